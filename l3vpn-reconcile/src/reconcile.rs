//! Per-device reconciliation.
//!
//! ## State machine
//!
//! ```text
//! LoadSiteContext → FetchObservedState → Plan
//!   → RemoveObsoleteVrfs → CreateMissingVrfs → ConfigureBgp
//!   → ConfigureInterfaces → CleanupSubinterfaces → Done
//! ```
//!
//! Failures before the first step end the device immediately. Once steps
//! start, a render or push failure marks every later step skipped. An
//! address-derivation failure only fails `ConfigureInterfaces`; cleanup still
//! runs because it does not depend on derived addresses.
//!
//! Observed state is fetched exactly once, before any push.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use l3vpn_core::types::{GlobalServices, HostName, SiteName};
use l3vpn_core::{Catalog, Inventory, SubinterfaceClassifier};
use l3vpn_renderer::{RenderContext, TemplateEngine};

use crate::device::{DeviceDriver, PushMode};
use crate::error::{Failure, ReconcileError};
use crate::plan::{DeviceContext, InterfacePlan, Planner};

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    RemoveObsoleteVrfs,
    CreateMissingVrfs,
    ConfigureBgp,
    ConfigureInterfaces,
    CleanupSubinterfaces,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Step::RemoveObsoleteVrfs => "remove-obsolete-vrfs",
            Step::CreateMissingVrfs => "create-missing-vrfs",
            Step::ConfigureBgp => "configure-bgp",
            Step::ConfigureInterfaces => "configure-interfaces",
            Step::CleanupSubinterfaces => "cleanup-subinterfaces",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepStatus {
    /// Pushed to the device.
    Applied,
    /// Rendered but not pushed (dry run).
    Planned,
    /// Nothing to do.
    NoOp,
    /// Not attempted because an earlier step failed.
    Skipped,
    Failed(Failure),
}

impl StepStatus {
    pub fn is_change(&self) -> bool {
        matches!(self, StepStatus::Applied | StepStatus::Planned)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub step: Step,
    #[serde(flatten)]
    pub status: StepStatus,
    /// Rendered block, present for applied and planned steps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeviceOutcome {
    Changed,
    NoOp,
    Failed(Failure),
}

/// Everything that happened to one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceReport {
    pub host: HostName,
    pub site: Option<SiteName>,
    pub multi_homed: bool,
    pub steps: Vec<StepOutcome>,
    #[serde(flatten)]
    pub outcome: DeviceOutcome,
}

impl DeviceReport {
    /// A device that failed before any step ran.
    pub fn failed(host: HostName, site: Option<SiteName>, failure: Failure) -> Self {
        Self {
            host,
            site,
            multi_homed: false,
            steps: Vec::new(),
            outcome: DeviceOutcome::Failed(failure),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, DeviceOutcome::Failed(_))
    }

    pub fn step(&self, step: Step) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.step == step)
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Render every block but push nothing.
    pub dry_run: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self { dry_run: true }
    }
}

/// Shared, read-only run state. One instance serves every device task.
pub struct Reconciler {
    catalog: Arc<Catalog>,
    global: GlobalServices,
    inventory: Arc<Inventory>,
    classifier: SubinterfaceClassifier,
    engine: Arc<TemplateEngine>,
    driver: Arc<dyn DeviceDriver>,
    options: ReconcileOptions,
}

impl Reconciler {
    pub fn new(
        catalog: Arc<Catalog>,
        inventory: Arc<Inventory>,
        engine: Arc<TemplateEngine>,
        driver: Arc<dyn DeviceDriver>,
        options: ReconcileOptions,
    ) -> Result<Self, ReconcileError> {
        let classifier = inventory.classifier()?;
        let global = catalog.global();
        Ok(Self {
            catalog,
            global,
            inventory,
            classifier,
            engine,
            driver,
            options,
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn options(&self) -> ReconcileOptions {
        self.options
    }

    /// Bring one device in line with the catalog. Never panics on device
    /// errors; every failure ends up in the returned report.
    pub async fn reconcile(&self, host: &HostName) -> DeviceReport {
        let site = match self.inventory.resolve_site(host) {
            Ok(site) => site,
            Err(err) => {
                tracing::warn!(host = %host, error = %err, "site resolution failed");
                return DeviceReport::failed(host.clone(), None, Failure::from(&err));
            }
        };
        let services = self.catalog.for_site(&site.site);
        tracing::debug!(
            host = %host,
            site = %site.site,
            services = services.len(),
            multi_homed = site.homing.is_multi(),
            "site context loaded"
        );

        let observed = match self.driver.fetch(host).await {
            Ok(observed) => observed,
            Err(err) => {
                tracing::warn!(host = %host, error = %err, "fetch failed");
                return DeviceReport::failed(host.clone(), Some(site.site), Failure::from(&err));
            }
        };
        let ctx = DeviceContext {
            site,
            services,
            observed,
        };

        let planner = Planner {
            global: &self.global,
            defaults: self.inventory.defaults(),
            classifier: &self.classifier,
        };
        let plan = match planner.plan(&ctx) {
            Ok(plan) => plan,
            Err(err) => {
                tracing::warn!(host = %host, error = %err, "planning failed");
                return DeviceReport::failed(
                    host.clone(),
                    Some(ctx.site.site),
                    Failure::from(&err),
                );
            }
        };
        tracing::debug!(
            host = %host,
            obsolete = ?plan.vrf_diff.obsolete,
            missing = ?plan.vrf_diff.missing,
            "vrf diff"
        );

        let mut run = StepRunner::new(self, host);
        run.apply(Step::RemoveObsoleteVrfs, plan.remove_vrfs.as_ref()).await;
        run.apply(Step::CreateMissingVrfs, plan.create_vrfs.as_ref()).await;
        run.apply(Step::ConfigureBgp, plan.bgp.as_ref()).await;
        match &plan.interfaces {
            Ok(Some(InterfacePlan::SingleHomed(c))) => {
                run.apply(Step::ConfigureInterfaces, Some(c)).await
            }
            Ok(Some(InterfacePlan::MultiHomed(c))) => {
                run.apply(Step::ConfigureInterfaces, Some(c)).await
            }
            Ok(None) => run.record(Step::ConfigureInterfaces, StepStatus::NoOp, None),
            Err(_) if run.aborted => run.record(Step::ConfigureInterfaces, StepStatus::Skipped, None),
            Err(err) => {
                tracing::warn!(host = %host, error = %err, "address derivation failed");
                run.fail(Step::ConfigureInterfaces, Failure::from(err));
            }
        }
        run.apply(Step::CleanupSubinterfaces, plan.cleanup.as_ref()).await;

        let report = run.finish(ctx.site.site, ctx.site.homing.is_multi());
        match &report.outcome {
            DeviceOutcome::Failed(f) => tracing::warn!(host = %host, failure = %f, "device failed"),
            DeviceOutcome::Changed => tracing::info!(host = %host, "device reconciled"),
            DeviceOutcome::NoOp => tracing::info!(host = %host, "device already converged"),
        }
        report
    }
}

/// Executes steps in order and records their outcomes.
struct StepRunner<'a> {
    reconciler: &'a Reconciler,
    host: &'a HostName,
    steps: Vec<StepOutcome>,
    first_failure: Option<Failure>,
    aborted: bool,
}

impl<'a> StepRunner<'a> {
    fn new(reconciler: &'a Reconciler, host: &'a HostName) -> Self {
        Self {
            reconciler,
            host,
            steps: Vec::new(),
            first_failure: None,
            aborted: false,
        }
    }

    fn record(&mut self, step: Step, status: StepStatus, config: Option<String>) {
        self.steps.push(StepOutcome {
            step,
            status,
            config,
        });
    }

    /// Fail `step` and stop every later one.
    fn abort(&mut self, step: Step, failure: Failure) {
        self.aborted = true;
        self.fail(step, failure);
    }

    /// Fail `step` without affecting later ones.
    fn fail(&mut self, step: Step, failure: Failure) {
        self.first_failure.get_or_insert_with(|| failure.clone());
        self.record(step, StepStatus::Failed(failure), None);
    }

    async fn apply<C>(&mut self, step: Step, ctx: Option<&C>)
    where
        C: RenderContext + Sync,
    {
        if self.aborted {
            self.record(step, StepStatus::Skipped, None);
            return;
        }
        let Some(ctx) = ctx else {
            self.record(step, StepStatus::NoOp, None);
            return;
        };

        let config = match self.reconciler.engine.render(ctx) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(host = %self.host, %step, error = %err, "render failed");
                self.abort(step, Failure::from(&err));
                return;
            }
        };
        if config.trim().is_empty() {
            self.record(step, StepStatus::NoOp, None);
            return;
        }

        if self.reconciler.options.dry_run {
            tracing::info!(host = %self.host, %step, "[dry-run] would push block");
            self.record(step, StepStatus::Planned, Some(config));
            return;
        }

        match self
            .reconciler
            .driver
            .push(self.host, &config, PushMode::Merge)
            .await
        {
            Ok(()) => {
                tracing::info!(host = %self.host, %step, "applied");
                self.record(step, StepStatus::Applied, Some(config));
            }
            Err(err) => {
                tracing::warn!(host = %self.host, %step, error = %err, "push failed");
                self.abort(step, Failure::from(&err));
            }
        }
    }

    fn finish(self, site: SiteName, multi_homed: bool) -> DeviceReport {
        let outcome = match self.first_failure {
            Some(failure) => DeviceOutcome::Failed(failure),
            None if self.steps.iter().any(|s| s.status.is_change()) => DeviceOutcome::Changed,
            None => DeviceOutcome::NoOp,
        };
        DeviceReport {
            host: self.host.clone(),
            site: Some(site),
            multi_homed,
            steps: self.steps,
            outcome,
        }
    }
}
