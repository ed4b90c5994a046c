//! Run-level entrypoint shared by every CLI command that touches devices.
//!
//! Each device gets its own task; a semaphore caps how many reconcile at
//! once. Devices share only read-only state, so no ordering holds between
//! them. Reports come back sorted by host name.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;

use l3vpn_core::types::HostName;
use l3vpn_core::{Catalog, Inventory, RunConfig};
use l3vpn_renderer::TemplateEngine;

use crate::error::{Failure, FailureKind, ReconcileError};
use crate::reconcile::{DeviceOutcome, DeviceReport, ReconcileOptions, Reconciler};
use crate::snapshot::SnapshotDriver;

/// Which devices a run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostScope {
    /// Every host in the inventory.
    All,
    /// Only the named hosts. Unknown names fail at site resolution.
    Only(Vec<HostName>),
}

impl HostScope {
    pub fn resolve(&self, inventory: &Inventory) -> Vec<HostName> {
        match self {
            HostScope::All => inventory.hosts().map(|(name, _)| name.clone()).collect(),
            HostScope::Only(hosts) => {
                let mut hosts = hosts.clone();
                hosts.sort();
                hosts.dedup();
                hosts
            }
        }
    }
}

/// Aggregated result of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub devices: Vec<DeviceReport>,
}

/// Device counts by outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub changed: usize,
    pub no_op: usize,
    pub failed: usize,
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        self.devices
            .iter()
            .fold(RunSummary::default(), |mut acc, d| {
                match d.outcome {
                    DeviceOutcome::Changed => acc.changed += 1,
                    DeviceOutcome::NoOp => acc.no_op += 1,
                    DeviceOutcome::Failed(_) => acc.failed += 1,
                }
                acc
            })
    }

    pub fn has_failures(&self) -> bool {
        self.devices.iter().any(DeviceReport::is_failed)
    }
}

/// An empty catalog would remove every service VRF on every device; callers
/// must confirm before dispatching.
pub fn requires_teardown_confirmation(catalog: &Catalog) -> bool {
    catalog.is_empty()
}

/// Build a file-backed reconciler from a loaded configuration.
pub fn build(config: &RunConfig, options: ReconcileOptions) -> Result<Reconciler, ReconcileError> {
    let inventory = Inventory::load(&config.inventory, &config.base_dir)?;
    let catalog = Catalog::load_at(&inventory.defaults().service_file)?;
    let engine = TemplateEngine::new(config.templates_dir.as_deref())?;
    let driver = SnapshotDriver::new(&config.device.snapshot_dir, &config.device.output_dir);
    tracing::debug!(
        services = catalog.len(),
        service_file = %inventory.defaults().service_file.display(),
        "catalog loaded"
    );
    Reconciler::new(
        Arc::new(catalog),
        Arc::new(inventory),
        Arc::new(engine),
        Arc::new(driver),
        options,
    )
}

/// Reconcile `hosts` with at most `num_workers` devices in flight.
pub async fn run(reconciler: Arc<Reconciler>, hosts: Vec<HostName>, num_workers: usize) -> RunReport {
    let started_at = Utc::now();
    let dry_run = reconciler.options().dry_run;
    let permits = Arc::new(Semaphore::new(num_workers.max(1)));
    tracing::info!(devices = hosts.len(), workers = num_workers, dry_run, "run started");

    let mut tasks = Vec::with_capacity(hosts.len());
    for host in hosts {
        let reconciler = Arc::clone(&reconciler);
        let permits = Arc::clone(&permits);
        let task_host = host.clone();
        let handle = tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(err) => {
                    return DeviceReport::failed(
                        task_host,
                        None,
                        Failure::new(FailureKind::Internal, err),
                    )
                }
            };
            reconciler.reconcile(&task_host).await
        });
        tasks.push((host, handle));
    }

    let mut devices = Vec::with_capacity(tasks.len());
    for (host, handle) in tasks {
        let report = match handle.await {
            Ok(report) => report,
            Err(err) => {
                tracing::error!(host = %host, error = %err, "device task aborted");
                DeviceReport::failed(host, None, Failure::new(FailureKind::Internal, err))
            }
        };
        devices.push(report);
    }
    devices.sort_by(|a, b| a.host.cmp(&b.host));

    let report = RunReport {
        dry_run,
        started_at,
        finished_at: Utc::now(),
        devices,
    };
    let summary = report.summary();
    tracing::info!(
        changed = summary.changed,
        no_op = summary.no_op,
        failed = summary.failed,
        "run finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_scope_sorts_and_dedups() {
        let scope = HostScope::Only(vec![
            HostName::from("r2"),
            HostName::from("r1"),
            HostName::from("r2"),
        ]);
        let inventory = Inventory::new(
            Default::default(),
            Default::default(),
            l3vpn_core::inventory::Defaults {
                service_file: "services.yaml".into(),
                bgp_asn: 65000,
                system_vrfs: Vec::new(),
                primary_loopback: "Loopback0".to_string(),
                subinterface_pattern: None,
            },
        )
        .expect("inventory");
        assert_eq!(
            scope.resolve(&inventory),
            vec![HostName::from("r1"), HostName::from("r2")]
        );
        assert!(HostScope::All.resolve(&inventory).is_empty());
    }

    #[test]
    fn empty_catalog_needs_confirmation() {
        assert!(requires_teardown_confirmation(&Catalog::default()));
    }
}
