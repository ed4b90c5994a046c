//! `l3vpn reconcile` — bring devices in line with the service catalog.

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use l3vpn_core::HostName;
use l3vpn_reconcile::pipeline::{self, HostScope};
use l3vpn_reconcile::{
    requires_teardown_confirmation, DeviceOutcome, DeviceReport, ReconcileOptions, RunReport,
    StepStatus,
};

use crate::load_config;

const TEARDOWN_PROMPT: &str = "Please confirm that all L3 VPN services shall be removed [Yes/No]: ";

/// Arguments for `l3vpn reconcile`.
#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// Push configuration to devices. Without this flag nothing is pushed.
    #[arg(long)]
    pub commit: bool,

    /// Do not ask for confirmation when the catalog is empty.
    #[arg(long)]
    pub yes: bool,

    /// Only reconcile this host (repeatable).
    #[arg(long = "host", value_name = "NAME")]
    pub hosts: Vec<String>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl ReconcileArgs {
    pub fn run(self, config_path: &Path, verbose: bool) -> Result<ExitCode> {
        let config = load_config(config_path)?;
        let options = ReconcileOptions {
            dry_run: !self.commit,
        };
        let reconciler =
            pipeline::build(&config, options).context("failed to prepare reconciliation")?;

        if requires_teardown_confirmation(reconciler.catalog()) {
            if !self.yes && !confirm_teardown()? {
                tracing::info!("teardown not confirmed, no device touched");
                bail!("aborted: removal of all L3 VPN services was not confirmed");
            }
            tracing::warn!(
                dry_run = options.dry_run,
                "service catalog is empty, removing every service VRF"
            );
        }

        let scope = if self.hosts.is_empty() {
            HostScope::All
        } else {
            HostScope::Only(self.hosts.into_iter().map(HostName::from).collect())
        };
        let hosts = scope.resolve(reconciler.inventory());

        let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
        let report = runtime.block_on(pipeline::run(
            Arc::new(reconciler),
            hosts,
            config.runner.num_workers,
        ));

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize run report")?
            );
        } else {
            print_report(&report, verbose);
        }

        Ok(if report.has_failures() {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        })
    }
}

fn confirm_teardown() -> Result<bool> {
    eprint!("{TEARDOWN_PROMPT}");
    io::stderr().flush().context("failed to flush prompt")?;
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("failed to read confirmation")?;
    Ok(is_affirmative(&answer))
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "host")]
    host: String,
    #[tabled(rename = "site")]
    site: String,
    #[tabled(rename = "homing")]
    homing: &'static str,
    #[tabled(rename = "outcome")]
    outcome: &'static str,
    #[tabled(rename = "detail")]
    detail: String,
}

impl From<&DeviceReport> for DeviceRow {
    fn from(d: &DeviceReport) -> Self {
        let (outcome, detail) = match &d.outcome {
            DeviceOutcome::Changed => ("changed", changed_steps(d)),
            DeviceOutcome::NoOp => ("no-op", String::new()),
            DeviceOutcome::Failed(f) => ("failed", f.to_string()),
        };
        DeviceRow {
            host: d.host.to_string(),
            site: d.site.as_ref().map(ToString::to_string).unwrap_or_else(|| "-".to_string()),
            homing: if d.multi_homed { "multi" } else { "single" },
            outcome,
            detail,
        }
    }
}

fn changed_steps(d: &DeviceReport) -> String {
    d.steps
        .iter()
        .filter(|s| s.status.is_change())
        .map(|s| s.step.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_report(report: &RunReport, verbose: bool) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    let summary = report.summary();

    if report.devices.is_empty() {
        println!("{prefix}No hosts to reconcile.");
        return;
    }

    let rows: Vec<DeviceRow> = report.devices.iter().map(DeviceRow::from).collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    let failed = format!("{} failed", summary.failed);
    let failed = if summary.failed > 0 {
        failed.red().bold().to_string()
    } else {
        failed
    };
    println!(
        "{prefix}{} devices | {} changed | {} no-op | {failed}",
        report.devices.len(),
        summary.changed.to_string().green(),
        summary.no_op,
    );

    if report.dry_run && verbose {
        for device in &report.devices {
            for step in device
                .steps
                .iter()
                .filter(|s| s.status == StepStatus::Planned)
            {
                println!("{}", format!("--- {} / {} ---", device.host, step.step).bold());
                if let Some(config) = &step.config {
                    print!("{config}");
                }
            }
        }
    }

    if report.dry_run && summary.changed > 0 {
        println!("Run 'l3vpn reconcile --commit' to apply.");
    }
}
