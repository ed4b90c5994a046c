//! `l3vpn inventory` — hosts with their resolved site and homing mode.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use l3vpn_core::{Homing, Inventory};

use crate::load_config;

/// Arguments for `l3vpn inventory`.
#[derive(Args, Debug)]
pub struct InventoryArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct HostJson {
    host: String,
    site: Option<String>,
    multi_homed: Option<bool>,
    priority: Option<u32>,
    vip_offset: Option<u32>,
    error: Option<String>,
}

#[derive(Tabled)]
struct HostRow {
    #[tabled(rename = "host")]
    host: String,
    #[tabled(rename = "site")]
    site: String,
    #[tabled(rename = "homing")]
    homing: String,
}

impl InventoryArgs {
    pub fn run(self, config_path: &Path) -> Result<()> {
        let config = load_config(config_path)?;
        let inventory = Inventory::load(&config.inventory, &config.base_dir)
            .context("failed to load inventory")?;
        let hosts = resolve_all(&inventory);

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&hosts).context("failed to serialize inventory")?
            );
            return Ok(());
        }
        if hosts.is_empty() {
            println!("No hosts in inventory.");
            return Ok(());
        }

        let unresolved = hosts.iter().filter(|h| h.error.is_some()).count();
        let rows: Vec<HostRow> = hosts.into_iter().map(HostRow::from).collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        if unresolved > 0 {
            println!(
                "{}",
                format!("{unresolved} host(s) cannot be reconciled").yellow()
            );
        }
        Ok(())
    }
}

fn resolve_all(inventory: &Inventory) -> Vec<HostJson> {
    inventory
        .hosts()
        .map(|(name, _)| match inventory.resolve_site(name) {
            Ok(ctx) => {
                let (priority, vip_offset) = match ctx.homing {
                    Homing::Multi(r) => (Some(r.priority), Some(r.vip_offset)),
                    Homing::Single => (None, None),
                };
                HostJson {
                    host: name.to_string(),
                    site: Some(ctx.site.to_string()),
                    multi_homed: Some(ctx.homing.is_multi()),
                    priority,
                    vip_offset,
                    error: None,
                }
            }
            Err(err) => HostJson {
                host: name.to_string(),
                site: None,
                multi_homed: None,
                priority: None,
                vip_offset: None,
                error: Some(err.to_string()),
            },
        })
        .collect()
}

impl From<HostJson> for HostRow {
    fn from(h: HostJson) -> Self {
        let homing = match (h.error, h.multi_homed, h.priority, h.vip_offset) {
            (Some(err), ..) => err,
            (None, Some(true), Some(priority), Some(offset)) => {
                format!("multi (priority {priority}, offset {offset})")
            }
            _ => "single".to_string(),
        };
        HostRow {
            host: h.host,
            site: h.site.unwrap_or_else(|| "-".to_string()),
            homing,
        }
    }
}
