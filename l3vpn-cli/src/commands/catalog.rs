//! `l3vpn catalog` — inspect the service catalog.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use l3vpn_core::{Catalog, Inventory, SiteName};

use crate::load_config;

/// Arguments for `l3vpn catalog`.
#[derive(Args, Debug)]
pub struct CatalogArgs {
    /// Show the interfaces assigned to one site instead of the global list.
    #[arg(long)]
    pub site: Option<String>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct ServiceRow {
    #[tabled(rename = "service")]
    name: String,
    #[tabled(rename = "id")]
    id: u32,
    #[tabled(rename = "description")]
    description: String,
    #[tabled(rename = "import")]
    route_import: String,
    #[tabled(rename = "export")]
    route_export: String,
    #[tabled(rename = "sites")]
    sites: String,
}

#[derive(Tabled)]
struct AssignmentRow {
    #[tabled(rename = "service")]
    service: String,
    #[tabled(rename = "interface")]
    interface: String,
    #[tabled(rename = "address")]
    ip: String,
}

impl CatalogArgs {
    pub fn run(self, config_path: &Path) -> Result<()> {
        let config = load_config(config_path)?;
        let inventory = Inventory::load(&config.inventory, &config.base_dir)
            .context("failed to load inventory")?;
        let service_file = &inventory.defaults().service_file;
        let catalog = Catalog::load_at(service_file)
            .with_context(|| format!("failed to load catalog {}", service_file.display()))?;

        match self.site {
            Some(site) => print_site(&catalog, &SiteName::from(site), self.json),
            None => print_global(&catalog, self.json),
        }
    }
}

fn print_global(catalog: &Catalog, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(catalog.services())
                .context("failed to serialize catalog")?
        );
        return Ok(());
    }
    if catalog.is_empty() {
        println!("{}", "Catalog is empty: a reconcile run would remove every service.".yellow());
        return Ok(());
    }

    let rows: Vec<ServiceRow> = catalog
        .services()
        .iter()
        .map(|s| ServiceRow {
            name: s.name.to_string(),
            id: s.id,
            description: s.description.clone(),
            route_import: s.route_import.clone(),
            route_export: s.route_export.clone(),
            sites: s
                .sites
                .as_ref()
                .map(|sites| {
                    sites
                        .keys()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .unwrap_or_default(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    println!("{} services", catalog.len());
    Ok(())
}

fn print_site(catalog: &Catalog, site: &SiteName, json: bool) -> Result<()> {
    let services = catalog.for_site(site);
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&services).context("failed to serialize site services")?
        );
        return Ok(());
    }
    if services.is_empty() {
        println!("No services assigned to '{site}'.");
        return Ok(());
    }

    let rows: Vec<AssignmentRow> = services
        .iter()
        .flat_map(|(name, params)| {
            params.interfaces.iter().map(move |i| AssignmentRow {
                service: name.to_string(),
                interface: i.name.clone(),
                ip: i.ip.clone(),
            })
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", site.to_string().bold());
    println!("{table}");
    Ok(())
}
