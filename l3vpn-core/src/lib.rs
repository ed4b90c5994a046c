//! l3vpn core library — domain types, catalog and inventory loading, and the
//! pure reconciliation primitives.
//!
//! - [`types`] — newtypes and domain structs
//! - [`error`] — [`CatalogError`], [`InventoryError`], [`SiteResolutionError`], [`AddressError`]
//! - [`catalog`] — service catalog loader
//! - [`inventory`] — hosts, groups, defaults, site resolution
//! - [`config`] — run configuration
//! - [`address`] — multi-homed address derivation
//! - [`diff`] — obsolete / missing set differences
//! - [`classify`] — subinterface classification

pub mod address;
pub mod catalog;
pub mod classify;
pub mod config;
pub mod diff;
pub mod error;
pub mod inventory;
pub mod types;

pub use catalog::Catalog;
pub use classify::SubinterfaceClassifier;
pub use config::RunConfig;
pub use diff::ResourceDiff;
pub use error::{AddressError, CatalogError, InventoryError, SiteResolutionError};
pub use inventory::{Homing, Inventory, RedundancySettings, SiteContext};
pub use types::{
    GlobalServices, HostName, InterfaceRecord, MultiHomedInterface, ObservedState, ResourceSet,
    ServiceName, ServicePolicy, SiteName, SiteServices,
};
