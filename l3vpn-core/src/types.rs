//! Domain types for the L3 VPN service catalog and device state.
//!
//! All types deserialize from YAML (catalog, inventory) or JSON (device
//! snapshots) via serde. Sets of resource identifiers are `BTreeSet<String>`
//! so that every iteration order downstream is deterministic.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed name for a service (and the VRF that carries it).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceName(pub String);

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ServiceName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ServiceName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A strongly-typed site identifier, e.g. `site-east`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteName(pub String);

impl fmt::Display for SiteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for SiteName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SiteName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A strongly-typed inventory host name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostName(pub String);

impl fmt::Display for HostName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for HostName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for HostName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Unordered collection of resource identifiers (VRF or interface names).
pub type ResourceSet = BTreeSet<String>;

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// One service-facing interface as declared in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceSpec {
    pub name: String,
    /// `"<address> <mask>"`, mask being a prefix (`/30`) or dotted mask.
    pub ip: String,
}

/// Parameters of a service at one site.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SiteServiceParams {
    #[serde(default, deserialize_with = "crate::types::null_as_default")]
    pub interfaces: Vec<InterfaceSpec>,
}

/// A service as declared in the catalog document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub name: ServiceName,
    pub id: u32,
    pub description: String,
    pub route_import: String,
    pub route_export: String,
    #[serde(default)]
    pub sites: Option<BTreeMap<SiteName, SiteServiceParams>>,
}

/// Global, site-independent view of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePolicy {
    pub id: u32,
    pub description: String,
    pub route_import: String,
    pub route_export: String,
}

impl From<&ServiceDefinition> for ServicePolicy {
    fn from(def: &ServiceDefinition) -> Self {
        Self {
            id: def.id,
            description: def.description.clone(),
            route_import: def.route_import.clone(),
            route_export: def.route_export.clone(),
        }
    }
}

/// Service name → policy, for every service in the catalog.
pub type GlobalServices = BTreeMap<ServiceName, ServicePolicy>;

/// Service name → parameters, for the services attached to one site.
pub type SiteServices = BTreeMap<ServiceName, SiteServiceParams>;

// ---------------------------------------------------------------------------
// Derived interface addressing
// ---------------------------------------------------------------------------

/// Interface configuration for a multi-homed site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiHomedInterface {
    pub name: String,
    /// Derived operational address followed by the original mask token.
    pub ip: String,
    /// Original catalog address, used as the redundancy-protocol virtual IP.
    pub virtual_ip: String,
}

// ---------------------------------------------------------------------------
// Observed device state
// ---------------------------------------------------------------------------

/// One interface as reported by the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceRecord {
    pub name: String,
    pub is_up: bool,
    /// Administrative state as reported. Informational only; cleanup
    /// decisions look at `is_up` alone.
    pub is_enabled: bool,
}

/// An IPv4 address with prefix length carried by an interface.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InterfaceAddress {
    pub address: String,
    pub prefix_length: u8,
}

/// Snapshot of a device taken at the start of a reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ObservedState {
    pub vrfs: ResourceSet,
    pub interfaces: BTreeMap<String, InterfaceRecord>,
    pub interfaces_ip: BTreeMap<String, Vec<InterfaceAddress>>,
}

impl ObservedState {
    /// Every interface name on the device.
    pub fn interface_names(&self) -> ResourceSet {
        self.interfaces.keys().cloned().collect()
    }

    /// Names of interfaces carrying at least one IP address.
    pub fn interfaces_with_ip(&self) -> ResourceSet {
        self.interfaces_ip
            .iter()
            .filter(|(_, addrs)| !addrs.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// First IPv4 address of `interface`, if any.
    pub fn first_address(&self, interface: &str) -> Option<&str> {
        self.interfaces_ip
            .get(interface)
            .and_then(|addrs| addrs.first())
            .map(|a| a.address.as_str())
    }

    pub fn is_up(&self, interface: &str) -> bool {
        self.interfaces.get(interface).is_some_and(|i| i.is_up)
    }
}

/// Treat an explicit YAML `null` like an absent field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
