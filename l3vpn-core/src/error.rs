//! Error types for l3vpn-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{HostName, ServiceName, SiteName};

/// Errors raised while loading the service catalog. Always fatal for the run.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Underlying I/O failure (permission denied, etc.).
    #[error("I/O error reading catalog at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse or schema error — includes file path and line context from serde_yaml.
    #[error("failed to parse catalog at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The catalog file did not exist.
    #[error("catalog not found at {path}")]
    NotFound { path: PathBuf },

    /// The file holds no document. Write `services: null` to declare an
    /// intentionally empty catalog.
    #[error("catalog at {path} is empty; expected a `services` key")]
    Empty { path: PathBuf },

    #[error("service '{name}' is declared more than once")]
    DuplicateService { name: ServiceName },

    /// An interface `ip` value could not be split into address and mask.
    #[error("service '{service}' at {site}: interface {interface}: {source}")]
    InvalidAddress {
        service: ServiceName,
        site: SiteName,
        interface: String,
        #[source]
        source: AddressError,
    },
}

/// Errors raised while loading inventory or run configuration files.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("file not found at {path}")]
    NotFound { path: PathBuf },

    #[error("host '{host}' references unknown group '{group}'")]
    UnknownGroup { host: HostName, group: String },

    #[error("invalid subinterface pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A device cannot be placed in a site. Fatal for that device only.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SiteResolutionError {
    #[error("host '{host}' is not a member of any 'site-' group")]
    NoSiteGroup { host: HostName },

    #[error("host '{host}' is unknown to the inventory")]
    UnknownHost { host: HostName },

    /// Multi-homed sites need a redundancy priority and address offset.
    #[error("site '{site}' is multi-homed but host '{host}' has no hsrp settings")]
    MissingRedundancy { host: HostName, site: SiteName },
}

/// Address parsing and offset arithmetic failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("expected '<address> <mask>', got '{value}'")]
    Malformed { value: String },

    #[error("'{value}' is not an IP address")]
    InvalidAddress { value: String },

    #[error("offset {offset} from {address} overflows the address family")]
    Overflow { address: String, offset: u32 },
}
