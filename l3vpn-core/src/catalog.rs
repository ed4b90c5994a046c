//! Declarative service catalog.
//!
//! # Document shape
//!
//! ```yaml
//! services:
//!   - name: blue
//!     id: 10
//!     description: Blue customer
//!     route_import: "65000:10"
//!     route_export: "65000:10"
//!     sites:
//!       site-east:
//!         interfaces:
//!           - name: GigabitEthernet2.10
//!             ip: 10.0.0.1 /30
//! ```
//!
//! `services: null` (or an empty list) is a valid catalog with no services.
//! The `services` key itself is required and no other top-level key is
//! accepted; an empty file is an error.
//! The file is read once per run; the global and per-site views are computed
//! from the parsed document.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::address::split_address_mask;
use crate::error::CatalogError;
use crate::types::{
    GlobalServices, ServiceDefinition, ServicePolicy, SiteName, SiteServices,
};

/// `deserialize_with` keeps a missing `services` key an error instead of `None`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogDocument {
    #[serde(deserialize_with = "Option::deserialize")]
    services: Option<Vec<ServiceDefinition>>,
}

/// The parsed, validated service catalog. Immutable after load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    services: Vec<ServiceDefinition>,
}

impl Catalog {
    /// Load and validate the catalog at `path`.
    ///
    /// Returns `CatalogError::NotFound` if absent, `CatalogError::Empty` for a
    /// blank file, `CatalogError::Parse` (with path + line context) if
    /// malformed YAML or the document shape is wrong.
    pub fn load_at(path: &Path) -> Result<Self, CatalogError> {
        if !path.exists() {
            return Err(CatalogError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let contents = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents, path.to_path_buf())
    }

    /// Parse a catalog document held in memory. `origin` is only used in errors.
    pub fn parse(contents: &str, origin: PathBuf) -> Result<Self, CatalogError> {
        if contents.trim().is_empty() {
            return Err(CatalogError::Empty { path: origin });
        }
        let doc: CatalogDocument = serde_yaml::from_str(contents)
            .map_err(|source| CatalogError::Parse { path: origin, source })?;
        Self::from_services(doc.services.unwrap_or_default())
    }

    /// Build a catalog from already-typed definitions, enforcing invariants.
    pub fn from_services(services: Vec<ServiceDefinition>) -> Result<Self, CatalogError> {
        let mut seen = BTreeSet::new();
        for service in &services {
            if !seen.insert(&service.name) {
                return Err(CatalogError::DuplicateService {
                    name: service.name.clone(),
                });
            }
            for (site, params) in service.sites.iter().flatten() {
                for iface in &params.interfaces {
                    split_address_mask(&iface.ip).map_err(|source| {
                        CatalogError::InvalidAddress {
                            service: service.name.clone(),
                            site: site.clone(),
                            interface: iface.name.clone(),
                            source,
                        }
                    })?;
                }
            }
        }
        Ok(Self { services })
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn services(&self) -> &[ServiceDefinition] {
        &self.services
    }

    /// Service name → policy for every declared service.
    pub fn global(&self) -> GlobalServices {
        self.services
            .iter()
            .map(|s| (s.name.clone(), ServicePolicy::from(s)))
            .collect()
    }

    /// Service name → parameters for the services attached to `site`.
    ///
    /// Services without site attachments, or not attached to `site`, are
    /// omitted.
    pub fn for_site(&self, site: &SiteName) -> SiteServices {
        self.services
            .iter()
            .filter_map(|s| {
                let params = s.sites.as_ref()?.get(site)?;
                Some((s.name.clone(), params.clone()))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
