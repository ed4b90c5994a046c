//! Inventory: hosts, groups, deployment defaults, and site resolution.
//!
//! # Files
//!
//! ```text
//! hosts.yaml     host → {hostname, platform, groups: [...], data: {hsrp}}
//! groups.yaml    group → {data: {multi_homed, hsrp}}
//! defaults.yaml  {data: {service_file, bgp_asn, system_vrfs, primary_loopback}}
//! ```
//!
//! A host's site is the first of its groups whose name starts with
//! [`SITE_GROUP_PREFIX`]. Host data overrides the site group's data.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::classify::{SubinterfaceClassifier, DEFAULT_SUBINTERFACE_PATTERN};
use crate::config::InventoryFiles;
use crate::error::{InventoryError, SiteResolutionError};
use crate::types::{HostName, SiteName};

/// Group names carrying this prefix identify a site.
pub const SITE_GROUP_PREFIX: &str = "site-";

// ---------------------------------------------------------------------------
// File schemas
// ---------------------------------------------------------------------------

/// First-hop redundancy settings for multi-homed sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedundancySettings {
    pub priority: u32,
    pub vip_offset: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostData {
    #[serde(default)]
    pub hsrp: Option<RedundancySettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default, deserialize_with = "crate::types::null_as_default")]
    pub data: HostData,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupData {
    #[serde(default)]
    pub multi_homed: bool,
    #[serde(default)]
    pub hsrp: Option<RedundancySettings>,
}

/// A named group with its data, as seen from a host's ordered membership list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub name: String,
    pub data: GroupData,
}

#[derive(Debug, Deserialize)]
struct GroupEntry {
    #[serde(default, deserialize_with = "crate::types::null_as_default")]
    data: GroupData,
}

/// Deployment-wide settings shared by every host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defaults {
    pub service_file: PathBuf,
    pub bgp_asn: u32,
    #[serde(default)]
    pub system_vrfs: Vec<String>,
    pub primary_loopback: String,
    #[serde(default)]
    pub subinterface_pattern: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DefaultsDocument {
    data: Defaults,
}

// ---------------------------------------------------------------------------
// Site resolution
// ---------------------------------------------------------------------------

/// How a site is attached to the provider network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Homing {
    Single,
    Multi(RedundancySettings),
}

impl Homing {
    pub fn is_multi(&self) -> bool {
        matches!(self, Homing::Multi(_))
    }
}

/// Everything the reconciler needs to know about where a host sits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteContext {
    pub host: HostName,
    pub site: SiteName,
    pub homing: Homing,
}

/// First group in `groups` whose name marks it as a site.
pub fn site_group(groups: &[Group]) -> Option<&Group> {
    groups.iter().find(|g| g.name.starts_with(SITE_GROUP_PREFIX))
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Inventory {
    hosts: BTreeMap<HostName, Host>,
    groups: BTreeMap<String, GroupData>,
    defaults: Defaults,
}

impl Inventory {
    /// Load the three inventory files. Relative `service_file` paths are
    /// resolved against `base_dir`.
    pub fn load(files: &InventoryFiles, base_dir: &Path) -> Result<Self, InventoryError> {
        let hosts: BTreeMap<HostName, Host> = read_yaml(&files.hosts_file)?;
        let groups: BTreeMap<String, GroupEntry> = read_yaml(&files.groups_file)?;
        let mut defaults = read_yaml::<DefaultsDocument>(&files.defaults_file)?.data;
        if defaults.service_file.is_relative() {
            defaults.service_file = base_dir.join(&defaults.service_file);
        }
        let groups = groups.into_iter().map(|(k, v)| (k, v.data)).collect();
        Self::new(hosts, groups, defaults)
    }

    /// Build an inventory from typed parts, checking group references.
    pub fn new(
        hosts: BTreeMap<HostName, Host>,
        groups: BTreeMap<String, GroupData>,
        defaults: Defaults,
    ) -> Result<Self, InventoryError> {
        for (name, host) in &hosts {
            if let Some(group) = host.groups.iter().find(|g| !groups.contains_key(*g)) {
                return Err(InventoryError::UnknownGroup {
                    host: name.clone(),
                    group: group.clone(),
                });
            }
        }
        if let Some(pattern) = &defaults.subinterface_pattern {
            SubinterfaceClassifier::new(pattern)?;
        }
        Ok(Self {
            hosts,
            groups,
            defaults,
        })
    }

    pub fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    pub fn hosts(&self) -> impl Iterator<Item = (&HostName, &Host)> {
        self.hosts.iter()
    }

    pub fn host(&self, name: &HostName) -> Option<&Host> {
        self.hosts.get(name)
    }

    /// The classifier configured for this deployment.
    pub fn classifier(&self) -> Result<SubinterfaceClassifier, InventoryError> {
        SubinterfaceClassifier::new(
            self.defaults
                .subinterface_pattern
                .as_deref()
                .unwrap_or(DEFAULT_SUBINTERFACE_PATTERN),
        )
    }

    /// The host's groups, in membership order.
    pub fn groups_of(&self, host: &Host) -> Vec<Group> {
        host.groups
            .iter()
            .filter_map(|name| {
                self.groups.get(name).map(|data| Group {
                    name: name.clone(),
                    data: data.clone(),
                })
            })
            .collect()
    }

    /// Resolve the site and homing mode of `name`.
    pub fn resolve_site(&self, name: &HostName) -> Result<SiteContext, SiteResolutionError> {
        let host = self
            .host(name)
            .ok_or_else(|| SiteResolutionError::UnknownHost { host: name.clone() })?;
        let groups = self.groups_of(host);
        let group = site_group(&groups)
            .ok_or_else(|| SiteResolutionError::NoSiteGroup { host: name.clone() })?;
        let site = SiteName::from(group.name.as_str());

        let homing = if group.data.multi_homed {
            let settings = host.data.hsrp.or(group.data.hsrp).ok_or_else(|| {
                SiteResolutionError::MissingRedundancy {
                    host: name.clone(),
                    site: site.clone(),
                }
            })?;
            Homing::Multi(settings)
        } else {
            Homing::Single
        };

        Ok(SiteContext {
            host: name.clone(),
            site,
            homing,
        })
    }
}

/// Read and deserialize a YAML file, mapping failures to [`InventoryError`].
pub(crate) fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, InventoryError> {
    if !path.exists() {
        return Err(InventoryError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|source| InventoryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&contents).map_err(|source| InventoryError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
