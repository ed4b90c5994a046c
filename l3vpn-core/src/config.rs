//! Run configuration (`config.yaml`).
//!
//! ```yaml
//! runner:
//!   num_workers: 20
//! inventory:
//!   hosts_file: inventory/hosts.yaml
//!   groups_file: inventory/groups.yaml
//!   defaults_file: inventory/defaults.yaml
//! device:
//!   snapshot_dir: snapshots
//!   output_dir: out
//! templates_dir: templates
//! ```
//!
//! Relative paths are resolved against the directory holding the config file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::InventoryError;
use crate::inventory::read_yaml;

/// Default upper bound on concurrently reconciled devices.
pub const DEFAULT_NUM_WORKERS: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            num_workers: DEFAULT_NUM_WORKERS,
        }
    }
}

fn default_num_workers() -> usize {
    DEFAULT_NUM_WORKERS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryFiles {
    pub hosts_file: PathBuf,
    pub groups_file: PathBuf,
    pub defaults_file: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub snapshot_dir: PathBuf,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub runner: RunnerConfig,
    pub inventory: InventoryFiles,
    pub device: DeviceConfig,
    #[serde(default)]
    pub templates_dir: Option<PathBuf>,
    /// Directory of the config file; relative paths above are already joined to it.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl RunConfig {
    /// Load `path` and absolutise every relative path it contains.
    pub fn load_at(path: &Path) -> Result<Self, InventoryError> {
        let mut config: RunConfig = read_yaml(path)?;
        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        config.resolve_relative_to(&base);
        Ok(config)
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        join(&mut self.inventory.hosts_file);
        join(&mut self.inventory.groups_file);
        join(&mut self.inventory.defaults_file);
        join(&mut self.device.snapshot_dir);
        join(&mut self.device.output_dir);
        if let Some(dir) = self.templates_dir.as_mut() {
            join(dir);
        }
        self.runner.num_workers = self.runner.num_workers.max(1);
        self.base_dir = base.to_path_buf();
    }
}
