//! File-backed [`DeviceDriver`].
//!
//! ## Layout
//!
//! ```text
//! <snapshot_dir>/<host>.json   napalm getter output: network_instances,
//!                              interfaces, interfaces_ip
//! <output_dir>/<host>.cfg      every pushed block, appended in push order
//! ```
//!
//! ## Append protocol
//!
//! 1. Read the current output file (empty if absent).
//! 2. Append the block, normalised to LF and newline-terminated.
//! 3. Write to `<path>.tmp`.
//! 4. Rename to the final path (atomic on POSIX); on failure remove the tmp.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;

use l3vpn_core::types::{HostName, InterfaceAddress, InterfaceRecord, ObservedState};

use crate::device::{DeviceDriver, PushMode};
use crate::error::{push_io_err, FetchError, PushError};

// ---------------------------------------------------------------------------
// Snapshot schema
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct NapalmSnapshot {
    #[serde(default)]
    network_instances: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    interfaces: BTreeMap<String, NapalmInterface>,
    #[serde(default)]
    interfaces_ip: BTreeMap<String, NapalmInterfaceIp>,
}

#[derive(Debug, Deserialize)]
struct NapalmInterface {
    is_up: bool,
    #[serde(default = "enabled_by_default")]
    is_enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct NapalmInterfaceIp {
    #[serde(default)]
    ipv4: BTreeMap<String, NapalmPrefix>,
}

#[derive(Debug, Deserialize)]
struct NapalmPrefix {
    prefix_length: u8,
}

impl From<NapalmSnapshot> for ObservedState {
    fn from(snap: NapalmSnapshot) -> Self {
        let interfaces = snap
            .interfaces
            .into_iter()
            .map(|(name, i)| {
                let record = InterfaceRecord {
                    name: name.clone(),
                    is_up: i.is_up,
                    is_enabled: i.is_enabled,
                };
                (name, record)
            })
            .collect();
        let interfaces_ip = snap
            .interfaces_ip
            .into_iter()
            .map(|(name, ip)| {
                let addrs = ip
                    .ipv4
                    .into_iter()
                    .map(|(address, p)| InterfaceAddress {
                        address,
                        prefix_length: p.prefix_length,
                    })
                    .collect();
                (name, addrs)
            })
            .collect();
        ObservedState {
            vrfs: snap.network_instances.into_keys().collect(),
            interfaces,
            interfaces_ip,
        }
    }
}

/// Parse napalm-shaped getter output. `origin` is only used in errors.
pub fn parse_snapshot(contents: &str, origin: &Path) -> Result<ObservedState, FetchError> {
    let snap: NapalmSnapshot =
        serde_json::from_str(contents).map_err(|source| FetchError::Malformed {
            path: origin.to_path_buf(),
            source,
        })?;
    Ok(snap.into())
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SnapshotDriver {
    snapshot_dir: PathBuf,
    output_dir: PathBuf,
}

impl SnapshotDriver {
    pub fn new(snapshot_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            snapshot_dir: snapshot_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn snapshot_path(&self, host: &HostName) -> PathBuf {
        self.snapshot_dir.join(format!("{}.json", host.0))
    }

    pub fn output_path(&self, host: &HostName) -> PathBuf {
        self.output_dir.join(format!("{}.cfg", host.0))
    }
}

#[async_trait]
impl DeviceDriver for SnapshotDriver {
    async fn fetch(&self, host: &HostName) -> Result<ObservedState, FetchError> {
        let path = self.snapshot_path(host);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(FetchError::SnapshotNotFound {
                    host: host.clone(),
                    path,
                })
            }
            Err(source) => return Err(FetchError::Io { path, source }),
        };
        parse_snapshot(&contents, &path)
    }

    async fn push(&self, host: &HostName, config: &str, mode: PushMode) -> Result<(), PushError> {
        if mode == PushMode::Replace {
            return Err(PushError::ReplaceUnsupported { host: host.clone() });
        }
        let path = self.output_path(host);
        let block = config.to_string();
        let target = path.clone();
        tokio::task::spawn_blocking(move || append_atomic(&target, &block))
            .await
            .map_err(|err| PushError::Rejected {
                host: host.clone(),
                message: format!("push task join error: {err}"),
            })??;
        tracing::info!(host = %host, path = %path.display(), "pushed configuration block");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// append_atomic
// ---------------------------------------------------------------------------

/// Append `block` to `path` through a temp file and rename.
pub(crate) fn append_atomic(path: &Path, block: &str) -> Result<(), PushError> {
    let tmp = PathBuf::from(format!("{}.tmp", path.display()));
    let mut content = match std::fs::read_to_string(path) {
        Ok(existing) => existing,
        Err(err) if err.kind() == ErrorKind::NotFound => String::new(),
        Err(err) => return Err(push_io_err(path, err)),
    };
    content.push_str(&block.replace("\r\n", "\n"));
    if !content.ends_with('\n') {
        content.push('\n');
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| push_io_err(parent, e))?;
    }
    std::fs::write(&tmp, &content).map_err(|e| push_io_err(&tmp, e))?;

    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(push_io_err(path, e));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
