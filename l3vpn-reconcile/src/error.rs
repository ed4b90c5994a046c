//! Error types for l3vpn-reconcile.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use l3vpn_core::types::HostName;
use l3vpn_core::{AddressError, CatalogError, InventoryError, SiteResolutionError};
use l3vpn_renderer::RenderError;

/// Observed-state retrieval failed. Fatal for that device's reconciliation.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no snapshot for '{host}' at {path}")]
    SnapshotNotFound { host: HostName, path: PathBuf },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed device state at {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// VRFs must be created but the RD prefix cannot be determined.
    #[error("'{host}' has no IPv4 address on primary loopback {interface}")]
    MissingLoopback { host: HostName, interface: String },

    #[error("'{host}' unreachable: {message}")]
    Unreachable { host: HostName, message: String },
}

/// Configuration push failed or was rejected. No retry at this layer.
#[derive(Debug, Error)]
pub enum PushError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{host}' does not accept replace-mode pushes")]
    ReplaceUnsupported { host: HostName },

    #[error("'{host}' rejected configuration: {message}")]
    Rejected { host: HostName, message: String },
}

/// Run-level failures that stop every device.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("inventory error: {0}")]
    Inventory(#[from] InventoryError),

    #[error("render error: {0}")]
    Render(#[from] RenderError),
}

/// Category of a per-device failure, as shown in run summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    SiteResolution,
    Fetch,
    AddressDerivation,
    Render,
    Push,
    Internal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::SiteResolution => "site resolution",
            FailureKind::Fetch => "fetch",
            FailureKind::AddressDerivation => "address derivation",
            FailureKind::Render => "render",
            FailureKind::Push => "push",
            FailureKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// A failure kind paired with its message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, err: impl fmt::Display) -> Self {
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl From<&SiteResolutionError> for Failure {
    fn from(err: &SiteResolutionError) -> Self {
        Failure::new(FailureKind::SiteResolution, err)
    }
}

impl From<&FetchError> for Failure {
    fn from(err: &FetchError) -> Self {
        Failure::new(FailureKind::Fetch, err)
    }
}

impl From<&AddressError> for Failure {
    fn from(err: &AddressError) -> Self {
        Failure::new(FailureKind::AddressDerivation, err)
    }
}

impl From<&RenderError> for Failure {
    fn from(err: &RenderError) -> Self {
        Failure::new(FailureKind::Render, err)
    }
}

impl From<&PushError> for Failure {
    fn from(err: &PushError) -> Self {
        Failure::new(FailureKind::Push, err)
    }
}

/// Convenience constructor for [`PushError::Io`].
pub(crate) fn push_io_err(path: impl Into<PathBuf>, source: std::io::Error) -> PushError {
    PushError::Io {
        path: path.into(),
        source,
    }
}
