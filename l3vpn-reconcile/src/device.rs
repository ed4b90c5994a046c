//! Device communication seam.
//!
//! The reconciler only ever fetches one snapshot and pushes merge-mode
//! configuration blocks; everything else (transport, authentication, retries)
//! belongs to the driver.

use async_trait::async_trait;
use serde::Serialize;

use l3vpn_core::types::{HostName, ObservedState};

use crate::error::{FetchError, PushError};

/// How a pushed block combines with the running configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PushMode {
    Merge,
    Replace,
}

#[async_trait]
pub trait DeviceDriver: Send + Sync {
    /// Fetch VRF names, interface inventory and interface addresses.
    async fn fetch(&self, host: &HostName) -> Result<ObservedState, FetchError>;

    /// Apply a configuration block. Atomic from the caller's point of view.
    async fn push(&self, host: &HostName, config: &str, mode: PushMode) -> Result<(), PushError>;
}
