//! # l3vpn-reconcile
//!
//! Per-device reconciliation of L3 VPN services and the bounded-concurrency
//! run that drives it.
//!
//! Call [`pipeline::build`] to assemble a [`Reconciler`] from a loaded
//! [`l3vpn_core::RunConfig`], then [`pipeline::run`] to reconcile a set of
//! hosts. Device I/O goes through the [`DeviceDriver`] trait;
//! [`SnapshotDriver`] is the file-backed implementation.

pub mod device;
pub mod error;
pub mod pipeline;
pub mod plan;
pub mod reconcile;
pub mod snapshot;

pub use device::{DeviceDriver, PushMode};
pub use error::{Failure, FailureKind, FetchError, PushError, ReconcileError};
pub use pipeline::{requires_teardown_confirmation, HostScope, RunReport, RunSummary};
pub use reconcile::{
    DeviceOutcome, DeviceReport, ReconcileOptions, Reconciler, Step, StepOutcome, StepStatus,
};
pub use snapshot::SnapshotDriver;
