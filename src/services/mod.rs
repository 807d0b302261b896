//! Service logic
//!
//! Identifier resolution, command rendering, status interpretation and
//! connectivity aggregation. Nothing here owns a transport; commands run
//! through an [`Executor`](crate::exec::Executor) supplied by the caller.

pub mod catalog;
pub mod connectivity;
pub mod family;
pub mod status;

pub use catalog::{render, Operation};
pub use connectivity::{ConnectivityPlan, ConnectivityReport, ProbeOutcome, ProbeResult};
pub use family::{resolve, Family, ServiceDescriptor};
pub use status::{interpret, CheckKind, Interpretation, StatusCheck, Verdict};
