//! Nullable infrastructure for deterministic testing.
//!
//! The orchestrator only talks to the election service through the
//! [`Backend`](votestorm_client::Backend) trait. This crate provides a
//! test-friendly implementation that:
//! - Records every call in order, for sequencing assertions
//! - Fails chosen calls on demand (backend, transport or timeout errors)
//! - Simulates balances that settle only after a configurable number of reads
//! - Never touches the network
//!
//! Usage: hand a `NullBackend` to the orchestrator in place of the GraphQL client.

pub mod backend;
pub mod faults;

pub use backend::{Call, NullBackend};
pub use faults::{Fault, FaultKind};
