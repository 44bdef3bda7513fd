//! Pre-built [`tracing::Span`] constructors for run activity.
//!
//! Consistent span names and fields make a run's log easy to filter by
//! phase or account.

use tracing::{info_span, Span};

use votestorm_client::Operation;
use votestorm_types::{AccountId, ElectionHandle};

use crate::phase::Phase;

/// Span covering a whole run against one endpoint.
pub fn run_span(endpoint: &str, accounts: u32) -> Span {
    info_span!("run", endpoint = %endpoint, accounts)
}

/// Span covering one phase of a run.
pub fn phase_span(phase: Phase, handle: Option<&ElectionHandle>) -> Span {
    match handle {
        Some(handle) => info_span!("phase", phase = %phase, election = %handle),
        None => info_span!("phase", phase = %phase),
    }
}

/// Span covering the work done for a single account within a phase.
pub fn account_span(account: AccountId) -> Span {
    info_span!("account", account = account.get())
}

/// Span covering one backend call, retries included.
pub fn call_span(operation: Operation) -> Span {
    info_span!("call", operation = %operation)
}
