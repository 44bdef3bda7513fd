//! Workload orchestration for election-service scale tests.
//!
//! [`WorkloadOrchestrator`] drives a [`Backend`](votestorm_client::Backend)
//! through the full election lifecycle (submit, provision accounts, scan,
//! vote, decode, collect) with settle barriers between the phases whose
//! backend effects complete asynchronously.

pub mod config;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod phase;
pub mod pool;
pub mod report;
pub mod retry;
pub mod shutdown;
pub mod tracing_spans;
pub mod waiter;

pub use config::{AmountFormula, Barrier, BarrierConfig, FailurePolicy, RetryConfig, WorkloadConfig};
pub use error::RunError;
pub use metrics::{InFlightGuard, RunMetrics};
pub use orchestrator::WorkloadOrchestrator;
pub use phase::{Phase, RunState};
pub use pool::WorkerPool;
pub use report::{PhaseTiming, RunReport, SkippedAccount};
pub use retry::RetryPolicy;
pub use shutdown::{ShutdownController, ShutdownSignal};
pub use waiter::{WaitError, Waiter};
