//! Waiting between phases: fixed sleeps and bounded polling, both
//! interruptible by shutdown.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use crate::shutdown::ShutdownSignal;

#[derive(Debug, Error)]
pub enum WaitError<E> {
    #[error("cancelled")]
    Cancelled,

    #[error("condition not met within {0:?}")]
    TimedOut(Duration),

    #[error("probe failed: {0}")]
    Probe(E),
}

/// Sleeps and polls on behalf of the orchestrator.
#[derive(Clone, Debug)]
pub struct Waiter {
    shutdown: ShutdownSignal,
}

impl Waiter {
    pub fn new(shutdown: ShutdownSignal) -> Self {
        Self { shutdown }
    }

    pub fn shutdown(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    /// Sleep for `duration` unless shutdown fires first.
    pub async fn wait_for(&self, duration: Duration) -> Result<(), WaitError<()>> {
        if self.shutdown.is_triggered() {
            return Err(WaitError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.shutdown.triggered() => Err(WaitError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    /// Run `probe` every `interval` until it returns `true`.
    ///
    /// Fails with [`WaitError::TimedOut`] once `timeout` has elapsed without
    /// success, or with [`WaitError::Probe`] as soon as the probe errors. A
    /// probe still running at the deadline is dropped.
    pub async fn poll_until<F, Fut, E>(
        &self,
        interval: Duration,
        timeout: Duration,
        mut probe: F,
    ) -> Result<u32, WaitError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, E>>,
    {
        let deadline = Instant::now() + timeout;
        let mut probes = 0u32;
        loop {
            if self.shutdown.is_triggered() {
                return Err(WaitError::Cancelled);
            }
            probes += 1;
            let settled = tokio::select! {
                biased;
                _ = self.shutdown.triggered() => return Err(WaitError::Cancelled),
                outcome = probe() => outcome.map_err(WaitError::Probe)?,
                _ = tokio::time::sleep_until(deadline) => return Err(WaitError::TimedOut(timeout)),
            };
            if settled {
                return Ok(probes);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(WaitError::TimedOut(timeout));
            }
            let pause = interval.min(deadline - now);
            tokio::select! {
                biased;
                _ = self.shutdown.triggered() => return Err(WaitError::Cancelled),
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }
}
