//! Bounded worker pool for per-account jobs.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

/// Runs keyed jobs with at most `size` in flight.
///
/// Jobs start in the order they are supplied. With `size == 1` they run
/// inline, one after the other, so the backend sees calls in exactly that
/// order.
pub struct WorkerPool {
    size: usize,
    semaphore: Arc<Semaphore>,
}

/// Outcome of one job, keyed by what it was run for.
pub type JobResult<K, T, E> = (K, Result<T, E>);

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            size,
            semaphore: Arc::new(Semaphore::new(size)),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Run every job and return the outcomes sorted by key.
    ///
    /// With `stop_on_error` the first failure is returned as `Err` as soon as
    /// it is observed: no further job is started and jobs still in flight are
    /// aborted.
    pub async fn run<K, T, E, Fut, I>(
        &self,
        jobs: I,
        stop_on_error: bool,
    ) -> Result<Vec<JobResult<K, T, E>>, (K, E)>
    where
        I: IntoIterator<Item = (K, Fut)>,
        K: Ord + Copy + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let mut finished = Vec::new();

        if self.size == 1 {
            for (key, job) in jobs {
                match job.await {
                    Err(e) if stop_on_error => return Err((key, e)),
                    outcome => finished.push((key, outcome)),
                }
            }
            return Ok(finished);
        }

        let mut set = JoinSet::new();
        for (key, job) in jobs {
            let permit = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("worker pool semaphore is never closed");
            set.spawn(async move {
                let outcome = job.await;
                drop(permit);
                (key, outcome)
            });
            while let Some(joined) = set.try_join_next() {
                collect(joined, stop_on_error, &mut finished)?;
            }
        }
        while let Some(joined) = set.join_next().await {
            collect(joined, stop_on_error, &mut finished)?;
        }

        finished.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(finished)
    }
}

fn collect<K, T, E>(
    joined: Result<JobResult<K, T, E>, JoinError>,
    stop_on_error: bool,
    finished: &mut Vec<JobResult<K, T, E>>,
) -> Result<(), (K, E)> {
    match joined {
        Ok((key, Err(e))) if stop_on_error => Err((key, e)),
        Ok(outcome) => {
            finished.push(outcome);
            Ok(())
        }
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        // Only aborted tasks land here, and the pool aborts nothing while it
        // is still collecting.
        Err(_) => Ok(()),
    }
}
