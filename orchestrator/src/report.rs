//! Summary of a finished run.

use serde::Serialize;
use std::time::Duration;

use votestorm_types::{AccountId, ElectionHandle, ResultSet};

use crate::config::saturating_millis;
use crate::phase::Phase;

/// An account dropped under the skip-account policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SkippedAccount {
    pub account: AccountId,
    pub phase: Phase,
    pub reason: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PhaseTiming {
    pub phase: Phase,
    pub millis: u64,
}

impl PhaseTiming {
    pub fn new(phase: Phase, elapsed: Duration) -> Self {
        Self {
            phase,
            millis: saturating_millis(elapsed),
        }
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.millis)
    }
}

/// What a completed run produced.
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub handle: ElectionHandle,
    /// Accounts registered and minted, ascending.
    pub funded: Vec<AccountId>,
    /// Accounts whose vote was acknowledged, ascending.
    pub voted: Vec<AccountId>,
    pub skipped: Vec<SkippedAccount>,
    /// Results from the confirmation read after decoding.
    pub results: ResultSet,
    pub timings: Vec<PhaseTiming>,
}

impl RunReport {
    /// Wall time across every phase.
    pub fn total_elapsed(&self) -> Duration {
        self.timings.iter().map(PhaseTiming::elapsed).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_timing_keeps_whole_millis() {
        let timing = PhaseTiming::new(Phase::Scan, Duration::from_micros(12_345));
        assert_eq!(timing.millis, 12);
        assert_eq!(timing.elapsed(), Duration::from_millis(12));
    }

    #[test]
    fn phase_timing_saturates_on_huge_durations() {
        assert_eq!(PhaseTiming::new(Phase::Vote, Duration::MAX).millis, u64::MAX);
    }
}
