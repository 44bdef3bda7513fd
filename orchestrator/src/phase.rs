//! Run phases and the run's state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The steps of a run, in the only order they may execute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Submit the election and obtain its handle.
    Init,
    /// Register and fund every account.
    Provision,
    /// Wait for minted weight to settle.
    ProvisionSettle,
    /// Ask the backend to scan the funded accounts.
    Scan,
    /// Cast one vote per funded account.
    Vote,
    /// Wait for the votes to settle.
    VoteSettle,
    /// Decode ballots and collect a first result set.
    Decode,
    /// Wait for decoding to settle.
    DecodeSettle,
    /// Confirmation read of the results.
    Finalize,
}

impl Phase {
    pub const ALL: [Phase; 9] = [
        Phase::Init,
        Phase::Provision,
        Phase::ProvisionSettle,
        Phase::Scan,
        Phase::Vote,
        Phase::VoteSettle,
        Phase::Decode,
        Phase::DecodeSettle,
        Phase::Finalize,
    ];

    /// The phase that follows this one, `None` after [`Phase::Finalize`].
    pub fn next(self) -> Option<Phase> {
        let position = Self::ALL.iter().position(|p| *p == self)?;
        Self::ALL.get(position + 1).copied()
    }

    pub fn is_settle(self) -> bool {
        matches!(
            self,
            Phase::ProvisionSettle | Phase::VoteSettle | Phase::DecodeSettle
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::Provision => "provision",
            Phase::ProvisionSettle => "provision-settle",
            Phase::Scan => "scan",
            Phase::Vote => "vote",
            Phase::VoteSettle => "vote-settle",
            Phase::Decode => "decode",
            Phase::DecodeSettle => "decode-settle",
            Phase::Finalize => "finalize",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a run stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    /// Waiting to execute the given phase.
    Ready(Phase),
    /// Every phase succeeded.
    Completed,
    /// The given phase failed; nothing further will run.
    Aborted(Phase),
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Aborted(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_chain_in_order() {
        let mut chain = vec![Phase::Init];
        while let Some(next) = chain.last().and_then(|p| p.next()) {
            chain.push(next);
        }
        assert_eq!(chain, Phase::ALL.to_vec());
        assert!(Phase::ALL.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn only_barriers_are_settle_phases() {
        let settles: Vec<Phase> = Phase::ALL.into_iter().filter(|p| p.is_settle()).collect();
        assert_eq!(
            settles,
            vec![Phase::ProvisionSettle, Phase::VoteSettle, Phase::DecodeSettle]
        );
    }

    #[test]
    fn terminal_states() {
        assert!(RunState::Completed.is_terminal());
        assert!(RunState::Aborted(Phase::Scan).is_terminal());
        assert!(!RunState::Ready(Phase::Init).is_terminal());
    }
}
