use std::time::Duration;
use thiserror::Error;

use votestorm_client::ClientError;
use votestorm_identity::IdentityError;
use votestorm_types::AccountId;

use crate::phase::Phase;

/// Why a run, or a single phase of it, did not complete.
#[derive(Debug, Error)]
pub enum RunError {
    /// A phase was requested out of order. The run state is left untouched.
    #[error("{phase}: out of sequence: {reason}")]
    Sequencing { phase: Phase, reason: String },

    /// A backend call failed for good (after any retries).
    #[error("{phase}{}: {source}", on_account(.account))]
    Call {
        phase: Phase,
        account: Option<AccountId>,
        source: ClientError,
    },

    #[error("{phase}: seed generation failed for account {account}: {source}")]
    Identity {
        phase: Phase,
        account: AccountId,
        source: IdentityError,
    },

    #[error("{phase}: amount for account {account} does not fit")]
    AmountOverflow { phase: Phase, account: AccountId },

    #[error("provision: no account was funded")]
    NoFundedAccounts,

    #[error("{phase}: backend did not settle within {after:?}")]
    BarrierTimeout { phase: Phase, after: Duration },

    #[error("{phase}: cancelled")]
    Cancelled { phase: Phase },

    #[error("config error: {0}")]
    Config(String),
}

impl RunError {
    /// The phase the error arose in, when there is one.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::Sequencing { phase, .. }
            | Self::Call { phase, .. }
            | Self::Identity { phase, .. }
            | Self::AmountOverflow { phase, .. }
            | Self::BarrierTimeout { phase, .. }
            | Self::Cancelled { phase } => Some(*phase),
            Self::NoFundedAccounts => Some(Phase::Provision),
            Self::Config(_) => None,
        }
    }

    /// The account the error concerns, for per-account failures.
    pub fn account(&self) -> Option<AccountId> {
        match self {
            Self::Call { account, .. } => *account,
            Self::Identity { account, .. } | Self::AmountOverflow { account, .. } => Some(*account),
            _ => None,
        }
    }
}

fn on_account(account: &Option<AccountId>) -> String {
    account
        .map(|id| format!(" (account {id})"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use votestorm_client::Operation;

    #[test]
    fn call_error_names_phase_and_account() {
        let err = RunError::Call {
            phase: Phase::Provision,
            account: Some(AccountId::new(3)),
            source: ClientError::backend(Operation::Mint, "Invalid account"),
        };
        assert_eq!(
            err.to_string(),
            "provision (account #3): mint: backend error: Invalid account"
        );
        assert_eq!(err.phase(), Some(Phase::Provision));
        assert_eq!(err.account(), Some(AccountId::new(3)));
    }

    #[test]
    fn run_wide_errors_have_no_account() {
        let err = RunError::Call {
            phase: Phase::Scan,
            account: None,
            source: ClientError::transport(Operation::ScanBallots, "connection refused"),
        };
        assert_eq!(err.to_string(), "scan: scanBallots: transport error: connection refused");
        assert_eq!(err.account(), None);
        assert_eq!(RunError::Config("x".into()).phase(), None);
    }
}
