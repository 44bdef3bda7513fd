//! Fault injection rules for [`NullBackend`](crate::NullBackend).

use std::time::Duration;

use votestorm_client::{ClientError, Operation};
use votestorm_types::AccountId;

/// The kind of error a fault produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultKind {
    Backend,
    Transport,
    Timeout,
}

/// Fail calls to `operation`, optionally only for one account, optionally
/// only a limited number of times.
#[derive(Clone, Debug)]
pub struct Fault {
    pub operation: Operation,
    pub account: Option<AccountId>,
    pub kind: FaultKind,
    /// Remaining failures; `None` fails forever.
    pub remaining: Option<u32>,
}

impl Fault {
    /// A backend rejection on every call to `operation`.
    pub fn backend(operation: Operation) -> Self {
        Self {
            operation,
            account: None,
            kind: FaultKind::Backend,
            remaining: None,
        }
    }

    /// A transport failure on every call to `operation`.
    pub fn transport(operation: Operation) -> Self {
        Self {
            kind: FaultKind::Transport,
            ..Self::backend(operation)
        }
    }

    pub fn timeout(operation: Operation) -> Self {
        Self {
            kind: FaultKind::Timeout,
            ..Self::backend(operation)
        }
    }

    /// Restrict the fault to calls concerning `account`.
    pub fn for_account(mut self, account: u32) -> Self {
        self.account = Some(AccountId::new(account));
        self
    }

    /// Fail only the next `n` matching calls.
    pub fn times(mut self, n: u32) -> Self {
        self.remaining = Some(n);
        self
    }

    pub(crate) fn matches(&self, operation: Operation, account: Option<AccountId>) -> bool {
        if self.operation != operation {
            return false;
        }
        if self.remaining == Some(0) {
            return false;
        }
        match self.account {
            Some(wanted) => account == Some(wanted),
            None => true,
        }
    }

    pub(crate) fn fire(&mut self, operation: Operation) -> ClientError {
        if let Some(n) = self.remaining.as_mut() {
            *n -= 1;
        }
        match self.kind {
            FaultKind::Backend => ClientError::backend(operation, "injected backend fault"),
            FaultKind::Transport => ClientError::transport(operation, "injected transport fault"),
            FaultKind::Timeout => ClientError::Timeout {
                operation,
                after: Duration::from_millis(1),
            },
        }
    }
}
