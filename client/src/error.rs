//! Client error taxonomy.

use std::time::Duration;
use thiserror::Error;

use crate::backend::Operation;

/// Failure of one backend call.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The backend could not be reached (connection refused, reset, 5xx).
    #[error("{operation}: transport error: {message}")]
    Transport {
        operation: Operation,
        message: String,
    },

    /// No response arrived within the call timeout.
    #[error("{operation}: no response within {after:?}")]
    Timeout {
        operation: Operation,
        after: Duration,
    },

    /// The backend answered but rejected the request, or the answer was malformed.
    #[error("{operation}: backend error: {message}")]
    Backend {
        operation: Operation,
        message: String,
    },
}

impl ClientError {
    pub fn transport(operation: Operation, message: impl Into<String>) -> Self {
        Self::Transport {
            operation,
            message: message.into(),
        }
    }

    pub fn backend(operation: Operation, message: impl Into<String>) -> Self {
        Self::Backend {
            operation,
            message: message.into(),
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            Self::Transport { operation, .. }
            | Self::Timeout { operation, .. }
            | Self::Backend { operation, .. } => *operation,
        }
    }

    /// Transport failures and timeouts may succeed on another attempt;
    /// a rejected request will not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout { .. })
    }
}
