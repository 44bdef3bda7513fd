//! Error type for value construction and parsing.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TypesError {
    #[error("invalid amount {input:?}: {reason}")]
    InvalidAmount { input: String, reason: &'static str },

    #[error("amount overflow")]
    AmountOverflow,

    #[error("invalid election: {0}")]
    InvalidElection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
