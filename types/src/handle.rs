//! Election handle returned by the backend.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque content-hash identifier of a submitted election.
///
/// The backend hands this out from `storeElection`; every later operation
/// for that election is correlated by it. The driver never inspects it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElectionHandle(String);

impl ElectionHandle {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElectionHandle {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
