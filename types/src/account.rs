//! Voter accounts created by a run.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::keys::SeedPhrase;

/// 1-based account identifier assigned by the orchestrator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(u32);

impl AccountId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A generated voter identity: the id plus the seed registered for it.
#[derive(Clone, Debug)]
pub struct Account {
    pub id: AccountId,
    pub seed: SeedPhrase,
}

impl Account {
    pub fn new(id: AccountId, seed: SeedPhrase) -> Self {
        Self { id, seed }
    }
}
