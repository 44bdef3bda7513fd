//! A single vote cast by one account.

use serde::{Deserialize, Serialize};

use crate::{AccountId, ElectionHandle, EncodedAnswer, VoteWeight};

/// One vote for one question, as sent to the backend's `vote` operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    pub account: AccountId,
    pub amount: VoteWeight,
    pub hash: ElectionHandle,
    pub question: u32,
    pub answer: EncodedAnswer,
}
