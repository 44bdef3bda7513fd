//! The backend capability.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

use votestorm_types::{
    AccountId, Ballot, DecodingSeed, ElectionHandle, ElectionSpec, ResultSet, SeedPhrase,
    VoteWeight,
};

use crate::error::ClientError;

/// Remote operations exposed by the election service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Operation {
    SubmitElection,
    RegisterSeed,
    Mint,
    ScanBallots,
    CastVote,
    DecodeBallots,
    CollectResults,
    DecodeAndCollect,
    Balance,
}

impl Operation {
    pub const ALL: [Operation; 9] = [
        Operation::SubmitElection,
        Operation::RegisterSeed,
        Operation::Mint,
        Operation::ScanBallots,
        Operation::CastVote,
        Operation::DecodeBallots,
        Operation::CollectResults,
        Operation::DecodeAndCollect,
        Operation::Balance,
    ];

    /// Name of the remote field, as the service spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubmitElection => "storeElection",
            Self::RegisterSeed => "setSeed",
            Self::Mint => "mint",
            Self::ScanBallots => "scanBallots",
            Self::CastVote => "vote",
            Self::DecodeBallots => "decodeBallots",
            Self::CollectResults => "collectResults",
            Self::DecodeAndCollect => "decodeBallots+collectResults",
            Self::Balance => "getBalance",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One method per capability of the election service.
///
/// Implementations hold no run state. A successful return only acknowledges
/// receipt: effects such as a scan may still be settling on the backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Store an election definition and return its content hash.
    async fn submit_election(&self, spec: &ElectionSpec) -> Result<ElectionHandle, ClientError>;

    /// Register the seed phrase for an account.
    async fn register_seed(
        &self,
        handle: &ElectionHandle,
        account: AccountId,
        seed: &SeedPhrase,
    ) -> Result<(), ClientError>;

    /// Credit `account` with vote weight for `question`.
    async fn mint(
        &self,
        handle: &ElectionHandle,
        account: AccountId,
        amount: VoteWeight,
        question: u32,
    ) -> Result<(), ClientError>;

    /// Ask the backend to scan the ledger for the given accounts' ballots.
    async fn scan_ballots(
        &self,
        handle: &ElectionHandle,
        accounts: &[AccountId],
    ) -> Result<(), ClientError>;

    async fn cast_vote(&self, ballot: &Ballot) -> Result<(), ClientError>;

    async fn decode_ballots(
        &self,
        handle: &ElectionHandle,
        seed: &DecodingSeed,
    ) -> Result<(), ClientError>;

    /// Read the aggregated results. Idempotent.
    async fn collect_results(
        &self,
        handle: Option<&ElectionHandle>,
    ) -> Result<ResultSet, ClientError>;

    /// Decode then collect. Transports that can batch both into one request
    /// should override this.
    async fn decode_and_collect(
        &self,
        handle: &ElectionHandle,
        seed: &DecodingSeed,
    ) -> Result<ResultSet, ClientError> {
        self.decode_ballots(handle, seed).await?;
        self.collect_results(Some(handle)).await
    }

    /// Current spendable weight of `account` for `question`.
    async fn balance(
        &self,
        handle: &ElectionHandle,
        account: AccountId,
        question: u32,
    ) -> Result<VoteWeight, ClientError>;
}
