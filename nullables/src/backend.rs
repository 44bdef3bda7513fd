//! Nullable backend: records calls and simulates the election service.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use votestorm_client::{Backend, ClientError, Operation};
use votestorm_types::{
    AccountId, Ballot, DecodingSeed, ElectionHandle, ElectionSpec, EncodedAnswer, ResultSet,
    SeedPhrase, TallyEntry, VoteWeight,
};

use crate::faults::Fault;

/// One recorded backend call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    SubmitElection {
        name: String,
    },
    RegisterSeed {
        account: AccountId,
    },
    Mint {
        account: AccountId,
        amount: VoteWeight,
        question: u32,
    },
    ScanBallots {
        accounts: Vec<AccountId>,
    },
    CastVote {
        account: AccountId,
        amount: VoteWeight,
        question: u32,
        answer: EncodedAnswer,
    },
    DecodeBallots,
    CollectResults,
    DecodeAndCollect,
    Balance {
        account: AccountId,
    },
}

impl Call {
    pub fn operation(&self) -> Operation {
        match self {
            Self::SubmitElection { .. } => Operation::SubmitElection,
            Self::RegisterSeed { .. } => Operation::RegisterSeed,
            Self::Mint { .. } => Operation::Mint,
            Self::ScanBallots { .. } => Operation::ScanBallots,
            Self::CastVote { .. } => Operation::CastVote,
            Self::DecodeBallots => Operation::DecodeBallots,
            Self::CollectResults => Operation::CollectResults,
            Self::DecodeAndCollect => Operation::DecodeAndCollect,
            Self::Balance { .. } => Operation::Balance,
        }
    }

    /// The account this call concerns, if any.
    pub fn account(&self) -> Option<AccountId> {
        match self {
            Self::RegisterSeed { account }
            | Self::Mint { account, .. }
            | Self::CastVote { account, .. }
            | Self::Balance { account } => Some(*account),
            _ => None,
        }
    }
}

#[derive(Default)]
struct Ledger {
    registered: BTreeSet<AccountId>,
    /// Balances as the backend currently sees them.
    live: HashMap<AccountId, VoteWeight>,
    /// Balances as reported to readers until the lag elapses.
    settled: HashMap<AccountId, VoteWeight>,
    lag_remaining: u32,
    votes: Vec<(AccountId, u32, EncodedAnswer, VoteWeight)>,
    decoded: bool,
}

/// An in-memory election service for tests.
///
/// Thread-safe, so it can be shared with the orchestrator's worker pool.
pub struct NullBackend {
    handle: ElectionHandle,
    calls: Mutex<Vec<Call>>,
    faults: Mutex<Vec<Fault>>,
    ledger: Mutex<Ledger>,
    balance_lag: u32,
    latency: Duration,
    in_flight: Mutex<(usize, usize)>,
}

/// Releases an in-flight slot, also when the calling future is dropped.
struct Pending<'a>(&'a Mutex<(usize, usize)>);

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        self.0.lock().unwrap().0 -= 1;
    }
}

impl NullBackend {
    /// A backend that hands out the election handle `"H1"`.
    pub fn new() -> Self {
        Self::with_handle("H1")
    }

    pub fn with_handle(handle: &str) -> Self {
        Self {
            handle: ElectionHandle::new(handle),
            calls: Mutex::new(Vec::new()),
            faults: Mutex::new(Vec::new()),
            ledger: Mutex::new(Ledger::default()),
            balance_lag: 0,
            latency: Duration::ZERO,
            in_flight: Mutex::new((0, 0)),
        }
    }

    /// Inject a fault.
    pub fn fail(self, fault: Fault) -> Self {
        self.faults.lock().unwrap().push(fault);
        self
    }

    /// Balance reads keep returning the pre-mutation value for `reads`
    /// calls after every mint or vote.
    pub fn with_balance_lag(mut self, reads: u32) -> Self {
        self.balance_lag = reads;
        self
    }

    /// Balances never reflect mints or votes.
    pub fn never_settles(self) -> Self {
        self.with_balance_lag(u32::MAX)
    }

    /// Every call takes `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// All calls in the order they were received.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls made to `operation`.
    pub fn count(&self, operation: Operation) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    /// Calls concerning one account, in order.
    pub fn calls_for(&self, account: u32) -> Vec<Call> {
        let account = AccountId::new(account);
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.account() == Some(account))
            .cloned()
            .collect()
    }

    /// Position of the first call to `operation`, if any.
    pub fn first_index_of(&self, operation: Operation) -> Option<usize> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .position(|c| c.operation() == operation)
    }

    /// Position of the last call to `operation`, if any.
    pub fn last_index_of(&self, operation: Operation) -> Option<usize> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rposition(|c| c.operation() == operation)
    }

    /// Highest number of calls that were in progress at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.in_flight.lock().unwrap().1
    }

    /// Accounts that have a registered seed.
    pub fn registered(&self) -> Vec<AccountId> {
        self.ledger
            .lock()
            .unwrap()
            .registered
            .iter()
            .copied()
            .collect()
    }

    async fn enter(&self, call: Call) -> Result<(), ClientError> {
        let operation = call.operation();
        let account = call.account();
        self.calls.lock().unwrap().push(call);

        {
            let mut in_flight = self.in_flight.lock().unwrap();
            in_flight.0 += 1;
            in_flight.1 = in_flight.1.max(in_flight.0);
        }
        let pending = Pending(&self.in_flight);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        drop(pending);

        let mut faults = self.faults.lock().unwrap();
        if let Some(fault) = faults.iter_mut().find(|f| f.matches(operation, account)) {
            return Err(fault.fire(operation));
        }
        Ok(())
    }

    fn results(&self) -> ResultSet {
        let ledger = self.ledger.lock().unwrap();
        if !ledger.decoded {
            return ResultSet::default();
        }
        let mut tally: BTreeMap<(u32, u32), VoteWeight> = BTreeMap::new();
        for (_, question, answer, amount) in &ledger.votes {
            let first = u32::from_str_radix(answer.as_str().get(..2).unwrap_or("00"), 16)
                .unwrap_or(0);
            let entry = tally.entry((*question, first)).or_default();
            *entry = entry.checked_add(*amount).unwrap_or(*entry);
        }
        ResultSet(
            tally
                .into_iter()
                .map(|((idx_question, idx_answer), votes)| TallyEntry {
                    idx_question,
                    idx_sub_question: 0,
                    idx_answer,
                    votes,
                })
                .collect(),
        )
    }

    fn touch_balances(&self, ledger: &mut Ledger) {
        if self.balance_lag == 0 {
            ledger.settled = ledger.live.clone();
        }
        ledger.lag_remaining = self.balance_lag;
    }
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for NullBackend {
    async fn submit_election(&self, spec: &ElectionSpec) -> Result<ElectionHandle, ClientError> {
        self.enter(Call::SubmitElection {
            name: spec.name.clone(),
        })
        .await?;
        Ok(self.handle.clone())
    }

    async fn register_seed(
        &self,
        _handle: &ElectionHandle,
        account: AccountId,
        _seed: &SeedPhrase,
    ) -> Result<(), ClientError> {
        self.enter(Call::RegisterSeed { account }).await?;
        self.ledger.lock().unwrap().registered.insert(account);
        Ok(())
    }

    async fn mint(
        &self,
        _handle: &ElectionHandle,
        account: AccountId,
        amount: VoteWeight,
        question: u32,
    ) -> Result<(), ClientError> {
        self.enter(Call::Mint {
            account,
            amount,
            question,
        })
        .await?;
        let mut ledger = self.ledger.lock().unwrap();
        if !ledger.registered.contains(&account) {
            return Err(ClientError::backend(
                Operation::Mint,
                format!("account {account} has no seed"),
            ));
        }
        let balance = ledger.live.entry(account).or_default();
        *balance = balance.checked_add(amount).unwrap_or(*balance);
        self.touch_balances(&mut ledger);
        Ok(())
    }

    async fn scan_ballots(
        &self,
        _handle: &ElectionHandle,
        accounts: &[AccountId],
    ) -> Result<(), ClientError> {
        self.enter(Call::ScanBallots {
            accounts: accounts.to_vec(),
        })
        .await
    }

    async fn cast_vote(&self, ballot: &Ballot) -> Result<(), ClientError> {
        self.enter(Call::CastVote {
            account: ballot.account,
            amount: ballot.amount,
            question: ballot.question,
            answer: ballot.answer.clone(),
        })
        .await?;
        let mut ledger = self.ledger.lock().unwrap();
        let balance = ledger.live.entry(ballot.account).or_default();
        *balance = balance.saturating_sub(ballot.amount);
        ledger.votes.push((
            ballot.account,
            ballot.question,
            ballot.answer.clone(),
            ballot.amount,
        ));
        self.touch_balances(&mut ledger);
        Ok(())
    }

    async fn decode_ballots(
        &self,
        _handle: &ElectionHandle,
        _seed: &DecodingSeed,
    ) -> Result<(), ClientError> {
        self.enter(Call::DecodeBallots).await?;
        self.ledger.lock().unwrap().decoded = true;
        Ok(())
    }

    async fn collect_results(
        &self,
        _handle: Option<&ElectionHandle>,
    ) -> Result<ResultSet, ClientError> {
        self.enter(Call::CollectResults).await?;
        Ok(self.results())
    }

    async fn decode_and_collect(
        &self,
        _handle: &ElectionHandle,
        _seed: &DecodingSeed,
    ) -> Result<ResultSet, ClientError> {
        self.enter(Call::DecodeAndCollect).await?;
        self.ledger.lock().unwrap().decoded = true;
        Ok(self.results())
    }

    async fn balance(
        &self,
        _handle: &ElectionHandle,
        account: AccountId,
        _question: u32,
    ) -> Result<VoteWeight, ClientError> {
        self.enter(Call::Balance { account }).await?;
        let mut ledger = self.ledger.lock().unwrap();
        if ledger.lag_remaining > 0 {
            ledger.lag_remaining = ledger.lag_remaining.saturating_sub(1);
        } else {
            ledger.settled = ledger.live.clone();
        }
        Ok(ledger.settled.get(&account).copied().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h() -> ElectionHandle {
        ElectionHandle::new("H1")
    }

    #[tokio::test]
    async fn records_calls_in_order() {
        let backend = NullBackend::new();
        let handle = backend.submit_election(&ElectionSpec::reference()).await.unwrap();
        assert_eq!(handle.as_str(), "H1");
        backend
            .register_seed(&handle, AccountId::new(1), &SeedPhrase::new("a b c"))
            .await
            .unwrap();
        backend
            .mint(&handle, AccountId::new(1), VoteWeight::from_whole(5).unwrap(), 1)
            .await
            .unwrap();

        let ops: Vec<Operation> = backend.calls().iter().map(Call::operation).collect();
        assert_eq!(
            ops,
            vec![Operation::SubmitElection, Operation::RegisterSeed, Operation::Mint]
        );
        assert_eq!(backend.calls_for(1).len(), 2);
    }

    #[tokio::test]
    async fn mint_without_seed_is_rejected() {
        let backend = NullBackend::new();
        let err = backend
            .mint(&h(), AccountId::new(9), VoteWeight::ZERO, 1)
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn limited_fault_fires_then_clears() {
        let backend = NullBackend::new().fail(Fault::transport(Operation::CollectResults).times(1));
        assert!(backend.collect_results(None).await.is_err());
        assert!(backend.collect_results(None).await.is_ok());
        assert_eq!(backend.count(Operation::CollectResults), 2);
    }

    #[tokio::test]
    async fn account_scoped_fault_spares_other_accounts() {
        let backend = NullBackend::new().fail(Fault::backend(Operation::RegisterSeed).for_account(2));
        let seed = SeedPhrase::new("x");
        assert!(backend.register_seed(&h(), AccountId::new(1), &seed).await.is_ok());
        assert!(backend.register_seed(&h(), AccountId::new(2), &seed).await.is_err());
    }

    #[tokio::test]
    async fn balances_lag_behind_mutations() {
        let backend = NullBackend::new().with_balance_lag(2);
        let account = AccountId::new(1);
        backend.register_seed(&h(), account, &SeedPhrase::new("x")).await.unwrap();
        backend
            .mint(&h(), account, VoteWeight::from_whole(10).unwrap(), 1)
            .await
            .unwrap();

        assert!(backend.balance(&h(), account, 1).await.unwrap().is_zero());
        assert!(backend.balance(&h(), account, 1).await.unwrap().is_zero());
        assert_eq!(
            backend.balance(&h(), account, 1).await.unwrap(),
            VoteWeight::from_whole(10).unwrap()
        );
    }

    #[tokio::test]
    async fn collect_is_idempotent() {
        let backend = NullBackend::new();
        let account = AccountId::new(1);
        backend.register_seed(&h(), account, &SeedPhrase::new("x")).await.unwrap();
        backend
            .cast_vote(&Ballot {
                account,
                amount: VoteWeight::from_whole(10).unwrap(),
                hash: h(),
                question: 1,
                answer: EncodedAnswer::synthetic(1),
            })
            .await
            .unwrap();
        backend.decode_ballots(&h(), &DecodingSeed::new("s")).await.unwrap();

        let first = backend.collect_results(Some(&h())).await.unwrap();
        let second = backend.collect_results(Some(&h())).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
        assert_eq!(backend.count(Operation::CollectResults), 2);
    }
}
