//! The run state machine.
//!
//! A run walks [`Phase::ALL`] in order: submit the election, provision every
//! account (register seed, then mint), let the mints settle, scan, vote, let
//! the votes settle, decode and collect, let decoding settle, and finally read
//! the results again as confirmation. Each phase only starts once the previous
//! one has finished, so no scan ever overtakes a mint and no collect overtakes
//! a decode.
//!
//! Per-account work (provision and vote) goes through a [`WorkerPool`]. Every
//! backend call goes through `Caller`, which applies the per-call timeout,
//! retries transport failures and observes cancellation.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn, Instrument};

use votestorm_client::{Backend, ClientError, Operation};
use votestorm_identity::{AccountAllocator, IdentityFactory};
use votestorm_types::{
    Account, AccountId, Ballot, ElectionHandle, ElectionSpec, EncodedAnswer, ResultSet,
    VoteWeight,
};
use votestorm_utils::format_duration;

use crate::config::{Barrier, FailurePolicy, WorkloadConfig};
use crate::error::RunError;
use crate::metrics::RunMetrics;
use crate::phase::{Phase, RunState};
use crate::pool::WorkerPool;
use crate::report::{PhaseTiming, RunReport, SkippedAccount};
use crate::retry::RetryPolicy;
use crate::shutdown::ShutdownSignal;
use crate::tracing_spans::{account_span, call_span, phase_span, run_span};
use crate::waiter::{WaitError, Waiter};

/// Issues backend calls with timeout, retry and cancellation applied.
struct Caller<B> {
    backend: Arc<B>,
    metrics: Arc<RunMetrics>,
    retry: RetryPolicy,
    timeout: Duration,
    waiter: Waiter,
}

impl<B> Clone for Caller<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            metrics: self.metrics.clone(),
            retry: self.retry,
            timeout: self.timeout,
            waiter: self.waiter.clone(),
        }
    }
}

impl<B: Backend> Caller<B> {
    /// Run `attempt` until it succeeds, fails for good, or the run is
    /// cancelled. Only transport failures and timeouts are retried.
    async fn call<T, F, Fut>(
        &self,
        phase: Phase,
        account: Option<AccountId>,
        operation: Operation,
        mut attempt: F,
    ) -> Result<T, RunError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let span = call_span(operation);
        let mut tries = 1u32;
        loop {
            let started = Instant::now();
            let in_flight = self.metrics.track_in_flight();
            let outcome = tokio::select! {
                biased;
                _ = self.waiter.shutdown().triggered() => None,
                outcome = tokio::time::timeout(self.timeout, attempt()).instrument(span.clone()) => {
                    Some(outcome.unwrap_or_else(|_| {
                        Err(ClientError::Timeout { operation, after: self.timeout })
                    }))
                }
            };
            drop(in_flight);

            let Some(outcome) = outcome else {
                return Err(RunError::Cancelled { phase });
            };
            self.metrics
                .observe_call(operation, started.elapsed(), outcome.is_ok());

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && self.retry.allows_retry_after(tries) => {
                    let delay = self.retry.backoff(tries);
                    warn!(
                        %operation,
                        attempt = tries,
                        error = %e,
                        delay = %format_duration(delay),
                        "call failed, retrying"
                    );
                    self.metrics.retries.inc();
                    self.waiter
                        .wait_for(delay)
                        .await
                        .map_err(|_| RunError::Cancelled { phase })?;
                    tries += 1;
                }
                Err(source) => {
                    return Err(RunError::Call {
                        phase,
                        account,
                        source,
                    })
                }
            }
        }
    }
}

/// Drives one election through its lifecycle against a [`Backend`].
///
/// Phases can be run one at a time (each public phase method checks it is
/// next in line) or all at once with [`WorkloadOrchestrator::run`].
pub struct WorkloadOrchestrator<B: Backend + 'static> {
    config: WorkloadConfig,
    election: ElectionSpec,
    caller: Caller<B>,
    identities: Arc<IdentityFactory>,
    pool: WorkerPool,
    metrics: Arc<RunMetrics>,
    state: RunState,
    handle: Option<ElectionHandle>,
    accounts: Vec<Account>,
    minted: BTreeMap<AccountId, VoteWeight>,
    voted: BTreeMap<AccountId, VoteWeight>,
    skipped: Vec<SkippedAccount>,
    interim: Option<ResultSet>,
    results: Option<ResultSet>,
    timings: Vec<PhaseTiming>,
}

impl<B: Backend + 'static> WorkloadOrchestrator<B> {
    pub fn new(
        backend: Arc<B>,
        election: ElectionSpec,
        config: WorkloadConfig,
        shutdown: ShutdownSignal,
    ) -> Result<Self, RunError> {
        config.validate()?;
        let metrics = Arc::new(RunMetrics::new());
        let caller = Caller {
            backend,
            metrics: metrics.clone(),
            retry: config.retry_policy(),
            timeout: config.call_timeout(),
            waiter: Waiter::new(shutdown),
        };
        Ok(Self {
            pool: WorkerPool::new(config.concurrency),
            config,
            election,
            caller,
            identities: Arc::new(IdentityFactory::new()),
            metrics,
            state: RunState::Ready(Phase::Init),
            handle: None,
            accounts: Vec::new(),
            minted: BTreeMap::new(),
            voted: BTreeMap::new(),
            skipped: Vec::new(),
            interim: None,
            results: None,
            timings: Vec::new(),
        })
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn config(&self) -> &WorkloadConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<RunMetrics> {
        &self.metrics
    }

    /// The handle returned by election submission, once known.
    pub fn handle(&self) -> Option<&ElectionHandle> {
        self.handle.as_ref()
    }

    /// Funded accounts, ascending by id.
    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn skipped(&self) -> &[SkippedAccount] {
        &self.skipped
    }

    /// Accounts whose vote was acknowledged, ascending by id.
    pub fn voted(&self) -> Vec<AccountId> {
        self.voted.keys().copied().collect()
    }

    /// Results returned together with decoding.
    pub fn interim_results(&self) -> Option<&ResultSet> {
        self.interim.as_ref()
    }

    /// Results from the confirmation read.
    pub fn results(&self) -> Option<&ResultSet> {
        self.results.as_ref()
    }

    /// The run summary, available once every phase has completed.
    pub fn report(&self) -> Option<RunReport> {
        if self.state != RunState::Completed {
            return None;
        }
        Some(RunReport {
            handle: self.handle.clone()?,
            funded: self.accounts.iter().map(|a| a.id).collect(),
            voted: self.voted(),
            skipped: self.skipped.clone(),
            results: self.results.clone()?,
            timings: self.timings.clone(),
        })
    }

    /// Run every remaining phase in order.
    pub async fn run(&mut self) -> Result<RunReport, RunError> {
        let span = run_span(&self.config.endpoint, self.config.accounts);
        async {
            while let RunState::Ready(_) = self.state {
                self.step().await?;
            }
            self.report().ok_or_else(|| RunError::Sequencing {
                phase: Phase::Finalize,
                reason: format!("run ended in state {:?}", self.state),
            })
        }
        .instrument(span)
        .await
    }

    /// Run the next phase and return which one it was.
    pub async fn step(&mut self) -> Result<Phase, RunError> {
        let phase = match self.state {
            RunState::Ready(phase) => phase,
            RunState::Completed => {
                return Err(RunError::Sequencing {
                    phase: Phase::Finalize,
                    reason: "run already completed".into(),
                })
            }
            RunState::Aborted(at) => {
                return Err(RunError::Sequencing {
                    phase: at,
                    reason: format!("run aborted in {at}"),
                })
            }
        };
        match phase {
            Phase::Init => self.submit_election().await?,
            Phase::Provision => self.provision().await?,
            Phase::ProvisionSettle => self.await_provision_settled().await?,
            Phase::Scan => self.scan().await?,
            Phase::Vote => self.vote().await?,
            Phase::VoteSettle => self.await_votes_settled().await?,
            Phase::Decode => self.decode().await?,
            Phase::DecodeSettle => self.await_decode_settled().await?,
            Phase::Finalize => self.finalize().await?,
        }
        Ok(phase)
    }

    /// Submit the election and keep its handle.
    pub async fn submit_election(&mut self) -> Result<(), RunError> {
        let started = self.begin(Phase::Init)?;
        let span = phase_span(Phase::Init, None);
        let outcome = self.submit_inner().instrument(span).await;
        self.finish(Phase::Init, started, outcome)
    }

    /// Register a fresh seed for every account, then mint its weight.
    pub async fn provision(&mut self) -> Result<(), RunError> {
        let started = self.begin(Phase::Provision)?;
        let span = phase_span(Phase::Provision, self.handle.as_ref());
        let outcome = self.provision_inner().instrument(span).await;
        self.finish(Phase::Provision, started, outcome)
    }

    pub async fn await_provision_settled(&mut self) -> Result<(), RunError> {
        self.settle(Phase::ProvisionSettle).await
    }

    /// Ask the backend to scan every funded account.
    pub async fn scan(&mut self) -> Result<(), RunError> {
        let started = self.begin(Phase::Scan)?;
        let span = phase_span(Phase::Scan, self.handle.as_ref());
        let outcome = self.scan_inner().instrument(span).await;
        self.finish(Phase::Scan, started, outcome)
    }

    /// Cast one vote per funded account.
    pub async fn vote(&mut self) -> Result<(), RunError> {
        let started = self.begin(Phase::Vote)?;
        let span = phase_span(Phase::Vote, self.handle.as_ref());
        let outcome = self.vote_inner().instrument(span).await;
        self.finish(Phase::Vote, started, outcome)
    }

    pub async fn await_votes_settled(&mut self) -> Result<(), RunError> {
        self.settle(Phase::VoteSettle).await
    }

    /// Decode the ballots and collect a first result set, in one request
    /// where the backend supports it.
    pub async fn decode(&mut self) -> Result<(), RunError> {
        let started = self.begin(Phase::Decode)?;
        let span = phase_span(Phase::Decode, self.handle.as_ref());
        let outcome = self.decode_inner().instrument(span).await;
        self.finish(Phase::Decode, started, outcome)
    }

    pub async fn await_decode_settled(&mut self) -> Result<(), RunError> {
        self.settle(Phase::DecodeSettle).await
    }

    /// Read the results once more and complete the run.
    pub async fn finalize(&mut self) -> Result<(), RunError> {
        let started = self.begin(Phase::Finalize)?;
        let span = phase_span(Phase::Finalize, self.handle.as_ref());
        let outcome = self.finalize_inner().instrument(span).await;
        self.finish(Phase::Finalize, started, outcome)
    }

    // ── Phase bodies ───────────────────────────────────────────────────

    async fn submit_inner(&mut self) -> Result<(), RunError> {
        let backend = &self.caller.backend;
        let election = &self.election;
        let handle = self
            .caller
            .call(Phase::Init, None, Operation::SubmitElection, || {
                backend.submit_election(election)
            })
            .await?;
        info!(election = %handle, name = %self.election.name, "election submitted");
        self.handle = Some(handle);
        Ok(())
    }

    async fn provision_inner(&mut self) -> Result<(), RunError> {
        let phase = Phase::Provision;
        let handle = self.require_handle(phase)?;
        let question = self.config.question;
        let formula = self.config.mint_amount;

        let jobs = AccountAllocator::new(self.config.accounts).map(|account| {
            let caller = self.caller.clone();
            let identities = self.identities.clone();
            let handle = handle.clone();
            let job = async move {
                let amount = formula
                    .amount_for(account)
                    .ok_or(RunError::AmountOverflow { phase, account })?;
                let seed = identities
                    .generate_seed()
                    .map_err(|source| RunError::Identity {
                        phase,
                        account,
                        source,
                    })?;
                let backend = &caller.backend;
                caller
                    .call(phase, Some(account), Operation::RegisterSeed, || {
                        backend.register_seed(&handle, account, &seed)
                    })
                    .await?;
                caller
                    .call(phase, Some(account), Operation::Mint, || {
                        backend.mint(&handle, account, amount, question)
                    })
                    .await?;
                debug!(%amount, "account funded");
                Ok::<_, RunError>((Account::new(account, seed), amount))
            };
            (account, job.instrument(account_span(account)))
        });

        let outcomes = self
            .pool
            .run(jobs, self.config.failure_policy == FailurePolicy::FailFast)
            .await
            .map_err(|(_, e)| e)?;

        for (account, outcome) in outcomes {
            match outcome {
                Ok((funded, amount)) => {
                    self.metrics.accounts_funded.inc();
                    self.minted.insert(account, amount);
                    self.accounts.push(funded);
                }
                Err(e) => self.skip(account, phase, e)?,
            }
        }

        if self.accounts.is_empty() {
            return Err(RunError::NoFundedAccounts);
        }
        info!(
            funded = self.accounts.len(),
            skipped = self.skipped.len(),
            "accounts provisioned"
        );
        Ok(())
    }

    async fn scan_inner(&mut self) -> Result<(), RunError> {
        let handle = self.require_handle(Phase::Scan)?;
        let ids: Vec<AccountId> = self.accounts.iter().map(|a| a.id).collect();
        let backend = &self.caller.backend;
        self.caller
            .call(Phase::Scan, None, Operation::ScanBallots, || {
                backend.scan_ballots(&handle, &ids)
            })
            .await?;
        info!(accounts = ids.len(), "scan requested");
        Ok(())
    }

    async fn vote_inner(&mut self) -> Result<(), RunError> {
        let phase = Phase::Vote;
        let handle = self.require_handle(phase)?;
        let question = self.config.question;
        let formula = self.config.vote_amount;
        let voters: Vec<AccountId> = self.accounts.iter().map(|a| a.id).collect();

        let jobs = voters.into_iter().map(|account| {
            let caller = self.caller.clone();
            let handle = handle.clone();
            let job = async move {
                let amount = formula
                    .amount_for(account)
                    .ok_or(RunError::AmountOverflow { phase, account })?;
                let ballot = Ballot {
                    account,
                    amount,
                    hash: handle,
                    question,
                    answer: EncodedAnswer::synthetic(account.get()),
                };
                let backend = &caller.backend;
                caller
                    .call(phase, Some(account), Operation::CastVote, || {
                        backend.cast_vote(&ballot)
                    })
                    .await?;
                debug!(%amount, answer = %ballot.answer, "vote cast");
                Ok::<_, RunError>(amount)
            };
            (account, job.instrument(account_span(account)))
        });

        let outcomes = self
            .pool
            .run(jobs, self.config.failure_policy == FailurePolicy::FailFast)
            .await
            .map_err(|(_, e)| e)?;

        for (account, outcome) in outcomes {
            match outcome {
                Ok(amount) => {
                    self.metrics.votes_cast.inc();
                    self.voted.insert(account, amount);
                }
                Err(e) => self.skip(account, phase, e)?,
            }
        }
        info!(votes = self.voted.len(), "votes cast");
        Ok(())
    }

    async fn decode_inner(&mut self) -> Result<(), RunError> {
        let handle = self.require_handle(Phase::Decode)?;
        let backend = &self.caller.backend;
        let seed = &self.config.decoding_seed;
        let results = self
            .caller
            .call(Phase::Decode, None, Operation::DecodeAndCollect, || {
                backend.decode_and_collect(&handle, seed)
            })
            .await?;
        info!(entries = results.len(), "ballots decoded");
        self.interim = Some(results);
        Ok(())
    }

    async fn finalize_inner(&mut self) -> Result<(), RunError> {
        let handle = self.require_handle(Phase::Finalize)?;
        let backend = &self.caller.backend;
        let results = self
            .caller
            .call(Phase::Finalize, None, Operation::CollectResults, || {
                backend.collect_results(Some(&handle))
            })
            .await?;
        info!(entries = results.len(), "results collected");
        self.results = Some(results);
        Ok(())
    }

    // ── Barriers ───────────────────────────────────────────────────────

    async fn settle(&mut self, phase: Phase) -> Result<(), RunError> {
        let started = self.begin(phase)?;
        let span = phase_span(phase, self.handle.as_ref());
        let outcome = self.settle_inner(phase).instrument(span).await;
        self.finish(phase, started, outcome)
    }

    async fn settle_inner(&self, phase: Phase) -> Result<(), RunError> {
        let barrier = self
            .config
            .barriers
            .for_phase(phase)
            .unwrap_or(Barrier::Fixed { millis: 0 });
        let waiter = &self.caller.waiter;

        match barrier {
            Barrier::Fixed { millis } => {
                let pause = Duration::from_millis(millis);
                debug!(pause = %format_duration(pause), "waiting for backend to settle");
                waiter
                    .wait_for(pause)
                    .await
                    .map_err(|_| RunError::Cancelled { phase })
            }
            Barrier::Poll {
                interval_millis,
                timeout_millis,
            } => {
                let timeout = Duration::from_millis(timeout_millis);
                let probes = waiter
                    .poll_until(Duration::from_millis(interval_millis), timeout, move || {
                        self.probe(phase)
                    })
                    .await
                    .map_err(|e| match e {
                        WaitError::Cancelled => RunError::Cancelled { phase },
                        WaitError::TimedOut(after) => RunError::BarrierTimeout { phase, after },
                        WaitError::Probe(e) => e,
                    })?;
                debug!(probes, "backend settled");
                Ok(())
            }
        }
    }

    /// Whether the effects of the phase guarded by `phase` are visible.
    async fn probe(&self, phase: Phase) -> Result<bool, RunError> {
        let handle = self.require_handle(phase)?;
        let question = self.config.question;
        let backend = &self.caller.backend;

        match phase {
            Phase::ProvisionSettle => {
                for (&account, &minted) in &self.minted {
                    let balance = self
                        .caller
                        .call(phase, Some(account), Operation::Balance, || {
                            backend.balance(&handle, account, question)
                        })
                        .await?;
                    if balance < minted {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Phase::VoteSettle => {
                for (&account, &spent) in &self.voted {
                    let minted = self.minted.get(&account).copied().unwrap_or_default();
                    let balance = self
                        .caller
                        .call(phase, Some(account), Operation::Balance, || {
                            backend.balance(&handle, account, question)
                        })
                        .await?;
                    if balance > minted.saturating_sub(spent) {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Phase::DecodeSettle => {
                let results = self
                    .caller
                    .call(phase, None, Operation::CollectResults, || {
                        backend.collect_results(Some(&handle))
                    })
                    .await?;
                Ok(!results.is_empty())
            }
            _ => Ok(true),
        }
    }

    // ── State bookkeeping ──────────────────────────────────────────────

    /// Check `phase` is next and the run has not been cancelled.
    fn begin(&mut self, phase: Phase) -> Result<Instant, RunError> {
        match self.state {
            RunState::Ready(next) if next == phase => {}
            RunState::Ready(next) => {
                return Err(RunError::Sequencing {
                    phase,
                    reason: format!("{next} has not run yet"),
                })
            }
            RunState::Completed => {
                return Err(RunError::Sequencing {
                    phase,
                    reason: "run already completed".into(),
                })
            }
            RunState::Aborted(at) => {
                return Err(RunError::Sequencing {
                    phase,
                    reason: format!("run aborted in {at}"),
                })
            }
        }
        if self.caller.waiter.shutdown().is_triggered() {
            self.state = RunState::Aborted(phase);
            return Err(RunError::Cancelled { phase });
        }
        debug!(%phase, "phase started");
        Ok(Instant::now())
    }

    fn finish(
        &mut self,
        phase: Phase,
        started: Instant,
        outcome: Result<(), RunError>,
    ) -> Result<(), RunError> {
        let elapsed = started.elapsed();
        match outcome {
            Ok(()) => {
                self.timings.push(PhaseTiming::new(phase, elapsed));
                self.state = match phase.next() {
                    Some(next) => RunState::Ready(next),
                    None => RunState::Completed,
                };
                info!(%phase, elapsed = %format_duration(elapsed), "phase complete");
                Ok(())
            }
            Err(e) => {
                self.state = RunState::Aborted(phase);
                error!(%phase, error = %e, elapsed = %format_duration(elapsed), "run aborted");
                Err(e)
            }
        }
    }

    /// Record a per-account failure under the skip policy. Cancellation is
    /// never skipped.
    fn skip(&mut self, account: AccountId, phase: Phase, e: RunError) -> Result<(), RunError> {
        if matches!(e, RunError::Cancelled { .. }) {
            return Err(e);
        }
        warn!(%account, %phase, error = %e, "skipping account");
        self.metrics.accounts_skipped.inc();
        self.skipped.push(SkippedAccount {
            account,
            phase,
            reason: e.to_string(),
        });
        Ok(())
    }

    fn require_handle(&self, phase: Phase) -> Result<ElectionHandle, RunError> {
        self.handle.clone().ok_or_else(|| RunError::Sequencing {
            phase,
            reason: "no election handle".into(),
        })
    }
}
