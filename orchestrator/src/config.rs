//! Workload configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use votestorm_client::{ClientOptions, DEFAULT_ENDPOINT};
use votestorm_types::{AccountId, DecodingSeed, VoteWeight};
use votestorm_utils::LogFormat;

use crate::phase::Phase;
use crate::retry::RetryPolicy;
use crate::RunError;

/// Configuration for one workload run.
///
/// Can be loaded from a TOML file via [`WorkloadConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Every field has a default, so an
/// empty file is a valid configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkloadConfig {
    /// GraphQL endpoint of the election service.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Number of voter accounts to provision.
    #[serde(default = "default_accounts")]
    pub accounts: u32,

    /// Question index used for mint and vote.
    #[serde(default = "default_question")]
    pub question: u32,

    /// Maximum in-flight per-account calls. `1` keeps the run sequential.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Secret shared with the backend for decoding ballots.
    #[serde(default = "default_decoding_seed")]
    pub decoding_seed: DecodingSeed,

    /// What to do when a per-account call fails.
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Per-call timeout, in milliseconds.
    #[serde(default = "default_call_timeout_millis")]
    pub call_timeout_millis: u64,

    /// Connection timeout, in milliseconds.
    #[serde(default = "default_connect_timeout_millis")]
    pub connect_timeout_millis: u64,

    /// Log format: "human" or "json".
    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Weight minted to each account.
    #[serde(default = "default_mint_amount")]
    pub mint_amount: AmountFormula,

    /// Weight each account votes with.
    #[serde(default = "default_vote_amount")]
    pub vote_amount: AmountFormula,

    /// Settle barriers after provision, vote and decode.
    #[serde(default)]
    pub barriers: BarrierConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

/// How a per-account amount is derived.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountFormula {
    /// The same amount for every account.
    Fixed(VoteWeight),
    /// The account index times this amount.
    PerIndex(VoteWeight),
}

impl AmountFormula {
    /// The amount for `account`, or `None` if it does not fit.
    pub fn amount_for(&self, account: AccountId) -> Option<VoteWeight> {
        match *self {
            AmountFormula::Fixed(amount) => Some(amount),
            AmountFormula::PerIndex(step) => step.checked_mul(u64::from(account.get())),
        }
    }
}

/// Settle barrier between two phases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Barrier {
    /// Sleep for a fixed duration.
    Fixed { millis: u64 },
    /// Probe the backend until it reports the phase's effects, or give up.
    Poll {
        interval_millis: u64,
        timeout_millis: u64,
    },
}

impl Barrier {
    pub fn fixed(duration: Duration) -> Self {
        Barrier::Fixed {
            millis: saturating_millis(duration),
        }
    }

    pub fn poll(interval: Duration, timeout: Duration) -> Self {
        Barrier::Poll {
            interval_millis: saturating_millis(interval),
            timeout_millis: saturating_millis(timeout),
        }
    }
}

/// Whole milliseconds in `d`, clamped to `u64::MAX`.
pub(crate) fn saturating_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarrierConfig {
    pub provision: Barrier,
    pub vote: Barrier,
    pub decode: Barrier,
}

impl BarrierConfig {
    /// The same barrier after every phase.
    pub fn uniform(barrier: Barrier) -> Self {
        Self {
            provision: barrier,
            vote: barrier,
            decode: barrier,
        }
    }

    /// The barrier guarding `phase`, if it is a settle phase.
    pub fn for_phase(&self, phase: Phase) -> Option<Barrier> {
        match phase {
            Phase::ProvisionSettle => Some(self.provision),
            Phase::VoteSettle => Some(self.vote),
            Phase::DecodeSettle => Some(self.decode),
            _ => None,
        }
    }
}

impl Default for BarrierConfig {
    fn default() -> Self {
        Self {
            provision: Barrier::Fixed { millis: 5_000 },
            vote: Barrier::Fixed { millis: 5_000 },
            decode: Barrier::Fixed { millis: 1_000 },
        }
    }
}

/// Behaviour when a per-account call fails for good.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the run.
    #[default]
    FailFast,
    /// Record the account as skipped and carry on without it.
    SkipAccount,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per call, the first one included. `1` disables retries.
    pub max_attempts: u32,
    pub initial_backoff_millis: u64,
    pub max_backoff_millis: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_millis: 200,
            max_backoff_millis: 5_000,
        }
    }
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_accounts() -> u32 {
    50
}

fn default_question() -> u32 {
    1
}

fn default_concurrency() -> usize {
    1
}

fn default_decoding_seed() -> DecodingSeed {
    DecodingSeed::new(
        "stool rich together paddle together pool raccoon promote attitude peasant latin concert",
    )
}

fn default_call_timeout_millis() -> u64 {
    30_000
}

fn default_connect_timeout_millis() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_mint_amount() -> AmountFormula {
    AmountFormula::Fixed(VoteWeight::from_zats(1_000_050_000_000))
}

fn default_vote_amount() -> AmountFormula {
    AmountFormula::PerIndex(VoteWeight::from_zats(1_000_000_000))
}

// ── Impl ───────────────────────────────────────────────────────────────

impl WorkloadConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, RunError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| RunError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, RunError> {
        toml::from_str(s).map_err(|e| RunError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("WorkloadConfig is always serializable to TOML")
    }

    /// Reject settings no run could execute with.
    pub fn validate(&self) -> Result<(), RunError> {
        if self.accounts == 0 {
            return Err(RunError::Config("accounts must be at least 1".into()));
        }
        if self.concurrency == 0 {
            return Err(RunError::Config("concurrency must be at least 1".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(RunError::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.call_timeout_millis == 0 {
            return Err(RunError::Config("call_timeout_millis must be positive".into()));
        }
        for (name, barrier) in [
            ("provision", self.barriers.provision),
            ("vote", self.barriers.vote),
            ("decode", self.barriers.decode),
        ] {
            if let Barrier::Poll {
                interval_millis: 0, ..
            } = barrier
            {
                return Err(RunError::Config(format!(
                    "barriers.{name}: poll interval must be positive"
                )));
            }
        }
        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_millis)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from(self.retry)
    }

    /// Timeouts for the HTTP transport.
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            request_timeout: self.call_timeout(),
            connect_timeout: Duration::from_millis(self.connect_timeout_millis),
        }
    }
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            accounts: default_accounts(),
            question: default_question(),
            concurrency: default_concurrency(),
            decoding_seed: default_decoding_seed(),
            failure_policy: FailurePolicy::default(),
            call_timeout_millis: default_call_timeout_millis(),
            connect_timeout_millis: default_connect_timeout_millis(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            mint_amount: default_mint_amount(),
            vote_amount: default_vote_amount(),
            barriers: BarrierConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = WorkloadConfig::default();
        let toml_str = config.to_toml_string();
        let parsed = WorkloadConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed.accounts, config.accounts);
        assert_eq!(parsed.mint_amount, config.mint_amount);
        assert_eq!(parsed.barriers, config.barriers);
        assert_eq!(parsed.retry, config.retry);
        assert_eq!(parsed.decoding_seed, config.decoding_seed);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = WorkloadConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.endpoint, "http://localhost:8000/graphql");
        assert_eq!(config.accounts, 50);
        assert_eq!(config.question, 1);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.failure_policy, FailurePolicy::FailFast);
        assert_eq!(config.retry.max_attempts, 1);
        assert_eq!(config.log_format, LogFormat::Human);
        assert_eq!(
            config.mint_amount,
            AmountFormula::Fixed("10000.5".parse().unwrap())
        );
        assert_eq!(config.barriers.provision, Barrier::Fixed { millis: 5_000 });
        assert_eq!(config.barriers.decode, Barrier::Fixed { millis: 1_000 });
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            accounts = 2
            concurrency = 8
            failure_policy = "skip_account"
            vote_amount = { fixed = "3.25" }

            [barriers.vote]
            mode = "poll"
            interval_millis = 100
            timeout_millis = 2000

            [retry]
            max_attempts = 4
        "#;
        let config = WorkloadConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.accounts, 2);
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.failure_policy, FailurePolicy::SkipAccount);
        assert_eq!(
            config.vote_amount,
            AmountFormula::Fixed("3.25".parse().unwrap())
        );
        assert_eq!(
            config.barriers.vote,
            Barrier::Poll {
                interval_millis: 100,
                timeout_millis: 2_000
            }
        );
        // untouched barriers and retry fields keep their defaults
        assert_eq!(config.barriers.provision, Barrier::Fixed { millis: 5_000 });
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.retry.initial_backoff_millis, 200);
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = WorkloadConfig::from_toml_file("/nonexistent/votestorm.toml");
        assert!(matches!(result, Err(RunError::Config(_))));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("votestorm.toml");
        std::fs::write(&path, "accounts = 3\nendpoint = \"http://10.0.0.5:8000/graphql\"\n").unwrap();

        let config = WorkloadConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.accounts, 3);
        assert_eq!(config.endpoint, "http://10.0.0.5:8000/graphql");
    }

    #[test]
    fn unknown_barrier_mode_is_rejected() {
        let toml = r#"
            [barriers.provision]
            mode = "eventually"
        "#;
        assert!(matches!(
            WorkloadConfig::from_toml_str(toml),
            Err(RunError::Config(_))
        ));
    }

    #[test]
    fn barrier_durations_saturate_instead_of_wrapping() {
        assert_eq!(Barrier::fixed(Duration::MAX), Barrier::Fixed { millis: u64::MAX });
        assert_eq!(
            Barrier::poll(Duration::from_millis(10), Duration::MAX),
            Barrier::Poll {
                interval_millis: 10,
                timeout_millis: u64::MAX
            }
        );
    }

    #[test]
    fn per_index_amount_scales_with_account() {
        let formula = AmountFormula::PerIndex(VoteWeight::from_whole(10).unwrap());
        assert_eq!(
            formula.amount_for(AccountId::new(1)),
            Some(VoteWeight::from_whole(10).unwrap())
        );
        assert_eq!(
            formula.amount_for(AccountId::new(2)),
            Some(VoteWeight::from_whole(20).unwrap())
        );
        let huge = AmountFormula::PerIndex(VoteWeight::from_zats(u64::MAX));
        assert_eq!(huge.amount_for(AccountId::new(2)), None);
    }

    #[test]
    fn validate_rejects_unrunnable_settings() {
        let mut config = WorkloadConfig::default();
        assert!(config.validate().is_ok());

        config.accounts = 0;
        assert!(config.validate().is_err());

        let mut config = WorkloadConfig::default();
        config.concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = WorkloadConfig::default();
        config.barriers.decode = Barrier::Poll {
            interval_millis: 0,
            timeout_millis: 100,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn client_options_follow_timeouts() {
        let config = WorkloadConfig {
            call_timeout_millis: 1_500,
            connect_timeout_millis: 250,
            ..WorkloadConfig::default()
        };
        let options = config.client_options();
        assert_eq!(options.request_timeout, Duration::from_millis(1_500));
        assert_eq!(options.connect_timeout, Duration::from_millis(250));
    }
}
