//! votestorm: drives an election service through a full scale-test run.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use votestorm_client::GraphQlClient;
use votestorm_orchestrator::{
    FailurePolicy, ShutdownController, WorkloadConfig, WorkloadOrchestrator,
};
use votestorm_types::ElectionSpec;
use votestorm_utils::{format_duration, init_logging, LogFormat};

#[derive(Parser)]
#[command(name = "votestorm", about = "Election service scale-test driver")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, global = true, env = "VOTESTORM_CONFIG")]
    config: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, global = true, env = "VOTESTORM_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, global = true, env = "VOTESTORM_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the full election lifecycle against the service.
    Run(RunArgs),
    /// Print the effective configuration as TOML.
    #[command(name = "show-config")]
    ShowConfig(RunArgs),
    /// Print a freshly generated seed phrase.
    Seed,
}

#[derive(clap::Args)]
struct RunArgs {
    /// GraphQL endpoint of the election service.
    #[arg(long, env = "VOTESTORM_ENDPOINT")]
    endpoint: Option<String>,

    /// Number of voter accounts to provision.
    #[arg(long, env = "VOTESTORM_ACCOUNTS")]
    accounts: Option<u32>,

    /// Maximum in-flight per-account calls.
    #[arg(long, env = "VOTESTORM_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Record failing accounts as skipped instead of aborting the run.
    #[arg(long, env = "VOTESTORM_SKIP_FAILED")]
    skip_failed: bool,

    /// Election definition as a JSON file. Defaults to the built-in
    /// three-question reference election.
    #[arg(long)]
    election: Option<PathBuf>,

    /// Print Prometheus metrics to stderr when the run ends.
    #[arg(long, env = "VOTESTORM_METRICS")]
    metrics: bool,
}

impl RunArgs {
    fn apply(&self, config: &mut WorkloadConfig) {
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(accounts) = self.accounts {
            config.accounts = accounts;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if self.skip_failed {
            config.failure_policy = FailurePolicy::SkipAccount;
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<WorkloadConfig> {
    let mut config = match &cli.config {
        Some(path) => WorkloadConfig::from_toml_file(path)
            .with_context(|| format!("failed to load config file {}", path.display()))?,
        None => WorkloadConfig::default(),
    };
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }
    if let Command::Run(args) | Command::ShowConfig(args) = &cli.command {
        args.apply(&mut config);
    }
    Ok(config)
}

fn load_election(path: Option<&PathBuf>) -> anyhow::Result<ElectionSpec> {
    let Some(path) = path else {
        return Ok(ElectionSpec::reference());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read election file {}", path.display()))?;
    let spec = ElectionSpec::from_json(&json)
        .with_context(|| format!("invalid election file {}", path.display()))?;
    spec.check()
        .with_context(|| format!("invalid election file {}", path.display()))?;
    Ok(spec)
}

async fn run(config: WorkloadConfig, args: &RunArgs) -> anyhow::Result<()> {
    let election = load_election(args.election.as_ref())?;
    let client = GraphQlClient::new(&config.endpoint, config.client_options())?;

    let controller = Arc::new(ShutdownController::new());
    let signals = controller.clone();
    tokio::spawn(async move { signals.wait_for_signal().await });

    tracing::info!(
        endpoint = %config.endpoint,
        accounts = config.accounts,
        concurrency = config.concurrency,
        election = %election.name,
        "starting run"
    );
    let mut orchestrator =
        WorkloadOrchestrator::new(Arc::new(client), election, config, controller.subscribe())?;
    let outcome = orchestrator.run().await;

    if args.metrics {
        eprint!("{}", orchestrator.metrics().encode_text());
    }

    let report = outcome?;
    tracing::info!(
        election = %report.handle,
        funded = report.funded.len(),
        voted = report.voted.len(),
        skipped = report.skipped.len(),
        elapsed = %format_duration(report.total_elapsed()),
        "run completed"
    );
    println!("{}", serde_json::to_string_pretty(&report.results)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match &cli.command {
        Command::Run(args) => {
            init_logging(config.log_format, &config.log_level);
            if let Some(path) = &cli.config {
                tracing::info!("loaded config from {}", path.display());
            }
            run(config, args).await?;
        }
        Command::ShowConfig(_) => {
            print!("{}", config.to_toml_string());
        }
        Command::Seed => {
            let seed = votestorm_identity::generate_seed()?;
            println!("{}", seed.expose());
        }
    }

    Ok(())
}
