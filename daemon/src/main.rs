//! VoxLedger daemon: operator entry point for a vote ledger.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use vox_crypto::VoteKey;
use vox_ledger::ValidationResult;
use vox_node::{init_logging, NodeConfig, VoteLedgerService};
use vox_store_lmdb::LmdbEnvironment;
use vox_types::{BlockHash, Difficulty, PayloadKind};

#[derive(Parser)]
#[command(name = "vox-daemon", about = "VoxLedger tamper-evident vote ledger")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "VOX_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for ledger storage.
    #[arg(long, env = "VOX_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Leading zero hex digits required of every block hash (0-64).
    #[arg(long, env = "VOX_DIFFICULTY")]
    difficulty: Option<u32>,

    /// Hex-encoded 256-bit vote encryption key.
    #[arg(long, env = "VOX_VOTE_KEY", hide_env_values = true)]
    vote_key: Option<String>,

    /// Upper bound on one append, in milliseconds.
    #[arg(long, env = "VOX_APPEND_TIMEOUT_MS")]
    append_timeout_ms: Option<u64>,

    /// Sealing threads (0 = one per core).
    #[arg(long, env = "VOX_SEAL_THREADS")]
    seal_threads: Option<usize>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "VOX_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "VOX_LOG_FORMAT")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Open the ledger, creating the genesis block if the store is empty.
    Init,
    /// Validate the whole chain; exits non-zero if it is broken.
    Validate,
    /// Print chain statistics.
    Stats {
        /// Also print Prometheus metrics.
        #[arg(long)]
        metrics: bool,
    },
    /// Print one block by hash.
    Block { hash: String },
    /// List blocks, optionally of one kind.
    Blocks {
        /// genesis, vote_cast, poll_created, poll_ended or user_registered.
        #[arg(long)]
        kind: Option<String>,
    },
    /// Generate a fresh vote encryption key.
    Keygen,
    /// Re-validate after repairing the store and clear the degraded state.
    ResetHealth,
    /// Check storage-level integrity without loading the ledger.
    CheckStore,
}

/// Layer CLI flags and env vars over the config file (or defaults).
fn build_config(cli: &Cli) -> anyhow::Result<NodeConfig> {
    let mut config = match &cli.config {
        Some(path) => NodeConfig::from_toml_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => NodeConfig::default(),
    };

    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = data_dir.clone();
    }
    if let Some(difficulty) = cli.difficulty {
        config.difficulty = Difficulty::new(difficulty)?;
    }
    if let Some(vote_key) = &cli.vote_key {
        config.vote_key = Some(vote_key.clone());
    }
    if let Some(timeout) = cli.append_timeout_ms {
        config.append_timeout_ms = timeout;
    }
    if let Some(threads) = cli.seal_threads {
        config.seal_threads = threads;
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.log_format = format.clone();
    }
    Ok(config)
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = build_config(&cli)?;
    init_logging(config.log_format()?, &config.log_level)?;

    match cli.command {
        Command::Keygen => {
            println!("{}", VoteKey::generate()?.to_hex());
        }
        Command::CheckStore => {
            let env = LmdbEnvironment::open(&config.data_dir, config.map_size_bytes())?;
            let report = env.check_integrity()?;
            println!(
                "checked {} blocks and {} vote records",
                report.blocks_checked, report.votes_checked
            );
            for error in &report.errors {
                println!("  {error}");
            }
            if !report.is_healthy() {
                anyhow::bail!("store has {} integrity errors", report.errors.len());
            }
        }
        command => {
            let mut config = config;
            // None of these subcommands seal ballots, so a missing key is harmless.
            if config.vote_key.is_none() {
                config.ephemeral_key = true;
            }
            let service = VoteLedgerService::open(config)?;
            let outcome = run(&service, command);
            service.shutdown()?;
            outcome?;
        }
    }
    Ok(())
}

fn run(service: &VoteLedgerService, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Init => {
            let genesis = service.ledger().genesis()?;
            tracing::info!(
                blocks = service.ledger().len(),
                genesis = %genesis.hash,
                "ledger initialized"
            );
            print_json(&service.health())?;
        }
        Command::Validate => {
            let result = service.validate_ledger()?;
            print_json(&result)?;
            if let ValidationResult::Invalid { index, reason } = result {
                anyhow::bail!("chain invalid at block {index}: {reason}");
            }
        }
        Command::Stats { metrics } => {
            print_json(&service.stats()?)?;
            if metrics {
                print!("{}", service.metrics().encode()?);
            }
        }
        Command::Block { hash } => {
            let hash: BlockHash = hash.parse()?;
            print_json(&service.get_block(&hash)?)?;
        }
        Command::Blocks { kind } => {
            let blocks = match kind {
                Some(kind) => service.get_blocks_by_type(kind.parse::<PayloadKind>()?)?,
                None => service.ledger().blocks()?,
            };
            print_json(&blocks)?;
        }
        Command::ResetHealth => {
            let result = service.reset_health()?;
            print_json(&service.health())?;
            if !result.is_valid() {
                anyhow::bail!("chain is still invalid, ledger remains degraded");
            }
        }
        Command::Keygen | Command::CheckStore => unreachable!("handled before the service opens"),
    }
    Ok(())
}
