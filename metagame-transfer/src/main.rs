//! metagame-transfer - Export and import Metagame profile data
//!
//! Pulls every event of a profile from one Metagame instance into
//! `results/{space}/{profile}/events.json`, and pushes such a file back into
//! a (possibly different) instance through its bulk-create endpoint.
//!
//! # Usage
//!
//! ```bash
//! # Export from production
//! metagame-transfer export $TOKEN my-space my-profile
//!
//! # Import into a local instance
//! metagame-transfer import $TOKEN my-space my-profile \
//!     --domain https://localhost:8000 --no-verifyssl
//! ```
//!
//! Each run refetches the whole collection. Nothing is retried, and an
//! interrupted import is not rolled back.

mod client;
mod commands;
mod config;
mod error;
mod fetch;
mod store;
mod submit;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use client::{ApiClient, ClientConfig};
use commands::{export_profile, import_profile};
use config::LogConfig;
use store::ProfileStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Command {
    /// Download a profile's events to the results directory
    Export,
    /// Upload previously exported events
    Import,
}

/// Metagame export data script
#[derive(Debug, Parser)]
#[command(name = "metagame-transfer", version)]
struct Args {
    /// Action to perform
    #[arg(value_enum)]
    command: Command,

    /// Auth token
    token: String,

    /// Space codename
    space: String,

    /// Profile username
    profile: String,

    /// The domain of the Metagame instance
    #[arg(long, env = "METAGAME_DOMAIN", default_value = config::METAGAME_DOMAIN)]
    domain: String,

    /// Verify SSL (default)
    #[arg(long = "verifyssl", overrides_with = "no_verify_ssl")]
    verify_ssl: bool,

    /// Do not verify SSL. Use for local development.
    #[arg(long = "no-verifyssl", overrides_with = "verify_ssl")]
    no_verify_ssl: bool,

    /// Directory exports are written to and imported from
    #[arg(long, default_value = config::RESULTS_DIR)]
    results_dir: PathBuf,

    /// Items requested per listing page
    #[arg(long, default_value_t = config::PER_PAGE, value_parser = parse_positive)]
    per_page: usize,

    /// Records sent per bulk-create request
    #[arg(long, default_value_t = config::BATCH_SIZE, value_parser = parse_positive)]
    batch_size: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = config::REQUEST_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

impl Args {
    fn client_config(&self) -> ClientConfig {
        ClientConfig {
            verify_ssl: self.verify_ssl || !self.no_verify_ssl,
            timeout: Duration::from_secs(self.timeout_secs),
            ..ClientConfig::new(self.domain.clone(), self.token.clone())
        }
    }
}

fn parse_positive(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

fn init_tracing(config: &LogConfig, verbose: bool) {
    let level = if verbose { "debug" } else { config.log_level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if config.log_json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let client_config = args.client_config();
    let client = ApiClient::new(&client_config).context("Failed to set up HTTP client")?;
    let store = ProfileStore::new(&args.results_dir);

    info!("Domain: {}", client.domain());
    if !client_config.verify_ssl {
        info!("SSL verification disabled");
    }

    match args.command {
        Command::Export => {
            let path = export_profile(&client, &store, &args.space, &args.profile, args.per_page)
                .await
                .with_context(|| format!("Export of {}/{} failed", args.space, args.profile))?;
            info!("Export written to {}", path.display());
        }
        Command::Import => {
            let summary = import_profile(&client, &store, &args.space, &args.profile, args.batch_size)
                .await
                .with_context(|| format!("Import of {}/{} failed", args.space, args.profile))?;
            info!(
                "Imported {} events in {} batches ({} rejected)",
                summary.records, summary.batches, summary.rejected_batches
            );
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    init_tracing(&LogConfig::from_env(), args.verbose);
    info!("metagame-transfer v{} starting", env!("CARGO_PKG_VERSION"));

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
