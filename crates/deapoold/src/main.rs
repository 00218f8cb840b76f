//! deapoold — the DEA pool daemon.
//!
//! Assembles the placement pool behind an in-memory message bus and replays
//! newline-delimited bus traffic into it:
//! - `dea.advertise` / `dea.shutdown` envelopes update the pool
//! - `placement.find` envelopes print the chosen DEA
//! - `placement.start` envelopes record the started instance
//!
//! # Usage
//!
//! ```text
//! deapoold run --config /etc/deapool/config.toml --input traffic.jsonl
//! ```

mod replay;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dea_core::{Config, LogFormat, LoggingConfig};
use dea_pool::DeaPool;

use crate::replay::Replayer;

#[derive(Parser)]
#[command(name = "deapoold", about = "DEA placement pool daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay bus envelopes into a fresh pool.
    Run {
        /// Path to the TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Newline-delimited JSON envelopes. Reads stdin when omitted.
        #[arg(long)]
        input: Option<PathBuf>,

        /// Override `pool.advertisement_timeout_in_seconds`.
        #[arg(long)]
        advertisement_timeout: Option<u64>,
    },
    /// Print the effective configuration as TOML.
    Config {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            input,
            advertisement_timeout,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(secs) = advertisement_timeout {
                config.pool.advertisement_timeout_in_seconds = secs;
            }
            init_tracing(&config.logging);
            run(config, input).await
        }
        Command::Config { config } => {
            let config = load_config(config.as_deref())?;
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::from_file(path),
        None => Ok(Config::default()),
    }
}

fn init_tracing(logging: &LoggingConfig) {
    // Stdout carries replay output; logs go to stderr.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"))
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn run(config: Config, input: Option<PathBuf>) -> anyhow::Result<()> {
    let pool = Arc::new(DeaPool::new(&config.pool));
    info!(
        ttl_secs = config.pool.advertisement_timeout_in_seconds,
        "dea pool initialized"
    );

    let replayer = Replayer::new(pool);
    let mut stdout = tokio::io::stdout();

    let stats = match input {
        Some(path) => {
            let file = tokio::fs::File::open(&path).await?;
            info!(path = ?path, "replaying envelopes from file");
            replayer.run(BufReader::new(file), &mut stdout).await?
        }
        None => {
            info!("replaying envelopes from stdin");
            replayer
                .run(BufReader::new(tokio::io::stdin()), &mut stdout)
                .await?
        }
    };

    info!(
        published = stats.published,
        placements = stats.placements,
        skipped = stats.skipped,
        stored = replayer.pool().len(),
        "replay finished"
    );
    Ok(())
}
