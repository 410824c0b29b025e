use std::{fs::File, io, path::PathBuf, sync::Arc};

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use casino_ledger::{
    LedgerConfig, LedgerEngine, MemoryStore, Timestamp, clock::ManualClock, dlq::StdErrDLQ,
    ingestion::CsvReader, replay::Replay,
};

/// Replays a CSV of ledger commands and prints the resulting account states.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// CSV with columns: type, account, at, game, result, amount, payout
    input: PathBuf,

    /// YAML ledger configuration; defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main] // using Tokio runtime for async
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => LedgerConfig::load(path)?,
        None => LedgerConfig::default(),
    };

    // Set up the components
    let file = File::open(&args.input)?;
    let ingestion = CsvReader::new(file);
    let clock = Arc::new(ManualClock::new(Timestamp::EPOCH));
    let engine = LedgerEngine::new(Arc::new(MemoryStore::new()), Arc::clone(&clock), config);

    let mut replay = Replay::new(ingestion, engine, clock, StdErrDLQ::new());
    let applied = replay.process().await?;
    info!(applied, rejected = replay.dlq().reported(), "replay finished");

    replay.flush(io::stdout().lock()).await?;
    Ok(())
}
