use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde_json::Value;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rust_financials::extractor::EmbeddedPayloadExtractor;
use rust_financials::models::{RawPayload, SourceProfile, Symbol};
use rust_financials::normalizer::StatementNormalizer;
use rust_financials::store::DatasetStore;

/// Run the extractor and normalizer over a saved page or API response
#[derive(Parser)]
#[command(name = "inspect_page")]
#[command(about = "Extract and normalize statements from a saved HTML or JSON file, printing CSV")]
struct Args {
    /// Saved HTML page or JSON response
    file: PathBuf,

    /// Symbol to label the rows with
    #[arg(long, short = 's', default_value = "PAGE")]
    symbol: String,

    /// Source profile JSON providing the marker list
    #[arg(long, short = 'p')]
    profile: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rust_financials=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let content = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let profile = SourceProfile::load_or_default(args.profile.as_deref())?;

    let payload = match serde_json::from_str::<Value>(&content) {
        Ok(value) => {
            info!("📄 {} is JSON, normalizing directly", args.file.display());
            RawPayload::new(value)
        }
        Err(_) => {
            info!("🔍 Scanning {} with {} markers", args.file.display(), profile.markers.len());
            EmbeddedPayloadExtractor::new(profile.markers)
                .extract(&content)
                .ok_or_else(|| anyhow!("No embedded statement payload found in {}", args.file.display()))?
        }
    };

    let rows = StatementNormalizer::new().normalize(&payload)?;
    info!("✅ {} periods extracted", rows.len());

    let symbol = Symbol::parse(&args.symbol).ok_or_else(|| anyhow!("Symbol must not be blank"))?;
    let mut store = DatasetStore::new();
    store.upsert(symbol, rows);
    store.write_csv(std::io::stdout().lock())?;

    Ok(())
}
