use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rust_financials::api::{HttpFetcher, ReqwestFetcher, RequestJitter};
use rust_financials::harvester::{FetchStatus, HarvestOptions, Harvester, RunSummary};
use rust_financials::models::{parse_symbol_list, Config, SourceProfile, Symbol};
use rust_financials::strategy::build_strategies;

/// Annual financial statement harvester
#[derive(Parser)]
#[command(name = "rust-financials")]
#[command(version)]
#[command(about = "Fetch annual financial statements per symbol into one master CSV")]
#[command(long_about = "
Fetches income statement, balance sheet, cash flow and key stats for each
symbol, trying several acquisition strategies in turn, and merges the result
into a single table keyed by (symbol, period). Progress is checkpointed so an
interrupted run can be resumed.

Examples:
  cargo run -- RELIANCE.NS TCS.NS INFY.NS
  cargo run -- --symbols-file nifty50.txt --resume
  cargo run -- -f nse.txt --limit 20 --export-dir companies
")]
struct Args {
    /// Symbols to fetch, e.g. RELIANCE.NS
    symbols: Vec<String>,

    /// File with one symbol per line (`#` comments allowed)
    #[arg(long, short = 'f')]
    symbols_file: Option<PathBuf>,

    /// Master CSV path (overrides CHECKPOINT_PATH)
    #[arg(long, short = 'c')]
    checkpoint: Option<PathBuf>,

    /// Skip symbols already present in the checkpoint
    #[arg(long, short = 'r')]
    resume: bool,

    /// Process at most this many symbols
    #[arg(long, short = 'l')]
    limit: Option<usize>,

    /// Save the checkpoint after this many successes (overrides CHECKPOINT_EVERY)
    #[arg(long)]
    checkpoint_every: Option<usize>,

    /// Source profile JSON (overrides SOURCE_PROFILE_PATH)
    #[arg(long, short = 'p')]
    profile: Option<String>,

    /// Also write one CSV per company into this directory
    #[arg(long)]
    export_dir: Option<PathBuf>,
}

fn collect_symbols(args: &Args) -> Result<Vec<Symbol>> {
    let mut symbols: Vec<Symbol> = args.symbols.iter().filter_map(|s| Symbol::parse(s)).collect();

    if let Some(path) = &args.symbols_file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read symbols file {}", path.display()))?;
        symbols.extend(parse_symbol_list(&content));
    }

    if symbols.is_empty() {
        return Err(anyhow!("No symbols given; pass them as arguments or with --symbols-file"));
    }
    Ok(symbols)
}

fn print_summary(summary: &RunSummary, harvester: &Harvester) {
    println!();
    println!("============================================================");
    println!(
        "COMPLETED: {} successful, {} failed, {} skipped ({} symbols)",
        summary.success_count, summary.failure_count, summary.skipped_count, summary.total_symbols
    );
    println!("Master file: {}", summary.checkpoint_path.display());

    let store = harvester.store();
    println!("  Total companies: {}", store.symbol_count());
    println!("  Total rows: {}", store.row_count());
    println!("  Columns: {}", store.columns().len());
    if let Some((first, last)) = store.period_range() {
        println!("  Periods: {} .. {}", first, last);
    }

    let failed: Vec<String> = summary
        .outcomes
        .iter()
        .filter_map(|o| match &o.status {
            FetchStatus::Failed(reason) => Some(format!("   - {}: {}", o.symbol, reason)),
            _ => None,
        })
        .collect();
    if !failed.is_empty() {
        println!("⚠️  Failed symbols:");
        for line in failed {
            println!("{}", line);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rust_financials=info")),
        )
        .init();

    info!("🚀 Starting financial statement harvest");

    let config = Config::from_env()?;
    let symbols = collect_symbols(&args)?;
    info!("📋 {} symbols requested", symbols.len());

    let profile_path = args.profile.clone().or_else(|| config.source_profile_path.clone());
    let profile = Arc::new(SourceProfile::load_or_default(profile_path.as_deref())?);
    info!(
        "🔧 Strategies: {}",
        profile
            .strategies
            .iter()
            .map(|s| s.name())
            .collect::<Vec<_>>()
            .join(" -> ")
    );

    let fetcher: Arc<dyn HttpFetcher> =
        Arc::new(ReqwestFetcher::new(&profile.user_agent, config.request_timeout())?);
    let strategies = build_strategies(profile, fetcher, config.request_timeout());

    let mut options = HarvestOptions::from_config(&config);
    options.resume = args.resume;
    options.limit = args.limit;
    options.export_dir = args.export_dir.clone();
    if let Some(path) = &args.checkpoint {
        options.checkpoint_path = path.clone();
    }
    if let Some(every) = args.checkpoint_every {
        options.checkpoint_every = every;
    }

    let jitter = RequestJitter::new(config.min_delay_ms, config.max_delay_ms);
    let mut harvester = Harvester::new(strategies, jitter, options);
    let summary = harvester.run(&symbols).await?;

    print_summary(&summary, &harvester);
    Ok(())
}
