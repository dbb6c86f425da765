//! Sequential harvest run over a symbol list.
//!
//! acquire -> normalize -> upsert, with a checkpoint every N successes and
//! once at the end. Per-symbol problems are recorded and the run moves on;
//! only a failed checkpoint write stops it.

use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::api::RequestJitter;
use crate::errors::HarvestError;
use crate::models::{Config, NormalizedRow, Symbol};
use crate::normalizer::StatementNormalizer;
use crate::orchestrator::AcquisitionOrchestrator;
use crate::store::DatasetStore;
use crate::strategy::Strategy;

/// Run settings
#[derive(Debug, Clone)]
pub struct HarvestOptions {
    pub checkpoint_path: PathBuf,
    /// Save after this many successes; 0 only saves at the end
    pub checkpoint_every: usize,
    /// Load the checkpoint first and skip the symbols it already holds
    pub resume: bool,
    /// Process at most this many symbols (after resume filtering)
    pub limit: Option<usize>,
    /// Also write one CSV per harvested symbol here
    pub export_dir: Option<PathBuf>,
}

impl HarvestOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            checkpoint_path: PathBuf::from(&config.checkpoint_path),
            checkpoint_every: config.checkpoint_every,
            resume: false,
            limit: None,
            export_dir: None,
        }
    }
}

/// Status of a symbol in a run
#[derive(Debug, Clone, PartialEq)]
pub enum FetchStatus {
    Skipped, // Already in the checkpoint
    Completed { rows: usize, strategy: String },
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolOutcome {
    pub symbol: Symbol,
    pub status: FetchStatus,
}

/// Result of a harvest run
#[derive(Debug)]
pub struct RunSummary {
    pub success_count: usize,
    pub failure_count: usize,
    pub skipped_count: usize,
    /// Symbols considered: skipped plus attempted
    pub total_symbols: usize,
    pub checkpoint_path: PathBuf,
    pub outcomes: Vec<SymbolOutcome>,
}

impl RunSummary {
    pub fn failed_symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, FetchStatus::Failed(_)))
            .map(|o| &o.symbol)
    }
}

pub struct Harvester {
    strategies: Vec<Box<dyn Strategy>>,
    orchestrator: AcquisitionOrchestrator,
    normalizer: StatementNormalizer,
    jitter: RequestJitter,
    options: HarvestOptions,
    store: DatasetStore,
}

impl Harvester {
    pub fn new(strategies: Vec<Box<dyn Strategy>>, jitter: RequestJitter, options: HarvestOptions) -> Self {
        Self {
            strategies,
            orchestrator: AcquisitionOrchestrator::new(),
            normalizer: StatementNormalizer::new(),
            jitter,
            options,
            store: DatasetStore::new(),
        }
    }

    pub fn store(&self) -> &DatasetStore {
        &self.store
    }

    pub fn options(&self) -> &HarvestOptions {
        &self.options
    }

    /// Harvest `symbols` in order.
    ///
    /// Duplicate symbols are processed once. On error the in-memory dataset
    /// is left as it was at the failed save.
    pub async fn run(&mut self, symbols: &[Symbol]) -> Result<RunSummary, HarvestError> {
        let mut seen = HashSet::new();
        let unique: Vec<&Symbol> = symbols.iter().filter(|s| seen.insert(*s)).collect();

        let done: BTreeSet<Symbol> = if self.options.resume {
            let (dataset, done) = DatasetStore::load(&self.options.checkpoint_path)?;
            self.store = DatasetStore::from(dataset);
            done
        } else {
            BTreeSet::new()
        };

        let mut outcomes = Vec::new();
        let mut pending = Vec::new();
        for symbol in unique {
            if done.contains(symbol) {
                outcomes.push(SymbolOutcome {
                    symbol: symbol.clone(),
                    status: FetchStatus::Skipped,
                });
            } else {
                pending.push(symbol.clone());
            }
        }
        let skipped_count = outcomes.len();
        if skipped_count > 0 {
            info!("⏭️ Skipping {} symbols already in checkpoint", skipped_count);
        }

        if let Some(limit) = self.options.limit {
            if pending.len() > limit {
                pending.truncate(limit);
                info!("🔢 Limiting to {} symbols", limit);
            }
        }

        let total = pending.len();
        info!("🚀 Harvesting {} symbols with {} strategies", total, self.strategies.len());

        let mut success_count = 0;
        let mut failure_count = 0;

        for (index, symbol) in pending.into_iter().enumerate() {
            info!("🔄 [{}/{}] {}", index + 1, total, symbol);

            let status = match self.harvest_symbol(&symbol).await {
                Ok((rows, strategy)) => {
                    let row_count = rows.len();
                    self.store.upsert(symbol.clone(), rows);
                    self.export(&symbol);
                    success_count += 1;
                    info!("✅ {}: {} periods via {}", symbol, row_count, strategy);

                    if self.options.checkpoint_every > 0
                        && success_count % self.options.checkpoint_every == 0
                    {
                        self.store.checkpoint_save(&self.options.checkpoint_path)?;
                        info!("💾 Checkpoint after {} symbols", success_count);
                    }

                    FetchStatus::Completed {
                        rows: row_count,
                        strategy,
                    }
                }
                Err(reason) => {
                    failure_count += 1;
                    error!("❌ {}: {}", symbol, reason);
                    FetchStatus::Failed(reason)
                }
            };
            outcomes.push(SymbolOutcome { symbol, status });

            if index + 1 < total {
                self.jitter.wait().await;
            }
        }

        if self.store.is_empty() {
            warn!("⚠️ Nothing harvested; checkpoint not written");
        } else {
            self.store.checkpoint_save(&self.options.checkpoint_path)?;
        }

        let summary = RunSummary {
            success_count,
            failure_count,
            skipped_count,
            total_symbols: skipped_count + total,
            checkpoint_path: self.options.checkpoint_path.clone(),
            outcomes,
        };

        info!(
            "📊 Results: {} succeeded, {} failed, {} skipped of {} symbols",
            summary.success_count, summary.failure_count, summary.skipped_count, summary.total_symbols
        );
        Ok(summary)
    }

    /// Acquire and normalize one symbol; failures come back as a reason string
    async fn harvest_symbol(&self, symbol: &Symbol) -> Result<(Vec<NormalizedRow>, String), String> {
        let acquisition = self
            .orchestrator
            .acquire(symbol, &self.strategies)
            .await
            .map_err(|e| e.to_string())?;

        let rows = self
            .normalizer
            .normalize(&acquisition.payload)
            .map_err(|e| format!("{} (via {})", e, acquisition.strategy))?;

        Ok((rows, acquisition.strategy))
    }

    fn export(&self, symbol: &Symbol) {
        let Some(dir) = &self.options.export_dir else {
            return;
        };

        let path = dir.join(format!("{}_financials.csv", symbol.file_stem()));
        match self.store.export_symbol(symbol, &path) {
            Ok(_) => info!("📄 Wrote {}", path.display()),
            Err(e) => warn!("⚠️ Export for {} failed: {}", symbol, e),
        }
    }
}
