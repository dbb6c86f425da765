//! Strategy cascade for a single symbol.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tracing::{debug, error, info, warn};

use crate::errors::AcquisitionError;
use crate::models::{RawPayload, Symbol};
use crate::strategy::Strategy;

/// Progress of one acquisition through the strategy list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    Pending,
    /// Strategy at this index is running
    Attempting(usize),
    /// Strategy at this index produced the payload
    Success(usize),
    Exhausted,
}

/// A payload together with how it was obtained
#[derive(Debug, Clone)]
pub struct Acquisition {
    pub payload: RawPayload,
    pub strategy: String,
    pub attempted: Vec<String>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AcquisitionOrchestrator;

impl AcquisitionOrchestrator {
    pub fn new() -> Self {
        Self
    }

    /// Run `strategies` in order until one yields a payload.
    ///
    /// Every strategy runs at most once. A strategy that panics counts as a
    /// miss.
    pub async fn acquire(
        &self,
        symbol: &Symbol,
        strategies: &[Box<dyn Strategy>],
    ) -> Result<Acquisition, AcquisitionError> {
        let mut state = AcquisitionState::Pending;
        debug!("{} -> {:?} ({} strategies)", symbol, state, strategies.len());
        let mut attempted = Vec::with_capacity(strategies.len());

        for (index, strategy) in strategies.iter().enumerate() {
            state = AcquisitionState::Attempting(index);
            let name = strategy.name().to_string();
            debug!("{} -> {:?} ({})", symbol, state, name);
            attempted.push(name.clone());

            let outcome = AssertUnwindSafe(strategy.try_fetch(symbol))
                .catch_unwind()
                .await;

            match outcome {
                Ok(Some(payload)) => {
                    state = AcquisitionState::Success(index);
                    debug!("{} -> {:?}", symbol, state);
                    info!("✅ {} acquired via {}", symbol, name);
                    return Ok(Acquisition {
                        payload,
                        strategy: name,
                        attempted,
                    });
                }
                Ok(None) => debug!("{} returned nothing for {}", name, symbol),
                Err(_) => error!("❌ Strategy {} panicked for {}", name, symbol),
            }
        }

        state = AcquisitionState::Exhausted;
        debug!("{} -> {:?}", symbol, state);
        warn!("⚠️ All strategies failed for {}", symbol);

        Err(AcquisitionError::Exhausted {
            symbol: symbol.clone(),
            attempted,
        })
    }
}
