//! Startup catch-up and live block processing.

use crate::{Error, FlowEngine, Result};
use bitcoin::Block;
use futures::{Stream, StreamExt};
use satindex_primitives::{ChainBackend, ChainEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Drives the flow engine from the node's block pipeline.
///
/// On startup the runner catches up from the persisted best block to the
/// node tip, then switches to live connect/disconnect notifications. All
/// per-block failures are fail-stop for the index only: the runner marks
/// itself unhealthy and stops while the node keeps running.
pub struct IndexRunner<C> {
    engine: FlowEngine,
    backend: Arc<C>,
    unhealthy: Arc<AtomicBool>,
}

impl<C: ChainBackend> IndexRunner<C> {
    /// Creates a runner over the engine and the node's block storage.
    pub fn new(engine: FlowEngine, backend: Arc<C>) -> Self {
        Self {
            engine,
            backend,
            unhealthy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared flag set when the index has stopped applying blocks.
    pub fn health_handle(&self) -> Arc<AtomicBool> {
        self.unhealthy.clone()
    }

    /// Catches up to the node tip, then processes chain events until the
    /// stream ends or the index turns unhealthy.
    pub async fn run(self, mut events: impl Stream<Item = ChainEvent> + Unpin) {
        if let Err(err) = self.catch_up() {
            tracing::error!(?err, "Failed to catch up with the node, index will not run");
            self.unhealthy.store(true, Ordering::Relaxed);
            return;
        }

        while let Some(event) = events.next().await {
            let number = event.number();
            let result = match event {
                ChainEvent::Connected { block, number, .. } => {
                    self.apply_with_retry(&block, number)
                }
                ChainEvent::Disconnected { block, number, .. } => {
                    self.engine.revert_block(&block, number)
                }
            };

            if let Err(err) = result {
                tracing::error!(
                    ?err,
                    number,
                    "Index unhealthy, stopped applying blocks; reindex to recover"
                );
                self.unhealthy.store(true, Ordering::Relaxed);
                return;
            }
        }
    }

    /// Applies a block, retrying once after a transient storage failure.
    ///
    /// A failed commit leaves nothing of the block behind, so the retry
    /// re-runs the whole application from clean state.
    fn apply_with_retry(&self, block: &Block, number: u32) -> Result<()> {
        match self.engine.apply_block(block, number) {
            Err(Error::Store(err)) => {
                tracing::warn!("Retrying block {number} after storage error: {err}");
                self.engine.apply_block(block, number)
            }
            result => result,
        }
    }

    fn catch_up(&self) -> Result<()> {
        if let Some(stored) = self.engine.store().best_block() {
            // The persisted best block must still be on the node's chain.
            // Blocks disconnected while the index was offline cannot be
            // replayed, so a stale tip means refusing to start.
            if self.backend.block_hash(stored.number) != Some(stored.hash) {
                return Err(Error::StaleBestBlock { stored });
            }
        }

        // Loop until fully caught up; the chain may progress while we work.
        loop {
            let Some(tip) = self.backend.best_block() else {
                break;
            };

            let start = match self.engine.store().best_block() {
                Some(best) if best.number >= tip.number => break,
                Some(best) => best.number + 1,
                None => 0,
            };

            tracing::info!(start, tip = tip.number, "Catching up satoshi index");

            for number in start..=tip.number {
                let hash = self
                    .backend
                    .block_hash(number)
                    .ok_or(Error::BlockUnavailable(number))?;
                let block = self
                    .backend
                    .block(hash)
                    .ok_or(Error::BlockUnavailable(number))?;
                self.apply_with_retry(&block, number)?;
            }
        }

        tracing::info!("Satoshi index caught up, switching to live mode");
        Ok(())
    }
}
