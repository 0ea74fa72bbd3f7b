//! The ordinal flow engine.
//!
//! Applies confirmed blocks to the satoshi-range index: input ranges are
//! pooled in order, distributed FIFO over outputs, transaction fee tails are
//! spliced into the coinbase after its freshly minted range, and the whole
//! block commits as one atomic batch. The reorg controller rewinds blocks
//! from per-block undo records and drives the pending-prune lifecycle.

mod engine;
mod error;
mod params;
mod reorg;
mod runner;

pub use engine::FlowEngine;
pub use error::Error;
pub use params::{ConfigError, IndexConfig, IndexParams};
pub use runner::IndexRunner;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
