//! Error types for the flow engine.

use bitcoin::{BlockHash, OutPoint};
use satindex_primitives::{IndexedBlock, RangeError};

/// Errors that can occur while applying or rewinding blocks.
///
/// Everything except [`Error::Store`] indicates corruption or a
/// mis-sequenced pipeline; the operator remedy is a reindex.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The block does not extend (or sit at) the indexed tip.
    #[error("block {height} ({hash}) does not follow the indexed tip {tip:?}")]
    NotSequential {
        height: u32,
        hash: BlockHash,
        tip: Option<IndexedBlock>,
    },

    /// The block's first transaction is not a coinbase.
    #[error("block has no coinbase transaction")]
    MissingCoinbase,

    /// An input refers to an output the index does not know.
    #[error("missing previous output {0}")]
    MissingPrevOut(OutPoint),

    /// Coinbase output total differs from subsidy plus fees.
    #[error("coinbase claims {claimed} sats but subsidy and fees supply {supplied}")]
    SupplyMismatch { claimed: u64, supplied: u64 },

    /// A transaction's outputs exceed its pooled inputs.
    #[error(transparent)]
    Range(#[from] RangeError),

    /// No undo record for the block being rewound.
    #[error("no undo data for height {0}")]
    NoUndoData(u32),

    /// Rewinding would move `last_ordinal` below zero.
    #[error("ordinal accounting underflow while rewinding height {0}")]
    OrdinalUnderflow(u32),

    /// The persisted best block is no longer on the node's chain.
    #[error("indexed best block {stored} is no longer on the node's chain, reindex required")]
    StaleBestBlock { stored: IndexedBlock },

    /// A block the backend should have is unavailable.
    #[error("block {0} unavailable from the node backend")]
    BlockUnavailable(u32),

    /// Underlying store failure.
    #[error(transparent)]
    Store(#[from] satindex_store::Error),
}
