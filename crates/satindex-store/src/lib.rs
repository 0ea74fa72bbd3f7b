//! Durable storage for the satoshi-range index.
//!
//! One RocksDB database holds, per transaction output, the list of ordinal
//! ranges the output currently contains (or contained when it was spent),
//! plus the metadata needed to resume and rewind: the exclusive upper bound
//! of the materialized ordinal space, the best indexed block, per-block undo
//! records and the pending-prune queue.
//!
//! ## Architecture
//!
//! - **Output entries**: direct key-value storage keyed by outpoint for O(1)
//!   lookups
//! - **Atomic batches**: every block is committed as a single `WriteBatch`,
//!   so a crash leaves the index fully before or fully after the block
//! - **Snapshot scans**: ordinal queries iterate a RocksDB snapshot and are
//!   cancellable between steps

mod entry;
mod error;
mod query;
mod store;
mod undo;

pub use entry::{key_to_outpoint, outpoint_to_key, OutputEntry};
pub use error::Error;
pub use query::CancelFlag;
pub use store::{BatchWriter, SatStore};
pub use undo::{BlockUndo, PrunedState};

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Retention policy for spent output entries, fixed at index creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMode {
    /// Spent entries are left untouched; history is complete but live and
    /// spent outputs cannot be told apart.
    Full,
    /// Spent entries are rewritten with `spent = true` and kept forever.
    /// Required for locating the unspent output holding an ordinal.
    RewriteSpent,
    /// Spent entries are rewritten with `spent = true` and physically
    /// deleted once they age past the prune horizon.
    Prune,
}

impl IndexMode {
    pub(crate) fn as_byte(self) -> u8 {
        match self {
            Self::Full => 0,
            Self::RewriteSpent => 1,
            Self::Prune => 2,
        }
    }

    pub(crate) fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Full),
            1 => Some(Self::RewriteSpent),
            2 => Some(Self::Prune),
            _ => None,
        }
    }

    /// Whether consuming an input rewrites its entry with `spent = true`.
    pub fn rewrites_spent(self) -> bool {
        matches!(self, Self::RewriteSpent | Self::Prune)
    }
}

/// Column family names for RocksDB.
mod cf {
    /// Column family for output entries.
    /// Key: OutPoint (txid || vout) = 36 bytes
    /// Value: OutputEntry (serialized)
    pub const OUTPUTS: &str = "outputs";

    /// Column family for block undo data.
    /// Key: block height (u32, big-endian)
    /// Value: BlockUndo (serialized)
    pub const UNDO: &str = "undo";

    /// Column family for pending-prune records.
    /// Key: block height (u32, big-endian)
    /// Value: outpoints spent at that height (serialized)
    pub const PRUNE: &str = "prune";

    /// Column family for metadata.
    /// Keys: "last_ordinal", "best_block", "mode"
    pub const META: &str = "meta";
}

/// Metadata keys.
mod meta_keys {
    pub const LAST_ORDINAL: &[u8] = b"last_ordinal";
    pub const BEST_BLOCK: &[u8] = b"best_block";
    pub const MODE: &[u8] = b"mode";
}
