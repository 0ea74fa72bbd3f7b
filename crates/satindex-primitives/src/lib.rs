//! Primitives shared across the satoshi-range index.

pub mod envelope;
pub mod ranges;
pub mod subsidy;

pub use ranges::{RangeError, RangeList, SatRange};

use bitcoin::{Block, BlockHash};

/// 6 blocks is the standard confirmation period in the Bitcoin community.
///
/// Doubles as the default horizon for physically deleting spent entries in
/// prune mode.
pub const CONFIRMATION_DEPTH: u32 = 6u32;

/// Represents an indexed Bitcoin block, identified by its block number and hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexedBlock {
    /// Block number.
    pub number: u32,
    /// Block hash.
    pub hash: BlockHash,
}

impl std::fmt::Display for IndexedBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{},{}", self.number, self.hash)
    }
}

/// Read access to the node's block storage.
///
/// The index is layered on top of the node pipeline and only ever asks for
/// blocks the node has already validated.
pub trait ChainBackend: Send + Sync {
    /// Returns the current best block, `None` before genesis is connected.
    fn best_block(&self) -> Option<IndexedBlock>;

    /// Returns the hash of the block at `number` on the best chain.
    fn block_hash(&self, number: u32) -> Option<BlockHash>;

    /// Returns the full block for the given hash.
    fn block(&self, hash: BlockHash) -> Option<Block>;
}

/// Connect/disconnect notification emitted by the node's validation pipeline.
#[derive(Debug, Clone)]
pub enum ChainEvent {
    /// `block` was connected to the best chain at `number`.
    Connected {
        block: Block,
        number: u32,
        hash: BlockHash,
    },
    /// `block` was disconnected from the best chain tip during a reorg.
    Disconnected {
        block: Block,
        number: u32,
        hash: BlockHash,
    },
}

impl ChainEvent {
    /// Block number the event refers to.
    pub fn number(&self) -> u32 {
        match self {
            Self::Connected { number, .. } | Self::Disconnected { number, .. } => *number,
        }
    }
}
