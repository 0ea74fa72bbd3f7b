//! Block undo data for chain reorganizations.
//!
//! When a block is applied, we save the pre-spend entries of every consumed
//! input and the outpoints that were created. This allows us to revert the
//! block if needed during a reorg. In prune mode the undo record also carries
//! everything the horizon pruning deleted while the block was applied, so
//! that an immediate disconnect restores the store byte for byte.

use crate::OutputEntry;
use bitcoin::OutPoint;
use serde::{Deserialize, Serialize};

/// Undo data for a single block.
///
/// Contains all information needed to revert the block's index changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockUndo {
    /// Entries consumed in this block, as they were before the spend.
    /// These need to be restored when reverting. Also carries entries
    /// overwritten by a duplicate coinbase txid (BIP30).
    pub spent_entries: Vec<(OutPoint, OutputEntry)>,

    /// Outpoints whose entries were written by this block.
    /// These need to be removed when reverting.
    pub created_outpoints: Vec<OutPoint>,

    /// What horizon pruning deleted while this block was applied, if
    /// anything. Prune mode only.
    pub pruned: Option<PrunedState>,
}

/// The store state deleted by one round of horizon pruning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrunedState {
    /// The height whose pending-prune record was consumed.
    pub height: u32,
    /// The consumed pending-prune record itself.
    pub record: Vec<OutPoint>,
    /// The spent entries that were physically deleted.
    pub entries: Vec<(OutPoint, OutputEntry)>,
    /// The encoded undo record of the pruned height, dropped alongside it.
    pub undo: Vec<u8>,
}

impl BlockUndo {
    /// Create a new empty BlockUndo.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a consumed entry, pre-spend.
    pub fn record_spend(&mut self, outpoint: OutPoint, entry: OutputEntry) {
        self.spent_entries.push((outpoint, entry));
    }

    /// Record a created entry.
    pub fn record_create(&mut self, outpoint: OutPoint) {
        self.created_outpoints.push(outpoint);
    }

    /// Record the effects of one round of horizon pruning.
    pub fn record_pruned(&mut self, pruned: PrunedState) {
        self.pruned = Some(pruned);
    }

    /// Serialize to bytes for storage.
    pub fn encode(&self) -> Vec<u8> {
        bincode::serialize(self).expect("BlockUndo serialization should not fail")
    }

    /// Deserialize from bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }

    /// Returns the number of entries consumed in this block.
    pub fn spent_count(&self) -> usize {
        self.spent_entries.len()
    }

    /// Returns the number of entries created in this block.
    pub fn created_count(&self) -> usize {
        self.created_outpoints.len()
    }

    /// Returns true if no index changes were recorded.
    pub fn is_empty(&self) -> bool {
        self.spent_entries.is_empty() && self.created_outpoints.is_empty() && self.pruned.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::hashes::Hash;
    use satindex_primitives::SatRange;

    #[test]
    fn test_block_undo_roundtrip() {
        let mut undo = BlockUndo::new();

        let outpoint1 = OutPoint {
            txid: bitcoin::Txid::all_zeros(),
            vout: 0,
        };
        let entry1 = OutputEntry::new(
            [SatRange::new(0, 5_000_000_000)].into_iter().collect(),
            0,
            false,
        );

        let outpoint2 = OutPoint {
            txid: bitcoin::Txid::all_zeros(),
            vout: 1,
        };

        undo.record_spend(outpoint1, entry1.clone());
        undo.record_create(outpoint2);
        undo.record_pruned(PrunedState {
            height: 3,
            record: vec![outpoint1],
            entries: vec![(outpoint1, entry1.into_spent())],
            undo: BlockUndo::new().encode(),
        });

        let decoded = BlockUndo::decode(&undo.encode()).unwrap();

        assert_eq!(undo, decoded);
        assert_eq!(decoded.spent_count(), 1);
        assert_eq!(decoded.created_count(), 1);
        assert!(!decoded.is_empty());
    }

    #[test]
    fn test_empty_undo() {
        let undo = BlockUndo::new();
        assert!(undo.is_empty());
        assert_eq!(BlockUndo::decode(&undo.encode()).unwrap(), undo);
    }
}
