//! Rewinding blocks and the pending-prune lifecycle.

use crate::engine::FlowEngine;
use crate::{Error, Result};
use bitcoin::Block;
use satindex_primitives::subsidy::block_subsidy;
use satindex_primitives::IndexedBlock;
use satindex_store::{BatchWriter, BlockUndo, IndexMode, PrunedState};

impl FlowEngine {
    /// Rewinds the block at the indexed tip during a chain reorganization.
    ///
    /// Entries created by the block are deleted, consumed entries are
    /// restored from the block's undo record, anything horizon pruning
    /// removed while the block was applied comes back, and `last_ordinal`
    /// steps back by the block subsidy. A disconnect immediately after a
    /// connect restores the store byte for byte.
    pub fn revert_block(&self, block: &Block, height: u32) -> Result<()> {
        let hash = block.block_hash();
        match self.store().best_block() {
            Some(best) if best.number == height && best.hash == hash => {}
            tip => return Err(Error::NotSequential { height, hash, tip }),
        }

        let undo = self
            .store()
            .block_undo(height)?
            .ok_or(Error::NoUndoData(height))?;

        let mut batch = self.store().batch();

        // Delete before restore: a BIP30-overwritten outpoint appears in
        // both lists and must come back as its old value.
        for outpoint in &undo.created_outpoints {
            batch.delete_entry(outpoint)?;
        }
        for (outpoint, entry) in &undo.spent_entries {
            batch.put_entry(outpoint, entry)?;
        }

        if let Some(pruned) = &undo.pruned {
            self.restore_pruned(pruned, &mut batch)?;
        }

        if self.store().mode() == IndexMode::Prune {
            batch.delete_prune_record(height)?;
        }
        batch.delete_undo(height)?;

        let subsidy = block_subsidy(height);
        let last_ordinal = self
            .store()
            .last_ordinal()
            .checked_sub(subsidy)
            .ok_or(Error::OrdinalUnderflow(height))?;
        batch.set_last_ordinal(last_ordinal);

        batch.set_best_block(if height == 0 {
            None
        } else {
            Some(IndexedBlock {
                number: height - 1,
                hash: block.header.prev_blockhash,
            })
        });

        batch.commit()?;

        tracing::info!(
            "Reverted block {height}: -{} +{} entries, last ordinal {last_ordinal}",
            undo.created_count(),
            undo.spent_count(),
        );

        Ok(())
    }

    /// Deletes the entries spent `prune_horizon` blocks ago, together with
    /// their pending-prune record and undo data, stashing everything removed
    /// in the current block's undo record.
    pub(crate) fn prune_aged(
        &self,
        height: u32,
        batch: &mut BatchWriter<'_>,
        undo: &mut BlockUndo,
    ) -> Result<()> {
        let Some(aged) = height.checked_sub(self.prune_horizon()) else {
            return Ok(());
        };
        let Some(record) = self.store().prune_record(aged)? else {
            return Ok(());
        };

        let mut entries = Vec::with_capacity(record.len());
        for outpoint in &record {
            if let Some(entry) = self.store().output_entry(outpoint)? {
                batch.delete_entry(outpoint)?;
                entries.push((*outpoint, entry));
            }
        }

        let aged_undo = self
            .store()
            .block_undo(aged)?
            .ok_or(Error::NoUndoData(aged))?;
        batch.delete_prune_record(aged)?;
        batch.delete_undo(aged)?;

        tracing::debug!(
            "Pruned {} spent entries from height {aged}",
            entries.len()
        );

        undo.record_pruned(PrunedState {
            height: aged,
            record,
            entries,
            undo: aged_undo.encode(),
        });

        Ok(())
    }

    fn restore_pruned(&self, pruned: &PrunedState, batch: &mut BatchWriter<'_>) -> Result<()> {
        for (outpoint, entry) in &pruned.entries {
            batch.put_entry(outpoint, entry)?;
        }
        batch.put_prune_record(pruned.height, &pruned.record)?;
        batch.put_undo(
            pruned.height,
            &BlockUndo::decode(&pruned.undo).map_err(satindex_store::Error::from)?,
        )?;
        Ok(())
    }
}
