//! Per-block application of ordinal flow.

use crate::{Error, Result};
use bitcoin::{Block, OutPoint, Transaction};
use satindex_primitives::subsidy::block_subsidy;
use satindex_primitives::{envelope, IndexedBlock, RangeList, SatRange};
use satindex_store::{BatchWriter, BlockUndo, IndexMode, OutputEntry, SatStore};
use std::collections::HashMap;
use std::sync::Arc;

/// The ordinal flow engine.
///
/// Exactly one engine mutates a store at a time, driven block by block from
/// the node's validation pipeline. Queries run concurrently against the
/// shared store; they never go through the engine.
pub struct FlowEngine {
    store: Arc<SatStore>,
    prune_horizon: u32,
}

impl FlowEngine {
    /// Creates an engine over the given store.
    pub fn new(store: Arc<SatStore>, prune_horizon: u32) -> Self {
        Self {
            store,
            prune_horizon,
        }
    }

    /// The store this engine writes to.
    pub fn store(&self) -> &Arc<SatStore> {
        &self.store
    }

    pub(crate) fn prune_horizon(&self) -> u32 {
        self.prune_horizon
    }

    /// Applies a block connected to the best chain.
    ///
    /// Non-coinbase transactions are processed in block order; the coinbase
    /// is handled last so it can absorb the fees collected above it. All
    /// writes, the undo record, `last_ordinal` and the best block commit as
    /// one atomic batch.
    pub fn apply_block(&self, block: &Block, height: u32) -> Result<()> {
        let hash = block.block_hash();
        self.check_extends_tip(block, height, hash)?;

        let coinbase = block
            .txdata
            .first()
            .filter(|tx| tx.is_coinbase())
            .ok_or(Error::MissingCoinbase)?;

        let mut batch = self.store.batch();
        let mut undo = BlockUndo::new();
        // Entries written by this block; a later transaction can spend an
        // output of an earlier one before the batch is visible in the DB.
        let mut pending: HashMap<OutPoint, OutputEntry> = HashMap::new();
        let mut spent_in_block: Vec<OutPoint> = Vec::new();
        let mut fee_pool = RangeList::new();

        for tx in &block.txdata[1..] {
            let mut fees = self.apply_transaction(
                tx,
                height,
                &mut batch,
                &mut undo,
                &mut pending,
                &mut spent_in_block,
            )?;
            fee_pool.append(&mut fees);
        }

        // Coinbase last: its pool is the minted range followed by the fee
        // tails, in that order. Which coinbase output receives the new sats
        // versus the fees under FIFO hangs on this ordering.
        let subsidy = block_subsidy(height);
        let last_ordinal = self.store.last_ordinal();
        let mut pool = RangeList::new();
        if subsidy > 0 {
            pool.push(SatRange::new(last_ordinal, last_ordinal + subsidy));
        }
        pool.append(&mut fee_pool);

        let claimed: u64 = coinbase.output.iter().map(|o| o.value.to_sat()).sum();
        let supplied = pool.size();
        if claimed != supplied {
            return Err(Error::SupplyMismatch { claimed, supplied });
        }

        self.assign_outputs(coinbase, &mut pool, height, &mut batch, &mut undo, &mut pending)?;

        if self.store.mode() == IndexMode::Prune {
            if !spent_in_block.is_empty() {
                batch.put_prune_record(height, &spent_in_block)?;
            }
            self.prune_aged(height, &mut batch, &mut undo)?;
        }

        batch.put_undo(height, &undo)?;
        batch.set_last_ordinal(last_ordinal + subsidy);
        batch.set_best_block(Some(IndexedBlock {
            number: height,
            hash,
        }));
        batch.commit()?;

        tracing::debug!(
            "Applied block {height}: +{} -{} entries, last ordinal {}",
            undo.created_count(),
            undo.spent_count(),
            last_ordinal + subsidy,
        );

        Ok(())
    }

    fn check_extends_tip(&self, block: &Block, height: u32, hash: bitcoin::BlockHash) -> Result<()> {
        let tip = self.store.best_block();
        let sequential = match tip {
            Some(best) => height == best.number + 1 && block.header.prev_blockhash == best.hash,
            None => height == 0,
        };

        if sequential {
            Ok(())
        } else {
            Err(Error::NotSequential { height, hash, tip })
        }
    }

    /// Pools a transaction's inputs, distributes them FIFO over its outputs
    /// and returns the leftover ranges, which are the transaction's fees.
    fn apply_transaction(
        &self,
        tx: &Transaction,
        height: u32,
        batch: &mut BatchWriter<'_>,
        undo: &mut BlockUndo,
        pending: &mut HashMap<OutPoint, OutputEntry>,
        spent_in_block: &mut Vec<OutPoint>,
    ) -> Result<RangeList> {
        let mut pool = RangeList::new();

        for input in &tx.input {
            let outpoint = input.previous_output;

            let mut entry = match pending.remove(&outpoint) {
                // Created earlier in this same block; the batch put below
                // supersedes the original one and disconnect covers it
                // through the created list alone, so no undo entry.
                Some(entry) => entry,
                None => {
                    let entry = self
                        .store
                        .output_entry(&outpoint)?
                        .filter(|entry| !entry.spent)
                        .ok_or(Error::MissingPrevOut(outpoint))?;
                    undo.record_spend(outpoint, entry.clone());
                    entry
                }
            };

            if self.store.mode().rewrites_spent() {
                entry.spent = true;
                batch.put_entry(&outpoint, &entry)?;
                if self.store.mode() == IndexMode::Prune {
                    spent_in_block.push(outpoint);
                }
            }

            let mut ranges = entry.ranges;
            pool.append(&mut ranges);
        }

        self.assign_outputs(tx, &mut pool, height, batch, undo, pending)?;

        Ok(pool)
    }

    /// Skims value-sized prefixes off the pool into the transaction's
    /// outputs, in output order.
    fn assign_outputs(
        &self,
        tx: &Transaction,
        pool: &mut RangeList,
        height: u32,
        batch: &mut BatchWriter<'_>,
        undo: &mut BlockUndo,
        pending: &mut HashMap<OutPoint, OutputEntry>,
    ) -> Result<()> {
        let txid = tx.compute_txid();

        for (vout, output) in tx.output.iter().enumerate() {
            let outpoint = OutPoint {
                txid,
                vout: vout as u32,
            };

            // Duplicate coinbase txid (BIP30, blocks 91842/91880): the prior
            // entry is overwritten and its ordinals are destroyed for
            // indexing purposes.
            if let Some(prior) = self.store.output_entry(&outpoint)? {
                tracing::warn!(
                    "Duplicate txid at height {height}: {outpoint} overwrites an existing entry (BIP30)"
                );
                undo.record_spend(outpoint, prior);
            }

            let taken = pool.skim(output.value.to_sat())?;
            let entry = OutputEntry::new(
                taken,
                height,
                envelope::script_carries_envelope(&output.script_pubkey),
            );

            undo.record_create(outpoint);
            batch.put_entry(&outpoint, &entry)?;
            pending.insert(outpoint, entry);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::hashes::Hash;

    fn open_engine(mode: IndexMode) -> (tempfile::TempDir, FlowEngine) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SatStore::open(dir.path(), mode).unwrap());
        (dir, FlowEngine::new(store, 6))
    }

    fn coinbase_block(height: u32, prev: bitcoin::BlockHash, values: &[u64]) -> Block {
        use bitcoin::blockdata::block::{Header, Version};
        use bitcoin::blockdata::transaction::{TxIn, Version as TxVersion};
        use bitcoin::{Amount, CompactTarget, ScriptBuf, TxOut};

        let mut coinbase_script = vec![0x03];
        coinbase_script.extend_from_slice(&height.to_le_bytes()[..3]);

        let coinbase_tx = Transaction {
            version: TxVersion::TWO,
            lock_time: bitcoin::absolute::LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::null(),
                script_sig: ScriptBuf::from_bytes(coinbase_script),
                sequence: bitcoin::Sequence::MAX,
                witness: bitcoin::Witness::new(),
            }],
            output: values
                .iter()
                .map(|&value| TxOut {
                    value: Amount::from_sat(value),
                    script_pubkey: ScriptBuf::new_p2pkh(&bitcoin::PubkeyHash::all_zeros()),
                })
                .collect(),
        };

        Block {
            header: Header {
                version: Version::TWO,
                prev_blockhash: prev,
                merkle_root: bitcoin::TxMerkleNode::all_zeros(),
                time: 0,
                bits: CompactTarget::from_consensus(0),
                nonce: height,
            },
            txdata: vec![coinbase_tx],
        }
    }

    #[test]
    fn test_rejects_block_without_coinbase() {
        let (_dir, engine) = open_engine(IndexMode::Full);

        let mut block = coinbase_block(0, bitcoin::BlockHash::all_zeros(), &[5_000_000_000]);
        block.txdata.clear();

        assert!(matches!(
            engine.apply_block(&block, 0),
            Err(Error::MissingCoinbase)
        ));
    }

    #[test]
    fn test_rejects_non_sequential_blocks() {
        let (_dir, engine) = open_engine(IndexMode::Full);

        let genesis = coinbase_block(0, bitcoin::BlockHash::all_zeros(), &[5_000_000_000]);

        // Height 1 before genesis.
        assert!(matches!(
            engine.apply_block(&genesis, 1),
            Err(Error::NotSequential { .. })
        ));

        engine.apply_block(&genesis, 0).unwrap();

        // A block that does not link to the tip hash.
        let stranger = coinbase_block(1, bitcoin::BlockHash::all_zeros(), &[5_000_000_000]);
        assert!(matches!(
            engine.apply_block(&stranger, 1),
            Err(Error::NotSequential { .. })
        ));
    }

    #[test]
    fn test_rejects_coinbase_supply_mismatch() {
        let (_dir, engine) = open_engine(IndexMode::Full);

        let block = coinbase_block(0, bitcoin::BlockHash::all_zeros(), &[5_000_000_001]);

        match engine.apply_block(&block, 0) {
            Err(Error::SupplyMismatch { claimed, supplied }) => {
                assert_eq!(claimed, 5_000_000_001);
                assert_eq!(supplied, 5_000_000_000);
            }
            other => panic!("expected supply mismatch, got {other:?}"),
        }

        // Underclaiming is a mismatch as well; sats cannot silently vanish.
        let block = coinbase_block(0, bitcoin::BlockHash::all_zeros(), &[4_999_999_999]);
        assert!(matches!(
            engine.apply_block(&block, 0),
            Err(Error::SupplyMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_prevout_aborts() {
        use bitcoin::blockdata::transaction::{TxIn, Version as TxVersion};
        use bitcoin::{Amount, ScriptBuf, TxOut};

        let (_dir, engine) = open_engine(IndexMode::Full);

        let genesis = coinbase_block(0, bitcoin::BlockHash::all_zeros(), &[5_000_000_000]);
        engine.apply_block(&genesis, 0).unwrap();

        let unknown = OutPoint {
            txid: bitcoin::Txid::from_byte_array([0xab; 32]),
            vout: 0,
        };
        let spend = Transaction {
            version: TxVersion::TWO,
            lock_time: bitcoin::absolute::LockTime::ZERO,
            input: vec![TxIn {
                previous_output: unknown,
                script_sig: ScriptBuf::new(),
                sequence: bitcoin::Sequence::MAX,
                witness: bitcoin::Witness::new(),
            }],
            output: vec![TxOut {
                value: Amount::from_sat(100),
                script_pubkey: ScriptBuf::new_p2pkh(&bitcoin::PubkeyHash::all_zeros()),
            }],
        };

        let mut block = coinbase_block(1, genesis.block_hash(), &[5_000_000_000]);
        block.txdata.push(spend);

        match engine.apply_block(&block, 1) {
            Err(Error::MissingPrevOut(outpoint)) => assert_eq!(outpoint, unknown),
            other => panic!("expected missing prevout, got {other:?}"),
        }

        // The batch was aborted: nothing from the failed block is visible.
        assert_eq!(engine.store().best_block().unwrap().number, 0);
        assert_eq!(engine.store().last_ordinal(), 5_000_000_000);
    }
}
