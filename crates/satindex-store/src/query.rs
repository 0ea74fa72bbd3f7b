//! Ordinal queries over the output table.
//!
//! Both queries are linear scans over the whole `outputs` column family;
//! there is no secondary index keyed by ordinal. Scans run against a RocksDB
//! snapshot, so a concurrent block commit never produces a torn view.

use crate::entry::{key_to_outpoint, OutputEntry};
use crate::{cf, Error, IndexMode, Result, SatStore};
use bitcoin::OutPoint;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag checked between scan steps.
///
/// A full scan can cover a very large table; the reader checks the flag
/// between iterator steps so an abandoned query does not pin the scan to
/// completion.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates a flag in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of the scan holding this flag.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl SatStore {
    /// Every output that has ever held `ordinal`, in outpoint key order.
    ///
    /// In prune mode the history is bounded by the prune horizon; entries
    /// deleted by pruning no longer show up.
    pub fn outputs_containing(&self, ordinal: u64, cancel: &CancelFlag) -> Result<Vec<OutPoint>> {
        let mut matches = Vec::new();

        self.for_each_output(cancel, |outpoint, entry| {
            if entry.ranges.contains(ordinal) {
                matches.push(outpoint);
            }
        })?;

        Ok(matches)
    }

    /// The single unspent output currently holding `ordinal`.
    ///
    /// Requires an index created in rewrite-spent mode; the other modes
    /// cannot tell live entries from consumed ones. Multiple unspent
    /// matches can coexist inside a reorg window; the entry created at the
    /// greatest height wins, ties broken by the smaller `(txid, vout)`.
    pub fn current_location(&self, ordinal: u64, cancel: &CancelFlag) -> Result<Option<OutPoint>> {
        if self.mode() != IndexMode::RewriteSpent {
            return Err(Error::ModeRequired);
        }

        let mut best: Option<(u32, OutPoint)> = None;

        self.for_each_output(cancel, |outpoint, entry| {
            if entry.spent || !entry.ranges.contains(ordinal) {
                return;
            }

            let wins = match best {
                None => true,
                Some((height, incumbent)) => {
                    entry.block_height > height
                        || (entry.block_height == height && outpoint < incumbent)
                }
            };
            if wins {
                best = Some((entry.block_height, outpoint));
            }
        })?;

        Ok(best.map(|(_, outpoint)| outpoint))
    }

    /// Visits every output entry in outpoint key order over a snapshot,
    /// checking the cancellation flag between steps.
    pub fn for_each_output(
        &self,
        cancel: &CancelFlag,
        mut f: impl FnMut(OutPoint, OutputEntry),
    ) -> Result<()> {
        let cf = self.cf_handle(cf::OUTPUTS)?;
        let snapshot = self.db().snapshot();

        let mut iter = snapshot.raw_iterator_cf(cf);
        iter.seek_to_first();

        while iter.valid() {
            if cancel.is_cancelled() {
                return Err(Error::Interrupted);
            }

            if let (Some(key), Some(value)) = (iter.key(), iter.value()) {
                if key.len() == 36 {
                    let key: [u8; 36] = key.try_into().expect("length checked above; qed");
                    let entry = OutputEntry::decode(value)?;
                    f(key_to_outpoint(&key), entry);
                }
            }

            iter.next();
        }

        Ok(())
    }
}
