//! Satoshi index query API.

use crate::error::Error;
use bitcoin::{OutPoint, Txid};
use jsonrpsee::proc_macros::rpc;
use satindex_store::{CancelFlag, SatStore};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// The ranges held by one output, as returned to RPC clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputRanges {
    /// `[start, end)` ordinal pairs in the order the engine produced them.
    pub ranges: Vec<(u64, u64)>,
    /// Height of the block that created the output.
    pub block_height: u32,
    /// Whether the output has been consumed (rewrite-spent and prune modes
    /// only; always `false` in full mode).
    pub spent: bool,
    /// Best-effort inscription envelope flag.
    pub inscription: bool,
}

/// An output position on the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLocation {
    pub txid: Txid,
    pub vout: u32,
}

impl From<OutPoint> for OutputLocation {
    fn from(outpoint: OutPoint) -> Self {
        Self {
            txid: outpoint.txid,
            vout: outpoint.vout,
        }
    }
}

/// Satoshi index API.
#[rpc(client, server)]
pub trait SatsApi {
    /// Get the ordinal ranges held by an output, `null` when unknown.
    #[method(name = "sats_outputRanges", blocking)]
    fn output_ranges(&self, txid: String, vout: i64) -> Result<Option<OutputRanges>, Error>;

    /// Get every output that has ever held the ordinal.
    #[method(name = "sats_outputsContaining")]
    async fn outputs_containing(&self, ordinal: u64) -> Result<Vec<OutputLocation>, Error>;

    /// Get the unspent output currently holding the ordinal, `null` when
    /// the ordinal has not been mined.
    #[method(name = "sats_currentLocation")]
    async fn current_location(&self, ordinal: u64) -> Result<Option<OutputLocation>, Error>;
}

/// This struct provides the satoshi index API.
pub struct Sats {
    store: Option<Arc<SatStore>>,
}

impl Sats {
    /// Constructs a new instance of [`Sats`].
    ///
    /// `store` is `None` when the node runs without the index; every query
    /// then fails with the disabled error.
    pub fn new(store: Option<Arc<SatStore>>) -> Self {
        Self { store }
    }

    fn store(&self) -> Result<&Arc<SatStore>, Error> {
        self.store.as_ref().ok_or(Error::IndexDisabled)
    }
}

/// Cancels the wrapped scan when the query future is dropped, so a client
/// disconnection never pins a full table scan.
struct CancelGuard(CancelFlag);

impl Drop for CancelGuard {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

fn parse_outpoint(txid: &str, vout: i64) -> Result<OutPoint, Error> {
    let txid = Txid::from_str(txid).map_err(|err| Error::BadTxid(err.to_string()))?;
    let vout = u32::try_from(vout).map_err(|_| Error::BadVout(vout))?;
    Ok(OutPoint { txid, vout })
}

#[async_trait::async_trait]
impl SatsApiServer for Sats {
    fn output_ranges(&self, txid: String, vout: i64) -> Result<Option<OutputRanges>, Error> {
        let outpoint = parse_outpoint(&txid, vout)?;

        Ok(self.store()?.output_entry(&outpoint)?.map(|entry| {
            OutputRanges {
                ranges: entry
                    .ranges
                    .iter()
                    .map(|range| (range.start, range.end))
                    .collect(),
                block_height: entry.block_height,
                spent: entry.spent,
                inscription: entry.inscription,
            }
        }))
    }

    async fn outputs_containing(&self, ordinal: u64) -> Result<Vec<OutputLocation>, Error> {
        let store = self.store()?.clone();
        let cancel = CancelFlag::new();
        let _guard = CancelGuard(cancel.clone());

        let matches =
            tokio::task::spawn_blocking(move || store.outputs_containing(ordinal, &cancel))
                .await
                .map_err(|_| Error::ScanTask)??;

        Ok(matches.into_iter().map(Into::into).collect())
    }

    async fn current_location(&self, ordinal: u64) -> Result<Option<OutputLocation>, Error> {
        let store = self.store()?.clone();
        let cancel = CancelFlag::new();
        let _guard = CancelGuard(cancel.clone());

        let location =
            tokio::task::spawn_blocking(move || store.current_location(ordinal, &cancel))
                .await
                .map_err(|_| Error::ScanTask)??;

        Ok(location.map(Into::into))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::hashes::Hash;
    use satindex_primitives::SatRange;
    use satindex_store::{IndexMode, OutputEntry};

    fn populated_store(mode: IndexMode) -> (tempfile::TempDir, Arc<SatStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SatStore::open(dir.path(), mode).unwrap());

        let mut batch = store.batch();
        batch
            .put_entry(
                &OutPoint {
                    txid: Txid::from_byte_array([1; 32]),
                    vout: 0,
                },
                &OutputEntry::new(
                    [SatRange::new(0, 5_000_000_000)].into_iter().collect(),
                    0,
                    false,
                ),
            )
            .unwrap();
        batch.commit().unwrap();

        (dir, store)
    }

    #[test]
    fn test_output_ranges_lookup() {
        let (_dir, store) = populated_store(IndexMode::RewriteSpent);
        let sats = Sats::new(Some(store));

        let txid = Txid::from_byte_array([1; 32]).to_string();
        let ranges = sats.output_ranges(txid.clone(), 0).unwrap().unwrap();
        assert_eq!(ranges.ranges, vec![(0, 5_000_000_000)]);
        assert_eq!(ranges.block_height, 0);
        assert!(!ranges.spent);

        // Unknown outpoints are null results, not errors.
        assert!(sats.output_ranges(txid, 1).unwrap().is_none());
    }

    #[test]
    fn test_output_ranges_argument_validation() {
        let (_dir, store) = populated_store(IndexMode::RewriteSpent);
        let sats = Sats::new(Some(store));

        assert!(matches!(
            sats.output_ranges("beef".to_string(), 0),
            Err(Error::BadTxid(_))
        ));
        assert!(matches!(
            sats.output_ranges("zz".repeat(32), 0),
            Err(Error::BadTxid(_))
        ));

        let txid = Txid::from_byte_array([1; 32]).to_string();
        assert!(matches!(
            sats.output_ranges(txid, -1),
            Err(Error::BadVout(-1))
        ));
    }

    #[tokio::test]
    async fn test_disabled_index_rejects_queries() {
        let sats = Sats::new(None);

        assert!(matches!(
            sats.output_ranges(Txid::all_zeros().to_string(), 0),
            Err(Error::IndexDisabled)
        ));
        assert!(matches!(
            sats.outputs_containing(0).await,
            Err(Error::IndexDisabled)
        ));
        assert!(matches!(
            sats.current_location(0).await,
            Err(Error::IndexDisabled)
        ));
    }

    #[tokio::test]
    async fn test_scan_queries() {
        let (_dir, store) = populated_store(IndexMode::RewriteSpent);
        let sats = Sats::new(Some(store));

        let matches = sats.outputs_containing(42).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].vout, 0);

        let location = sats.current_location(42).await.unwrap().unwrap();
        assert_eq!(location.txid, Txid::from_byte_array([1; 32]));

        assert!(sats.current_location(5_000_000_000).await.unwrap().is_none());
        assert!(sats.outputs_containing(5_000_000_000).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_current_location_requires_rewrite_spent_mode() {
        let (_dir, store) = populated_store(IndexMode::Full);
        let sats = Sats::new(Some(store));

        assert!(matches!(
            sats.current_location(0).await,
            Err(Error::Store(satindex_store::Error::ModeRequired))
        ));
    }
}
