//! Index store implementation using RocksDB.

use crate::entry::{outpoint_to_key, OutputEntry};
use crate::undo::BlockUndo;
use crate::{cf, meta_keys, Error, IndexMode, Result};
use bitcoin::hashes::Hash;
use bitcoin::{BlockHash, OutPoint};
use parking_lot::RwLock;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Options, WriteBatch, DB};
use satindex_primitives::IndexedBlock;
use std::path::Path;

fn encode_best_block(best: &IndexedBlock) -> [u8; 36] {
    let mut value = [0u8; 36];
    value[..4].copy_from_slice(&best.number.to_le_bytes());
    value[4..].copy_from_slice(best.hash.as_ref());
    value
}

fn decode_best_block(bytes: &[u8]) -> Result<IndexedBlock> {
    let bytes: &[u8; 36] = bytes.try_into().map_err(|_| Error::CorruptMeta {
        key: "best_block",
        reason: format!("expected 36 bytes, got {}", bytes.len()),
    })?;
    let number = u32::from_le_bytes(bytes[..4].try_into().expect("slice is 4 bytes; qed"));
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&bytes[4..]);
    Ok(IndexedBlock {
        number,
        hash: BlockHash::from_byte_array(hash),
    })
}

/// The satoshi-range index store.
///
/// All block application funnels through a single writer task; queries read
/// concurrently through RocksDB snapshots. The cached metadata scalars are
/// behind `RwLock`s so readers never touch the database for them.
pub struct SatStore {
    /// RocksDB instance.
    db: DB,
    /// Retention mode the database was created with.
    mode: IndexMode,
    /// Exclusive upper bound of the materialized ordinal space.
    last_ordinal: RwLock<u64>,
    /// Best indexed block, `None` before genesis.
    best_block: RwLock<Option<IndexedBlock>>,
}

impl SatStore {
    /// Open or create the index store at the given path.
    ///
    /// The retention mode is persisted on first creation; reopening an
    /// existing database with a different mode fails, a reindex being the
    /// only way to change modes.
    pub fn open(path: &Path, mode: IndexMode) -> Result<Self> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        // Bloom filters keep the per-input point lookups cheap.
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        db_opts.set_block_based_table_factory(&block_opts);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(cf::OUTPUTS, Options::default()),
            ColumnFamilyDescriptor::new(cf::UNDO, Options::default()),
            ColumnFamilyDescriptor::new(cf::PRUNE, Options::default()),
            ColumnFamilyDescriptor::new(cf::META, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        Self::check_mode(&db, mode)?;
        let last_ordinal = Self::load_last_ordinal(&db)?;
        let best_block = Self::load_best_block(&db)?;

        match best_block {
            Some(best) => {
                tracing::info!("Opened satoshi index in {mode:?} mode at {best}, last ordinal {last_ordinal}")
            }
            None => tracing::info!("Opened empty satoshi index in {mode:?} mode"),
        }

        Ok(Self {
            db,
            mode,
            last_ordinal: RwLock::new(last_ordinal),
            best_block: RwLock::new(best_block),
        })
    }

    /// The retention mode the store was created with.
    pub fn mode(&self) -> IndexMode {
        self.mode
    }

    /// Exclusive upper bound of the ordinal space materialized so far.
    pub fn last_ordinal(&self) -> u64 {
        *self.last_ordinal.read()
    }

    /// The best indexed block, `None` before genesis is connected.
    pub fn best_block(&self) -> Option<IndexedBlock> {
        *self.best_block.read()
    }

    /// Get an output entry by outpoint.
    pub fn output_entry(&self, outpoint: &OutPoint) -> Result<Option<OutputEntry>> {
        let cf = self.cf_handle(cf::OUTPUTS)?;
        self.db
            .get_cf(cf, outpoint_to_key(outpoint))?
            .map(|bytes| OutputEntry::decode(&bytes).map_err(Into::into))
            .transpose()
    }

    /// Get the undo record for a block height.
    pub fn block_undo(&self, height: u32) -> Result<Option<BlockUndo>> {
        let cf = self.cf_handle(cf::UNDO)?;
        self.db
            .get_cf(cf, height.to_be_bytes())?
            .map(|bytes| BlockUndo::decode(&bytes).map_err(Into::into))
            .transpose()
    }

    /// Get the pending-prune record for a block height.
    pub fn prune_record(&self, height: u32) -> Result<Option<Vec<OutPoint>>> {
        let cf = self.cf_handle(cf::PRUNE)?;
        self.db
            .get_cf(cf, height.to_be_bytes())?
            .map(|bytes| bincode::deserialize(&bytes).map_err(Into::into))
            .transpose()
    }

    /// Start collecting a block's worth of writes for one atomic commit.
    pub fn batch(&self) -> BatchWriter<'_> {
        BatchWriter {
            store: self,
            batch: WriteBatch::default(),
            last_ordinal: None,
            best_block: None,
        }
    }

    pub(crate) fn db(&self) -> &DB {
        &self.db
    }

    pub(crate) fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or(Error::NotInitialized)
    }

    fn check_mode(db: &DB, configured: IndexMode) -> Result<()> {
        let cf = db.cf_handle(cf::META).ok_or(Error::NotInitialized)?;

        match db.get_cf(cf, meta_keys::MODE)? {
            Some(bytes) => {
                let byte = bytes.first().copied().ok_or(Error::CorruptMeta {
                    key: "mode",
                    reason: "empty value".to_string(),
                })?;
                let stored = IndexMode::from_byte(byte).ok_or(Error::CorruptMeta {
                    key: "mode",
                    reason: format!("unknown mode byte {byte}"),
                })?;
                if stored != configured {
                    return Err(Error::ModeMismatch { stored, configured });
                }
            }
            None => db.put_cf(cf, meta_keys::MODE, [configured.as_byte()])?,
        }

        Ok(())
    }

    fn load_last_ordinal(db: &DB) -> Result<u64> {
        let cf = db.cf_handle(cf::META).ok_or(Error::NotInitialized)?;

        match db.get_cf(cf, meta_keys::LAST_ORDINAL)? {
            Some(bytes) => {
                let bytes: [u8; 8] = bytes.as_slice().try_into().map_err(|_| Error::CorruptMeta {
                    key: "last_ordinal",
                    reason: format!("expected 8 bytes, got {}", bytes.len()),
                })?;
                Ok(u64::from_le_bytes(bytes))
            }
            None => Ok(0),
        }
    }

    fn load_best_block(db: &DB) -> Result<Option<IndexedBlock>> {
        let cf = db.cf_handle(cf::META).ok_or(Error::NotInitialized)?;

        db.get_cf(cf, meta_keys::BEST_BLOCK)?
            .map(|bytes| decode_best_block(&bytes))
            .transpose()
    }
}

/// Collects the puts and deletes of one block application or rewind.
///
/// Nothing becomes visible until [`BatchWriter::commit`], which writes the
/// whole set as a single RocksDB batch and only then updates the cached
/// metadata scalars.
pub struct BatchWriter<'a> {
    store: &'a SatStore,
    batch: WriteBatch,
    last_ordinal: Option<u64>,
    best_block: Option<Option<IndexedBlock>>,
}

impl BatchWriter<'_> {
    /// Stage an output entry write.
    pub fn put_entry(&mut self, outpoint: &OutPoint, entry: &OutputEntry) -> Result<()> {
        let cf = self.store.cf_handle(cf::OUTPUTS)?;
        self.batch
            .put_cf(cf, outpoint_to_key(outpoint), entry.encode());
        Ok(())
    }

    /// Stage an output entry deletion.
    pub fn delete_entry(&mut self, outpoint: &OutPoint) -> Result<()> {
        let cf = self.store.cf_handle(cf::OUTPUTS)?;
        self.batch.delete_cf(cf, outpoint_to_key(outpoint));
        Ok(())
    }

    /// Stage a block undo record write.
    pub fn put_undo(&mut self, height: u32, undo: &BlockUndo) -> Result<()> {
        let cf = self.store.cf_handle(cf::UNDO)?;
        self.batch.put_cf(cf, height.to_be_bytes(), undo.encode());
        Ok(())
    }

    /// Stage a block undo record deletion.
    pub fn delete_undo(&mut self, height: u32) -> Result<()> {
        let cf = self.store.cf_handle(cf::UNDO)?;
        self.batch.delete_cf(cf, height.to_be_bytes());
        Ok(())
    }

    /// Stage a pending-prune record write.
    pub fn put_prune_record(&mut self, height: u32, outpoints: &[OutPoint]) -> Result<()> {
        let cf = self.store.cf_handle(cf::PRUNE)?;
        self.batch
            .put_cf(cf, height.to_be_bytes(), bincode::serialize(outpoints)?);
        Ok(())
    }

    /// Stage a pending-prune record deletion.
    pub fn delete_prune_record(&mut self, height: u32) -> Result<()> {
        let cf = self.store.cf_handle(cf::PRUNE)?;
        self.batch.delete_cf(cf, height.to_be_bytes());
        Ok(())
    }

    /// Stage the new exclusive upper bound of the ordinal space.
    pub fn set_last_ordinal(&mut self, last_ordinal: u64) {
        self.last_ordinal = Some(last_ordinal);
    }

    /// Stage the new best indexed block. `None` clears it (genesis rewind).
    pub fn set_best_block(&mut self, best: Option<IndexedBlock>) {
        self.best_block = Some(best);
    }

    /// Atomically write everything staged, then refresh the cached scalars.
    pub fn commit(mut self) -> Result<()> {
        let cf_meta = self.store.cf_handle(cf::META)?;

        if let Some(last_ordinal) = self.last_ordinal {
            self.batch
                .put_cf(cf_meta, meta_keys::LAST_ORDINAL, last_ordinal.to_le_bytes());
        }
        if let Some(best) = self.best_block {
            match best {
                Some(ref best) => {
                    self.batch
                        .put_cf(cf_meta, meta_keys::BEST_BLOCK, encode_best_block(best))
                }
                None => self.batch.delete_cf(cf_meta, meta_keys::BEST_BLOCK),
            }
        }

        self.store.db.write(self.batch)?;

        if let Some(last_ordinal) = self.last_ordinal {
            *self.store.last_ordinal.write() = last_ordinal;
        }
        if let Some(best) = self.best_block {
            *self.store.best_block.write() = best;
        }

        Ok(())
    }
}
