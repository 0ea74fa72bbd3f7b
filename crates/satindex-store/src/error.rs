//! Error types for the index store.

use crate::IndexMode;

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// RocksDB error.
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Metadata value failed to decode.
    #[error("Corrupt metadata for key {key}: {reason}")]
    CorruptMeta {
        key: &'static str,
        reason: String,
    },

    /// Database was created in a different retention mode.
    #[error("index was created in {stored:?} mode but {configured:?} was configured, reindex required")]
    ModeMismatch {
        stored: IndexMode,
        configured: IndexMode,
    },

    /// Query needs spent-entry tracking the configured mode does not provide.
    #[error("query requires an index created with --rewrite-spent-mode")]
    ModeRequired,

    /// Scan abandoned because the caller went away.
    #[error("scan interrupted by caller")]
    Interrupted,

    /// Storage not initialized.
    #[error("Storage not initialized")]
    NotInitialized,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
