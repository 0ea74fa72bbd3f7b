//! JSON-RPC surface of the satoshi-range index.
//!
//! The transport is whatever RPC server the host node runs; this crate only
//! defines the query methods and merges them into the node's method table.

mod error;
mod sats;

pub use error::Error;
pub use sats::{OutputLocation, OutputRanges, Sats, SatsApiClient, SatsApiServer};

use satindex_store::SatStore;
use std::sync::Arc;

/// Satoshi index RPC.
pub struct SatIndexRpc {
    /// Satoshi queries RPC.
    pub sats: Sats,
}

impl SatIndexRpc {
    /// Creates a new instance of [`SatIndexRpc`].
    ///
    /// Pass `None` when the node runs without the index; the methods are
    /// still registered and answer with the disabled error.
    pub fn new(store: Option<Arc<SatStore>>) -> Self {
        Self {
            sats: Sats::new(store),
        }
    }

    /// Merges the index RPCs into the given RPC module.
    pub fn merge_into(
        self,
        module: &mut jsonrpsee::Methods,
    ) -> Result<(), jsonrpsee::server::RegisterMethodError> {
        module.merge(self.sats.into_rpc())
    }
}
