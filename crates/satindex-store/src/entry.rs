//! Per-output index entries and their storage keys.

use bitcoin::hashes::Hash;
use bitcoin::OutPoint;
use satindex_primitives::RangeList;
use serde::{Deserialize, Serialize};

/// Persistent record of the ordinals held by one transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputEntry {
    /// The ordinal ranges the output holds, or held at the time it was
    /// consumed.
    pub ranges: RangeList,
    /// Height of the block that created the output.
    pub block_height: u32,
    /// Whether the output has been consumed. Only ever set in the
    /// rewrite-spent and prune retention modes.
    pub spent: bool,
    /// Best-effort inscription envelope flag stamped at connect time.
    pub inscription: bool,
}

impl OutputEntry {
    /// Creates a live entry for a freshly connected output.
    pub fn new(ranges: RangeList, block_height: u32, inscription: bool) -> Self {
        Self {
            ranges,
            block_height,
            spent: false,
            inscription,
        }
    }

    /// The same entry with the spent marker set.
    pub fn into_spent(mut self) -> Self {
        self.spent = true;
        self
    }

    /// Serialize to bytes for storage.
    pub fn encode(&self) -> Vec<u8> {
        bincode::serialize(self).expect("OutputEntry serialization should not fail")
    }

    /// Deserialize from bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

/// Convert OutPoint to storage key (36 bytes).
///
/// Format: txid (32 bytes, raw) || vout (4 bytes, little-endian)
pub fn outpoint_to_key(outpoint: &OutPoint) -> [u8; 36] {
    let mut key = [0u8; 36];
    key[..32].copy_from_slice(outpoint.txid.as_ref());
    key[32..].copy_from_slice(&outpoint.vout.to_le_bytes());
    key
}

/// Parse storage key back to OutPoint.
pub fn key_to_outpoint(key: &[u8; 36]) -> OutPoint {
    let mut txid_bytes = [0u8; 32];
    txid_bytes.copy_from_slice(&key[..32]);
    let txid = bitcoin::Txid::from_byte_array(txid_bytes);
    let vout = u32::from_le_bytes(key[32..].try_into().expect("slice is 4 bytes; qed"));
    OutPoint { txid, vout }
}

#[cfg(test)]
mod tests {
    use super::*;
    use satindex_primitives::SatRange;

    #[test]
    fn test_entry_roundtrip() {
        let entry = OutputEntry::new(
            [SatRange::new(0, 5_000_000_000)].into_iter().collect(),
            0,
            false,
        );

        let encoded = entry.encode();
        let decoded = OutputEntry::decode(&encoded).unwrap();

        assert_eq!(entry, decoded);
    }

    #[test]
    fn test_spent_entry_roundtrip() {
        let entry = OutputEntry::new(RangeList::new(), 17, true).into_spent();

        let decoded = OutputEntry::decode(&entry.encode()).unwrap();

        assert!(decoded.spent);
        assert!(decoded.inscription);
        assert!(decoded.ranges.is_empty());
    }

    #[test]
    fn test_outpoint_key_roundtrip() {
        let outpoint = OutPoint {
            txid: bitcoin::Txid::all_zeros(),
            vout: 42,
        };

        let key = outpoint_to_key(&outpoint);
        let decoded = key_to_outpoint(&key);

        assert_eq!(outpoint, decoded);
    }
}
