//! Ordinal range lists and the FIFO skim operation.
//!
//! Every satoshi is identified by its ordinal, the position of the satoshi
//! in mining order. An output holds a list of half-open ordinal ranges; the
//! flow engine moves ranges between outputs by concatenating input lists
//! into a pool and skimming value-sized prefixes off the head.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Range list operation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    /// The list holds fewer ordinals than requested.
    #[error("insufficient supply: {requested} sats requested, {available} available")]
    InsufficientSupply { requested: u64, available: u64 },
}

/// A half-open interval `[start, end)` of ordinals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SatRange {
    /// First ordinal in the range.
    pub start: u64,
    /// One past the last ordinal in the range.
    pub end: u64,
}

impl SatRange {
    /// Creates a new range. `start` must be strictly below `end`.
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start < end, "empty or inverted sat range [{start}, {end})");
        Self { start, end }
    }

    /// Number of ordinals in the range.
    pub fn size(&self) -> u64 {
        self.end - self.start
    }

    /// Whether `ordinal` falls within the range.
    pub fn contains(&self, ordinal: u64) -> bool {
        self.start <= ordinal && ordinal < self.end
    }
}

/// An ordered sequence of pairwise disjoint [`SatRange`]s.
///
/// Order is positional, not numeric: the coinbase of a block holds its
/// newly minted range followed by fee ranges with lower ordinals, so
/// consumers must never assume the list is sorted by `start`. Adjacent
/// ranges are deliberately left uncoalesced; the persisted form is exactly
/// what the engine produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeList(VecDeque<SatRange>);

impl RangeList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of ordinals across all ranges.
    pub fn size(&self) -> u64 {
        self.0.iter().map(SatRange::size).sum()
    }

    /// Number of ranges in the list.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list holds no ranges.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Appends a range at the tail.
    pub fn push(&mut self, range: SatRange) {
        self.0.push_back(range);
    }

    /// Moves every range of `other` onto the tail, preserving order.
    pub fn append(&mut self, other: &mut RangeList) {
        self.0.append(&mut other.0);
    }

    /// Whether any range contains `ordinal`.
    pub fn contains(&self, ordinal: u64) -> bool {
        self.0.iter().any(|range| range.contains(ordinal))
    }

    /// Removes the first `n` ordinals from the head of the list.
    ///
    /// Whole ranges are consumed until fewer than a range's worth remain;
    /// the straddling range is split in place. Fails with
    /// [`RangeError::InsufficientSupply`] when the list holds fewer than
    /// `n` ordinals, leaving the list untouched.
    pub fn skim(&mut self, n: u64) -> Result<RangeList, RangeError> {
        let available = self.size();
        if available < n {
            return Err(RangeError::InsufficientSupply {
                requested: n,
                available,
            });
        }

        let mut taken = RangeList::new();
        let mut remaining = n;

        while remaining > 0 {
            let mut range = self
                .0
                .pop_front()
                .expect("size checked above, list cannot run dry; qed");

            if range.size() <= remaining {
                remaining -= range.size();
                taken.push(range);
            } else {
                let split = range.start + remaining;
                taken.push(SatRange::new(range.start, split));
                range.start = split;
                self.0.push_front(range);
                remaining = 0;
            }
        }

        Ok(taken)
    }

    /// Iterates over the ranges in list order.
    pub fn iter(&self) -> impl Iterator<Item = &SatRange> {
        self.0.iter()
    }
}

impl From<SatRange> for RangeList {
    fn from(range: SatRange) -> Self {
        let mut list = RangeList::new();
        list.push(range);
        list
    }
}

impl FromIterator<SatRange> for RangeList {
    fn from_iter<I: IntoIterator<Item = SatRange>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for RangeList {
    type Item = SatRange;
    type IntoIter = std::collections::vec_deque::IntoIter<SatRange>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(ranges: &[(u64, u64)]) -> RangeList {
        ranges
            .iter()
            .map(|&(start, end)| SatRange::new(start, end))
            .collect()
    }

    #[test]
    fn test_size_sums_all_ranges() {
        assert_eq!(list(&[]).size(), 0);
        assert_eq!(list(&[(0, 100)]).size(), 100);
        assert_eq!(list(&[(0, 100), (500, 700)]).size(), 300);
    }

    #[test]
    fn test_skim_whole_ranges() {
        let mut pool = list(&[(0, 100), (100, 200)]);
        let taken = pool.skim(100).unwrap();
        assert_eq!(taken, list(&[(0, 100)]));
        assert_eq!(pool, list(&[(100, 200)]));
    }

    #[test]
    fn test_skim_splits_straddling_range() {
        let mut pool = list(&[(0, 100), (100, 200)]);
        let taken = pool.skim(150).unwrap();
        assert_eq!(taken, list(&[(0, 100), (100, 150)]));
        assert_eq!(pool, list(&[(150, 200)]));
    }

    #[test]
    fn test_skim_zero_is_empty() {
        let mut pool = list(&[(0, 100)]);
        let taken = pool.skim(0).unwrap();
        assert!(taken.is_empty());
        assert_eq!(pool, list(&[(0, 100)]));
    }

    #[test]
    fn test_skim_entire_pool() {
        let mut pool = list(&[(0, 100), (300, 400)]);
        let taken = pool.skim(200).unwrap();
        assert_eq!(taken, list(&[(0, 100), (300, 400)]));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_skim_insufficient_supply_leaves_pool_untouched() {
        let mut pool = list(&[(0, 100)]);
        let err = pool.skim(101).unwrap_err();
        assert_eq!(
            err,
            RangeError::InsufficientSupply {
                requested: 101,
                available: 100,
            }
        );
        assert_eq!(pool, list(&[(0, 100)]));
    }

    #[test]
    fn test_skim_preserves_positional_order() {
        // A coinbase pool carries the mint range before lower-numbered fee
        // ranges; skim must respect position, not ordinal value.
        let mut pool = list(&[(5_000, 6_000), (100, 200)]);
        let taken = pool.skim(1_050).unwrap();
        assert_eq!(taken, list(&[(5_000, 6_000), (100, 150)]));
        assert_eq!(pool, list(&[(150, 200)]));
    }

    #[test]
    fn test_contains() {
        let pool = list(&[(0, 100), (500, 700)]);
        assert!(pool.contains(0));
        assert!(pool.contains(99));
        assert!(!pool.contains(100));
        assert!(pool.contains(500));
        assert!(!pool.contains(700));
    }

    #[test]
    fn test_append_preserves_order() {
        let mut pool = list(&[(100, 200)]);
        let mut tail = list(&[(0, 50)]);
        pool.append(&mut tail);
        assert_eq!(pool, list(&[(100, 200), (0, 50)]));
        assert!(tail.is_empty());
    }
}
