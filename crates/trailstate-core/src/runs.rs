//! # Run-Length Summarizer
//!
//! Reduces an ordered row sequence into maximal runs of equal keys.
//!
//! A single primitive serves the per-state cycle breakdown, the compound
//! state's two-state cross product and the sequence matcher's state-set
//! partition. Keys are compared structurally (`PartialEq`), so composite keys
//! such as `BTreeSet<StateId>` compare by content.

use crate::types::IndexRange;
use serde::{Deserialize, Serialize};

/// A maximal span of consecutive rows sharing one key value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run<K> {
    pub value: K,
    /// Inclusive Index bounds of the run.
    pub range: IndexRange,
}

impl<K> Run<K> {
    /// Number of rows covered by the run, given the Index values of the rows
    /// it was built from.
    #[must_use]
    pub fn row_count(&self, index: &[i64]) -> usize {
        let lo = index.partition_point(|&i| i < self.range.start);
        let hi = index.partition_point(|&i| i <= self.range.end);
        hi.saturating_sub(lo)
    }
}

/// Summarize `(index, key)` pairs, given in row order, into runs.
///
/// A row whose key equals the previous run's value extends that run;
/// otherwise it opens a new one. The resulting ranges partition the rows:
/// no gaps, no overlaps.
pub fn summarize_by_key<K, I>(rows: I) -> Vec<Run<K>>
where
    K: PartialEq,
    I: IntoIterator<Item = (i64, K)>,
{
    let mut runs: Vec<Run<K>> = Vec::new();
    for (index, key) in rows {
        match runs.last_mut() {
            Some(last) if last.value == key => last.range.end = index,
            _ => runs.push(Run {
                value: key,
                range: IndexRange::single(index),
            }),
        }
    }
    runs
}

/// Contiguous Index ranges over which a boolean column is true.
///
/// A true row extends the open range only when its Index is exactly one
/// past the range's end; any gap in the Index sequence closes the range.
pub fn true_ranges_of<I>(rows: I) -> Vec<IndexRange>
where
    I: IntoIterator<Item = (i64, bool)>,
{
    let mut ranges: Vec<IndexRange> = Vec::new();
    for (index, value) in rows {
        if !value {
            continue;
        }
        match ranges.last_mut() {
            Some(last) if last.end.checked_add(1) == Some(index) => last.end = index,
            _ => ranges.push(IndexRange::single(index)),
        }
    }
    ranges
}

/// Ranges of the runs whose value satisfies `keep`, in run order.
pub fn ranges_where<K>(runs: &[Run<K>], mut keep: impl FnMut(&K) -> bool) -> Vec<IndexRange> {
    runs.iter()
        .filter(|run| keep(&run.value))
        .map(|run| run.range)
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
