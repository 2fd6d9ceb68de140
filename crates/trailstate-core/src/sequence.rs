//! # Sequence Matcher
//!
//! Finds occurrences of a target sequence inside an observed run sequence.
//!
//! Matching is greedy, left to right and non-overlapping: at each position
//! the target is compared element-wise; a hit labels the whole window with
//! the next occurrence number and skips past it, a miss leaves the position
//! unmatched and moves on by one. There is no backtracking, so a
//! self-overlapping target such as `[A, A]` against `[A, A, A]` matches once.

use serde::{Deserialize, Serialize};

/// Per-position result of [`match_sequence`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceInfo {
    /// 1-based occurrence this position belongs to, `None` when unmatched.
    pub occurrence: Option<usize>,
    /// Positions from here to the end of the block sharing this occurrence
    /// value, counting this one (>= 1).
    pub next_boundary: usize,
    /// Positions from the start of that block to here, counting this one
    /// (>= 1).
    pub prev_boundary: usize,
}

impl SequenceInfo {
    /// Occurrence as a plain integer: `-1` when unmatched.
    #[must_use]
    pub fn occurrence_number(&self) -> i64 {
        self.occurrence.map_or(-1, |n| n as i64)
    }

    /// Whether this position starts a block of equal occurrence values.
    #[must_use]
    pub fn starts_block(&self) -> bool {
        self.prev_boundary == 1
    }
}

impl Default for SequenceInfo {
    fn default() -> Self {
        Self {
            occurrence: None,
            next_boundary: 1,
            prev_boundary: 1,
        }
    }
}

/// Label every observed position with its occurrence of `target`.
///
/// An empty target matches nothing.
pub fn match_sequence<K: PartialEq>(observed: &[K], target: &[K]) -> Vec<SequenceInfo> {
    let mut info = vec![SequenceInfo::default(); observed.len()];

    if !target.is_empty() {
        let mut occurrence = 0;
        let mut i = 0;
        while i + target.len() <= observed.len() {
            if observed[i..i + target.len()] == *target {
                occurrence += 1;
                for slot in &mut info[i..i + target.len()] {
                    slot.occurrence = Some(occurrence);
                }
                i += target.len();
            } else {
                i += 1;
            }
        }
    }

    for i in (0..info.len().saturating_sub(1)).rev() {
        if info[i].occurrence == info[i + 1].occurrence {
            info[i].next_boundary = info[i + 1].next_boundary + 1;
        }
    }
    for i in 1..info.len() {
        if info[i - 1].occurrence == info[i].occurrence {
            info[i].prev_boundary = info[i - 1].prev_boundary + 1;
        }
    }

    info
}
