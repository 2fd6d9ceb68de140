//! Timespan states: a closed range over the Index column.

use crate::table::Table;
use crate::types::IndexRange;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimespanState {
    pub range: IndexRange,
}

impl TimespanState {
    #[must_use]
    pub fn new(range: IndexRange) -> Self {
        Self { range }
    }

    #[must_use]
    pub fn compute(&self, table: &Table) -> Vec<bool> {
        table
            .index_values()
            .iter()
            .map(|&index| self.range.contains(index))
            .collect()
    }
}
