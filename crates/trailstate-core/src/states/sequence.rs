//! Sequence states: occurrences of a target sequence of state sets.

use crate::runs::{Run, summarize_by_key};
use crate::sequence::match_sequence;
use crate::table::Table;
use crate::types::{ComputationError, IndexRange, StateId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceState {
    /// States whose concurrent truth forms the observed timeline.
    pub states: Vec<StateId>,
    /// Target: which of `states` are true together, step by step.
    pub sequence: Vec<BTreeSet<StateId>>,
}

impl SequenceState {
    #[must_use]
    pub fn new(states: Vec<StateId>, sequence: Vec<BTreeSet<StateId>>) -> Self {
        Self { states, sequence }
    }

    pub fn validate(&self) -> Result<(), ComputationError> {
        if self.sequence.is_empty() {
            return Err(ComputationError::InvalidParameters(
                "sequence must have at least one step".to_string(),
            ));
        }
        if let Some(stray) = self
            .sequence
            .iter()
            .flatten()
            .find(|id| !self.states.contains(id))
        {
            return Err(ComputationError::InvalidParameters(format!(
                "sequence step references {} outside the chosen states",
                stray
            )));
        }
        Ok(())
    }

    /// Ranges of the runs that belong to an occurrence of the target.
    pub fn matched_ranges(&self, table: &Table) -> Result<Vec<IndexRange>, ComputationError> {
        self.validate()?;
        let runs = state_set_runs(table, &self.states)?;
        let observed: Vec<&BTreeSet<StateId>> = runs.iter().map(|r| &r.value).collect();
        let target: Vec<&BTreeSet<StateId>> = self.sequence.iter().collect();
        Ok(runs
            .iter()
            .zip(match_sequence(&observed, &target))
            .filter(|(_, info)| info.occurrence.is_some())
            .map(|(run, _)| run.range)
            .collect())
    }

    pub fn compute(&self, table: &Table) -> Result<Vec<bool>, ComputationError> {
        let ranges = self.matched_ranges(table)?;
        Ok(super::membership(table, &ranges))
    }
}

/// Summarize `table` by the set of `ids` true on each row.
pub fn state_set_runs(
    table: &Table,
    ids: &[StateId],
) -> Result<Vec<Run<BTreeSet<StateId>>>, ComputationError> {
    let columns = ids
        .iter()
        .map(|id| table.boolean_column(id).map(|values| (id, values)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(summarize_by_key(table.index_values().iter().enumerate().map(
        |(pos, &index)| {
            let set = columns
                .iter()
                .filter(|(_, values)| values[pos])
                .map(|(id, _)| (*id).clone())
                .collect::<BTreeSet<StateId>>();
            (index, set)
        },
    )))
}
