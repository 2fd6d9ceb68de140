//! # States
//!
//! A state is a named boolean predicate over the rows of a [`Table`],
//! materialized as a derived column keyed by the state's id.
//!
//! Variants form a closed sum type, [`StateKind`]; computing values,
//! describing and persisting a state are each a single exhaustive match.
//!
//! Compound and sequence states reference other states by id. A state that
//! others reference cannot be removed without first resolving its
//! dependents, see [`find_dependents`].

pub mod compound;
pub mod condition;
pub mod region;
pub mod registry;
pub mod sequence;
pub mod timespan;

pub use compound::CompoundState;
pub use condition::ConditionState;
pub use region::{Ellipse, Rect, RegionShape};
pub use registry::PersistableState;
pub use sequence::SequenceState;
pub use timespan::TimespanState;

use crate::table::Table;
use crate::types::{ComputationError, IndexRange, StateId, ranges_contain};
use std::collections::{BTreeSet, VecDeque};
use tracing::debug;

// =============================================================================
// STATE
// =============================================================================

/// Variant-specific parameters of a state.
#[derive(Debug, Clone, PartialEq)]
pub enum StateKind {
    Region(RegionShape),
    Compound(CompoundState),
    Condition(ConditionState),
    Sequence(SequenceState),
    Timespan(TimespanState),
}

impl From<RegionShape> for StateKind {
    fn from(shape: RegionShape) -> Self {
        Self::Region(shape)
    }
}

impl From<Ellipse> for StateKind {
    fn from(ellipse: Ellipse) -> Self {
        Self::Region(RegionShape::Ellipse(ellipse))
    }
}

impl From<Rect> for StateKind {
    fn from(rect: Rect) -> Self {
        Self::Region(RegionShape::Rect(rect))
    }
}

impl From<CompoundState> for StateKind {
    fn from(state: CompoundState) -> Self {
        Self::Compound(state)
    }
}

impl From<ConditionState> for StateKind {
    fn from(state: ConditionState) -> Self {
        Self::Condition(state)
    }
}

impl From<SequenceState> for StateKind {
    fn from(state: SequenceState) -> Self {
        Self::Sequence(state)
    }
}

impl From<TimespanState> for StateKind {
    fn from(state: TimespanState) -> Self {
        Self::Timespan(state)
    }
}

/// A named, identified state.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub id: StateId,
    pub name: String,
    pub kind: StateKind,
}

impl State {
    /// Create a state with a fresh id.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: impl Into<StateKind>) -> Self {
        Self::with_id(StateId::generate(), name, kind)
    }

    #[must_use]
    pub fn with_id(id: StateId, name: impl Into<String>, kind: impl Into<StateKind>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: kind.into(),
        }
    }

    /// Renamed copy, same id.
    #[must_use]
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// One-line description for state lists.
    #[must_use]
    pub fn describe(&self) -> String {
        match &self.kind {
            StateKind::Region(RegionShape::Ellipse(e)) => format!(
                "Ellipse at ({}, {}), radii {} x {}",
                e.center[0], e.center[1], e.rx, e.ry
            ),
            StateKind::Region(RegionShape::Rect(r)) => format!(
                "Rectangle at ({}, {}), {} x {}",
                r.center[0], r.center[1], r.width, r.height
            ),
            StateKind::Compound(c) => format!(
                "Compound of {} and {}: {} node(s), {} edge(s)",
                c.states[0],
                c.states[1],
                c.nodes.len(),
                c.edges.len()
            ),
            StateKind::Condition(c) => format!("Condition: {}", c.expression),
            StateKind::Sequence(s) => format!(
                "Sequence of {} step(s) over {} state(s)",
                s.sequence.len(),
                s.states.len()
            ),
            StateKind::Timespan(t) => format!("Timespan {} to {}", t.range.start, t.range.end),
        }
    }

    /// One boolean per row of `table`, in row order.
    ///
    /// # Errors
    /// Any `ComputationError` of the variant; nothing is partially applied.
    pub fn compute_column_values(&self, table: &Table) -> Result<Vec<bool>, ComputationError> {
        let values = match &self.kind {
            StateKind::Region(shape) => shape.compute(table)?,
            StateKind::Compound(compound) => compound.compute(table)?,
            StateKind::Condition(condition) => condition.compute(table),
            StateKind::Sequence(sequence) => sequence.compute(table)?,
            StateKind::Timespan(timespan) => timespan.compute(table),
        };
        debug!(
            state = %self.id,
            kind = self.type_tag(),
            rows = values.len(),
            "state values computed"
        );
        Ok(values)
    }

    /// Ids of the states this one is computed from.
    #[must_use]
    pub fn dependencies(&self) -> Vec<&StateId> {
        match &self.kind {
            StateKind::Compound(compound) => compound.states.iter().collect(),
            StateKind::Sequence(sequence) => sequence.states.iter().collect(),
            StateKind::Region(_) | StateKind::Condition(_) | StateKind::Timespan(_) => Vec::new(),
        }
    }

    #[must_use]
    pub fn depends_on(&self, id: &StateId) -> bool {
        self.dependencies().contains(&id)
    }
}

// =============================================================================
// DEPENDENCIES
// =============================================================================

/// Every state that directly or transitively references `id`.
///
/// Breadth-first, in discovery order, without duplicates; `id` itself is
/// never included.
#[must_use]
pub fn find_dependents(id: &StateId, states: &[State]) -> Vec<StateId> {
    let mut found: Vec<StateId> = Vec::new();
    let mut seen: BTreeSet<&StateId> = BTreeSet::new();
    seen.insert(id);
    let mut queue: VecDeque<&StateId> = VecDeque::from([id]);

    while let Some(current) = queue.pop_front() {
        for state in states {
            if state.depends_on(current) && seen.insert(&state.id) {
                found.push(state.id.clone());
                queue.push_back(&state.id);
            }
        }
    }
    found
}

/// Row-wise membership of the table's Index values in `ranges`.
fn membership(table: &Table, ranges: &[IndexRange]) -> Vec<bool> {
    table
        .index_values()
        .iter()
        .map(|&index| ranges_contain(ranges, index))
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
