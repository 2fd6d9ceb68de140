//! # Project
//!
//! The unit the application shell holds as "current version": a table, the
//! committed states whose columns it carries, and at most one state being
//! composed.
//!
//! Every operation returns a new `Project`; a failed operation leaves the
//! receiver as it was.

use crate::states::{State, find_dependents};
use crate::table::Table;
use crate::types::{ComputationError, StateId, TrailError};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    table: Table,
    states: Vec<State>,
    temp_state: Option<State>,
}

impl Project {
    /// A project over a freshly loaded table, without states.
    #[must_use]
    pub fn new(table: Table) -> Self {
        Self {
            table,
            states: Vec::new(),
            temp_state: None,
        }
    }

    /// Reassemble a project from committed parts. The table must already
    /// carry a State column for every state.
    pub fn from_parts(table: Table, states: Vec<State>) -> Result<Self, TrailError> {
        for state in &states {
            table.boolean_column(&state.id)?;
        }
        Ok(Self {
            table: table.without_temp_column(),
            states,
            temp_state: None,
        })
    }

    #[must_use]
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Committed states, in creation order.
    #[must_use]
    pub fn states(&self) -> &[State] {
        &self.states
    }

    #[must_use]
    pub fn temp_state(&self) -> Option<&State> {
        self.temp_state.as_ref()
    }

    #[must_use]
    pub fn state(&self, id: &StateId) -> Option<&State> {
        self.states.iter().find(|s| &s.id == id)
    }

    // =========================================================================
    // COMPOSING
    // =========================================================================

    /// Derive `state` into the temp column, replacing any state being
    /// composed.
    ///
    /// # Errors
    /// - `ComputationError::InvalidParameters` when the id is already committed
    /// - `ComputationError::MissingState` when a referenced state is not committed
    /// - any error of the derivation itself
    pub fn with_temp_state(&self, state: State) -> Result<Self, TrailError> {
        if self.state(&state.id).is_some() {
            return Err(ComputationError::InvalidParameters(format!(
                "state {} is already committed",
                state.id
            ))
            .into());
        }
        if let Some(missing) = state
            .dependencies()
            .into_iter()
            .find(|dep| self.state(dep).is_none())
        {
            return Err(ComputationError::MissingState(missing.clone()).into());
        }

        let table = self.table.with_derived_column(&state).inspect_err(|e| {
            warn!(state = %state.id, error = %e, "derivation rejected");
        })?;
        Ok(Self {
            table,
            states: self.states.clone(),
            temp_state: Some(state),
        })
    }

    /// Drop the state being composed.
    #[must_use]
    pub fn cancel_temp_state(&self) -> Self {
        Self {
            table: self.table.without_temp_column(),
            states: self.states.clone(),
            temp_state: None,
        }
    }

    /// Commit the state being composed: its column becomes a State column
    /// and the state joins the committed list.
    pub fn commit_temp_state(&self) -> Result<Self, TrailError> {
        let Some(state) = self.temp_state.clone() else {
            return Err(ComputationError::InvalidParameters(
                "no state is being composed".to_string(),
            )
            .into());
        };
        info!(state = %state.id, name = %state.name, kind = state.type_tag(), "state committed");
        let mut states = self.states.clone();
        states.push(state);
        Ok(Self {
            table: self.table.with_committed_temp_column(),
            states,
            temp_state: None,
        })
    }

    // =========================================================================
    // EDITING COMMITTED STATES
    // =========================================================================

    /// Every committed state that references `id`, transitively.
    #[must_use]
    pub fn dependents_of(&self, id: &StateId) -> Vec<StateId> {
        find_dependents(id, &self.states)
    }

    /// Delete a state nothing else references.
    ///
    /// # Errors
    /// - `TrailError::Dependency` listing the dependents, when there are any
    /// - `ComputationError::MissingState` for an unknown id
    pub fn delete_state(&self, id: &StateId) -> Result<Self, TrailError> {
        self.require(id)?;
        let dependents = self.dependents_of(id);
        if !dependents.is_empty() {
            warn!(state = %id, dependents = dependents.len(), "delete refused");
            return Err(TrailError::Dependency {
                state: id.clone(),
                dependents,
            });
        }
        Ok(self.without_states(&[id.clone()]))
    }

    /// Delete a state together with everything that references it.
    pub fn delete_state_cascade(&self, id: &StateId) -> Result<Self, TrailError> {
        self.require(id)?;
        let mut doomed = vec![id.clone()];
        doomed.extend(self.dependents_of(id));
        Ok(self.without_states(&doomed))
    }

    /// Rename a committed state and its column.
    pub fn rename_state(&self, id: &StateId, name: &str) -> Result<Self, TrailError> {
        self.require(id)?;
        Ok(Self {
            table: self.table.with_renamed_column(id, name),
            states: self
                .states
                .iter()
                .map(|s| if &s.id == id { s.with_name(name) } else { s.clone() })
                .collect(),
            temp_state: self.temp_state.clone(),
        })
    }

    fn require(&self, id: &StateId) -> Result<(), TrailError> {
        match self.state(id) {
            Some(_) => Ok(()),
            None => Err(ComputationError::MissingState(id.clone()).into()),
        }
    }

    /// Remove `ids` and their columns. A state being composed on top of a
    /// removed state is cancelled with them.
    fn without_states(&self, ids: &[StateId]) -> Self {
        let orphaned_temp = self
            .temp_state
            .as_ref()
            .is_some_and(|t| ids.iter().any(|id| t.depends_on(id)));
        let base = if orphaned_temp {
            self.cancel_temp_state()
        } else {
            self.clone()
        };
        info!(removed = ids.len(), "states deleted");
        Self {
            table: base.table.with_removed_columns(ids),
            states: base
                .states
                .into_iter()
                .filter(|s| !ids.contains(&s.id))
                .collect(),
            temp_state: base.temp_state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::states::{CompoundState, TimespanState};
    use crate::table::ColumnKindHints;
    use crate::types::{ColumnKind, IndexRange, RawTable};

    fn project() -> Project {
        let raw = RawTable::from_text_records(
            vec!["Order".to_string()],
            (1..=6).map(|i| vec![i.to_string()]).collect(),
        );
        let hints: ColumnKindHints = [("Order".to_string(), ColumnKind::Index)]
            .into_iter()
            .collect();
        Project::new(Table::load(&raw, &hints, &EngineConfig::default()).expect("load"))
    }

    fn timespan(id: &str, lo: i64, hi: i64) -> State {
        State::with_id(StateId::new(id), id, TimespanState::new(IndexRange::new(lo, hi)))
    }

    fn commit(project: &Project, state: State) -> Project {
        project
            .with_temp_state(state)
            .expect("derive")
            .commit_temp_state()
            .expect("commit")
    }

    fn with_compound() -> Project {
        let p = commit(&project(), timespan("a", 1, 3));
        let p = commit(&p, timespan("b", 2, 5));
        let compound = CompoundState::for_table(StateId::new("a"), StateId::new("b"), p.table())
            .expect("compound");
        commit(&p, State::with_id(StateId::new("ab"), "ab", compound))
    }

    #[test]
    fn commit_promotes_temp_column() {
        let p = project().with_temp_state(timespan("a", 2, 3)).expect("derive");
        assert!(p.temp_state().is_some());
        assert!(p.table().temp_column().is_some());

        let p = p.commit_temp_state().expect("commit");
        assert!(p.temp_state().is_none());
        assert!(p.table().temp_column().is_none());
        assert_eq!(p.states().len(), 1);
        assert_eq!(p.table().true_ranges("a"), &[IndexRange::new(2, 3)]);
    }

    #[test]
    fn cancel_discards_temp() {
        let p = project().with_temp_state(timespan("a", 2, 3)).expect("derive");
        let cancelled = p.cancel_temp_state();
        assert!(cancelled.temp_state().is_none());
        assert!(cancelled.table().column("a").is_none());
        assert!(cancelled.commit_temp_state().is_err());
    }

    #[test]
    fn temp_state_requires_committed_dependencies() {
        let compound = CompoundState::new(StateId::new("a"), StateId::new("b"));
        let result = project().with_temp_state(State::new("ab", compound));
        assert!(matches!(
            result,
            Err(TrailError::Computation(ComputationError::MissingState(_)))
        ));
    }

    #[test]
    fn delete_refuses_referenced_state() {
        let p = with_compound();
        let err = p.delete_state(&StateId::new("a")).expect_err("should refuse");
        assert!(matches!(
            &err,
            TrailError::Dependency { dependents, .. } if dependents == &vec![StateId::new("ab")]
        ));
        assert_eq!(p.states().len(), 3);

        let p = p.delete_state(&StateId::new("ab")).expect("delete");
        assert!(p.table().column("ab").is_none());
        assert!(p.delete_state(&StateId::new("a")).is_ok());
    }

    #[test]
    fn cascade_removes_dependents() {
        let p = with_compound()
            .delete_state_cascade(&StateId::new("b"))
            .expect("cascade");
        let ids: Vec<&str> = p.states().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
        assert!(p.table().column("ab").is_none());
        assert!(p.table().true_ranges("ab").is_empty());
    }

    #[test]
    fn deleting_cancels_dependent_temp_state() {
        let p = commit(&project(), timespan("a", 1, 2));
        let p = commit(&p, timespan("b", 2, 3));
        let pending = CompoundState::new(StateId::new("a"), StateId::new("b"));
        let p = p.with_temp_state(State::new("ab", pending)).expect("derive");
        let p = p.delete_state(&StateId::new("a")).expect("delete");
        assert!(p.temp_state().is_none());
        assert!(p.table().temp_column().is_none());
    }

    #[test]
    fn rename_updates_column() {
        let p = with_compound().rename_state(&StateId::new("a"), "Home").expect("rename");
        assert_eq!(p.state(&StateId::new("a")).map(|s| s.name.as_str()), Some("Home"));
        assert_eq!(
            p.table().column("a").map(|c| c.display_name.as_str()),
            Some("Home")
        );
        assert!(p.rename_state(&StateId::new("zz"), "x").is_err());
    }
}
