//! # Validation Tier Tests (T0-T3)
//!
//! If ANY tier fails, the engine is INVALID.
//!
//! ## Tiers
//! - T0: Import Integrity
//! - T1: Single-State Derivation
//! - T2: Composite States (compound, sequence, condition)
//! - T3: Persistence and Export

use std::collections::BTreeSet;
use trailstate_core::{
    ColumnKind, ColumnKindHints, ComputationError, EngineConfig, IndexRange, Project, RawTable,
    State, StateId, Table, TrailError,
};

fn raw(headers: &[&str], rows: &[&[&str]]) -> RawTable {
    RawTable::from_text_records(
        headers.iter().map(|h| h.to_string()).collect(),
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect(),
    )
}

fn hints(pairs: &[(&str, ColumnKind)]) -> ColumnKindHints {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// Ten GPS points walking east along the equator, one every 30 seconds.
fn trace() -> Table {
    let rows: Vec<Vec<String>> = (1..=10)
        .map(|i| {
            vec![
                i.to_string(),
                format!("{}", f64::from(i) * 0.001),
                "0".to_string(),
                format!("11/11/2021 03:{:02}:{:02} PM", 20 + i / 2, (i % 2) * 30),
            ]
        })
        .collect();
    let raw = RawTable::from_text_records(
        vec![
            "Order".to_string(),
            "Longitude".to_string(),
            "Latitude".to_string(),
            "Date Created".to_string(),
        ],
        rows,
    );
    let guessed = trailstate_core::guess_column_kinds(&raw.headers);
    Table::load(&raw, &guessed, &EngineConfig::default()).expect("load trace")
}

fn commit(project: &Project, state: State) -> Project {
    project
        .with_temp_state(state)
        .expect("derive")
        .commit_temp_state()
        .expect("commit")
}

// =============================================================================
// TIER T0: IMPORT INTEGRITY
// =============================================================================

mod t0_import_integrity {
    use super::*;

    /// T0.1: Guessed kinds produce the canonical column order.
    #[test]
    fn guessed_trace_loads_in_display_order() {
        let table = trace();
        let kinds: Vec<ColumnKind> = table.columns().iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ColumnKind::Index,
                ColumnKind::X,
                ColumnKind::Y,
                ColumnKind::TimeClean,
                ColumnKind::Time,
            ]
        );
        assert_eq!(table.len(), 10);
    }

    /// T0.2: Empty hints leave every column Unclassified.
    #[test]
    fn empty_hints_tolerated() {
        let table = Table::load(
            &raw(&["a", "b"], &[&["1", "x"]]),
            &ColumnKindHints::new(),
            &EngineConfig::default(),
        )
        .expect("load");
        assert_eq!(table.columns_of_kind(ColumnKind::Unclassified).count(), 2);
        assert_eq!(table.columns_of_kind(ColumnKind::Index).count(), 1);
    }

    /// T0.3: Duplicate Index values abort the import.
    #[test]
    fn duplicate_index_rejected() {
        let result = Table::load(
            &raw(&["Order"], &[&["1"], &["2"], &["2"]]),
            &hints(&[("Order", ColumnKind::Index)]),
            &EngineConfig::default(),
        );
        assert!(matches!(result, Err(TrailError::Import(_))));
    }

    /// T0.4: No rows, no table.
    #[test]
    fn empty_input_rejected() {
        let result = Table::load(
            &raw(&["Order"], &[]),
            &ColumnKindHints::new(),
            &EngineConfig::default(),
        );
        assert!(matches!(result, Err(TrailError::Import(_))));
    }
}

// =============================================================================
// TIER T1: SINGLE-STATE DERIVATION
// =============================================================================

mod t1_single_state {
    use super::*;
    use trailstate_core::{Ellipse, Rect, TimespanState};

    /// T1.1: A loaded boolean column reduces to its true ranges.
    #[test]
    fn loaded_column_true_ranges() {
        let table = Table::load(
            &raw(
                &["Order", "S"],
                &[&["1", "true"], &["2", "true"], &["3", "false"], &["4", "true"], &["5", "true"]],
            ),
            &hints(&[("Order", ColumnKind::Index), ("S", ColumnKind::State)]),
            &EngineConfig::default(),
        )
        .expect("load");
        assert_eq!(
            table.true_ranges("S"),
            &[IndexRange::new(1, 2), IndexRange::new(4, 5)]
        );
    }

    /// T1.2: A region over the trace selects the points inside it.
    #[test]
    fn ellipse_region_over_trace() {
        let project = commit(
            &Project::new(trace()),
            State::with_id(
                StateId::new("park"),
                "Park",
                Ellipse {
                    center: [0.005, 0.0],
                    rx: 0.0015,
                    ry: 0.001,
                    angle: 0.0,
                },
            ),
        );
        assert_eq!(project.table().true_ranges("park"), &[IndexRange::new(4, 6)]);
    }

    /// T1.3: A rectangle over the trace.
    #[test]
    fn rect_region_over_trace() {
        let project = commit(
            &Project::new(trace()),
            State::with_id(
                StateId::new("block"),
                "Block",
                Rect {
                    center: [0.0035, 0.0],
                    width: 0.002,
                    height: 1.0,
                    angle: 0.0,
                },
            ),
        );
        assert_eq!(project.table().true_ranges("block"), &[IndexRange::new(3, 4)]);
    }

    /// T1.4: A failed derivation leaves the project as it was.
    #[test]
    fn failed_derivation_is_all_or_nothing() {
        let project = Project::new(trace());
        let flat = State::new(
            "flat",
            Ellipse {
                center: [0.0, 0.0],
                rx: 0.0,
                ry: 1.0,
                angle: 0.0,
            },
        );
        let result = project.with_temp_state(flat);
        assert!(matches!(
            result,
            Err(TrailError::Computation(ComputationError::InvalidParameters(_)))
        ));
        assert!(project.table().temp_column().is_none());
    }

    /// T1.5: Replacing the temp state keeps a single temp column.
    #[test]
    fn single_temp_column() {
        let project = Project::new(trace())
            .with_temp_state(State::new("a", TimespanState::new(IndexRange::new(1, 3))))
            .expect("first")
            .with_temp_state(State::new("b", TimespanState::new(IndexRange::new(5, 9))))
            .expect("second");
        assert_eq!(project.table().columns_of_kind(ColumnKind::StateTemp).count(), 1);
        assert_eq!(project.temp_state().map(|s| s.name.as_str()), Some("b"));
    }
}

// =============================================================================
// TIER T2: COMPOSITE STATES
// =============================================================================

mod t2_composite_states {
    use super::*;
    use trailstate_core::graph::NodeLabel::{FF, FT, TF, TT};
    use trailstate_core::{
        CompoundState, ConditionState, SequenceState, TimespanState, Transition,
    };

    fn two_spans() -> Project {
        let p = commit(
            &Project::new(trace()),
            State::with_id(StateId::new("a"), "A", TimespanState::new(IndexRange::new(2, 5))),
        );
        commit(
            &p,
            State::with_id(StateId::new("b"), "B", TimespanState::new(IndexRange::new(4, 8))),
        )
    }

    /// T2.1: The compound graph lists the observed labels and transitions.
    #[test]
    fn compound_possible_graph() {
        let p = two_spans();
        let compound = CompoundState::for_table(StateId::new("a"), StateId::new("b"), p.table())
            .expect("compound");
        assert_eq!(compound.possible_nodes, [TT, TF, FT, FF].into_iter().collect());
        assert!(compound.possible_edges.contains(&Transition::new(TF, TT)));
        assert!(compound.possible_edges.contains(&Transition::new(FT, FF)));
        assert!(compound.nodes.is_empty());
    }

    /// T2.2: "B after A": the FT run entered from TT.
    #[test]
    fn compound_edge_selection() {
        let p = two_spans();
        let compound = CompoundState::for_table(StateId::new("a"), StateId::new("b"), p.table())
            .expect("compound")
            .with_selection(
                [FT].into_iter().collect(),
                [Transition::new(TT, FT)].into_iter().collect(),
            );
        let p = commit(&p, State::with_id(StateId::new("ab"), "B after A", compound));
        assert_eq!(p.table().true_ranges("ab"), &[IndexRange::new(6, 8)]);
    }

    /// T2.3: Sequence A-only then both marks rows 2..=5.
    #[test]
    fn sequence_state_marks_occurrence() {
        let p = two_spans();
        let a: BTreeSet<StateId> = [StateId::new("a")].into_iter().collect();
        let both: BTreeSet<StateId> = [StateId::new("a"), StateId::new("b")].into_iter().collect();
        let sequence =
            SequenceState::new(vec![StateId::new("a"), StateId::new("b")], vec![a, both]);
        let p = commit(&p, State::with_id(StateId::new("seq"), "Seq", sequence));
        assert_eq!(p.table().true_ranges("seq"), &[IndexRange::new(2, 5)]);
    }

    /// T2.4: Conditions see committed states by display name.
    #[test]
    fn condition_over_states() {
        let p = two_spans();
        let condition = ConditionState::capture("A && !B", p.table(), &EngineConfig::default())
            .expect("capture");
        let p = commit(&p, State::with_id(StateId::new("c"), "Only A", condition));
        assert_eq!(p.table().true_ranges("c"), &[IndexRange::new(2, 3)]);
    }

    /// T2.5: Unsupported operators are reported with the token.
    #[test]
    fn unsupported_operator_named() {
        let p = two_spans();
        let err = ConditionState::capture("A = 1", p.table(), &EngineConfig::default())
            .expect_err("should fail");
        assert!(matches!(&err, ComputationError::UnsupportedOperator(op) if op == "="));
    }

    /// T2.6: Deleting a referenced state is refused until cascaded.
    #[test]
    fn dependency_guard() {
        let p = two_spans();
        let compound = CompoundState::new(StateId::new("a"), StateId::new("b"));
        let p = commit(&p, State::with_id(StateId::new("ab"), "AB", compound));
        assert!(matches!(
            p.delete_state(&StateId::new("b")),
            Err(TrailError::Dependency { .. })
        ));
        let p = p.delete_state_cascade(&StateId::new("b")).expect("cascade");
        assert_eq!(p.states().len(), 1);
    }
}

// =============================================================================
// TIER T3: PERSISTENCE AND EXPORT
// =============================================================================

mod t3_persistence_export {
    use super::*;
    use trailstate_core::summary::{aggregate_summary, breakdown_by_value, cycle_breakdown};
    use trailstate_core::{TimespanState, project_from_json, project_to_json};

    fn project() -> Project {
        commit(
            &Project::new(trace()),
            State::with_id(
                StateId::new("mid"),
                "Middle",
                TimespanState::new(IndexRange::new(3, 6)),
            ),
        )
    }

    /// T3.1: Save -> load restores states and cleaned timestamps.
    #[test]
    fn project_roundtrip() {
        let config = EngineConfig::default();
        let p = project();
        let json = project_to_json(&p, &config).expect("serialize");
        let restored = project_from_json(&json, &config).expect("deserialize");
        assert_eq!(restored, p);

        let clean = restored.table().column_of_kind(ColumnKind::TimeClean).expect("clean");
        let first = restored.table().row(0).expect("row");
        assert_eq!(
            first.get(&clean.key).as_time(),
            p.table().row(0).expect("row").get(&clean.key).as_time()
        );
    }

    /// T3.1b: Sub-millisecond input times restore to the same instant.
    #[test]
    fn fine_grained_times_roundtrip() {
        let config = EngineConfig::default();
        let table = Table::load(
            &raw(&["Time"], &[&["2021-11-11T15:22:21.123456"], &["2021-11-11T15:22:22.5"]]),
            &hints(&[("Time", ColumnKind::Time)]),
            &config,
        )
        .expect("load");
        let p = Project::new(table);
        let restored =
            project_from_json(&project_to_json(&p, &config).expect("serialize"), &config)
                .expect("deserialize");
        assert_eq!(restored, p);

        let clean = p.table().column_of_kind(ColumnKind::TimeClean).expect("clean");
        for (before, after) in p.table().rows().zip(restored.table().rows()) {
            assert!(before.get(&clean.key).as_time().is_some());
            assert_eq!(before.get(&clean.key).as_time(), after.get(&clean.key).as_time());
        }
    }

    /// T3.2: Summaries over a committed state.
    #[test]
    fn summaries_of_state() {
        let p = project();
        let id = StateId::new("mid");
        let cycles = cycle_breakdown(p.table(), &id).expect("cycles");
        assert_eq!(cycles.len(), 2);

        let breakdown = breakdown_by_value(p.table(), &id).expect("breakdown");
        let summary = aggregate_summary(&breakdown);
        assert_eq!(summary.visits, 1);
        // rows 3..=6 span 15:21:30 to 15:23:00
        assert_eq!(summary.total_duration, 90.0);
        assert!(summary.total_distance > 0.0);
    }

    /// T3.3: Base export renames state columns to display names.
    #[test]
    fn base_export_csv() {
        let p = project();
        let export =
            trailstate_core::summary::base_table_export(p.table(), &EngineConfig::default());
        let csv = export.to_csv().expect("csv");
        let header = csv.lines().next().expect("header");
        assert!(header.ends_with(",Middle"));
        assert_eq!(csv.lines().count(), 11);
    }
}
