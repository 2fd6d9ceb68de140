//! # trailstate-core
//!
//! The state/derivation engine for Trailstate.
//!
//! A GPS trace is loaded into an immutable [`Table`]. Users define boolean
//! [`State`]s over its rows (regions, timespans, conditions, compound and
//! sequence states); each state materializes as a derived column, and the
//! engine reduces those columns to runs and Index ranges for highlighting
//! and summaries.
//!
//! ## Architectural Constraints
//!
//! - Pure and synchronous: no async, no network, no file I/O in derivations
//! - Snapshots: every change returns a new `Table` / `Project`
//! - Deterministic: ordered collections are `BTreeMap`/`BTreeSet`
//! - Closed: rendering, CSV parsing and file storage are collaborators that
//!   call in through [`Table::load`], [`formats`] and [`summary`]

// =============================================================================
// MODULES
// =============================================================================

pub mod config;
pub mod expr;
pub mod formats;
pub mod graph;
pub mod logging;
pub mod primitives;
pub mod project;
pub mod runs;
pub mod sequence;
pub mod states;
pub mod summary;
pub mod table;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    CellValue, Column, ColumnKind, ComputationError, IndexRange, RawTable, StateId, TrailError,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use config::{EngineConfig, LogFormat, LoggingConfig};
pub use expr::{Evaluator, compile};
pub use graph::{NodeLabel, Terminal, Transition, TransitionGraph};
pub use project::Project;
pub use runs::{Run, summarize_by_key};
pub use sequence::{SequenceInfo, match_sequence};
pub use states::{
    CompoundState, ConditionState, Ellipse, PersistableState, Rect, RegionShape, SequenceState,
    State, StateKind, TimespanState, find_dependents,
};
pub use table::{ColumnKindHints, PersistableTable, RowView, Table, guess_column_kinds};

// =============================================================================
// RE-EXPORTS: Summaries and Formats
// =============================================================================

pub use formats::{PersistenceHeader, project_from_json, project_to_json};
pub use summary::{AggregateSummary, Cycle, ExportColumn, ExportTable, SequenceRow, ValueRun};
