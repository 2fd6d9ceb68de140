//! # Core Type Definitions
//!
//! This module contains the value types shared by every part of the engine:
//! - State identifiers (`StateId`)
//! - Column metadata (`Column`, `ColumnKind`)
//! - Cell values (`CellValue`) and raw import input (`RawTable`)
//! - Inclusive index ranges (`IndexRange`)
//! - Error types (`TrailError`, `ComputationError`)
//!
//! ## Determinism Guarantees
//!
//! Identifiers and kinds implement `Ord` so they can key `BTreeMap`/`BTreeSet`.
//! Floating-point values only appear inside `CellValue` and region geometry.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// STATE IDENTIFIERS
// =============================================================================

/// Unique identifier of a user-defined state.
///
/// The identifier doubles as the key of the derived column holding the
/// state's values. Fresh identifiers are UUID v4 strings, so two states
/// created back to back never collide.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateId(String);

impl StateId {
    /// Generate a fresh, collision-free identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("state-{}", uuid::Uuid::new_v4()))
    }

    /// Wrap an existing identifier (deserialization, tests).
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// COLUMNS
// =============================================================================

/// Semantic kind of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ColumnKind {
    /// Canonical integer row order ("Order").
    Index,
    /// Longitude / x coordinate.
    X,
    /// Latitude / y coordinate.
    Y,
    /// Raw timestamp text as imported.
    Time,
    /// Timestamp parsed into a `NaiveDateTime`.
    TimeClean,
    /// Committed user-defined state.
    State,
    /// The single state currently being composed.
    StateTemp,
    /// Distance travelled since the previous row.
    Distance,
    /// Anything else.
    Unclassified,
}

impl ColumnKind {
    /// Position of the kind in the canonical display order:
    /// Index, X, Y, TimeClean, Time, Distance, (others), State*, StateTemp.
    #[must_use]
    pub const fn display_rank(self) -> u8 {
        match self {
            Self::Index => 0,
            Self::X => 1,
            Self::Y => 2,
            Self::TimeClean => 3,
            Self::Time => 4,
            Self::Distance => 5,
            Self::Unclassified => 6,
            Self::State => 7,
            Self::StateTemp => 8,
        }
    }

    /// Kinds that at most one column may carry.
    #[must_use]
    pub const fn is_unique(self) -> bool {
        matches!(
            self,
            Self::Index
                | Self::X
                | Self::Y
                | Self::Time
                | Self::TimeClean
                | Self::Distance
                | Self::StateTemp
        )
    }

    /// Kinds the engine produces itself and never accepts from an import.
    #[must_use]
    pub const fn is_derived(self) -> bool {
        matches!(self, Self::TimeClean | Self::StateTemp)
    }

    /// Kinds holding derived state values.
    #[must_use]
    pub const fn is_state(self) -> bool {
        matches!(self, Self::State | Self::StateTemp)
    }
}

/// Column metadata: the key rows are stored under, the name shown to the
/// user (and accepted by condition expressions), and the semantic kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub key: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub kind: ColumnKind,
}

impl Column {
    /// Create a new column.
    #[must_use]
    pub fn new(key: impl Into<String>, display_name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            key: key.into(),
            display_name: display_name.into(),
            kind,
        }
    }
}

// =============================================================================
// CELL VALUES
// =============================================================================

/// A single cell of the table.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Time(NaiveDateTime),
}

impl CellValue {
    /// Dynamic typing of a raw text cell: integers, floats, `true`/`false`,
    /// empty text becomes `Null`, anything else stays text.
    #[must_use]
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::Null;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Self::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            if f.is_finite() {
                return Self::Float(f);
            }
        }
        match trimmed {
            "true" => Self::Bool(true),
            "false" => Self::Bool(false),
            _ => Self::Text(raw.to_string()),
        }
    }

    /// A cell counts as a true state value iff it is `Bool(true)` or the
    /// exact text `"true"`.
    #[must_use]
    pub fn is_true(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Text(s) => s == "true",
            _ => false,
        }
    }

    /// Numeric view of the cell, if it has one.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Integer view of the cell. Floats qualify only when integral.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            Self::Text(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    /// Timestamp view of the cell.
    #[must_use]
    pub fn as_time(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Time(t) => Some(*t),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Text(s) => f.write_str(s),
            Self::Time(t) => {
                write!(f, "{}", t.format(crate::primitives::DEFAULT_CLEAN_TIME_FORMAT))
            }
        }
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for CellValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Raw rows handed over by the import collaborator (CSV parsing lives there).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    /// Column headers, in file order.
    pub headers: Vec<String>,
    /// One record per row, aligned with `headers`.
    pub records: Vec<Vec<CellValue>>,
}

impl RawTable {
    /// Create a raw table from headers and already-typed records.
    #[must_use]
    pub fn new(headers: Vec<String>, records: Vec<Vec<CellValue>>) -> Self {
        Self { headers, records }
    }

    /// Create a raw table from untyped text records, applying `CellValue::infer`.
    #[must_use]
    pub fn from_text_records(headers: Vec<String>, records: Vec<Vec<String>>) -> Self {
        let records = records
            .iter()
            .map(|record| record.iter().map(|cell| CellValue::infer(cell)).collect())
            .collect();
        Self { headers, records }
    }
}

// =============================================================================
// INDEX RANGES
// =============================================================================

/// Inclusive range `[start, end]` in Index units.
///
/// Serialized as a two-element array, the shape the highlight collaborator
/// consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "(i64, i64)", into = "(i64, i64)")]
pub struct IndexRange {
    pub start: i64,
    pub end: i64,
}

impl IndexRange {
    /// Create a new inclusive range.
    #[must_use]
    pub const fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Range covering a single index.
    #[must_use]
    pub const fn single(index: i64) -> Self {
        Self::new(index, index)
    }

    /// Check whether `index` falls inside the range.
    #[must_use]
    pub const fn contains(&self, index: i64) -> bool {
        self.start <= index && index <= self.end
    }
}

impl From<(i64, i64)> for IndexRange {
    fn from((start, end): (i64, i64)) -> Self {
        Self::new(start, end)
    }
}

impl From<IndexRange> for (i64, i64) {
    fn from(range: IndexRange) -> Self {
        (range.start, range.end)
    }
}

/// Check whether `index` falls into any of the sorted, disjoint `ranges`.
#[must_use]
pub fn ranges_contain(ranges: &[IndexRange], index: i64) -> bool {
    let pos = ranges.partition_point(|r| r.end < index);
    ranges.get(pos).is_some_and(|r| r.contains(index))
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Failures raised while computing a state's column values.
///
/// Derivations are all-or-nothing: when one of these is returned, the table
/// the derivation started from is left untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComputationError {
    /// An expression referenced a name that is not a column.
    #[error("Unknown identifier: {0}")]
    UnknownIdentifier(String),

    /// An expression used an operator outside the supported set.
    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    /// The expression text could not be parsed.
    #[error("Syntax error at {position}: {message}")]
    Syntax { position: usize, message: String },

    /// Evaluation failed for a row (type errors and the like).
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// A referenced state has no column in the table.
    #[error("Referenced state not found: {0}")]
    MissingState(StateId),

    /// The table lacks a column kind the state needs.
    #[error("Table has no {0:?} column")]
    MissingColumn(ColumnKind),

    /// State parameters are unusable (zero radius, empty sequence, ...).
    #[error("Invalid state parameters: {0}")]
    InvalidParameters(String),
}

/// Errors that can occur in the Trailstate engine.
///
/// - No silent failures
/// - Use `Result<T, TrailError>` for fallible operations
/// - The engine never panics; every error carries a user-facing message
#[derive(Debug, Error)]
pub enum TrailError {
    /// Raw rows could not be turned into a table.
    #[error("Import failed: {0}")]
    Import(String),

    /// A state's values could not be computed.
    #[error(transparent)]
    Computation(#[from] ComputationError),

    /// The state is still referenced by other states.
    #[error("State {state} is referenced by {} other state(s)", dependents.len())]
    Dependency {
        state: StateId,
        dependents: Vec<StateId>,
    },

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infer_applies_dynamic_typing() {
        assert_eq!(CellValue::infer("42"), CellValue::Int(42));
        assert_eq!(CellValue::infer("-3.5"), CellValue::Float(-3.5));
        assert_eq!(CellValue::infer("true"), CellValue::Bool(true));
        assert_eq!(CellValue::infer("  "), CellValue::Null);
        assert_eq!(
            CellValue::infer("11/11/2021 03:22:21 PM"),
            CellValue::Text("11/11/2021 03:22:21 PM".to_string())
        );
    }

    #[test]
    fn truthiness_accepts_bool_and_text() {
        assert!(CellValue::Bool(true).is_true());
        assert!(CellValue::from("true").is_true());
        assert!(!CellValue::from("True").is_true());
        assert!(!CellValue::Int(1).is_true());
    }

    #[test]
    fn state_ids_are_unique() {
        let a = StateId::generate();
        let b = StateId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("state-"));
    }

    #[test]
    fn index_range_serializes_as_pair() {
        let json = serde_json::to_string(&IndexRange::new(4, 9)).expect("serialize");
        assert_eq!(json, "[4,9]");
        let back: IndexRange = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, IndexRange::new(4, 9));
    }

    #[test]
    fn ranges_contain_uses_sorted_search() {
        let ranges = [IndexRange::new(1, 2), IndexRange::new(4, 5)];
        assert!(ranges_contain(&ranges, 1));
        assert!(!ranges_contain(&ranges, 3));
        assert!(ranges_contain(&ranges, 5));
        assert!(!ranges_contain(&ranges, 6));
        assert!(!ranges_contain(&[], 0));
    }

    #[test]
    fn display_rank_orders_state_columns_last() {
        assert!(ColumnKind::Index.display_rank() < ColumnKind::X.display_rank());
        assert!(ColumnKind::TimeClean.display_rank() < ColumnKind::Time.display_rank());
        assert!(ColumnKind::Unclassified.display_rank() < ColumnKind::State.display_rank());
        assert!(ColumnKind::State.display_rank() < ColumnKind::StateTemp.display_rank());
    }

    #[test]
    fn evaluator_errors_name_the_token() {
        let err = ComputationError::UnknownIdentifier("Foo".to_string());
        assert!(err.to_string().contains("Foo"));
        let err = ComputationError::UnsupportedOperator("<<".to_string());
        assert!(err.to_string().contains("<<"));
    }
}
