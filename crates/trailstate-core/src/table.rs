//! # Table
//!
//! The tabular data store: rows ordered by the Index column, typed columns,
//! and the derived boolean columns that user-defined states materialize into.
//!
//! ## Snapshot semantics
//!
//! A `Table` is never mutated after construction. Every column change
//! (`with_derived_column`, `with_committed_temp_column`, `without_temp_column`,
//! `with_removed_columns`) returns a new table. Column storage is shared
//! through `Arc`, so a new version only allocates the column it changes.
//!
//! ## Range cache
//!
//! `true_ranges` memoizes per column. The cache cell travels with the column
//! it belongs to: unrelated derivations keep it, replacing or deleting the
//! column drops it.

use crate::config::EngineConfig;
use crate::primitives::{CLEAN_TIME_SUFFIX, DEFAULT_INDEX_NAME, FALSE_TEXT, TRUE_TEXT};
use crate::runs::{Run, summarize_by_key, true_ranges_of};
use crate::states::State;
use crate::types::{
    CellValue, Column, ColumnKind, ComputationError, IndexRange, RawTable, StateId, TrailError,
};
use chrono::{NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// Column classification supplied by the import collaborator:
/// display name -> kind. Columns without a hint are Unclassified.
pub type ColumnKindHints = BTreeMap<String, ColumnKind>;

type RangeCache = Arc<OnceLock<Vec<IndexRange>>>;

static NULL_CELL: CellValue = CellValue::Null;

// =============================================================================
// COLUMN GUESSING
// =============================================================================

/// Header names recognized per kind, compared case-insensitively.
const KIND_GUESSES: &[(ColumnKind, &[&str])] = &[
    (ColumnKind::Index, &["index", "order"]),
    (ColumnKind::X, &["longitude"]),
    (ColumnKind::Y, &["latitude"]),
    (ColumnKind::Time, &["time", "timestamp", "date created"]),
    (ColumnKind::Distance, &["distance from last"]),
];

/// Guess kinds for well-known headers.
///
/// For every guessable kind the first matching header wins. Headers that
/// match nothing are left out, so the result is a partial hint map.
pub fn guess_column_kinds<S: AsRef<str>>(headers: &[S]) -> ColumnKindHints {
    let mut hints = ColumnKindHints::new();
    for (kind, names) in KIND_GUESSES {
        let found = headers
            .iter()
            .map(AsRef::as_ref)
            .find(|h| names.contains(&h.trim().to_lowercase().as_str()));
        if let Some(header) = found {
            hints.entry(header.to_string()).or_insert(*kind);
        }
    }
    hints
}

// =============================================================================
// TABLE
// =============================================================================

/// The full dataset as an immutable snapshot.
#[derive(Debug, Clone, Default)]
pub struct Table {
    /// Column metadata in canonical display order.
    columns: Vec<Column>,
    /// Column key -> one cell per row, in row order.
    cells: BTreeMap<String, Arc<Vec<CellValue>>>,
    /// Index value of every row, strictly ascending.
    index: Arc<Vec<i64>>,
    /// Column key -> memoized true ranges.
    range_cache: BTreeMap<String, RangeCache>,
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns && self.index == other.index && self.cells == other.cells
    }
}

impl Table {
    /// Build a table from raw import rows.
    ///
    /// # Errors
    /// `TrailError::Import` when the input is empty, ragged or over the row
    /// limit, when a hint names a derived kind (TimeClean, StateTemp), when
    /// two columns claim the same unique kind, or when Index values are not
    /// unique integers. No partial table is produced.
    pub fn load(
        raw: &RawTable,
        hints: &ColumnKindHints,
        config: &EngineConfig,
    ) -> Result<Self, TrailError> {
        validate_raw(raw, config)?;

        let kinds: Vec<ColumnKind> = raw
            .headers
            .iter()
            .map(|h| hints.get(h).copied().unwrap_or(ColumnKind::Unclassified))
            .collect();
        if let Some((header, kind)) = raw
            .headers
            .iter()
            .zip(&kinds)
            .find(|(_, kind)| kind.is_derived())
        {
            return Err(TrailError::Import(format!(
                "Column '{}' cannot be imported as {:?}",
                header, kind
            )));
        }
        validate_kinds(&raw.headers, &kinds).map_err(TrailError::Import)?;

        let mut columns = Vec::with_capacity(raw.headers.len() + 2);
        let mut cells: BTreeMap<String, Vec<CellValue>> = BTreeMap::new();
        for (pos, (header, kind)) in raw.headers.iter().zip(&kinds).enumerate() {
            let values = raw
                .records
                .iter()
                .map(|record| {
                    let cell = record.get(pos).cloned().unwrap_or_default();
                    if kind.is_state() {
                        CellValue::Bool(cell.is_true())
                    } else {
                        cell
                    }
                })
                .collect();
            columns.push(Column::new(header.clone(), header.clone(), *kind));
            cells.insert(header.clone(), values);
        }

        let index_key = columns
            .iter()
            .find(|c| c.kind == ColumnKind::Index)
            .map(|c| c.key.clone());
        let index = match index_key {
            Some(key) => {
                let values = cells.get(&key).map(Vec::as_slice).unwrap_or_default();
                let index = parse_index(&key, values).map_err(TrailError::Import)?;
                cells.insert(key, index.iter().map(|&i| CellValue::Int(i)).collect());
                index
            }
            None => {
                if cells.contains_key(DEFAULT_INDEX_NAME) {
                    return Err(TrailError::Import(format!(
                        "Column '{}' must be classified as the index",
                        DEFAULT_INDEX_NAME
                    )));
                }
                let index: Vec<i64> = (1..=raw.records.len() as i64).collect();
                columns.push(Column::new(
                    DEFAULT_INDEX_NAME,
                    DEFAULT_INDEX_NAME,
                    ColumnKind::Index,
                ));
                cells.insert(
                    DEFAULT_INDEX_NAME.to_string(),
                    index.iter().map(|&i| CellValue::Int(i)).collect(),
                );
                index
            }
        };

        let mut seen = BTreeSet::new();
        if let Some(dup) = index.iter().find(|&&i| !seen.insert(i)) {
            return Err(TrailError::Import(format!("Duplicate index value {}", dup)));
        }

        if let Some(time) = columns.iter().find(|c| c.kind == ColumnKind::Time).cloned() {
            let clean_key = format!("{}{}", time.key, CLEAN_TIME_SUFFIX);
            if cells.contains_key(&clean_key) {
                return Err(TrailError::Import(format!(
                    "Column '{}' collides with the cleaned time column",
                    clean_key
                )));
            }
            let cleaned: Vec<CellValue> = cells
                .get(&time.key)
                .map(Vec::as_slice)
                .unwrap_or_default()
                .iter()
                .map(|cell| clean_time(cell, &config.time_formats))
                .collect();
            let unparsed = cleaned.iter().filter(|c| c.is_null()).count();
            if unparsed > 0 {
                debug!(column = %time.key, unparsed, "time cells left uncleaned");
            }
            columns.push(Column::new(
                clean_key.clone(),
                clean_key.clone(),
                ColumnKind::TimeClean,
            ));
            cells.insert(clean_key, cleaned);
        }

        // Rows are ordered by Index once, here; they never move afterwards.
        let mut order: Vec<usize> = (0..index.len()).collect();
        order.sort_by_key(|&pos| index[pos]);
        let index: Vec<i64> = order.iter().map(|&pos| index[pos]).collect();
        let cells: BTreeMap<String, Arc<Vec<CellValue>>> = cells
            .into_iter()
            .map(|(key, values)| {
                let sorted = order.iter().map(|&pos| values[pos].clone()).collect();
                (key, Arc::new(sorted))
            })
            .collect();

        columns.sort_by_key(|c| c.kind.display_rank());

        let table = Self::assemble(columns, cells, index);
        info!(
            rows = table.len(),
            columns = table.columns.len(),
            "table loaded"
        );
        Ok(table)
    }

    fn assemble(
        columns: Vec<Column>,
        cells: BTreeMap<String, Arc<Vec<CellValue>>>,
        index: Vec<i64>,
    ) -> Self {
        let range_cache = columns
            .iter()
            .map(|c| (c.key.clone(), RangeCache::default()))
            .collect();
        Self {
            columns,
            cells,
            index: Arc::new(index),
            range_cache,
        }
    }

    // =========================================================================
    // DERIVED COLUMNS
    // =========================================================================

    /// Compute `state`'s values and install them as the StateTemp column,
    /// replacing any previous one.
    ///
    /// # Errors
    /// Propagates the state's `ComputationError`; `self` is unaffected.
    pub fn with_derived_column(&self, state: &State) -> Result<Self, TrailError> {
        let key = state.id.as_str();
        if let Some(existing) = self.column(key) {
            if existing.kind != ColumnKind::StateTemp {
                return Err(ComputationError::InvalidParameters(format!(
                    "column '{}' already exists",
                    key
                ))
                .into());
            }
        }

        let values = state.compute_column_values(self)?;
        let true_rows = values.iter().filter(|&&v| v).count();

        let mut next = self.without_temp_column();
        next.columns
            .push(Column::new(key, state.name.clone(), ColumnKind::StateTemp));
        next.cells.insert(
            key.to_string(),
            Arc::new(values.into_iter().map(CellValue::Bool).collect()),
        );
        next.range_cache.insert(key.to_string(), RangeCache::default());

        debug!(state = %state.id, rows = next.len(), true_rows, "derived temp column");
        Ok(next)
    }

    /// Promote the StateTemp column to a committed State column and build its
    /// range cache. Without a temp column this is a plain copy.
    #[must_use]
    pub fn with_committed_temp_column(&self) -> Self {
        let mut next = self.clone();
        let Some(pos) = self
            .columns
            .iter()
            .position(|c| c.kind == ColumnKind::StateTemp)
        else {
            return next;
        };
        next.columns[pos].kind = ColumnKind::State;
        let key = next.columns[pos].key.clone();

        let cache = RangeCache::default();
        cache.get_or_init(|| next.compute_true_ranges(&key));
        next.range_cache.insert(key.clone(), cache);

        info!(column = %key, "temp column committed");
        next
    }

    /// Drop the StateTemp column, if any.
    #[must_use]
    pub fn without_temp_column(&self) -> Self {
        let mut next = self.clone();
        if let Some(key) = self.temp_column().map(|c| c.key.clone()) {
            next.drop_column(&key);
        }
        next
    }

    /// Remove the derived columns of the listed states, with their caches.
    /// Ids without a state column are ignored.
    #[must_use]
    pub fn with_removed_columns(&self, state_ids: &[StateId]) -> Self {
        let mut next = self.clone();
        for id in state_ids {
            let is_state = self.column(id.as_str()).is_some_and(|c| c.kind.is_state());
            if is_state {
                next.drop_column(id.as_str());
            }
        }
        debug!(removed = state_ids.len(), "state columns removed");
        next
    }

    /// Change the display name of state column `id`.
    #[must_use]
    pub fn with_renamed_column(&self, id: &StateId, display_name: &str) -> Self {
        let mut next = self.clone();
        for column in &mut next.columns {
            if column.key == id.as_str() && column.kind.is_state() {
                column.display_name = display_name.to_string();
            }
        }
        next
    }

    fn drop_column(&mut self, key: &str) {
        self.columns.retain(|c| c.key != key);
        self.cells.remove(key);
        self.range_cache.remove(key);
    }

    // =========================================================================
    // RANGES AND RUNS
    // =========================================================================

    /// Contiguous Index ranges over which column `key` is true, memoized.
    ///
    /// Unknown columns yield an empty slice.
    pub fn true_ranges(&self, key: &str) -> &[IndexRange] {
        match self.range_cache.get(key) {
            Some(cache) => cache.get_or_init(|| self.compute_true_ranges(key)).as_slice(),
            None => &[],
        }
    }

    fn compute_true_ranges(&self, key: &str) -> Vec<IndexRange> {
        let Some(values) = self.cells.get(key) else {
            return Vec::new();
        };
        true_ranges_of(
            self.index
                .iter()
                .zip(values.iter())
                .map(|(&i, cell)| (i, cell.is_true())),
        )
    }

    /// Summarize the rows by `key_fn`, in row order.
    pub fn summarize_by<K: PartialEq>(
        &self,
        mut key_fn: impl FnMut(RowView<'_>) -> K,
    ) -> Vec<Run<K>> {
        summarize_by_key(self.rows().map(|row| (row.index(), key_fn(row))))
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Columns in display order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column metadata by key.
    #[must_use]
    pub fn column(&self, key: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.key == key)
    }

    /// The column currently being composed, if any.
    #[must_use]
    pub fn temp_column(&self) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.kind == ColumnKind::StateTemp)
    }

    /// All columns of the given kind, in display order.
    pub fn columns_of_kind(&self, kind: ColumnKind) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(move |c| c.kind == kind)
    }

    /// First column of the given kind.
    #[must_use]
    pub fn column_of_kind(&self, kind: ColumnKind) -> Option<&Column> {
        self.columns_of_kind(kind).next()
    }

    #[must_use]
    pub fn column_by_display_name(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.display_name == name)
    }

    /// Display names of every column, the identifiers conditions may use.
    #[must_use]
    pub fn display_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.display_name.as_str()).collect()
    }

    /// Index values, one per row, ascending.
    #[must_use]
    pub fn index_values(&self) -> &[i64] {
        &self.index
    }

    /// Cells of column `key`, in row order.
    #[must_use]
    pub fn column_values(&self, key: &str) -> Option<&[CellValue]> {
        self.cells.get(key).map(|v| v.as_slice())
    }

    /// Row position holding Index value `index`.
    #[must_use]
    pub fn position_of_index(&self, index: i64) -> Option<usize> {
        self.index.binary_search(&index).ok()
    }

    /// Borrowed view of the row at `position`.
    #[must_use]
    pub fn row(&self, position: usize) -> Option<RowView<'_>> {
        (position < self.len()).then_some(RowView {
            table: self,
            position,
        })
    }

    /// All rows, in Index order.
    pub fn rows(&self) -> impl Iterator<Item = RowView<'_>> {
        (0..self.len()).map(move |position| RowView {
            table: self,
            position,
        })
    }

    /// Whether the state-like column `key` is true on every row, as a vector.
    ///
    /// # Errors
    /// `ComputationError::MissingState` when the column does not exist.
    pub fn boolean_column(&self, key: &StateId) -> Result<Vec<bool>, ComputationError> {
        self.cells
            .get(key.as_str())
            .map(|values| values.iter().map(CellValue::is_true).collect())
            .ok_or_else(|| ComputationError::MissingState(key.clone()))
    }

    // =========================================================================
    // PERSISTENCE
    // =========================================================================

    /// Plain `{columns, rows}` form for the serialization collaborator.
    ///
    /// TimeClean cells are written with `config.clean_time_format`; state
    /// cells as `"true"`/`"false"`.
    #[must_use]
    pub fn as_persistable(&self, config: &EngineConfig) -> PersistableTable {
        let rows = self
            .rows()
            .map(|row| {
                self.columns
                    .iter()
                    .map(|column| {
                        let cell = row.get(&column.key);
                        let value = if column.kind.is_state() {
                            let text = if cell.is_true() { TRUE_TEXT } else { FALSE_TEXT };
                            serde_json::Value::String(text.to_string())
                        } else {
                            cell_to_json(cell, &config.clean_time_format)
                        };
                        (column.key.clone(), value)
                    })
                    .collect()
            })
            .collect();
        PersistableTable {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Rebuild a table from its persistable form.
    ///
    /// # Errors
    /// `TrailError::Deserialization` when the column set violates the table
    /// invariants or a cell cannot be decoded.
    pub fn from_persistable(
        persisted: &PersistableTable,
        config: &EngineConfig,
    ) -> Result<Self, TrailError> {
        let mut columns = persisted.columns.clone();
        let headers: Vec<String> = columns.iter().map(|c| c.key.clone()).collect();
        let kinds: Vec<ColumnKind> = columns.iter().map(|c| c.kind).collect();
        validate_kinds(&headers, &kinds).map_err(TrailError::Deserialization)?;
        let Some(index_key) = columns
            .iter()
            .find(|c| c.kind == ColumnKind::Index)
            .map(|c| c.key.clone())
        else {
            return Err(TrailError::Deserialization(
                "table has no index column".to_string(),
            ));
        };

        let mut cells = BTreeMap::new();
        for column in &columns {
            let values = persisted
                .rows
                .iter()
                .enumerate()
                .map(|(pos, row)| {
                    let json = row.get(&column.key).unwrap_or(&serde_json::Value::Null);
                    cell_from_json(json, column.kind, &config.clean_time_format).ok_or_else(
                        || {
                            TrailError::Deserialization(format!(
                                "row {}: bad value for column '{}'",
                                pos, column.key
                            ))
                        },
                    )
                })
                .collect::<Result<Vec<_>, _>>()?;
            cells.insert(column.key.clone(), values);
        }

        let index_cells = cells.get(&index_key).map(Vec::as_slice).unwrap_or_default();
        let index = parse_index(&index_key, index_cells).map_err(TrailError::Deserialization)?;
        if index.windows(2).any(|w| w[0] >= w[1]) {
            return Err(TrailError::Deserialization(
                "index values must be unique and ascending".to_string(),
            ));
        }

        columns.sort_by_key(|c| c.kind.display_rank());
        let cells = cells
            .into_iter()
            .map(|(key, values)| (key, Arc::new(values)))
            .collect();
        Ok(Self::assemble(columns, cells, index))
    }
}

// =============================================================================
// ROW VIEW
// =============================================================================

/// A borrowed row of a [`Table`].
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    table: &'a Table,
    position: usize,
}

impl<'a> RowView<'a> {
    /// Position of the row in Index order.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// The row's Index value.
    #[must_use]
    pub fn index(&self) -> i64 {
        self.table.index[self.position]
    }

    /// Cell of column `key`; Null for unknown columns.
    #[must_use]
    pub fn get(&self, key: &str) -> &'a CellValue {
        self.table
            .cells
            .get(key)
            .and_then(|values| values.get(self.position))
            .unwrap_or(&NULL_CELL)
    }

    /// Cell of the first column of `kind`.
    #[must_use]
    pub fn get_kind(&self, kind: ColumnKind) -> Option<&'a CellValue> {
        self.table
            .column_of_kind(kind)
            .map(|column| self.get(&column.key))
    }

    /// Cell of the column displayed as `name`.
    #[must_use]
    pub fn get_by_display_name(&self, name: &str) -> Option<&'a CellValue> {
        self.table
            .column_by_display_name(name)
            .map(|column| self.get(&column.key))
    }

    /// Whether the state column `key` is true on this row.
    #[must_use]
    pub fn is_true(&self, key: &str) -> bool {
        self.get(key).is_true()
    }
}

// =============================================================================
// PERSISTABLE FORM
// =============================================================================

/// `{columns, rows}`: rows are JSON objects keyed by column key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistableTable {
    pub columns: Vec<Column>,
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
}

fn cell_to_json(cell: &CellValue, time_format: &str) -> serde_json::Value {
    match cell {
        CellValue::Null => serde_json::Value::Null,
        CellValue::Bool(b) => serde_json::Value::Bool(*b),
        CellValue::Int(i) => serde_json::Value::from(*i),
        CellValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        CellValue::Text(s) => serde_json::Value::String(s.clone()),
        CellValue::Time(t) => serde_json::Value::String(t.format(time_format).to_string()),
    }
}

fn cell_from_json(
    json: &serde_json::Value,
    kind: ColumnKind,
    time_format: &str,
) -> Option<CellValue> {
    use serde_json::Value;
    if kind.is_state() {
        return match json {
            Value::Bool(b) => Some(CellValue::Bool(*b)),
            Value::String(s) if s == TRUE_TEXT => Some(CellValue::Bool(true)),
            Value::String(s) if s == FALSE_TEXT => Some(CellValue::Bool(false)),
            Value::Null => Some(CellValue::Bool(false)),
            _ => None,
        };
    }
    if kind == ColumnKind::TimeClean {
        return match json {
            Value::Null => Some(CellValue::Null),
            Value::String(s) => NaiveDateTime::parse_from_str(s, time_format)
                .ok()
                .map(CellValue::Time),
            _ => None,
        };
    }
    Some(match json {
        Value::Null => CellValue::Null,
        Value::Bool(b) => CellValue::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => CellValue::Int(i),
            None => CellValue::Float(n.as_f64()?),
        },
        Value::String(s) => CellValue::Text(s.clone()),
        other => CellValue::Text(other.to_string()),
    })
}

// =============================================================================
// IMPORT HELPERS
// =============================================================================

fn validate_raw(raw: &RawTable, config: &EngineConfig) -> Result<(), TrailError> {
    if raw.headers.is_empty() {
        return Err(TrailError::Import("No columns found".to_string()));
    }
    if raw.records.is_empty() {
        return Err(TrailError::Import("No rows found".to_string()));
    }
    if raw.records.len() > config.max_rows {
        return Err(TrailError::Import(format!(
            "{} rows exceed the limit of {}",
            raw.records.len(),
            config.max_rows
        )));
    }
    let mut names = BTreeSet::new();
    if let Some(dup) = raw.headers.iter().find(|h| !names.insert(h.as_str())) {
        return Err(TrailError::Import(format!("Duplicate column '{}'", dup)));
    }
    if let Some((pos, record)) = raw
        .records
        .iter()
        .enumerate()
        .find(|(_, r)| r.len() != raw.headers.len())
    {
        return Err(TrailError::Import(format!(
            "Row {} has {} cells, expected {}",
            pos + 1,
            record.len(),
            raw.headers.len()
        )));
    }
    Ok(())
}

/// At most one column per unique kind. The caller picks the error variant.
fn validate_kinds(headers: &[String], kinds: &[ColumnKind]) -> Result<(), String> {
    let mut claimed: BTreeMap<ColumnKind, &str> = BTreeMap::new();
    for (header, kind) in headers.iter().zip(kinds) {
        if !kind.is_unique() {
            continue;
        }
        if let Some(first) = claimed.insert(*kind, header) {
            return Err(format!(
                "Columns must be unique: '{}' and '{}' are both {:?}",
                first, header, kind
            ));
        }
    }
    Ok(())
}

fn parse_index(key: &str, values: &[CellValue]) -> Result<Vec<i64>, String> {
    values
        .iter()
        .enumerate()
        .map(|(pos, cell)| {
            cell.as_i64().ok_or_else(|| {
                format!(
                    "Index column '{}' has a non-integer value at row {}",
                    key,
                    pos + 1
                )
            })
        })
        .collect()
}

/// Parse a Time cell with the first matching format; Null when none match.
///
/// Cleaned times are kept to the millisecond, the precision of the
/// persisted TimeClean text.
fn clean_time(cell: &CellValue, formats: &[String]) -> CellValue {
    let parsed = match cell {
        CellValue::Time(t) => Some(*t),
        CellValue::Text(s) => formats
            .iter()
            .find_map(|f| NaiveDateTime::parse_from_str(s.trim(), f).ok()),
        _ => None,
    };
    parsed
        .map(|t| CellValue::Time(t.trunc_subsecs(3)))
        .unwrap_or(CellValue::Null)
}

// =============================================================================
// TESTS
// =============================================================================
