//! # Summaries
//!
//! Per-state breakdowns and aggregates shown next to the map, and the
//! generic `{columns, rows}` tables handed to the export collaborator.
//!
//! Times come from the TimeClean column. Distances come from the Distance
//! column when the table has one, otherwise from the haversine distance
//! between consecutive X/Y points read as longitude/latitude.

use crate::config::EngineConfig;
use crate::primitives::EARTH_RADIUS_M;
use crate::runs::Run;
use crate::sequence::match_sequence;
use crate::states::sequence::state_set_runs;
use crate::states::{SequenceState, State};
use crate::table::Table;
use crate::types::{ColumnKind, ComputationError, IndexRange, StateId, TrailError};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// `STATES` label of a run where none of the chosen states is true.
pub const NO_STATES_LABEL: &str = "[None]";

/// `SEQUENCE` label of a row outside every occurrence of the target.
pub const UNMATCHED_SEQUENCE_LABEL: &str = "--";

// =============================================================================
// EXPORT TABLE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportColumn {
    pub header: String,
    pub accessor: String,
}

impl ExportColumn {
    #[must_use]
    pub fn new(header: impl Into<String>, accessor: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            accessor: accessor.into(),
        }
    }
}

/// Generic tabular shape: rows are objects keyed by column accessor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExportTable {
    pub columns: Vec<ExportColumn>,
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
}

impl ExportTable {
    /// Build from serializable records; each record must serialize to an
    /// object whose keys are the accessors.
    pub fn from_records<T: Serialize>(
        columns: Vec<ExportColumn>,
        records: &[T],
    ) -> Result<Self, TrailError> {
        let rows = records
            .iter()
            .map(|record| match serde_json::to_value(record) {
                Ok(serde_json::Value::Object(map)) => Ok(map),
                Ok(other) => Err(TrailError::Serialization(format!(
                    "export record is not an object: {}",
                    other
                ))),
                Err(e) => Err(TrailError::Serialization(e.to_string())),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { columns, rows })
    }

    /// Pretty JSON array of rows keyed by header.
    pub fn to_json(&self) -> Result<String, TrailError> {
        let rows: Vec<serde_json::Map<String, serde_json::Value>> = self
            .rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| {
                        let value = row.get(&c.accessor).cloned().unwrap_or_default();
                        (c.header.clone(), value)
                    })
                    .collect()
            })
            .collect();
        serde_json::to_string_pretty(&rows).map_err(|e| TrailError::Serialization(e.to_string()))
    }

    /// CSV text: a header line, then one line per row. Null cells are empty.
    pub fn to_csv(&self) -> Result<String, TrailError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(self.columns.iter().map(|c| c.header.as_str()))
            .map_err(|e| TrailError::Serialization(e.to_string()))?;
        for row in &self.rows {
            let record = self
                .columns
                .iter()
                .map(|c| csv_field(row.get(&c.accessor)));
            writer
                .write_record(record)
                .map_err(|e| TrailError::Serialization(e.to_string()))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| TrailError::Serialization(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| TrailError::Serialization(e.to_string()))
    }
}

fn csv_field(value: Option<&serde_json::Value>) -> String {
    match value {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

// =============================================================================
// CYCLES
// =============================================================================

/// One cycle of a state: a true part followed by a false part.
///
/// A cycle starts at every false -> true transition. The first cycle may
/// have no true part (the state starts false); the last may have no false
/// part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cycle {
    pub true_range: Option<IndexRange>,
    pub false_range: Option<IndexRange>,
}

impl Cycle {
    #[must_use]
    pub fn start_index(&self) -> Option<i64> {
        self.true_range.or(self.false_range).map(|r| r.start)
    }

    #[must_use]
    pub fn end_index(&self) -> Option<i64> {
        self.false_range.or(self.true_range).map(|r| r.end)
    }
}

/// Cycles of state column `id`. Empty tables have no cycles.
pub fn cycle_breakdown(table: &Table, id: &StateId) -> Result<Vec<Cycle>, ComputationError> {
    let values = table.boolean_column(id)?;
    let mut cycles: Vec<Cycle> = Vec::new();
    for run in crate::runs::summarize_by_key(table.index_values().iter().copied().zip(values)) {
        if run.value {
            cycles.push(Cycle {
                true_range: Some(run.range),
                false_range: None,
            });
        } else if let Some(cycle) = cycles.last_mut().filter(|c| c.false_range.is_none()) {
            cycle.false_range = Some(run.range);
        } else {
            cycles.push(Cycle {
                true_range: None,
                false_range: Some(run.range),
            });
        }
    }
    Ok(cycles)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct CycleRecord {
    cycle: usize,
    start_time: Option<NaiveDateTime>,
    end_time: Option<NaiveDateTime>,
    duration: Option<String>,
}

/// The cycle table: number, start and end time, and formatted duration.
pub fn cycle_table(table: &Table, id: &StateId) -> Result<ExportTable, TrailError> {
    let records: Vec<CycleRecord> = cycle_breakdown(table, id)?
        .iter()
        .enumerate()
        .map(|(i, cycle)| {
            let start_time = cycle.start_index().and_then(|idx| time_at(table, idx));
            let end_time = cycle.end_index().and_then(|idx| time_at(table, idx));
            let duration = start_time
                .zip(end_time)
                .map(|(s, e)| format_duration((e - s).num_milliseconds()));
            CycleRecord {
                cycle: i + 1,
                start_time,
                end_time,
                duration,
            }
        })
        .collect();
    ExportTable::from_records(
        vec![
            ExportColumn::new("Cycle", "CYCLE"),
            ExportColumn::new("Start Time", "START_TIME"),
            ExportColumn::new("End Time", "END_TIME"),
            ExportColumn::new("Duration", "DURATION"),
        ],
        &records,
    )
}

// =============================================================================
// BREAKDOWN BY VALUE
// =============================================================================

/// Time and distance over one range of rows.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct RangeStats {
    pub start_index: i64,
    pub end_index: i64,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    /// Seconds from the first to the last row, when both have a time.
    pub duration: Option<f64>,
    pub distance: Option<f64>,
}

/// Stats of one run of a state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ValueRun {
    pub state_value: bool,
    #[serde(flatten)]
    pub stats: RangeStats,
}

/// Time and distance stats of the rows in `range`.
#[must_use]
pub fn range_stats(table: &Table, range: IndexRange) -> RangeStats {
    let start_time = time_at(table, range.start);
    let end_time = time_at(table, range.end);
    RangeStats {
        start_index: range.start,
        end_index: range.end,
        start_time,
        end_time,
        duration: start_time
            .zip(end_time)
            .map(|(s, e)| (e - s).num_milliseconds() as f64 / 1000.0),
        distance: distance_over(table, range),
    }
}

/// One entry per run of state `id`, true and false alike.
pub fn breakdown_by_value(table: &Table, id: &StateId) -> Result<Vec<ValueRun>, ComputationError> {
    let values = table.boolean_column(id)?;
    let runs: Vec<Run<bool>> =
        crate::runs::summarize_by_key(table.index_values().iter().copied().zip(values));
    debug!(state = %id, runs = runs.len(), "breakdown computed");
    Ok(runs
        .iter()
        .map(|run| ValueRun {
            state_value: run.value,
            stats: range_stats(table, run.range),
        })
        .collect())
}

/// Export form of [`breakdown_by_value`], optionally true runs only.
pub fn breakdown_table(
    table: &Table,
    id: &StateId,
    true_only: bool,
) -> Result<ExportTable, TrailError> {
    let runs: Vec<ValueRun> = breakdown_by_value(table, id)?
        .into_iter()
        .filter(|r| r.state_value || !true_only)
        .collect();
    let mut columns = vec![ExportColumn::new("In State", "STATE_VALUE")];
    columns.extend(stats_columns());
    ExportTable::from_records(columns, &runs)
}

fn stats_columns() -> Vec<ExportColumn> {
    vec![
        ExportColumn::new("Start Index", "START_INDEX"),
        ExportColumn::new("End Index", "END_INDEX"),
        ExportColumn::new("Start Time", "START_TIME"),
        ExportColumn::new("End Time", "END_TIME"),
        ExportColumn::new("Duration (s)", "DURATION"),
        ExportColumn::new("Distance (m)", "DISTANCE"),
    ]
}

// =============================================================================
// AGGREGATES
// =============================================================================

/// Totals over a breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AggregateSummary {
    /// Number of true runs.
    pub visits: usize,
    /// Seconds spent in the state.
    pub total_duration: f64,
    /// `total_duration / visits`, `None` without visits.
    pub avg_duration: Option<f64>,
    /// Seconds spent outside the state.
    pub total_outside_duration: f64,
    /// Metres travelled while in the state.
    pub total_distance: f64,
}

#[must_use]
pub fn aggregate_summary(breakdown: &[ValueRun]) -> AggregateSummary {
    let (inside, outside): (Vec<&ValueRun>, Vec<&ValueRun>) =
        breakdown.iter().partition(|r| r.state_value);
    let total = |runs: &[&ValueRun]| runs.iter().filter_map(|r| r.stats.duration).sum::<f64>();

    let visits = inside.len();
    let total_duration = total(inside.as_slice());
    AggregateSummary {
        visits,
        total_duration,
        avg_duration: (visits > 0).then(|| total_duration / visits as f64),
        total_outside_duration: total(outside.as_slice()),
        total_distance: inside.iter().filter_map(|r| r.stats.distance).sum(),
    }
}

/// Export form of [`aggregate_summary`]: a single row.
pub fn aggregate_table(summary: &AggregateSummary) -> Result<ExportTable, TrailError> {
    ExportTable::from_records(
        vec![
            ExportColumn::new("Visits", "VISITS"),
            ExportColumn::new("Time in State", "TOTAL_DURATION"),
            ExportColumn::new("Average time in State", "AVG_DURATION"),
            ExportColumn::new("Time Outside State", "TOTAL_OUTSIDE_DURATION"),
            ExportColumn::new("Total Distance", "TOTAL_DISTANCE"),
        ],
        std::slice::from_ref(summary),
    )
}

// =============================================================================
// GROUP BY STATES
// =============================================================================

/// A run of the timeline keyed by which chosen states are true together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct StateSetRow {
    #[serde(skip)]
    pub ids: BTreeSet<StateId>,
    /// Names of the true states, or [`NO_STATES_LABEL`].
    pub states: String,
    #[serde(flatten)]
    pub stats: RangeStats,
}

/// The sequence-editor table over `states`.
pub fn group_by_states(
    table: &Table,
    states: &[State],
) -> Result<Vec<StateSetRow>, ComputationError> {
    let ids: Vec<StateId> = states.iter().map(|s| s.id.clone()).collect();
    let runs = state_set_runs(table, &ids)?;
    Ok(runs
        .into_iter()
        .map(|run| {
            let names: Vec<&str> = states
                .iter()
                .filter(|s| run.value.contains(&s.id))
                .map(|s| s.name.as_str())
                .collect();
            let label = if names.is_empty() {
                NO_STATES_LABEL.to_string()
            } else {
                names.join(", ")
            };
            StateSetRow {
                ids: run.value,
                states: label,
                stats: range_stats(table, run.range),
            }
        })
        .collect())
}

/// Export form of [`group_by_states`].
pub fn group_by_states_table(table: &Table, states: &[State]) -> Result<ExportTable, TrailError> {
    let rows = group_by_states(table, states)?;
    let mut columns = vec![ExportColumn::new("State(s)", "STATES")];
    columns.extend(stats_columns());
    ExportTable::from_records(columns, &rows)
}

// =============================================================================
// SEQUENCES
// =============================================================================

/// A [`StateSetRow`] labelled with the occurrence of a target sequence it
/// belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SequenceRow {
    /// Occurrence number, or [`UNMATCHED_SEQUENCE_LABEL`].
    pub sequence: String,
    /// Length of the block of rows sharing this label. Only the first row
    /// of a block carries it.
    pub span: Option<usize>,
    #[serde(flatten)]
    pub row: StateSetRow,
}

/// Target sequence made of the grouped rows `first..=last`.
///
/// `rows` must come from [`group_by_states`] over the same `states`.
///
/// # Errors
/// `ComputationError::InvalidParameters` when the selection is empty or
/// runs past the last row.
pub fn sequence_from_rows(
    states: &[State],
    rows: &[StateSetRow],
    first: usize,
    last: usize,
) -> Result<SequenceState, ComputationError> {
    if first > last || last >= rows.len() {
        return Err(ComputationError::InvalidParameters(format!(
            "row selection {}..={} is outside the {} grouped rows",
            first,
            last,
            rows.len()
        )));
    }
    Ok(SequenceState::new(
        states.iter().map(|s| s.id.clone()).collect(),
        rows[first..=last].iter().map(|r| r.ids.clone()).collect(),
    ))
}

/// [`group_by_states`] rows labelled with the occurrences of `target`.
pub fn label_sequence(
    table: &Table,
    states: &[State],
    target: &[BTreeSet<StateId>],
) -> Result<Vec<SequenceRow>, ComputationError> {
    let rows = group_by_states(table, states)?;
    let observed: Vec<&BTreeSet<StateId>> = rows.iter().map(|r| &r.ids).collect();
    let target: Vec<&BTreeSet<StateId>> = target.iter().collect();
    let info = match_sequence(&observed, &target);
    debug!(
        rows = rows.len(),
        occurrences = info.iter().filter_map(|i| i.occurrence).max().unwrap_or(0),
        "sequence labelled"
    );
    Ok(rows
        .into_iter()
        .zip(info)
        .map(|(row, info)| SequenceRow {
            sequence: info
                .occurrence
                .map_or_else(|| UNMATCHED_SEQUENCE_LABEL.to_string(), |n| n.to_string()),
            span: info.starts_block().then_some(info.next_boundary),
            row,
        })
        .collect())
}

/// Export form of [`label_sequence`].
pub fn sequence_table(
    table: &Table,
    states: &[State],
    target: &[BTreeSet<StateId>],
) -> Result<ExportTable, TrailError> {
    let rows = label_sequence(table, states, target)?;
    let mut columns = vec![
        ExportColumn::new("Sequence", "SEQUENCE"),
        ExportColumn::new("Rows", "SPAN"),
        ExportColumn::new("State(s)", "STATES"),
    ];
    columns.extend(stats_columns());
    ExportTable::from_records(columns, &rows)
}

// =============================================================================
// BASE TABLE
// =============================================================================

/// The base table as shown to the user: every committed column, headed by
/// its display name. The temp column is left out.
#[must_use]
pub fn base_table_export(table: &Table, config: &EngineConfig) -> ExportTable {
    let persisted = table.without_temp_column().as_persistable(config);
    ExportTable {
        columns: persisted
            .columns
            .iter()
            .map(|c| ExportColumn::new(c.display_name.clone(), c.key.clone()))
            .collect(),
        rows: persisted.rows,
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// `"{s}s"` under a minute, `"{m}m {s}s"` otherwise.
#[must_use]
pub fn format_duration(ms: i64) -> String {
    let seconds = (ms as f64 / 1000.0).round() as i64;
    if seconds < 60 {
        return format!("{}s", seconds);
    }
    format!("{}m {}s", seconds / 60, seconds % 60)
}

/// Great-circle distance in metres between two latitude/longitude points.
#[must_use]
pub fn haversine(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

fn time_at(table: &Table, index: i64) -> Option<NaiveDateTime> {
    let row = table.row(table.position_of_index(index)?)?;
    row.get_kind(ColumnKind::TimeClean)?.as_time()
}

fn distance_over(table: &Table, range: IndexRange) -> Option<f64> {
    let first = table.position_of_index(range.start)?;
    let last = table.position_of_index(range.end)?;
    let rows: Vec<_> = (first..=last).filter_map(|pos| table.row(pos)).collect();

    if table.column_of_kind(ColumnKind::Distance).is_some() {
        return Some(
            rows.iter()
                .filter_map(|row| row.get_kind(ColumnKind::Distance)?.as_f64())
                .sum(),
        );
    }

    if table.column_of_kind(ColumnKind::X).is_none()
        || table.column_of_kind(ColumnKind::Y).is_none()
    {
        return None;
    }
    let points: Vec<(f64, f64)> = rows
        .iter()
        .filter_map(|row| {
            let lon = row.get_kind(ColumnKind::X)?.as_f64()?;
            let lat = row.get_kind(ColumnKind::Y)?.as_f64()?;
            Some((lat, lon))
        })
        .collect();
    Some(
        points
            .windows(2)
            .map(|w| haversine(w[0].0, w[0].1, w[1].0, w[1].1))
            .sum(),
    )
}

// =============================================================================
// TESTS
// =============================================================================
