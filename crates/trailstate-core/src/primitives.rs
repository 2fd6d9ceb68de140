//! # Engine Primitives
//!
//! Hardcoded constants for the Trailstate engine.
//!
//! Runtime-tunable limits live in [`crate::config::EngineConfig`]; the values
//! here are the defaults and the fixed vocabulary of the persisted formats.

/// Display name of the Index column synthesized when the import names none.
pub const DEFAULT_INDEX_NAME: &str = "Order";

/// Suffix appended to the Time column's display name for its cleaned twin.
pub const CLEAN_TIME_SUFFIX: &str = " (clean)";

/// Textual datetime format of persisted TimeClean cells.
///
/// Round-trips every `NaiveDateTime` down to the millisecond.
pub const DEFAULT_CLEAN_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Timestamp formats tried, in order, when cleaning the Time column.
///
/// The first entry is the export format of the GPS logging apps the product
/// was built around ("11/11/2021 03:22:21 PM").
pub const DEFAULT_TIME_FORMATS: &[&str] = &[
    "%m/%d/%Y %I:%M:%S %p",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

/// Text written for a true state value in persisted and exported tables.
pub const TRUE_TEXT: &str = "true";

/// Text written for a false state value in persisted and exported tables.
pub const FALSE_TEXT: &str = "false";

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Default maximum number of rows accepted by an import.
///
/// Every derivation is a single O(rows) pass over in-memory columns, so the
/// limit only guards against runaway input.
pub const MAX_IMPORT_ROWS: usize = 2_000_000;

/// Default maximum length of a condition expression, in bytes.
pub const MAX_EXPRESSION_LENGTH: usize = 4096;

/// Maximum size of a persisted project document, validated before decoding.
pub const MAX_DOCUMENT_SIZE: usize = 512 * 1024 * 1024;

// =============================================================================
// PERSISTENCE FORMAT
// =============================================================================

/// Format tag of persisted project documents.
pub const PROJECT_FORMAT_TAG: &str = "trailstate-project";

/// Current project document version.
///
/// Increment this when making breaking changes to the persisted shape.
pub const FORMAT_VERSION: u32 = 1;

/// Mean Earth radius in metres, for haversine distances.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;
