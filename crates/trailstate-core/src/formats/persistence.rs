//! # Persistence Format
//!
//! JSON project documents for the save/load collaborator.
//!
//! File I/O belongs to the collaborator; this module only turns a
//! [`Project`] into text and back.
//!
//! Format:
//! ```json
//! { "format": "trailstate-project", "version": 1,
//!   "table": { "columns": [...], "rows": [...] },
//!   "states": [ { "type": "...", "id": "...", "name": "...", "params": {...} } ] }
//! ```
//!
//! ## Validation
//!
//! Before the table and states are decoded:
//! - the document size is checked against `MAX_DOCUMENT_SIZE`
//! - the header (`format`, `version`) is decoded alone and validated
//!
//! The state being composed is never persisted.

use crate::config::EngineConfig;
use crate::primitives::{FORMAT_VERSION, MAX_DOCUMENT_SIZE, PROJECT_FORMAT_TAG};
use crate::project::Project;
use crate::states::{PersistableState, State};
use crate::table::{PersistableTable, Table};
use crate::types::TrailError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{info, warn};

// =============================================================================
// DOCUMENT HEADER
// =============================================================================

/// The leading fields of every project document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceHeader {
    pub format: String,
    pub version: u32,
}

impl PersistenceHeader {
    /// Header of the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            format: PROJECT_FORMAT_TAG.to_string(),
            version: FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), TrailError> {
        if self.format != PROJECT_FORMAT_TAG {
            return Err(TrailError::Deserialization(format!(
                "Not a project document: format '{}'",
                self.format
            )));
        }
        if self.version != FORMAT_VERSION {
            return Err(TrailError::Deserialization(format!(
                "Unsupported version: {} (expected {})",
                self.version, FORMAT_VERSION
            )));
        }
        Ok(())
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ProjectDocument {
    #[serde(flatten)]
    header: PersistenceHeader,
    table: PersistableTable,
    states: Vec<PersistableState>,
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize the committed part of a project.
pub fn project_to_json(project: &Project, config: &EngineConfig) -> Result<String, TrailError> {
    let document = ProjectDocument {
        header: PersistenceHeader::new(),
        table: project.table().without_temp_column().as_persistable(config),
        states: project
            .states()
            .iter()
            .map(State::as_persistable)
            .collect::<Result<_, _>>()?,
    };
    serde_json::to_string(&document).map_err(|e| TrailError::Serialization(e.to_string()))
}

/// Restore a project document.
///
/// Size and header are validated before the payload is decoded.
pub fn project_from_json(json: &str, config: &EngineConfig) -> Result<Project, TrailError> {
    if json.len() > MAX_DOCUMENT_SIZE {
        warn!(size = json.len(), "project document too large");
        return Err(TrailError::Deserialization(format!(
            "Document size {} bytes exceeds maximum allowed {} bytes",
            json.len(),
            MAX_DOCUMENT_SIZE
        )));
    }

    let header: PersistenceHeader = serde_json::from_str(json)
        .map_err(|e| TrailError::Deserialization(format!("Invalid document header: {}", e)))?;
    header.validate().inspect_err(|e| warn!(error = %e, "project header rejected"))?;

    let document: ProjectDocument = serde_json::from_str(json).map_err(|e| {
        TrailError::Deserialization(format!("Failed to decode project document: {}", e))
    })?;

    let table = Table::from_persistable(&document.table, config)?;
    let states = document
        .states
        .iter()
        .map(State::from_persistable)
        .collect::<Result<Vec<_>, _>>()?;

    let mut seen = BTreeSet::new();
    if let Some(duplicate) = states.iter().find(|s| !seen.insert(&s.id)) {
        return Err(TrailError::Deserialization(format!(
            "duplicate state id {}",
            duplicate.id
        )));
    }

    let project = Project::from_parts(table, states)
        .map_err(|e| TrailError::Deserialization(e.to_string()))?;
    info!(
        rows = project.table().len(),
        states = project.states().len(),
        "project restored"
    );
    Ok(project)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::states::{Ellipse, TimespanState};
    use crate::table::ColumnKindHints;
    use crate::types::{ColumnKind, IndexRange, RawTable, StateId};

    fn project() -> Project {
        let raw = RawTable::from_text_records(
            vec!["Order".to_string(), "Longitude".to_string(), "Latitude".to_string()],
            (1..=4)
                .map(|i| vec![i.to_string(), (i as f64 * 0.5).to_string(), "0".to_string()])
                .collect(),
        );
        let hints: ColumnKindHints = [
            ("Order".to_string(), ColumnKind::Index),
            ("Longitude".to_string(), ColumnKind::X),
            ("Latitude".to_string(), ColumnKind::Y),
        ]
        .into_iter()
        .collect();
        let table = Table::load(&raw, &hints, &EngineConfig::default()).expect("load");
        Project::new(table)
            .with_temp_state(State::with_id(
                StateId::new("near"),
                "Near",
                Ellipse {
                    center: [0.5, 0.0],
                    rx: 0.6,
                    ry: 0.6,
                    angle: 0.0,
                },
            ))
            .expect("derive")
            .commit_temp_state()
            .expect("commit")
    }

    #[test]
    fn header_roundtrip() {
        let json = serde_json::to_string(&PersistenceHeader::new()).expect("serialize");
        let header: PersistenceHeader = serde_json::from_str(&json).expect("parse header");
        assert!(header.validate().is_ok());
    }

    #[test]
    fn document_roundtrip_is_stable() {
        let config = EngineConfig::default();
        let p = project();
        let first = project_to_json(&p, &config).expect("first serialize");
        let restored = project_from_json(&first, &config).expect("deserialize");
        assert_eq!(restored, p);
        let second = project_to_json(&restored, &config).expect("second serialize");
        assert_eq!(first, second, "save -> load -> save must produce identical text");
    }

    #[test]
    fn temp_state_not_persisted() {
        let config = EngineConfig::default();
        let pending = project()
            .with_temp_state(State::new("t", TimespanState::new(IndexRange::new(1, 2))))
            .expect("derive");
        let json = project_to_json(&pending, &config).expect("serialize");
        let restored = project_from_json(&json, &config).expect("deserialize");
        assert!(restored.temp_state().is_none());
        assert!(restored.table().temp_column().is_none());
        assert_eq!(restored.states().len(), 1);
    }

    #[test]
    fn wrong_header_rejected() {
        let config = EngineConfig::default();
        let wrong_tag =
            r#"{"format":"kml","version":1,"table":{"columns":[],"rows":[]},"states":[]}"#;
        assert!(matches!(
            project_from_json(wrong_tag, &config),
            Err(TrailError::Deserialization(msg)) if msg.contains("kml")
        ));
        let wrong_version = concat!(
            r#"{"format":"trailstate-project","version":99,"#,
            r#""table":{"columns":[],"rows":[]},"states":[]}"#
        );
        assert!(project_from_json(wrong_version, &config).is_err());
        assert!(project_from_json("not json", &config).is_err());
    }

    #[test]
    fn state_without_column_rejected() {
        let config = EngineConfig::default();
        let json = project_to_json(&project(), &config).expect("serialize");
        let mut value: serde_json::Value = serde_json::from_str(&json).expect("parse");
        value["states"][0]["id"] = serde_json::json!("ghost");
        let tampered = value.to_string();
        assert!(matches!(
            project_from_json(&tampered, &config),
            Err(TrailError::Deserialization(_))
        ));
    }
}
