//! Persistable form of states and the ordered decoder registry.
//!
//! A persisted state is `{"type", "id", "name", "params"}`. Decoding looks up
//! `type` in [`REGISTRY`]; tags are unique, so at most one decoder applies.

use super::{
    CompoundState, ConditionState, Ellipse, Rect, RegionShape, SequenceState, State, StateKind,
    TimespanState,
};
use crate::types::{StateId, TrailError};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const ELLIPSE_REGION_TAG: &str = "EllipseRegion";
pub const COMPOUND_STATE_TAG: &str = "CompoundState";
pub const RECT_REGION_TAG: &str = "RectRegion";
pub const CONDITION_STATE_TAG: &str = "ConditionState";
pub const SEQUENCE_STATE_TAG: &str = "SequenceState";
pub const TIMESPAN_STATE_TAG: &str = "TimespanState";

pub type Decoder = fn(serde_json::Value) -> Result<StateKind, serde_json::Error>;

/// `(type tag, decoder)` pairs, tried in order.
pub const REGISTRY: &[(&str, Decoder)] = &[
    (ELLIPSE_REGION_TAG, decode_ellipse),
    (COMPOUND_STATE_TAG, decode_compound),
    (RECT_REGION_TAG, decode_rect),
    (CONDITION_STATE_TAG, decode_condition),
    (SEQUENCE_STATE_TAG, decode_sequence),
    (TIMESPAN_STATE_TAG, decode_timespan),
];

fn decode_ellipse(params: serde_json::Value) -> Result<StateKind, serde_json::Error> {
    serde_json::from_value::<Ellipse>(params).map(StateKind::from)
}

fn decode_compound(params: serde_json::Value) -> Result<StateKind, serde_json::Error> {
    serde_json::from_value::<CompoundState>(params).map(StateKind::from)
}

fn decode_rect(params: serde_json::Value) -> Result<StateKind, serde_json::Error> {
    serde_json::from_value::<Rect>(params).map(StateKind::from)
}

fn decode_condition(params: serde_json::Value) -> Result<StateKind, serde_json::Error> {
    serde_json::from_value::<ConditionState>(params).map(StateKind::from)
}

fn decode_sequence(params: serde_json::Value) -> Result<StateKind, serde_json::Error> {
    serde_json::from_value::<SequenceState>(params).map(StateKind::from)
}

fn decode_timespan(params: serde_json::Value) -> Result<StateKind, serde_json::Error> {
    serde_json::from_value::<TimespanState>(params).map(StateKind::from)
}

/// A state as stored in a project document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistableState {
    #[serde(rename = "type")]
    pub type_tag: String,
    pub id: StateId,
    pub name: String,
    pub params: serde_json::Value,
}

impl State {
    /// Persisted type discriminant.
    #[must_use]
    pub fn type_tag(&self) -> &'static str {
        match &self.kind {
            StateKind::Region(RegionShape::Ellipse(_)) => ELLIPSE_REGION_TAG,
            StateKind::Region(RegionShape::Rect(_)) => RECT_REGION_TAG,
            StateKind::Compound(_) => COMPOUND_STATE_TAG,
            StateKind::Condition(_) => CONDITION_STATE_TAG,
            StateKind::Sequence(_) => SEQUENCE_STATE_TAG,
            StateKind::Timespan(_) => TIMESPAN_STATE_TAG,
        }
    }

    pub fn as_persistable(&self) -> Result<PersistableState, TrailError> {
        let params = match &self.kind {
            StateKind::Region(RegionShape::Ellipse(e)) => serde_json::to_value(e),
            StateKind::Region(RegionShape::Rect(r)) => serde_json::to_value(r),
            StateKind::Compound(c) => serde_json::to_value(c),
            StateKind::Condition(c) => serde_json::to_value(c),
            StateKind::Sequence(s) => serde_json::to_value(s),
            StateKind::Timespan(t) => serde_json::to_value(t),
        }
        .map_err(|e| TrailError::Serialization(e.to_string()))?;

        Ok(PersistableState {
            type_tag: self.type_tag().to_string(),
            id: self.id.clone(),
            name: self.name.clone(),
            params,
        })
    }

    /// Restore a state through [`REGISTRY`].
    ///
    /// # Errors
    /// `TrailError::Deserialization` for an unknown tag or malformed params.
    pub fn from_persistable(persisted: &PersistableState) -> Result<Self, TrailError> {
        let Some((_, decode)) = REGISTRY
            .iter()
            .find(|(tag, _)| *tag == persisted.type_tag)
        else {
            warn!(tag = %persisted.type_tag, "unknown state type");
            return Err(TrailError::Deserialization(format!(
                "unknown state type '{}'",
                persisted.type_tag
            )));
        };
        let kind = decode(persisted.params.clone()).map_err(|e| {
            TrailError::Deserialization(format!("state {}: {}", persisted.id, e))
        })?;
        Ok(Self::with_id(persisted.id.clone(), persisted.name.clone(), kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IndexRange;
    use std::collections::BTreeSet;

    #[test]
    fn tags_are_unique() {
        let tags: BTreeSet<&str> = REGISTRY.iter().map(|(tag, _)| *tag).collect();
        assert_eq!(tags.len(), REGISTRY.len());
    }

    #[test]
    fn persisted_shape() {
        let state = State::with_id(
            StateId::new("s1"),
            "Lunch",
            TimespanState::new(IndexRange::new(3, 7)),
        );
        let persisted = state.as_persistable().expect("persist");
        let json = serde_json::to_value(&persisted).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "type": "TimespanState",
                "id": "s1",
                "name": "Lunch",
                "params": {"range": [3, 7]}
            })
        );
        assert_eq!(State::from_persistable(&persisted).expect("restore"), state);
    }

    #[test]
    fn every_variant_restores() {
        let states = vec![
            State::new(
                "e",
                Ellipse {
                    center: [1.0, 2.0],
                    rx: 3.0,
                    ry: 1.5,
                    angle: 30.0,
                },
            ),
            State::new(
                "r",
                Rect {
                    center: [0.0, 0.0],
                    width: 2.0,
                    height: 1.0,
                    angle: 0.0,
                },
            ),
            State::new(
                "c",
                CompoundState::new(StateId::new("a"), StateId::new("b"))
                    .toggle_node(crate::graph::NodeLabel::TF),
            ),
            State::new(
                "q",
                SequenceState::new(
                    vec![StateId::new("a")],
                    vec![[StateId::new("a")].into_iter().collect(), BTreeSet::new()],
                ),
            ),
            State::new(
                "k",
                ConditionState {
                    expression: "x > 1".to_string(),
                    matched: [1, 4].into_iter().collect(),
                },
            ),
        ];
        for state in states {
            let persisted = state.as_persistable().expect("persist");
            assert_eq!(persisted.type_tag, state.type_tag());
            let back = State::from_persistable(&persisted).expect("restore");
            assert_eq!(back, state);
        }
    }

    #[test]
    fn unknown_tag_rejected() {
        let persisted = PersistableState {
            type_tag: "PolygonRegion".to_string(),
            id: StateId::new("p"),
            name: "p".to_string(),
            params: serde_json::json!({}),
        };
        let err = State::from_persistable(&persisted).expect_err("should fail");
        assert!(matches!(err, TrailError::Deserialization(msg) if msg.contains("PolygonRegion")));
    }

    #[test]
    fn malformed_params_rejected() {
        let persisted = PersistableState {
            type_tag: TIMESPAN_STATE_TAG.to_string(),
            id: StateId::new("t"),
            name: "t".to_string(),
            params: serde_json::json!({"range": "soon"}),
        };
        assert!(matches!(
            State::from_persistable(&persisted),
            Err(TrailError::Deserialization(_))
        ));
    }
}
