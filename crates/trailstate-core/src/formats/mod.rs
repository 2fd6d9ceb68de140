//! # Formats
//!
//! Serialized forms of a project, for the save/load collaborator.

pub mod persistence;

pub use persistence::{PersistenceHeader, project_from_json, project_to_json};
