//! Domain model for gists, links and their production status
//!
//! Records themselves flow through the gateway as raw `bson::Document`s
//! because the physical schema is unsettled (see the adapter module); the
//! typed structs here cover the one sub-record with guaranteed shape after
//! any update - the gist status - plus the wire-level enums.

use bson::{doc, Document};
use serde::Deserialize;

/// Field holding the gists when the container uses the array shape.
pub const GISTS_FIELD: &str = "gists";
/// Field holding the links when the container uses the array shape.
pub const LINKS_FIELD: &str = "links";
/// Timestamp field written on every updated record.
pub const UPDATED_AT_FIELD: &str = "updatedAt";
/// Flag on a link marking it as already processed into a gist. Immutable
/// once true.
pub const GIST_CREATED_FIELD: &str = "gist_created";

/// Production lifecycle status of a gist.
///
/// The canonical states are draft/review/published, but the production
/// workflow also writes free-text progress labels (e.g. "Processing Audio")
/// through the same field, so unknown strings round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductionStatus {
    Draft,
    Review,
    Published,
    /// Free-text workflow label from the production pipeline
    Workflow(String),
}

impl ProductionStatus {
    /// Parse only the canonical states; used by the HTTP boundary, which
    /// rejects anything else with a 400.
    pub fn parse_strict(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "review" => Some(Self::Review),
            "published" => Some(Self::Published),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Draft => "draft",
            Self::Review => "review",
            Self::Published => "published",
            Self::Workflow(label) => label,
        }
    }
}

impl From<&str> for ProductionStatus {
    fn from(s: &str) -> Self {
        Self::parse_strict(s).unwrap_or_else(|| Self::Workflow(s.to_string()))
    }
}

/// Gist status sub-record. Guaranteed to exist after any status update;
/// synthesized with these defaults when a stored gist lacks one. Stored
/// status documents may carry extra fields; deserialization ignores them
/// and fills anything missing with the defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GistStatus {
    #[serde(default = "default_production_status")]
    pub production_status: String,
    #[serde(default)]
    pub in_production: bool,
    #[serde(default)]
    pub is_now_playing: bool,
    #[serde(default)]
    pub is_done_playing: bool,
    #[serde(default)]
    pub playback_time: f64,
    #[serde(default, rename = "in_productionQueue")]
    pub in_production_queue: bool,
}

fn default_production_status() -> String {
    "pending".to_string()
}

impl Default for GistStatus {
    fn default() -> Self {
        Self {
            production_status: default_production_status(),
            in_production: false,
            is_now_playing: false,
            is_done_playing: false,
            playback_time: 0.0,
            in_production_queue: false,
        }
    }
}

impl GistStatus {
    /// Parse a stored status document; partial or drifted shapes fall
    /// back to the defaults rather than erroring
    pub fn from_document(status: Document) -> Self {
        bson::from_document(status).unwrap_or_default()
    }

    /// Default status sub-record as a stored document
    pub fn default_document() -> Document {
        doc! {
            "production_status": "pending",
            "in_production": false,
            "is_now_playing": false,
            "is_done_playing": false,
            "playback_time": 0.0,
            "in_productionQueue": false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strict_accepts_canonical_states() {
        assert_eq!(ProductionStatus::parse_strict("draft"), Some(ProductionStatus::Draft));
        assert_eq!(ProductionStatus::parse_strict("review"), Some(ProductionStatus::Review));
        assert_eq!(
            ProductionStatus::parse_strict("published"),
            Some(ProductionStatus::Published)
        );
    }

    #[test]
    fn test_parse_strict_rejects_workflow_labels() {
        assert_eq!(ProductionStatus::parse_strict("Processing Audio"), None);
        assert_eq!(ProductionStatus::parse_strict("DRAFT"), None);
        assert_eq!(ProductionStatus::parse_strict(""), None);
    }

    #[test]
    fn test_workflow_label_round_trips() {
        let status = ProductionStatus::from("Generating Transcript");
        assert_eq!(status, ProductionStatus::Workflow("Generating Transcript".into()));
        assert_eq!(status.as_str(), "Generating Transcript");
    }

    #[test]
    fn test_default_status_document_matches_struct_default() {
        let from_doc = GistStatus::from_document(GistStatus::default_document());
        assert_eq!(from_doc, GistStatus::default());
    }

    #[test]
    fn test_partial_status_document_fills_defaults() {
        let status = GistStatus::from_document(doc! {
            "in_production": true,
            "production_status": "review",
            "legacy_field": "ignored",
        });
        assert!(status.in_production);
        assert_eq!(status.production_status, "review");
        assert_eq!(status.playback_time, 0.0);
        assert!(!status.in_production_queue);
    }
}
