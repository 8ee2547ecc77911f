use std::time::Duration;

use crate::domain::Response;

/// The kind of structural difference recorded at a JSON path.
///
/// `Missing` and `Extra` follow the convention `spec.md` §4.6/§9 settles
/// on after flagging the ambiguity in the source material: `Missing`
/// means the field is absent in the legacy response and present in the
/// modern one; `Extra` means the reverse (present in legacy, absent in
/// modern).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DiffKind {
    Missing,
    Extra,
    ValueMismatch,
    TypeMismatch,
}

/// A single structural or value difference between two compared
/// responses, at a specific JSON path (dotted, with array indices as
/// `[i]`).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DiffEntry {
    pub kind: DiffKind,
    pub path: String,
    pub legacy_value: Option<serde_json::Value>,
    pub modern_value: Option<serde_json::Value>,
    pub message: Option<String>,
}

/// A single record of a paired dispatch, produced by
/// [`crate::compare::Comparator`] and handed to
/// [`crate::repository::ComparisonRepository`].
#[derive(Debug, Clone)]
pub struct APIComparison {
    pub comparison_id: String,
    pub request_id: String,
    pub rule_id: String,
    pub legacy_response: Option<Response>,
    pub modern_response: Option<Response>,
    pub match_rate: f64,
    pub diffs: Vec<DiffEntry>,
    pub compared_fields: u64,
    pub matched_fields: u64,
    pub duration: Duration,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl APIComparison {
    /// `spec.md` §4.6: "is_successful := match_rate >= 0.95".
    pub fn is_successful(&self) -> bool {
        self.match_rate >= 0.95
    }
}
