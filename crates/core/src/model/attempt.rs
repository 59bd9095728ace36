use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::{AttemptId, ExamId};

/// Attempt object as returned by the start/resume endpoints.
///
/// The same shape is stored as the per-exam attempt record and as the global
/// active-attempt record. Fields this client does not interpret (server-side
/// answers, question lists, timing) are kept verbatim in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    #[serde(default, alias = "attemptId", skip_serializing_if = "Option::is_none")]
    pub exam_attempt_id: Option<AttemptId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exam_id: Option<ExamId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Server responses and stored markers share one shape.
pub type ServerAttempt = AttemptRecord;

impl AttemptRecord {
    #[must_use]
    pub fn new(exam_id: impl Into<ExamId>, attempt_id: Option<AttemptId>) -> Self {
        Self {
            exam_attempt_id: attempt_id,
            exam_id: Some(exam_id.into()),
            title: None,
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Title with surrounding whitespace removed; blank titles count as missing.
    #[must_use]
    pub fn display_title(&self) -> Option<&str> {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
    }
}

/// Graded outcome of a submitted attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamResult {
    #[serde(default, alias = "attemptId", skip_serializing_if = "Option::is_none")]
    pub exam_attempt_id: Option<AttemptId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_score: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
