use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{AttemptId, ExamId, SubjectId, TemplateId};

/// Placeholder title for attempts whose record carries none.
pub const DEFAULT_EXAM_TITLE: &str = "Untitled exam";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown exam type: {0}")]
pub struct ParseExamTypeError(pub String);

/// How an attempt was started, and therefore how it has to be resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExamType {
    /// One exam template.
    #[default]
    Single,
    /// A fixed list of templates taken as one attempt.
    Combo,
    /// Templates drawn at random from a list of subjects.
    RandomCombo,
}

impl ExamType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ExamType::Single => "single",
            ExamType::Combo => "combo",
            ExamType::RandomCombo => "random-combo",
        }
    }

    /// Single attempts are tracked per exam; the others share the global
    /// active-attempt record.
    #[must_use]
    pub fn uses_active_attempt(self) -> bool {
        !matches!(self, ExamType::Single)
    }
}

impl fmt::Display for ExamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExamType {
    type Err = ParseExamTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "single" => Ok(ExamType::Single),
            "combo" => Ok(ExamType::Combo),
            "random-combo" => Ok(ExamType::RandomCombo),
            other => Err(ParseExamTypeError(other.to_string())),
        }
    }
}

/// Identifiers needed to rebuild the start/resume call for an attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamMetadata {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub template_ids: Vec<TemplateId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subject_ids: Vec<SubjectId>,
}

impl ExamMetadata {
    #[must_use]
    pub fn single(template: impl Into<TemplateId>) -> Self {
        Self {
            template_ids: vec![template.into()],
            subject_ids: Vec::new(),
        }
    }

    #[must_use]
    pub fn templates(templates: impl IntoIterator<Item = TemplateId>) -> Self {
        Self {
            template_ids: templates.into_iter().collect(),
            subject_ids: Vec::new(),
        }
    }

    #[must_use]
    pub fn subjects(subjects: impl IntoIterator<Item = SubjectId>) -> Self {
        Self {
            template_ids: Vec::new(),
            subject_ids: subjects.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.template_ids.is_empty() && self.subject_ids.is_empty()
    }
}

/// Persisted per-exam record of how the attempt was started.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamMetadataRecord {
    #[serde(default)]
    pub exam_type: ExamType,
    #[serde(flatten)]
    pub metadata: ExamMetadata,
}

/// A resumable attempt, projected from storage by the ongoing-exam scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OngoingExam {
    pub exam_id: ExamId,
    pub attempt_id: Option<AttemptId>,
    pub title: String,
    pub remaining_time: u32,
    pub progress: usize,
    /// Epoch milliseconds.
    pub last_accessed: i64,
    pub exam_type: ExamType,
    pub metadata: Option<ExamMetadata>,
}

impl OngoingExam {
    #[must_use]
    pub fn template_ids(&self) -> &[TemplateId] {
        self.metadata
            .as_ref()
            .map(|meta| meta.template_ids.as_slice())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn subject_ids(&self) -> &[SubjectId] {
        self.metadata
            .as_ref()
            .map(|meta| meta.subject_ids.as_slice())
            .unwrap_or_default()
    }
}
