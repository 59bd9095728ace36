//! Start/resume and grading endpoints, one call per exam type.

mod http;

use async_trait::async_trait;
use exam_core::model::{AttemptId, ExamResult, ServerAttempt, SubjectId, TemplateId};

use crate::error::ApiError;

pub use http::HttpExamApi;

/// Server side of an exam attempt.
///
/// The start calls double as resume calls: for an attempt already in
/// progress the server answers with that attempt, including its synced
/// answers. `Ok(None)` is an empty response.
#[async_trait]
pub trait ExamAttemptApi: Send + Sync {
    /// Start or resume a single-template exam.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    async fn start_single(&self, template: &TemplateId)
    -> Result<Option<ServerAttempt>, ApiError>;

    /// Start or resume a fixed combination of templates.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    async fn start_combo(
        &self,
        templates: &[TemplateId],
    ) -> Result<Option<ServerAttempt>, ApiError>;

    /// Start or resume a combination drawn at random from subjects.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    async fn start_random_combo(
        &self,
        subjects: &[SubjectId],
    ) -> Result<Option<ServerAttempt>, ApiError>;

    /// Graded result of a submitted attempt, `None` while grading is pending.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    async fn fetch_result(&self, attempt: &AttemptId) -> Result<Option<ExamResult>, ApiError>;
}
