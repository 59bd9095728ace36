//! Bookkeeping for attempts as they start and finish.

use std::sync::Arc;

use exam_core::model::{
    AttemptId, AttemptRecord, ExamId, ExamMetadata, ExamMetadataRecord, ExamType, ServerAttempt,
};
use storage::keys;
use storage::repository::KeyValueStore;

use crate::error::AttemptError;
use crate::progress::ProgressStore;
use crate::records::{read_json, write_json};

/// Writes the records that let an attempt be found and resumed later.
///
/// Only one combo or random-combo attempt may be active at a time; starting
/// another one while a different combo holds the active record fails with
/// [`AttemptError::Conflict`].
pub struct AttemptRegistry {
    store: Arc<dyn KeyValueStore>,
    progress: Arc<ProgressStore>,
}

impl AttemptRegistry {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, progress: Arc<ProgressStore>) -> Self {
        Self { store, progress }
    }

    /// Record a freshly started attempt.
    ///
    /// # Errors
    ///
    /// `MissingExamId` if the attempt names no exam, `Conflict` if another
    /// combo is active, `Storage` if a write fails.
    pub async fn begin_attempt(
        &self,
        exam_type: ExamType,
        attempt: &ServerAttempt,
        metadata: &ExamMetadata,
    ) -> Result<(), AttemptError> {
        let exam_id = attempt.exam_id.as_ref().ok_or(AttemptError::MissingExamId)?;

        if exam_type.uses_active_attempt() {
            if let Some(active) = self.active_attempt().await? {
                if let Some(active_id) = active.exam_attempt_id.clone() {
                    if attempt.exam_attempt_id.as_ref() != Some(&active_id)
                        && self.holds_combo(&active).await?
                    {
                        tracing::warn!(
                            %active_id,
                            requested = ?attempt.exam_attempt_id,
                            "refusing to start a second active attempt"
                        );
                        return Err(AttemptError::Conflict {
                            active: active_id,
                            requested: attempt.exam_attempt_id.clone(),
                        });
                    }
                }
            }
            write_json(self.store.as_ref(), keys::ACTIVE_ATTEMPT, attempt).await?;
        } else {
            write_json(self.store.as_ref(), &keys::attempt_key(exam_id), attempt).await?;
        }

        let record = ExamMetadataRecord {
            exam_type,
            metadata: metadata.clone(),
        };
        write_json(self.store.as_ref(), &keys::metadata_key(exam_id), &record).await?;

        tracing::info!(
            %exam_id,
            %exam_type,
            attempt_id = ?attempt.exam_attempt_id,
            "attempt started"
        );
        Ok(())
    }

    /// The attempt holding the active record, if any.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::Storage` if the record cannot be read.
    pub async fn active_attempt(&self) -> Result<Option<AttemptRecord>, AttemptError> {
        Ok(read_json(self.store.as_ref(), keys::ACTIVE_ATTEMPT).await?)
    }

    /// Whether the active record belongs to a combo-style attempt. A resumed
    /// single exam also lands in the active record but never blocks a combo.
    /// Without metadata the record counts as a combo.
    async fn holds_combo(&self, active: &AttemptRecord) -> Result<bool, AttemptError> {
        let Some(exam_id) = active.exam_id.as_ref() else {
            return Ok(true);
        };
        let record: Option<ExamMetadataRecord> =
            read_json(self.store.as_ref(), &keys::metadata_key(exam_id)).await?;
        Ok(record.is_none_or(|record| record.exam_type.uses_active_attempt()))
    }

    /// Drop the records of a submitted or abandoned attempt, including its
    /// progress snapshot.
    ///
    /// The active record and the snapshot are shared by whichever attempt
    /// wrote them last, so they are only removed when they belong to this
    /// attempt. A snapshot without identifiers is left alone.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::Storage` if a record cannot be read or removed.
    pub async fn finish_attempt(
        &self,
        exam_id: &ExamId,
        attempt_id: Option<&AttemptId>,
    ) -> Result<(), AttemptError> {
        self.store.remove(&keys::attempt_key(exam_id)).await?;
        self.store.remove(&keys::metadata_key(exam_id)).await?;

        if let Some(active) = self.active_attempt().await? {
            let owner = (active.exam_id.as_ref(), active.exam_attempt_id.as_ref());
            if belongs_to(owner, exam_id, attempt_id) {
                self.store.remove(keys::ACTIVE_ATTEMPT).await?;
            } else {
                tracing::debug!(%exam_id, "active record belongs to another attempt; kept");
            }
        }

        if let Some(snapshot) = self.progress.load_progress().await {
            let owner = (snapshot.exam_id.as_ref(), snapshot.attempt_id.as_ref());
            if !belongs_to(owner, exam_id, attempt_id) {
                tracing::debug!(%exam_id, "progress snapshot belongs to another attempt; kept");
            } else if !self.progress.clear_snapshot().await {
                tracing::warn!(%exam_id, "progress snapshot could not be fully cleared");
            }
        }

        tracing::info!(%exam_id, attempt_id = ?attempt_id, "attempt finished");
        Ok(())
    }
}

/// Attempt ids decide when both sides have one; otherwise the exam ids do.
fn belongs_to(
    (owner_exam, owner_attempt): (Option<&ExamId>, Option<&AttemptId>),
    exam_id: &ExamId,
    attempt_id: Option<&AttemptId>,
) -> bool {
    match (owner_attempt, attempt_id) {
        (Some(owner), Some(finished)) => owner == finished,
        _ => owner_exam == Some(exam_id),
    }
}
