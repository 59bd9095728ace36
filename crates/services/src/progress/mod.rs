//! Durable snapshot of the one exam attempt being taken.

mod autosave;

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use exam_core::model::{AnsweredSet, Answers, AttemptId, ExamId, ExamProgressSnapshot};
use storage::keys;
use storage::repository::KeyValueStore;

use crate::Clock;
use crate::error::ProgressError;
use crate::shell::{Notice, Notifier};

pub use autosave::AutoSave;

/// Whether the user has already been told that saving is failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SaveHealth {
    Healthy,
    Failing,
}

/// Persists and restores the progress snapshot of exactly one attempt.
///
/// Every operation is best-effort: failures are logged, surfaced as a
/// transient notice where the user would care, and reported through the
/// return value. Nothing here returns an error to the caller.
pub struct ProgressStore {
    store: Arc<dyn KeyValueStore>,
    notifier: Arc<dyn Notifier>,
    clock: Clock,
    health: Mutex<SaveHealth>,
    auto_save: AutoSave,
}

impl ProgressStore {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            clock: Clock::default(),
            health: Mutex::new(SaveHealth::Healthy),
            auto_save: AutoSave::new(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Write the snapshot, stamped with the current time, plus the legacy
    /// per-field copies.
    ///
    /// Returns `false` if any write failed. The first failure of a streak is
    /// shown to the user; a later successful save re-arms the notice.
    pub async fn save_progress(
        &self,
        answers: &Answers,
        answered_questions: &AnsweredSet,
        remaining_time: u32,
        attempt_id: Option<&AttemptId>,
        exam_id: Option<&ExamId>,
    ) -> bool {
        let snapshot = ExamProgressSnapshot {
            answers: answers.clone(),
            answered_questions: answered_questions.clone(),
            remaining_time,
            last_saved: Some(self.clock.now_millis()),
            attempt_id: attempt_id.cloned(),
            exam_id: exam_id.cloned(),
        };

        match self.write_snapshot(&snapshot).await {
            Ok(()) => {
                tracing::debug!(
                    remaining_time,
                    answered = snapshot.progress(),
                    "exam progress saved"
                );
                *self.health.lock().unwrap_or_else(PoisonError::into_inner) = SaveHealth::Healthy;
                true
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to save exam progress");
                let first_failure = {
                    let mut health = self.health.lock().unwrap_or_else(PoisonError::into_inner);
                    let first = *health == SaveHealth::Healthy;
                    *health = SaveHealth::Failing;
                    first
                };
                if first_failure {
                    self.notifier.notify(Notice::error(
                        "Your progress could not be saved on this device. You can keep working.",
                    ));
                }
                false
            }
        }
    }

    async fn write_snapshot(&self, snapshot: &ExamProgressSnapshot) -> Result<(), ProgressError> {
        let combined = serde_json::to_string(snapshot)?;
        let answers = serde_json::to_string(&snapshot.answers)?;
        let answered = serde_json::to_string(&snapshot.answered_questions)?;
        let remaining = snapshot.remaining_time.to_string();

        self.store.set(keys::PROGRESS, &combined).await?;
        self.store.set(keys::LEGACY_ANSWERS, &answers).await?;
        self.store
            .set(keys::LEGACY_ANSWERED_QUESTIONS, &answered)
            .await?;
        self.store
            .set(keys::LEGACY_REMAINING_TIME, &remaining)
            .await?;
        Ok(())
    }

    /// Read the snapshot back: the combined record first, then the legacy
    /// per-field records. `None` if neither is usable.
    pub async fn load_progress(&self) -> Option<ExamProgressSnapshot> {
        match self.read_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::error!(error = %err, "failed to load exam progress");
                None
            }
        }
    }

    async fn read_snapshot(&self) -> Result<Option<ExamProgressSnapshot>, ProgressError> {
        if let Some(raw) = self.store.get(keys::PROGRESS).await? {
            match ExamProgressSnapshot::from_combined_json(&raw) {
                Ok(snapshot) => return Ok(Some(snapshot)),
                Err(err) => {
                    tracing::warn!(error = %err, "combined progress record unusable; trying legacy keys");
                }
            }
        }

        let Some(answers) = self.store.get(keys::LEGACY_ANSWERS).await? else {
            return Ok(None);
        };
        let answered = self.store.get(keys::LEGACY_ANSWERED_QUESTIONS).await?;
        let remaining = self.store.get(keys::LEGACY_REMAINING_TIME).await?;

        match ExamProgressSnapshot::from_legacy_json(
            &answers,
            answered.as_deref(),
            remaining.as_deref(),
        ) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(err) => {
                tracing::warn!(error = %err, "legacy progress records unusable");
                Ok(None)
            }
        }
    }

    /// Delete the snapshot, the legacy copies and the active-attempt marker.
    ///
    /// Deleting absent keys is not an error. Returns `false` if a delete failed.
    pub async fn clear_progress(&self) -> bool {
        let snapshot_cleared = self.clear_snapshot().await;
        self.remove_logged(keys::ACTIVE_ATTEMPT).await && snapshot_cleared
    }

    /// Delete the snapshot and its legacy copies but keep the active-attempt
    /// marker, which may belong to another attempt.
    pub async fn clear_snapshot(&self) -> bool {
        let mut cleared = true;
        for key in keys::PROGRESS_KEYS {
            cleared &= self.remove_logged(key).await;
        }
        cleared
    }

    async fn remove_logged(&self, key: &str) -> bool {
        match self.store.remove(key).await {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(key, error = %err, "failed to clear exam progress key");
                false
            }
        }
    }

    /// Whether a combined or legacy snapshot exists, without decoding it.
    pub async fn has_saved_progress(&self) -> bool {
        for key in [keys::PROGRESS, keys::LEGACY_ANSWERS] {
            match self.store.contains(key).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(err) => tracing::warn!(key, error = %err, "progress existence check failed"),
            }
        }
        false
    }

    /// Invoke `save` every `interval`, replacing any timer started earlier.
    ///
    /// The timer stops with [`ProgressStore::stop_auto_save`] or when the
    /// store is dropped. Capture the store weakly in `save` if it refers back
    /// to it.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start_auto_save<F, Fut>(&self, save: F, interval: Duration)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.auto_save.start(save, interval);
    }

    /// Stop the auto-save timer, if any.
    pub fn stop_auto_save(&self) {
        self.auto_save.stop();
    }

    #[must_use]
    pub fn is_auto_saving(&self) -> bool {
        self.auto_save.is_running()
    }
}
