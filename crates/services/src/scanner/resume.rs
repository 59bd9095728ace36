use std::sync::{Mutex, PoisonError};

use exam_core::model::{AttemptRecord, ExamMetadataRecord, ExamType, OngoingExam, ServerAttempt};
use storage::keys;

use super::{OngoingExamScanner, ResumeState, ScannerState};
use crate::error::ApiError;
use crate::records::{read_json, write_json};
use crate::shell::{Notice, Route};

/// Why a resume continued with locally stored data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// The exam lacks the template or subject ids the start call needs.
    MissingIdentifiers,
    /// The server answered without an attempt.
    EmptyResponse,
    Api(String),
}

/// What a resume request did. Every outcome except `Ignored` navigated.
#[derive(Debug, Clone, PartialEq)]
pub enum ResumeOutcome {
    Resumed { attempt: ServerAttempt, route: Route },
    Fallback { reason: FallbackReason, route: Route },
    /// Another resume was already running; nothing was requested.
    Ignored,
}

impl ResumeOutcome {
    #[must_use]
    pub fn route(&self) -> Option<&Route> {
        match self {
            ResumeOutcome::Resumed { route, .. } | ResumeOutcome::Fallback { route, .. } => {
                Some(route)
            }
            ResumeOutcome::Ignored => None,
        }
    }
}

/// Holds the scanner in `Resuming`; dropping it returns the scanner to `Idle`.
struct ResumeGuard<'a> {
    state: &'a Mutex<ScannerState>,
}

impl<'a> ResumeGuard<'a> {
    fn acquire(state: &'a Mutex<ScannerState>) -> Option<Self> {
        let mut locked = state.lock().unwrap_or_else(PoisonError::into_inner);
        if locked.resume == ResumeState::Resuming {
            return None;
        }
        locked.resume = ResumeState::Resuming;
        Some(Self { state })
    }
}

impl Drop for ResumeGuard<'_> {
    fn drop(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .resume = ResumeState::Idle;
    }
}

impl OngoingExamScanner {
    /// Resume `exam`, syncing it with the server first.
    ///
    /// On success the server attempt becomes the active attempt. Without a
    /// usable server answer the user is told and sent on with the local
    /// data after the longer delay. Calls made while another resume is in
    /// flight return [`ResumeOutcome::Ignored`].
    pub async fn resume_exam_with_sync(&self, exam: &OngoingExam) -> ResumeOutcome {
        let Some(_guard) = ResumeGuard::acquire(&self.state) else {
            tracing::debug!(exam_id = %exam.exam_id, "resume already in progress; ignoring");
            return ResumeOutcome::Ignored;
        };
        tracing::info!(exam_id = %exam.exam_id, exam_type = %exam.exam_type, "resuming exam");

        match self.request_attempt(exam).await {
            Ok(Some(attempt)) => self.adopt(exam, attempt).await,
            Ok(None) => self.fall_back(exam, FallbackReason::EmptyResponse).await,
            Err(reason) => self.fall_back(exam, reason).await,
        }
    }

    async fn request_attempt(
        &self,
        exam: &OngoingExam,
    ) -> Result<Option<ServerAttempt>, FallbackReason> {
        let response: Result<_, ApiError> = match exam.exam_type {
            ExamType::Single => {
                let template = exam
                    .template_ids()
                    .first()
                    .ok_or(FallbackReason::MissingIdentifiers)?;
                self.api.start_single(template).await
            }
            ExamType::Combo => {
                let templates = exam.template_ids();
                if templates.is_empty() {
                    return Err(FallbackReason::MissingIdentifiers);
                }
                self.api.start_combo(templates).await
            }
            ExamType::RandomCombo => {
                let subjects = exam.subject_ids();
                if subjects.is_empty() {
                    return Err(FallbackReason::MissingIdentifiers);
                }
                self.api.start_random_combo(subjects).await
            }
        };
        response.map_err(|err| FallbackReason::Api(err.to_string()))
    }

    async fn adopt(&self, exam: &OngoingExam, mut attempt: ServerAttempt) -> ResumeOutcome {
        attempt.exam_id.get_or_insert_with(|| exam.exam_id.clone());
        if attempt.display_title().is_none() {
            attempt.title = Some(exam.title.clone());
        }

        self.replace_active_attempt(&attempt).await;
        let record = ExamMetadataRecord {
            exam_type: exam.exam_type,
            metadata: exam.metadata.clone().unwrap_or_default(),
        };
        let key = keys::metadata_key(&exam.exam_id);
        if let Err(err) = write_json(self.store.as_ref(), &key, &record).await {
            tracing::error!(key = key.as_str(), error = %err, "failed to persist exam metadata");
        }

        self.notifier.notify(Notice::success(format!(
            "Resumed {}. Your answers are in sync.",
            exam.title
        )));
        tokio::time::sleep(self.delays.success).await;

        let attempt_id = attempt
            .exam_attempt_id
            .as_ref()
            .or(exam.attempt_id.as_ref());
        let route = Route::for_exam(exam.exam_type, &exam.exam_id, attempt_id);
        self.navigator.navigate(route.clone());
        tracing::info!(%route, "resumed exam");

        ResumeOutcome::Resumed { attempt, route }
    }

    async fn replace_active_attempt(&self, attempt: &ServerAttempt) {
        match read_json::<AttemptRecord>(self.store.as_ref(), keys::ACTIVE_ATTEMPT).await {
            Ok(Some(previous))
                if previous.exam_attempt_id.is_some()
                    && previous.exam_attempt_id != attempt.exam_attempt_id =>
            {
                tracing::warn!(
                    previous = ?previous.exam_attempt_id,
                    current = ?attempt.exam_attempt_id,
                    "replacing a different active attempt"
                );
            }
            Ok(_) => {}
            Err(err) => tracing::warn!(error = %err, "could not read active attempt"),
        }

        if let Err(err) = write_json(self.store.as_ref(), keys::ACTIVE_ATTEMPT, attempt).await {
            tracing::error!(error = %err, "failed to store active attempt");
        }
    }

    async fn fall_back(&self, exam: &OngoingExam, reason: FallbackReason) -> ResumeOutcome {
        tracing::warn!(exam_id = %exam.exam_id, reason = ?reason, "resuming with local data");
        let notice = match &reason {
            FallbackReason::MissingIdentifiers | FallbackReason::EmptyResponse => {
                Notice::warning(format!(
                    "Could not sync {} with the server. Continuing with the answers saved on this device.",
                    exam.title
                ))
            }
            FallbackReason::Api(_) => Notice::error(format!(
                "The server is unreachable. Continuing {} with the answers saved on this device.",
                exam.title
            )),
        };
        self.notifier.notify(notice);
        tokio::time::sleep(self.delays.fallback).await;

        let route = Route::for_exam(exam.exam_type, &exam.exam_id, exam.attempt_id.as_ref());
        self.navigator.navigate(route.clone());

        ResumeOutcome::Fallback { reason, route }
    }
}
