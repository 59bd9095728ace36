//! Discovery and server-reconciled resume of unfinished exam attempts.

mod resume;
mod scan;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use exam_core::model::{AttemptId, ExamId, OngoingExam};
use storage::keys;
use storage::repository::KeyValueStore;

use crate::Clock;
use crate::api::ExamAttemptApi;
use crate::config::ExamClientConfig;
use crate::progress::ProgressStore;
use crate::shell::{Navigator, Notice, Notifier};

pub use resume::{FallbackReason, ResumeOutcome};

/// Whether a resume is in flight. Re-entry while `Resuming` is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResumeState {
    #[default]
    Idle,
    Resuming,
}

/// The ongoing-exam summary notice is shown at most once per scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToastState {
    #[default]
    Pending,
    Shown,
}

#[derive(Debug, Default)]
struct ScannerState {
    resume: ResumeState,
    toast: ToastState,
    cached: Vec<OngoingExam>,
}

/// Pauses before navigating, long enough for the status notice to be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedirectDelays {
    pub success: Duration,
    pub fallback: Duration,
}

impl RedirectDelays {
    #[must_use]
    pub fn from_config(config: &ExamClientConfig) -> Self {
        Self {
            success: config.redirect_delay,
            fallback: config.fallback_redirect_delay,
        }
    }
}

impl Default for RedirectDelays {
    fn default() -> Self {
        Self::from_config(&ExamClientConfig::default())
    }
}

/// Session-scoped scanner over every attempt record in storage.
///
/// One instance lives as long as the screen that offers to resume exams;
/// its resume guard and one-shot notice flag live with it.
pub struct OngoingExamScanner {
    store: Arc<dyn KeyValueStore>,
    progress: Arc<ProgressStore>,
    api: Arc<dyn ExamAttemptApi>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    clock: Clock,
    delays: RedirectDelays,
    state: Mutex<ScannerState>,
}

impl OngoingExamScanner {
    #[must_use]
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        progress: Arc<ProgressStore>,
        api: Arc<dyn ExamAttemptApi>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            store,
            progress,
            api,
            notifier,
            navigator,
            clock: Clock::default(),
            delays: RedirectDelays::default(),
            state: Mutex::new(ScannerState::default()),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_delays(mut self, delays: RedirectDelays) -> Self {
        self.delays = delays;
        self
    }

    fn lock_state(&self) -> MutexGuard<'_, ScannerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Result of the most recent scan.
    #[must_use]
    pub fn cached_exams(&self) -> Vec<OngoingExam> {
        self.lock_state().cached.clone()
    }

    #[must_use]
    pub fn resume_state(&self) -> ResumeState {
        self.lock_state().resume
    }

    #[must_use]
    pub fn toast_state(&self) -> ToastState {
        self.lock_state().toast
    }

    /// Scan once and, if anything is resumable, show one summary notice.
    ///
    /// Only the first call per scanner does anything. Returns whether a
    /// notice was shown.
    pub async fn show_ongoing_exam_toast(&self) -> bool {
        {
            let mut state = self.lock_state();
            if state.toast == ToastState::Shown {
                return false;
            }
            state.toast = ToastState::Shown;
        }

        let exams = self.check_ongoing_exams().await;
        match exams.as_slice() {
            [] => false,
            [exam] => {
                self.notifier.notify(Notice::info(format!(
                    "You have an unfinished exam: {}. Open it to continue.",
                    exam.title
                )));
                true
            }
            many => {
                self.notifier.notify(Notice::info(format!(
                    "You have {} unfinished exams. Open the list to continue.",
                    many.len()
                )));
                true
            }
        }
    }

    /// Forget an attempt: its per-exam record and metadata, and with an
    /// attempt id also the global active-attempt record. Rescans afterwards.
    pub async fn clear_exam(
        &self,
        exam_id: &ExamId,
        attempt_id: Option<&AttemptId>,
    ) -> Vec<OngoingExam> {
        let mut doomed = vec![keys::attempt_key(exam_id), keys::metadata_key(exam_id)];
        if attempt_id.is_some() {
            doomed.push(keys::ACTIVE_ATTEMPT.to_string());
        }
        for key in &doomed {
            if let Err(err) = self.store.remove(key).await {
                tracing::error!(key = key.as_str(), error = %err, "failed to clear exam record");
            }
        }
        tracing::info!(%exam_id, attempt_id = ?attempt_id, "cleared ongoing exam");

        self.check_ongoing_exams().await
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Arc, Mutex, PoisonError};

    use async_trait::async_trait;
    use exam_core::model::{
        AttemptId, AttemptRecord, ExamId, ExamMetadata, ExamMetadataRecord, ExamResult, ExamType,
        ServerAttempt, SubjectId, TemplateId,
    };
    use exam_core::time::fixed_clock;
    use storage::keys;
    use storage::repository::{InMemoryStore, KeyValueStore};
    use tokio::sync::Notify;

    use super::OngoingExamScanner;
    use crate::api::ExamAttemptApi;
    use crate::error::ApiError;
    use crate::progress::ProgressStore;
    use crate::records::write_json;
    use crate::shell::{RecordingNavigator, RecordingNotifier};

    #[derive(Debug, Clone)]
    pub(crate) enum Reply {
        Attempt(ServerAttempt),
        Empty,
        Fail,
    }

    /// Scripted start endpoints. A gated api parks every call until released.
    pub(crate) struct FakeApi {
        reply: Reply,
        calls: Mutex<Vec<String>>,
        entered: Notify,
        gate: Option<Notify>,
    }

    impl FakeApi {
        pub(crate) fn replying(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: Mutex::new(Vec::new()),
                entered: Notify::new(),
                gate: None,
            })
        }

        pub(crate) fn gated(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: Mutex::new(Vec::new()),
                entered: Notify::new(),
                gate: Some(Notify::new()),
            })
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        pub(crate) fn entered(&self) -> &Notify {
            &self.entered
        }

        pub(crate) fn release(&self) {
            if let Some(gate) = &self.gate {
                gate.notify_one();
            }
        }

        async fn answer(&self, call: String) -> Result<Option<ServerAttempt>, ApiError> {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(call);
            self.entered.notify_one();
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            match &self.reply {
                Reply::Attempt(attempt) => Ok(Some(attempt.clone())),
                Reply::Empty => Ok(None),
                Reply::Fail => Err(ApiError::Unavailable("connection refused".into())),
            }
        }
    }

    fn joined<T: std::fmt::Display>(ids: &[T]) -> String {
        ids.iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    #[async_trait]
    impl ExamAttemptApi for FakeApi {
        async fn start_single(
            &self,
            template: &TemplateId,
        ) -> Result<Option<ServerAttempt>, ApiError> {
            self.answer(format!("single:{template}")).await
        }

        async fn start_combo(
            &self,
            templates: &[TemplateId],
        ) -> Result<Option<ServerAttempt>, ApiError> {
            self.answer(format!("combo:{}", joined(templates))).await
        }

        async fn start_random_combo(
            &self,
            subjects: &[SubjectId],
        ) -> Result<Option<ServerAttempt>, ApiError> {
            self.answer(format!("random-combo:{}", joined(subjects))).await
        }

        async fn fetch_result(&self, _attempt: &AttemptId) -> Result<Option<ExamResult>, ApiError> {
            Ok(None)
        }
    }

    pub(crate) struct Harness {
        pub(crate) store: Arc<dyn KeyValueStore>,
        pub(crate) progress: Arc<ProgressStore>,
        pub(crate) notifier: Arc<RecordingNotifier>,
        pub(crate) navigator: Arc<RecordingNavigator>,
        pub(crate) scanner: Arc<OngoingExamScanner>,
    }

    impl Harness {
        pub(crate) fn new() -> Self {
            Self::build(InMemoryStore::new(), FakeApi::replying(Reply::Empty))
        }

        pub(crate) fn with_store(store: InMemoryStore) -> Self {
            Self::build(store, FakeApi::replying(Reply::Empty))
        }

        pub(crate) fn with_api(api: Arc<FakeApi>) -> Self {
            Self::build(InMemoryStore::new(), api)
        }

        fn build(store: InMemoryStore, api: Arc<FakeApi>) -> Self {
            let store: Arc<dyn KeyValueStore> = Arc::new(store);
            let notifier = Arc::new(RecordingNotifier::new());
            let navigator = Arc::new(RecordingNavigator::new());
            let progress = Arc::new(
                ProgressStore::new(Arc::clone(&store), notifier.clone()).with_clock(fixed_clock()),
            );
            let scanner = OngoingExamScanner::new(
                Arc::clone(&store),
                Arc::clone(&progress),
                api,
                notifier.clone(),
                navigator.clone(),
            )
            .with_clock(fixed_clock());
            Self {
                store,
                progress,
                notifier,
                navigator,
                scanner: Arc::new(scanner),
            }
        }
    }

    pub(crate) async fn seed_attempt(
        store: &dyn KeyValueStore,
        exam: &str,
        attempt: Option<&str>,
        title: Option<&str>,
    ) {
        let exam_id = ExamId::new(exam);
        let mut record = AttemptRecord::new(exam_id.clone(), attempt.map(AttemptId::new));
        record.title = title.map(str::to_string);
        write_json(store, &keys::attempt_key(&exam_id), &record)
            .await
            .unwrap();
    }

    pub(crate) async fn seed_metadata(
        store: &dyn KeyValueStore,
        exam: &str,
        exam_type: ExamType,
        metadata: ExamMetadata,
    ) {
        let record = ExamMetadataRecord {
            exam_type,
            metadata,
        };
        write_json(store, &keys::metadata_key(&ExamId::new(exam)), &record)
            .await
            .unwrap();
    }
}

#[cfg(test)]
mod tests {
    use exam_core::model::{AnsweredSet, Answers};
    use storage::repository::KeyValueStore;

    use super::test_support::{Harness, seed_attempt};
    use super::*;
    use crate::shell::NoticeLevel;

    async fn live_snapshot(h: &Harness, exam: &str, attempt: &str) {
        h.progress
            .save_progress(
                &Answers::new(),
                &AnsweredSet::new(),
                300,
                Some(&AttemptId::new(attempt)),
                Some(&ExamId::new(exam)),
            )
            .await;
    }

    #[tokio::test]
    async fn toast_is_shown_once() {
        let h = Harness::new();
        seed_attempt(h.store.as_ref(), "e1", Some("a1"), Some("Physics")).await;
        live_snapshot(&h, "e1", "a1").await;

        assert_eq!(h.scanner.toast_state(), ToastState::Pending);
        assert!(h.scanner.show_ongoing_exam_toast().await);
        assert!(!h.scanner.show_ongoing_exam_toast().await);
        assert_eq!(h.scanner.toast_state(), ToastState::Shown);

        let notices = h.notifier.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Info);
        assert!(notices[0].message.contains("Physics"));
    }

    #[tokio::test]
    async fn toast_is_spent_even_when_nothing_is_ongoing() {
        let h = Harness::new();
        assert!(!h.scanner.show_ongoing_exam_toast().await);

        seed_attempt(h.store.as_ref(), "e1", Some("a1"), None).await;
        live_snapshot(&h, "e1", "a1").await;
        assert!(!h.scanner.show_ongoing_exam_toast().await);
        assert!(h.notifier.notices().is_empty());
    }

    #[tokio::test]
    async fn clear_exam_removes_records_and_rescans() {
        let h = Harness::new();
        seed_attempt(h.store.as_ref(), "e1", Some("a1"), None).await;
        h.store.set(keys::ACTIVE_ATTEMPT, r#"{"examAttemptId":"a1","examId":"e1"}"#)
            .await
            .unwrap();
        h.store.set("exam_meta_e1", r#"{"examType":"single"}"#).await.unwrap();
        live_snapshot(&h, "e1", "a1").await;
        assert_eq!(h.scanner.check_ongoing_exams().await.len(), 1);

        let left = h
            .scanner
            .clear_exam(&ExamId::new("e1"), Some(&AttemptId::new("a1")))
            .await;

        assert!(left.is_empty());
        assert!(h.scanner.cached_exams().is_empty());
        for key in ["exam_attempt_e1", "exam_meta_e1", keys::ACTIVE_ATTEMPT] {
            assert!(!h.store.contains(key).await.unwrap(), "{key} survived");
        }
        assert!(h.progress.has_saved_progress().await);
    }

    #[tokio::test]
    async fn clear_exam_without_attempt_keeps_active_marker() {
        let h = Harness::new();
        seed_attempt(h.store.as_ref(), "e1", None, None).await;
        h.store.set(keys::ACTIVE_ATTEMPT, r#"{"examAttemptId":"c1","examId":"combo"}"#)
            .await
            .unwrap();

        let left = h.scanner.clear_exam(&ExamId::new("e1"), None).await;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].attempt_id, Some(AttemptId::new("c1")));
        assert!(h.store.contains(keys::ACTIVE_ATTEMPT).await.unwrap());
    }
}
