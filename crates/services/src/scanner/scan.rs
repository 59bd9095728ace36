use exam_core::model::{
    AttemptRecord, DEFAULT_EXAM_TITLE, ExamId, ExamMetadataRecord, ExamProgressSnapshot,
    ExamType, OngoingExam,
};
use storage::keys;
use storage::repository::StorageError;

use super::OngoingExamScanner;
use crate::records::read_json;

impl OngoingExamScanner {
    /// Every attempt that can still be resumed, and refresh the cached list.
    ///
    /// Per-exam records count only while the progress snapshot belongs to
    /// the same exam and has time left. The active-attempt record is added
    /// unless an entry with its attempt id is already listed. Storage
    /// failures read as an empty result.
    pub async fn check_ongoing_exams(&self) -> Vec<OngoingExam> {
        let exams = match self.scan().await {
            Ok(exams) => exams,
            Err(err) => {
                tracing::error!(error = %err, "ongoing exam scan failed");
                Vec::new()
            }
        };
        tracing::debug!(count = exams.len(), "scanned ongoing exams");

        self.lock_state().cached = exams.clone();
        exams
    }

    async fn scan(&self) -> Result<Vec<OngoingExam>, StorageError> {
        let snapshot = self.progress.load_progress().await;
        let mut exams = Vec::new();

        for key in self.store.keys().await? {
            let Some(key_exam_id) = keys::exam_id_from_attempt_key(&key) else {
                continue;
            };
            let Some(record) = read_json::<AttemptRecord>(self.store.as_ref(), &key).await? else {
                continue;
            };
            let exam_id = record.exam_id.clone().unwrap_or(key_exam_id);
            let Some(live) = snapshot
                .as_ref()
                .filter(|snap| snap.has_time_left() && snap.exam_id.as_ref() == Some(&exam_id))
            else {
                tracing::debug!(%exam_id, "attempt record has no live progress; skipping");
                continue;
            };

            let exam = self
                .project(exam_id, &record, Some(live), ExamType::Single)
                .await?;
            exams.push(exam);
        }

        if let Some(active) = self.active_entry(snapshot.as_ref(), &exams).await? {
            exams.push(active);
        }

        Ok(exams)
    }

    async fn active_entry(
        &self,
        snapshot: Option<&ExamProgressSnapshot>,
        listed: &[OngoingExam],
    ) -> Result<Option<OngoingExam>, StorageError> {
        let Some(record) =
            read_json::<AttemptRecord>(self.store.as_ref(), keys::ACTIVE_ATTEMPT).await?
        else {
            return Ok(None);
        };
        let Some(attempt_id) = record.exam_attempt_id.as_ref() else {
            tracing::debug!("active attempt record has no attempt id; skipping");
            return Ok(None);
        };
        if listed
            .iter()
            .any(|exam| exam.attempt_id.as_ref() == Some(attempt_id))
        {
            return Ok(None);
        }

        let snapshot_attempt =
            snapshot.filter(|snap| snap.attempt_id.as_ref() == Some(attempt_id));
        let Some(exam_id) = record
            .exam_id
            .clone()
            .or_else(|| snapshot_attempt.and_then(|snap| snap.exam_id.clone()))
        else {
            tracing::debug!(%attempt_id, "active attempt has no exam id; skipping");
            return Ok(None);
        };

        let matching = snapshot_attempt
            .or_else(|| snapshot.filter(|snap| snap.exam_id.as_ref() == Some(&exam_id)));
        if matching.is_some_and(|snap| !snap.has_time_left()) {
            tracing::debug!(%attempt_id, "active attempt is out of time; skipping");
            return Ok(None);
        }

        self.project(exam_id, &record, matching, ExamType::Combo)
            .await
            .map(Some)
    }

    async fn project(
        &self,
        exam_id: ExamId,
        record: &AttemptRecord,
        snapshot: Option<&ExamProgressSnapshot>,
        default_type: ExamType,
    ) -> Result<OngoingExam, StorageError> {
        let meta =
            read_json::<ExamMetadataRecord>(self.store.as_ref(), &keys::metadata_key(&exam_id))
                .await?;
        let (exam_type, metadata) = match meta {
            Some(meta) => (
                meta.exam_type,
                Some(meta.metadata).filter(|metadata| !metadata.is_empty()),
            ),
            None => (default_type, None),
        };

        Ok(OngoingExam {
            attempt_id: record
                .exam_attempt_id
                .clone()
                .or_else(|| snapshot.and_then(|snap| snap.attempt_id.clone())),
            title: record
                .display_title()
                .unwrap_or(DEFAULT_EXAM_TITLE)
                .to_string(),
            remaining_time: snapshot.map_or(0, |snap| snap.remaining_time),
            progress: snapshot.map_or(0, ExamProgressSnapshot::progress),
            last_accessed: snapshot
                .and_then(|snap| snap.last_saved)
                .unwrap_or_else(|| self.clock.now_millis()),
            exam_id,
            exam_type,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::{AnsweredSet, Answers, AttemptId, ExamMetadata, QuestionId};
    use exam_core::time::FIXED_TEST_TIMESTAMP;
    use storage::repository::{InMemoryStore, KeyValueStore};

    use crate::scanner::test_support::{Harness, seed_attempt, seed_metadata};

    async fn save_snapshot(h: &Harness, exam: &str, attempt: Option<&str>, remaining: u32) {
        let answered: AnsweredSet = [QuestionId::new("q1"), QuestionId::new("q2")]
            .into_iter()
            .collect();
        h.progress
            .save_progress(
                &Answers::new(),
                &answered,
                remaining,
                attempt.map(AttemptId::new).as_ref(),
                Some(&ExamId::new(exam)),
            )
            .await;
    }

    #[tokio::test]
    async fn lists_attempt_with_live_progress() {
        let h = Harness::new();
        seed_attempt(h.store.as_ref(), "e1", Some("a1"), Some("Biology")).await;
        seed_metadata(h.store.as_ref(), "e1", ExamType::Single, ExamMetadata::single("t1")).await;
        save_snapshot(&h, "e1", Some("a1"), 600).await;

        let exams = h.scanner.check_ongoing_exams().await;
        assert_eq!(exams.len(), 1);
        let exam = &exams[0];
        assert_eq!(exam.exam_id, ExamId::new("e1"));
        assert_eq!(exam.attempt_id, Some(AttemptId::new("a1")));
        assert_eq!(exam.title, "Biology");
        assert_eq!(exam.remaining_time, 600);
        assert_eq!(exam.progress, 2);
        assert_eq!(exam.last_accessed, FIXED_TEST_TIMESTAMP * 1000);
        assert_eq!(exam.exam_type, ExamType::Single);
        assert_eq!(exam.template_ids().len(), 1);
        assert_eq!(h.scanner.cached_exams(), exams);
    }

    #[tokio::test]
    async fn zero_remaining_time_is_excluded() {
        let h = Harness::new();
        seed_attempt(h.store.as_ref(), "e1", Some("a1"), None).await;
        save_snapshot(&h, "e1", Some("a1"), 0).await;

        assert!(h.scanner.check_ongoing_exams().await.is_empty());
    }

    #[tokio::test]
    async fn snapshot_of_another_exam_is_excluded() {
        let h = Harness::new();
        seed_attempt(h.store.as_ref(), "e1", Some("a1"), None).await;
        save_snapshot(&h, "e2", Some("a2"), 300).await;

        assert!(h.scanner.check_ongoing_exams().await.is_empty());
    }

    #[tokio::test]
    async fn missing_title_and_metadata_use_defaults() {
        let h = Harness::new();
        seed_attempt(h.store.as_ref(), "e1", None, Some("   ")).await;
        save_snapshot(&h, "e1", Some("a9"), 60).await;

        let exams = h.scanner.check_ongoing_exams().await;
        assert_eq!(exams[0].title, DEFAULT_EXAM_TITLE);
        assert_eq!(exams[0].exam_type, ExamType::Single);
        assert_eq!(exams[0].metadata, None);
        assert_eq!(exams[0].attempt_id, Some(AttemptId::new("a9")));
    }

    #[tokio::test]
    async fn active_attempt_is_listed_as_combo_by_default() {
        let h = Harness::new();
        let marker = AttemptRecord::new("combo-7", Some(AttemptId::new("c7"))).with_title("Mixed");
        crate::records::write_json(h.store.as_ref(), keys::ACTIVE_ATTEMPT, &marker)
            .await
            .unwrap();

        let exams = h.scanner.check_ongoing_exams().await;
        assert_eq!(exams.len(), 1);
        assert_eq!(exams[0].exam_type, ExamType::Combo);
        assert_eq!(exams[0].remaining_time, 0);
        assert_eq!(exams[0].last_accessed, FIXED_TEST_TIMESTAMP * 1000);
    }

    #[tokio::test]
    async fn same_attempt_is_listed_once() {
        let h = Harness::new();
        seed_attempt(h.store.as_ref(), "e1", Some("a1"), None).await;
        save_snapshot(&h, "e1", Some("a1"), 120).await;
        let marker = AttemptRecord::new("e1", Some(AttemptId::new("a1")));
        crate::records::write_json(h.store.as_ref(), keys::ACTIVE_ATTEMPT, &marker)
            .await
            .unwrap();

        let exams = h.scanner.check_ongoing_exams().await;
        assert_eq!(exams.len(), 1);
        assert_eq!(exams[0].exam_type, ExamType::Single);
    }

    #[tokio::test]
    async fn corrupt_records_are_skipped() {
        let h = Harness::new();
        h.store.set("exam_attempt_bad", "{oops").await.unwrap();
        h.store.set(keys::ACTIVE_ATTEMPT, "\"gone\"").await.unwrap();
        seed_attempt(h.store.as_ref(), "e1", Some("a1"), None).await;
        save_snapshot(&h, "e1", Some("a1"), 30).await;

        let exams = h.scanner.check_ongoing_exams().await;
        assert_eq!(exams.len(), 1);
        assert_eq!(exams[0].exam_id, ExamId::new("e1"));
    }

    #[tokio::test]
    async fn unavailable_storage_scans_empty() {
        let memory = InMemoryStore::new();
        let h = Harness::with_store(memory.clone());
        seed_attempt(h.store.as_ref(), "e1", Some("a1"), None).await;
        save_snapshot(&h, "e1", Some("a1"), 30).await;

        memory.set_unavailable(true);
        assert!(h.scanner.check_ongoing_exams().await.is_empty());
        assert!(h.scanner.cached_exams().is_empty());
    }
}
