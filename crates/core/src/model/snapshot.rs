use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::model::answers::{answered_from_value, answers_from_value};
use crate::model::{AnsweredSet, Answers, AttemptId, ExamId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SnapshotError {
    #[error("snapshot has no answers map")]
    MissingAnswers,

    #[error("snapshot remaining time is not a number")]
    InvalidRemainingTime,

    #[error("malformed snapshot: {0}")]
    Malformed(String),
}

/// Durable record of one attempt's client-side state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamProgressSnapshot {
    pub answers: Answers,
    /// Serialized as an ordered list of ids.
    pub answered_questions: AnsweredSet,
    /// Seconds left on the exam clock.
    pub remaining_time: u32,
    /// Epoch milliseconds; absent for records rebuilt from legacy keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_saved: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt_id: Option<AttemptId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exam_id: Option<ExamId>,
}

/// Loosely typed view of a combined record; every field is checked by hand.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSnapshot {
    answers: Option<Value>,
    answered_questions: Option<Value>,
    remaining_time: Option<Value>,
    last_saved: Option<Value>,
    attempt_id: Option<AttemptId>,
    exam_id: Option<ExamId>,
}

impl ExamProgressSnapshot {
    /// Decode the combined record.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::MissingAnswers` if `answers` is absent or not a map,
    /// `SnapshotError::InvalidRemainingTime` if `remainingTime` is not a number,
    /// and `SnapshotError::Malformed` if the text is not a JSON object.
    pub fn from_combined_json(raw: &str) -> Result<Self, SnapshotError> {
        let record: RawSnapshot =
            serde_json::from_str(raw).map_err(|err| SnapshotError::Malformed(err.to_string()))?;

        let answers = record
            .answers
            .as_ref()
            .and_then(answers_from_value)
            .ok_or(SnapshotError::MissingAnswers)?;
        let remaining_time = record
            .remaining_time
            .as_ref()
            .and_then(seconds_from_number)
            .ok_or(SnapshotError::InvalidRemainingTime)?;
        let answered_questions = record
            .answered_questions
            .map(answered_from_value)
            .unwrap_or_default();
        let last_saved = record.last_saved.as_ref().and_then(Value::as_i64);

        Ok(Self {
            answers,
            answered_questions,
            remaining_time,
            last_saved,
            attempt_id: record.attempt_id,
            exam_id: record.exam_id,
        })
    }

    /// Rebuild a snapshot from the per-field legacy records.
    ///
    /// A missing or unreadable remaining-time record reads as zero.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError` if the legacy answers record is unusable.
    pub fn from_legacy_json(
        answers_raw: &str,
        answered_raw: Option<&str>,
        remaining_raw: Option<&str>,
    ) -> Result<Self, SnapshotError> {
        let answers_value: Value = serde_json::from_str(answers_raw)
            .map_err(|err| SnapshotError::Malformed(err.to_string()))?;
        let answers = answers_from_value(&answers_value).ok_or(SnapshotError::MissingAnswers)?;

        let answered_questions = answered_raw
            .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
            .map(answered_from_value)
            .unwrap_or_default();
        let remaining_time = remaining_raw.and_then(legacy_seconds).unwrap_or(0);

        Ok(Self {
            answers,
            answered_questions,
            remaining_time,
            last_saved: None,
            attempt_id: None,
            exam_id: None,
        })
    }

    /// Number of answered questions.
    #[must_use]
    pub fn progress(&self) -> usize {
        self.answered_questions.len()
    }

    #[must_use]
    pub fn has_time_left(&self) -> bool {
        self.remaining_time > 0
    }

    /// Answered ids that have no row in `answers`.
    pub fn orphaned_answers(&self) -> impl Iterator<Item = &crate::model::QuestionId> {
        self.answered_questions
            .iter()
            .filter(|id| !self.answers.contains_key(*id))
    }
}

/// Seconds from a JSON number, floored and clamped to the non-negative range.
fn seconds_from_number(value: &Value) -> Option<u32> {
    let n = value.as_f64()?;
    if !n.is_finite() {
        return None;
    }
    Some(clamp_seconds(n))
}

/// Legacy remaining-time records may hold a bare number or a quoted one.
fn legacy_seconds(raw: &str) -> Option<u32> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::String(s)) => s.trim().parse::<f64>().ok().map(clamp_seconds),
        Ok(value) => seconds_from_number(&value),
        Err(_) => raw.trim().parse::<f64>().ok().map(clamp_seconds),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_seconds(n: f64) -> u32 {
    n.floor().clamp(0.0, f64::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnswerEntry, QuestionId};

    #[test]
    fn combined_record_decodes() {
        let snapshot = ExamProgressSnapshot::from_combined_json(
            r#"{
                "answers": {"q1": {"selectedAnswerId": "o2"}},
                "answeredQuestions": ["q1"],
                "remainingTime": 1200,
                "lastSaved": 1700000000000,
                "attemptId": 88,
                "examId": "exam-1"
            }"#,
        )
        .unwrap();

        assert_eq!(snapshot.remaining_time, 1200);
        assert_eq!(snapshot.last_saved, Some(1_700_000_000_000));
        assert_eq!(snapshot.attempt_id, Some(AttemptId::new("88")));
        assert_eq!(snapshot.exam_id, Some(ExamId::new("exam-1")));
        assert_eq!(
            snapshot.answers[&QuestionId::new("q1")],
            AnswerEntry::choice("o2")
        );
        assert_eq!(snapshot.progress(), 1);
    }

    #[test]
    fn combined_record_requires_answers() {
        let err = ExamProgressSnapshot::from_combined_json(r#"{"remainingTime": 10}"#).unwrap_err();
        assert_eq!(err, SnapshotError::MissingAnswers);
    }

    #[test]
    fn combined_record_requires_numeric_time() {
        let err =
            ExamProgressSnapshot::from_combined_json(r#"{"answers": {}, "remainingTime": "10"}"#)
                .unwrap_err();
        assert_eq!(err, SnapshotError::InvalidRemainingTime);
    }

    #[test]
    fn negative_and_fractional_time_is_normalized() {
        let snapshot =
            ExamProgressSnapshot::from_combined_json(r#"{"answers": {}, "remainingTime": -5}"#)
                .unwrap();
        assert_eq!(snapshot.remaining_time, 0);

        let snapshot =
            ExamProgressSnapshot::from_combined_json(r#"{"answers": {}, "remainingTime": 59.9}"#)
                .unwrap();
        assert_eq!(snapshot.remaining_time, 59);
    }

    #[test]
    fn legacy_records_tolerate_missing_fields() {
        let snapshot =
            ExamProgressSnapshot::from_legacy_json(r#"{"q1": {"frqAnswerText": "x"}}"#, None, None)
                .unwrap();
        assert_eq!(snapshot.remaining_time, 0);
        assert!(snapshot.answered_questions.is_empty());
        assert!(snapshot.last_saved.is_none());
    }

    #[test]
    fn legacy_time_may_be_quoted() {
        let snapshot =
            ExamProgressSnapshot::from_legacy_json("{}", Some("[1,2]"), Some(r#""300""#)).unwrap();
        assert_eq!(snapshot.remaining_time, 300);
        assert_eq!(snapshot.progress(), 2);
    }

    #[test]
    fn orphaned_answered_ids_are_tolerated() {
        let snapshot = ExamProgressSnapshot::from_combined_json(
            r#"{"answers": {"q1": {}}, "answeredQuestions": ["q1", "q9"], "remainingTime": 5}"#,
        )
        .unwrap();
        let orphans: Vec<_> = snapshot.orphaned_answers().collect();
        assert_eq!(orphans, vec![&QuestionId::new("q9")]);
    }
}
