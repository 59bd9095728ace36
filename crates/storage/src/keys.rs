//! Logical key names of the exam records.
//!
//! The progress keys track exactly one attempt at a time. Attempt and
//! metadata records are per exam and carry the exam id as a suffix.

use exam_core::model::ExamId;

/// Combined progress snapshot.
pub const PROGRESS: &str = "exam_progress";
/// Legacy copy of the answers map.
pub const LEGACY_ANSWERS: &str = "exam_answers";
/// Legacy copy of the answered-question ids.
pub const LEGACY_ANSWERED_QUESTIONS: &str = "exam_answered_questions";
/// Legacy copy of the remaining seconds.
pub const LEGACY_REMAINING_TIME: &str = "exam_remaining_time";
/// The one attempt (usually a combo) currently marked active.
pub const ACTIVE_ATTEMPT: &str = "active_exam_attempt";

pub const ATTEMPT_PREFIX: &str = "exam_attempt_";
pub const METADATA_PREFIX: &str = "exam_meta_";

/// Every key owned by the progress snapshot, combined and legacy.
pub const PROGRESS_KEYS: [&str; 4] = [
    PROGRESS,
    LEGACY_ANSWERS,
    LEGACY_ANSWERED_QUESTIONS,
    LEGACY_REMAINING_TIME,
];

#[must_use]
pub fn attempt_key(exam_id: &ExamId) -> String {
    format!("{ATTEMPT_PREFIX}{exam_id}")
}

#[must_use]
pub fn metadata_key(exam_id: &ExamId) -> String {
    format!("{METADATA_PREFIX}{exam_id}")
}

/// Exam id encoded in a per-exam attempt key, if `key` is one.
#[must_use]
pub fn exam_id_from_attempt_key(key: &str) -> Option<ExamId> {
    key.strip_prefix(ATTEMPT_PREFIX)
        .filter(|suffix| !suffix.is_empty())
        .map(ExamId::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_keys_round_trip_exam_id() {
        let exam_id = ExamId::new("chem-101");
        let key = attempt_key(&exam_id);
        assert_eq!(key, "exam_attempt_chem-101");
        assert_eq!(exam_id_from_attempt_key(&key), Some(exam_id));
    }

    #[test]
    fn other_keys_are_not_attempt_keys() {
        assert!(exam_id_from_attempt_key(ACTIVE_ATTEMPT).is_none());
        assert!(exam_id_from_attempt_key(PROGRESS).is_none());
        assert!(exam_id_from_attempt_key(ATTEMPT_PREFIX).is_none());
        assert!(exam_id_from_attempt_key("exam_meta_chem-101").is_none());
    }
}
