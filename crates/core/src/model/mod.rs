pub mod answers;
mod attempt;
mod exam;
mod ids;
mod snapshot;

pub use answers::{AnswerEntry, AnsweredQuestionsShape, AnsweredSet, Answers};
pub use attempt::{AttemptRecord, ExamResult, ServerAttempt};
pub use exam::{
    DEFAULT_EXAM_TITLE, ExamMetadata, ExamMetadataRecord, ExamType, OngoingExam,
    ParseExamTypeError,
};
pub use ids::{AnswerOptionId, AttemptId, ExamId, ParseIdError, QuestionId, SubjectId, TemplateId};
pub use snapshot::{ExamProgressSnapshot, SnapshotError};
