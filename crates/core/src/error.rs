use thiserror::Error;

use crate::model::{ParseExamTypeError, ParseIdError, SnapshotError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    ParseId(#[from] ParseIdError),
    #[error(transparent)]
    ExamType(#[from] ParseExamTypeError),
}
