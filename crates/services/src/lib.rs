#![forbid(unsafe_code)]

pub mod api;
pub mod attempts;
pub mod config;
pub mod error;
pub mod grading;
pub mod progress;
mod records;
pub mod scanner;
pub mod shell;

pub use exam_core::Clock;

pub use api::{ExamAttemptApi, HttpExamApi};
pub use attempts::AttemptRegistry;
pub use config::ExamClientConfig;
pub use error::{ApiError, AttemptError, ConfigError, ProgressError};
pub use grading::{GradingOutcome, ResultWaiter};
pub use progress::ProgressStore;
pub use scanner::{
    FallbackReason, OngoingExamScanner, RedirectDelays, ResumeOutcome, ResumeState, ToastState,
};
pub use shell::{LogNotifier, Navigator, Notice, NoticeLevel, Notifier, Route};
