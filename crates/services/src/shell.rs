//! Seams to the hosting UI: transient notices and navigation.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use exam_core::model::{AttemptId, ExamId, ExamType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A transient, non-blocking message (a toast).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    #[must_use]
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, message)
    }

    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, message)
    }

    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, message)
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Where the exam UI should go next.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    /// Full-test page of a single exam.
    FullTest { exam_id: ExamId },
    /// Attempt page of a combo or random-combo exam.
    ComboAttempt { attempt_id: AttemptId },
    /// Exam list; used when a combo has no attempt to land on.
    ExamList,
}

impl Route {
    /// Route for taking `exam_type`: single exams by exam id, everything
    /// else by attempt id.
    #[must_use]
    pub fn for_exam(exam_type: ExamType, exam_id: &ExamId, attempt_id: Option<&AttemptId>) -> Self {
        match (exam_type, attempt_id) {
            (ExamType::Single, _) => Route::FullTest {
                exam_id: exam_id.clone(),
            },
            (_, Some(attempt_id)) => Route::ComboAttempt {
                attempt_id: attempt_id.clone(),
            },
            (_, None) => Route::ExamList,
        }
    }

    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Route::FullTest { exam_id } => format!("/exam/full-test/{exam_id}"),
            Route::ComboAttempt { attempt_id } => format!("/exam/combo-attempt/{attempt_id}"),
            Route::ExamList => "/exam".to_string(),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

/// Notifier that writes notices to the log, for headless hosts.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info | NoticeLevel::Success => {
                tracing::info!(level = ?notice.level, "{}", notice.message);
            }
            NoticeLevel::Warning => tracing::warn!("{}", notice.message),
            NoticeLevel::Error => tracing::error!("{}", notice.message),
        }
    }
}

/// Keeps every notice; used by tests and by hosts that render them later.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn count(&self, level: NoticeLevel) -> usize {
        self.notices()
            .iter()
            .filter(|notice| notice.level == level)
            .count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notice);
    }
}

/// Keeps every navigation request.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<Route>>,
}

impl RecordingNavigator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn routes(&self) -> Vec<Route> {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: Route) {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(route);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_exams_route_by_exam_id() {
        let route = Route::for_exam(
            ExamType::Single,
            &ExamId::new("e1"),
            Some(&AttemptId::new("a1")),
        );
        assert_eq!(route.path(), "/exam/full-test/e1");
    }

    #[test]
    fn combos_route_by_attempt_id() {
        let route = Route::for_exam(
            ExamType::RandomCombo,
            &ExamId::new("e1"),
            Some(&AttemptId::new("a1")),
        );
        assert_eq!(route.to_string(), "/exam/combo-attempt/a1");

        let route = Route::for_exam(ExamType::Combo, &ExamId::new("e1"), None);
        assert_eq!(route, Route::ExamList);
    }

    #[test]
    fn recorders_keep_order() {
        let notifier = RecordingNotifier::new();
        notifier.notify(Notice::warning("a"));
        notifier.notify(Notice::error("b"));
        assert_eq!(notifier.count(NoticeLevel::Warning), 1);
        assert_eq!(notifier.notices()[1].message, "b");
    }
}
