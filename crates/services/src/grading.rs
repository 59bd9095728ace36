//! Waiting for a submitted attempt to be graded.

use std::sync::Arc;
use std::time::Duration;

use exam_core::model::{AttemptId, ExamResult};
use tokio::time::MissedTickBehavior;

use crate::api::ExamAttemptApi;
use crate::config::ExamClientConfig;

#[derive(Debug, Clone, PartialEq)]
pub enum GradingOutcome {
    Ready(ExamResult),
    /// No result within the ceiling; the caller decides what to show.
    TimedOut { waited: Duration },
}

/// Polls the result endpoint until a result appears or the ceiling passes.
pub struct ResultWaiter {
    api: Arc<dyn ExamAttemptApi>,
    timeout: Duration,
    poll_interval: Duration,
}

impl ResultWaiter {
    #[must_use]
    pub fn new(api: Arc<dyn ExamAttemptApi>, config: &ExamClientConfig) -> Self {
        Self {
            api,
            timeout: config.grading_timeout,
            poll_interval: config.grading_poll_interval,
        }
    }

    /// Poll right away, then every poll interval. Failed polls are logged
    /// and do not end the wait.
    pub async fn wait_for_result(&self, attempt: &AttemptId) -> GradingOutcome {
        let poll = async {
            let mut ticker = tokio::time::interval(self.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match self.api.fetch_result(attempt).await {
                    Ok(Some(result)) => return result,
                    Ok(None) => tracing::debug!(%attempt, "result not ready"),
                    Err(err) => tracing::warn!(%attempt, error = %err, "result poll failed"),
                }
            }
        };

        match tokio::time::timeout(self.timeout, poll).await {
            Ok(result) => {
                tracing::info!(%attempt, "exam result ready");
                GradingOutcome::Ready(result)
            }
            Err(_) => {
                tracing::warn!(
                    %attempt,
                    waited_secs = self.timeout.as_secs(),
                    "gave up waiting for exam result"
                );
                GradingOutcome::TimedOut {
                    waited: self.timeout,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use exam_core::model::{ServerAttempt, SubjectId, TemplateId};
    use tokio::time::Instant;

    use super::*;
    use crate::error::ApiError;

    struct ScriptedResults {
        replies: Mutex<VecDeque<Result<Option<ExamResult>, ApiError>>>,
        polls: Mutex<usize>,
    }

    impl ScriptedResults {
        fn new(replies: Vec<Result<Option<ExamResult>, ApiError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                polls: Mutex::new(0),
            })
        }

        fn polls(&self) -> usize {
            *self.polls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ExamAttemptApi for ScriptedResults {
        async fn start_single(&self, _: &TemplateId) -> Result<Option<ServerAttempt>, ApiError> {
            Ok(None)
        }

        async fn start_combo(&self, _: &[TemplateId]) -> Result<Option<ServerAttempt>, ApiError> {
            Ok(None)
        }

        async fn start_random_combo(
            &self,
            _: &[SubjectId],
        ) -> Result<Option<ServerAttempt>, ApiError> {
            Ok(None)
        }

        async fn fetch_result(&self, _: &AttemptId) -> Result<Option<ExamResult>, ApiError> {
            *self.polls.lock().unwrap() += 1;
            self.replies.lock().unwrap().pop_front().unwrap_or(Ok(None))
        }
    }

    fn graded(score: f64) -> ExamResult {
        ExamResult {
            exam_attempt_id: Some(AttemptId::new("a1")),
            score: Some(score),
            total_score: Some(100.0),
            ..ExamResult::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn returns_result_once_graded() {
        let api = ScriptedResults::new(vec![Ok(None), Ok(None), Ok(Some(graded(87.0)))]);
        let waiter = ResultWaiter::new(api.clone(), &ExamClientConfig::default());

        let start = Instant::now();
        let outcome = waiter.wait_for_result(&AttemptId::new("a1")).await;

        assert_eq!(outcome, GradingOutcome::Ready(graded(87.0)));
        assert_eq!(api.polls(), 3);
        assert!(start.elapsed() >= Duration::from_secs(10));
        assert!(start.elapsed() < Duration::from_secs(11));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_errors_do_not_end_the_wait() {
        let api = ScriptedResults::new(vec![
            Err(ApiError::Unavailable("reset".into())),
            Ok(Some(graded(50.0))),
        ]);
        let waiter = ResultWaiter::new(api.clone(), &ExamClientConfig::default());

        let outcome = waiter.wait_for_result(&AttemptId::new("a1")).await;
        assert!(matches!(outcome, GradingOutcome::Ready(_)));
        assert_eq!(api.polls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_at_the_ceiling() {
        let api = ScriptedResults::new(Vec::new());
        let config = ExamClientConfig {
            grading_timeout: Duration::from_secs(60),
            ..ExamClientConfig::default()
        };
        let waiter = ResultWaiter::new(api.clone(), &config);

        let start = Instant::now();
        let outcome = waiter.wait_for_result(&AttemptId::new("a1")).await;

        assert_eq!(
            outcome,
            GradingOutcome::TimedOut {
                waited: Duration::from_secs(60)
            }
        );
        assert!(start.elapsed() >= Duration::from_secs(60));
        assert!(start.elapsed() < Duration::from_secs(61));
        assert!(api.polls() >= 12);
    }
}
