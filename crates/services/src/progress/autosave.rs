use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::DEFAULT_AUTO_SAVE_INTERVAL;

/// A single recurring save timer.
///
/// Starting replaces any running timer; stopping is idempotent; dropping the
/// owner stops the timer, so no tick outlives the exam session that
/// installed it.
#[derive(Debug, Default)]
pub struct AutoSave {
    task: Mutex<Option<JoinHandle<()>>>,
}

impl AutoSave {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `callback` every `period`, first after one full period.
    ///
    /// A zero period falls back to the 30 second default.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start<F, Fut>(&self, callback: F, period: Duration)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = if period.is_zero() {
            DEFAULT_AUTO_SAVE_INTERVAL
        } else {
            period
        };

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                callback().await;
            }
        });

        let previous = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
            tracing::debug!("replaced running auto-save timer");
        }
        tracing::debug!(period_ms = period.as_millis(), "auto-save started");
    }

    /// Stop the timer. Returns whether one was running.
    pub fn stop(&self) -> bool {
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match task {
            Some(task) => {
                task.abort();
                tracing::debug!("auto-save stopped");
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl Drop for AutoSave {
    fn drop(&mut self) {
        self.stop();
    }
}
