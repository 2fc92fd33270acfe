//! TaskPoller - bounded polling of a remote task.
//!
//! A single `poll` call fetches the task, and while it is still queued or
//! processing waits a fixed interval and fetches again, up to a fixed number
//! of fetches. It then returns the last snapshot it saw, terminal or not.
//! A non-terminal answer is a normal outcome: the summary tells the caller to
//! poll again, and the next call starts with a fresh budget.
//!
//! The delay goes through [`Sleeper`] so tests can run without real time.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kilnconf::TrellisConfig;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{JobService, Task, TaskStatus};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between fetches.
    pub interval: Duration,
    /// Total fetches per poll call, including the first.
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 5,
        }
    }
}

impl PollPolicy {
    pub fn from_config(config: &TrellisConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            max_attempts: config.max_poll_attempts,
        }
    }
}

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Normalized view of the last snapshot a poll call observed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskSummary {
    pub task_id: String,
    pub status: TaskStatus,
    pub task_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_step: Option<String>,
    /// Set whenever the task was still running when polling stopped.
    pub must_poll_again: bool,
    /// Fetches made during this call.
    pub attempts: u32,
}

impl TaskSummary {
    pub fn from_snapshot(task: &Task, base_url: &str, attempts: u32) -> Self {
        let mut summary = Self {
            task_id: task.id.clone(),
            status: task.status,
            task_type: task.task_type.clone(),
            model_url: None,
            error: None,
            message: String::new(),
            next_step: None,
            must_poll_again: false,
            attempts,
        };

        match task.status {
            TaskStatus::Complete => match task.output_locator(base_url) {
                Some(url) => {
                    summary.model_url = Some(url);
                    summary.message =
                        "Task completed successfully. You can now use the model_url.".to_string();
                    summary.next_step = Some(
                        "Use the model_url to access the 3D model; import it with import_glb_model."
                            .to_string(),
                    );
                }
                None => {
                    summary.message =
                        "Task completed but no output directory was found.".to_string();
                }
            },
            TaskStatus::Error => {
                let error = task
                    .error
                    .clone()
                    .unwrap_or_else(|| "Unknown error".to_string());
                summary.message = format!("Task failed: {}", error);
                summary.error = Some(error);
            }
            TaskStatus::Queued | TaskStatus::Processing => {
                summary.must_poll_again = true;
                summary.message =
                    format!("Task is still in progress. Current status: {}", task.status);
                summary.next_step = Some(format!(
                    "IMPORTANT: You must call get_task_status again with task_id {} to continue checking progress.",
                    task.id
                ));
            }
        }

        summary
    }
}

#[derive(Clone)]
pub struct TaskPoller {
    service: Arc<dyn JobService>,
    sleeper: Arc<dyn Sleeper>,
    policy: PollPolicy,
}

impl TaskPoller {
    pub fn new(service: Arc<dyn JobService>, policy: PollPolicy) -> Self {
        Self {
            service,
            sleeper: Arc::new(TokioSleeper),
            policy,
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    pub async fn poll(&self, task_id: &str) -> Result<TaskSummary> {
        self.poll_with_cancel(task_id, &CancellationToken::new()).await
    }

    /// Like [`poll`](Self::poll), but stops waiting as soon as `cancel` fires.
    #[tracing::instrument(
        name = "trellis.poll",
        skip(self, cancel),
        fields(task.id = %task_id, poll.attempts = tracing::field::Empty)
    )]
    pub async fn poll_with_cancel(
        &self,
        task_id: &str,
        cancel: &CancellationToken,
    ) -> Result<TaskSummary> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempts = 1;
        let mut task = self.service.get_job(task_id).await?;

        while !task.status.is_terminal() && attempts < max_attempts {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Polling cancelled");
                    break;
                }
                _ = self.sleeper.sleep(self.policy.interval) => {}
            }

            attempts += 1;
            info!(
                attempt = attempts,
                max_attempts,
                status = %task.status,
                "Task still pending, polling again"
            );
            task = self.service.get_job(task_id).await?;
        }

        tracing::Span::current().record("poll.attempts", attempts);
        Ok(TaskSummary::from_snapshot(
            &task,
            self.service.base_url(),
            attempts,
        ))
    }
}
