//! The Step Runner: a generic retrying executor for one named unit of work.
//!
//! Every workflow stage runs through here. The policy is deliberately blunt:
//!
//! * the delay between attempts is fixed, not exponential;
//! * `max_retries` is the *total* attempt ceiling, not additional attempts;
//! * every error kind is retryable, including authentication failures —
//!   there is no fatal/non-retryable distinction at this layer. Callers that
//!   know a stage cannot succeed twice (rendering, validation) set
//!   `max_retries = 1` instead.
//!
//! Timeout and rate-limit failures get differentiated log lines so an
//! operator can tell congestion from breakage, but they receive no
//! kind-specific backoff.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::WorkflowConfig;
use crate::error::{StepError, WorkflowError};
use crate::model::ModelError;

/// Retrying executor for named workflow steps.
#[derive(Debug, Clone)]
pub struct StepRunner {
    max_retries: u32,
    retry_delay: Duration,
}

impl StepRunner {
    /// `max_retries` is clamped to at least one attempt.
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            retry_delay,
        }
    }

    /// Runner using the workflow's retry budget.
    pub fn from_config(config: &WorkflowConfig) -> Self {
        Self::new(config.max_retries, config.retry_delay)
    }

    /// Same delay, different attempt ceiling. Used for the single-attempt
    /// render stage.
    pub fn with_retries(&self, max_retries: u32) -> Self {
        Self::new(max_retries, self.retry_delay)
    }

    /// Execute `op` until it succeeds or the attempt ceiling is reached.
    ///
    /// `op` is reinvoked from scratch on every attempt; a fixed
    /// [`Self::retry_delay`] sleep separates attempts. On exhaustion the
    /// last failure is folded into a [`StepError`] carrying the step name,
    /// the attempt count, and the original error's kind and message.
    pub async fn run<T, F, Fut>(&self, step: &str, mut op: F) -> Result<T, StepError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, WorkflowError>>,
    {
        debug!(step, max_retries = self.max_retries, "step start");

        let mut last_error: Option<WorkflowError> = None;
        for attempt in 1..=self.max_retries {
            if attempt > 1 {
                sleep(self.retry_delay).await;
            }

            match op().await {
                Ok(value) => {
                    info!(step, attempt, "step succeeded");
                    return Ok(value);
                }
                Err(e) => {
                    // Congestion-class model failures get their own log
                    // lines; the retry policy itself does not differ.
                    match &e {
                        WorkflowError::Model(ModelError::Timeout(detail)) => {
                            warn!(step, attempt, max_retries = self.max_retries, %detail, "step hit model timeout");
                        }
                        WorkflowError::Model(ModelError::RateLimited(detail)) => {
                            warn!(step, attempt, max_retries = self.max_retries, %detail, "step rate limited");
                        }
                        other => {
                            warn!(step, attempt, max_retries = self.max_retries, error = %other, "step failed");
                        }
                    }
                    last_error = Some(e);
                }
            }
        }

        let last = last_error.unwrap_or_else(|| {
            WorkflowError::Internal(format!("step '{step}' produced no error and no value"))
        });
        warn!(step, attempts = self.max_retries, kind = last.kind(), "step exhausted retries");
        Err(StepError {
            step: step.to_string(),
            attempts: self.max_retries,
            kind: last.kind(),
            message: last.to_string(),
        })
    }

    /// Execute a synchronous operation with the same retry policy.
    pub async fn run_sync<T, F>(&self, step: &str, mut op: F) -> Result<T, StepError>
    where
        F: FnMut() -> Result<T, WorkflowError>,
    {
        self.run(step, || {
            let result = op();
            async move { result }
        })
        .await
    }
}
