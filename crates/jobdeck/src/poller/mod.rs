//! Status polling for a single backend job.
//!
//! A [`JobPoller`] fetches `GET /status/{id}` until the backend reports a
//! terminal status, the attempt budget runs out, the backend stays
//! unreachable, or the caller cancels. Fetches are strictly sequential.

pub mod cancel;
pub mod retry;

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use thiserror::Error;
use tracing::Instrument;

use crate::api::{ApiError, JobBackend, JobStatusResponse};
use crate::jobs::JobStatus;

pub use cancel::CancelToken;
pub use retry::RetryPolicy;

/// Polling cadence and budget.
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    /// Delay between a non-terminal answer and the next fetch.
    pub interval: Duration,
    /// Total fetches, successful or not, before giving up.
    pub max_attempts: u32,
    pub retry: RetryPolicy,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            max_attempts: 200,
            retry: RetryPolicy::default(),
        }
    }
}

/// How a polling run ended without error.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The backend reported a terminal status; this is its payload.
    Finished(JobStatusResponse),
    /// The cancel token fired.
    Cancelled,
}

/// Why polling stopped before a terminal status was seen.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PollError {
    #[error("No terminal status after {attempts} attempts")]
    TimedOut { attempts: u32 },

    #[error("Backend unreachable after {failures} consecutive failures: {message}")]
    ConnectionLost { failures: u32, message: String },

    #[error("Backend rejected status request: {0}")]
    Api(ApiError),
}

fn is_terminal(response: &JobStatusResponse) -> bool {
    response
        .status
        .parse::<JobStatus>()
        .map(|s| s.is_terminal())
        .unwrap_or(false)
}

/// Polls one backend job until it reaches a terminal state.
#[derive(Clone)]
pub struct JobPoller {
    backend: Arc<dyn JobBackend>,
    config: PollConfig,
}

impl JobPoller {
    pub fn new(backend: Arc<dyn JobBackend>, config: PollConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Runs the polling loop. `on_update` sees every successful fetch,
    /// including the terminal one, and is never called after cancellation.
    pub async fn poll<F>(
        &self,
        backend_job_id: &str,
        on_update: F,
        cancel: &CancelToken,
    ) -> Result<PollOutcome, PollError>
    where
        F: FnMut(&JobStatusResponse) + Send,
    {
        debug_assert!(!backend_job_id.is_empty(), "poll requires a job id");

        let span = tracing::info_span!("poll_job", job_id = %backend_job_id);
        self.run(backend_job_id, on_update, cancel)
            .instrument(span)
            .await
    }

    async fn run<F>(
        &self,
        backend_job_id: &str,
        mut on_update: F,
        cancel: &CancelToken,
    ) -> Result<PollOutcome, PollError>
    where
        F: FnMut(&JobStatusResponse) + Send,
    {
        let retry = &self.config.retry;
        let mut attempts = 0u32;
        let mut failures = 0u32;

        loop {
            if cancel.is_cancelled() {
                debug!("Polling of {} cancelled", backend_job_id);
                return Ok(PollOutcome::Cancelled);
            }

            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Polling of {} cancelled mid-request", backend_job_id);
                    return Ok(PollOutcome::Cancelled);
                }
                result = self.backend.job_status(backend_job_id) => result,
            };
            attempts += 1;

            let delay = match fetched {
                Ok(response) => {
                    failures = 0;
                    if cancel.is_cancelled() {
                        return Ok(PollOutcome::Cancelled);
                    }
                    on_update(&response);

                    if is_terminal(&response) {
                        info!(
                            "Job {} finished with status '{}' after {} attempts",
                            backend_job_id, response.status, attempts
                        );
                        return Ok(PollOutcome::Finished(response));
                    }
                    self.config.interval
                }
                Err(e) if e.is_retryable() => {
                    failures += 1;
                    if retry.is_exhausted(failures) {
                        warn!(
                            "Giving up on job {} after {} consecutive failures: {}",
                            backend_job_id, failures, e
                        );
                        return Err(PollError::ConnectionLost {
                            failures,
                            message: e.to_string(),
                        });
                    }
                    let backoff = retry.backoff_for(failures);
                    warn!(
                        "Status fetch for {} failed ({}), retrying in {:?}",
                        backend_job_id, e, backoff
                    );
                    backoff
                }
                Err(e) => {
                    warn!("Status fetch for {} rejected: {}", backend_job_id, e);
                    return Err(PollError::Api(e));
                }
            };

            if attempts >= self.config.max_attempts {
                warn!(
                    "Job {} still running after {} attempts, stopping",
                    backend_job_id, attempts
                );
                return Err(PollError::TimedOut { attempts });
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Polling of {} cancelled while waiting", backend_job_id);
                    return Ok(PollOutcome::Cancelled);
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
