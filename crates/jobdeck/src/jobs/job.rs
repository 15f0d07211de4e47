//! The job record and the rules for applying status updates to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::models::JobStatusResponse;
use crate::jobs::status::{AnalysisType, JobStatus};

/// Why the client stopped hearing about a job.
///
/// This is local bookkeeping only and never replaces `status`: a job whose
/// poller timed out is still whatever the backend last said it was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncIssue {
    /// Polling ran out of attempts before a terminal status was seen.
    TimedOut { attempts: u32 },
    /// The backend could not be reached after repeated retries.
    Unreachable { failures: u32, message: String },
    /// The backend refused the status request.
    Rejected { message: String },
}

impl std::fmt::Display for SyncIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncIssue::TimedOut { attempts } => {
                write!(f, "No final status after {} status checks", attempts)
            }
            SyncIssue::Unreachable { failures, message } => write!(
                f,
                "Backend unreachable after {} attempts: {}",
                failures, message
            ),
            SyncIssue::Rejected { message } => {
                write!(f, "Backend rejected the status request: {}", message)
            }
        }
    }
}

/// Result of offering an update or record to an existing job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The job was created or changed.
    Applied,
    /// The job is already terminal; nothing changed.
    IgnoredTerminal,
    /// The update reports an earlier phase than the one recorded.
    IgnoredStale,
}

impl UpdateOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, UpdateOutcome::Applied)
    }
}

/// One requested analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Client-generated identifier.
    pub id: String,
    /// Identifier assigned by the backend once the run is accepted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_job_id: Option<String>,
    /// Repository in `owner/name` form.
    pub repository: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub analysis_type: AnalysisType,
    pub status: JobStatus,
    /// 0..=100, non-decreasing while the job is running.
    pub progress: u8,
    /// Current human-readable status line.
    pub message: String,
    /// Final analysis output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
    /// Report returned together with the start response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_report: Option<String>,
    /// Failure details reported by the backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_issue: Option<SyncIssue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Creates a pending job with a fresh client id.
    pub fn new(repository: &str, branch: Option<&str>, analysis_type: AnalysisType) -> Self {
        let now = Utc::now();
        let status = JobStatus::Pending;

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            backend_job_id: None,
            repository: repository.to_string(),
            branch: branch.map(|b| b.to_string()),
            analysis_type,
            status,
            progress: status.progress(),
            message: "Analysis requested".to_string(),
            report: None,
            initial_report: None,
            error: None,
            sync_issue: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// Applies a status update observed from the backend.
    pub fn apply_update(&mut self, update: &JobUpdate) -> UpdateOutcome {
        if self.status.is_terminal() {
            return UpdateOutcome::IgnoredTerminal;
        }

        let now = Utc::now();

        let Some(next) = update.status else {
            // Status outside the taxonomy: only the text can be trusted.
            if let Some(ref message) = update.message {
                self.message = message.clone();
            }
            self.sync_issue = None;
            self.updated_at = now;
            return UpdateOutcome::Applied;
        };

        if !next.is_terminal() && next.rank() < self.status.rank() {
            return UpdateOutcome::IgnoredStale;
        }

        self.progress = match next {
            JobStatus::Completed => 100,
            JobStatus::Failed | JobStatus::Rejected => self.progress,
            _ => {
                let reported = update.progress.unwrap_or_else(|| next.progress()).min(100);
                self.progress.max(reported)
            }
        };

        self.message = update
            .message
            .clone()
            .unwrap_or_else(|| next.label().to_string());

        if self.report.is_none() {
            self.report = update.report.clone();
        }

        if next == JobStatus::Failed {
            self.error = update.error.clone();
        }

        if next.is_terminal() {
            self.completed_at = Some(now);
        }

        self.status = next;
        self.sync_issue = None;
        self.updated_at = now;

        UpdateOutcome::Applied
    }

    /// Merges a full record for the same id into this one.
    ///
    /// Identity fields (`repository`, `branch`, `analysis_type`,
    /// `created_at`) never change; `backend_job_id` and the reports are
    /// written once.
    pub fn merge(&mut self, incoming: &Job) -> UpdateOutcome {
        if self.status.is_terminal() {
            return UpdateOutcome::IgnoredTerminal;
        }
        if !incoming.status.is_terminal() && incoming.status.rank() < self.status.rank() {
            return UpdateOutcome::IgnoredStale;
        }

        self.progress = match incoming.status {
            JobStatus::Completed => 100,
            _ => self.progress.max(incoming.progress.min(100)),
        };
        self.status = incoming.status;
        self.message = incoming.message.clone();

        if self.backend_job_id.is_none() {
            self.backend_job_id = incoming.backend_job_id.clone();
        }
        if self.report.is_none() {
            self.report = incoming.report.clone();
        }
        if self.initial_report.is_none() {
            self.initial_report = incoming.initial_report.clone();
        }
        if incoming.status == JobStatus::Failed {
            self.error = incoming.error.clone();
        }
        if incoming.status.is_terminal() {
            self.completed_at = incoming.completed_at.or_else(|| Some(Utc::now()));
        }

        self.sync_issue = incoming.sync_issue.clone();
        self.updated_at = self.updated_at.max(incoming.updated_at);

        UpdateOutcome::Applied
    }
}

/// A status observation to apply to a job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    /// `None` when the backend reported a status outside the taxonomy.
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub message: Option<String>,
    pub report: Option<String>,
    pub error: Option<String>,
}

impl JobUpdate {
    /// An update carrying only a status.
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn with_message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }

    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Builds an update from a `GET /status` payload.
    pub fn from_response(response: &JobStatusResponse) -> Self {
        let status = match response.status.parse::<JobStatus>() {
            Ok(status) => Some(status),
            Err(e) => {
                log::warn!("{} for backend job {}, keeping last status", e, response.job_id);
                None
            }
        };

        Self {
            status,
            progress: response.progress,
            message: response.message.clone(),
            report: response.report.clone(),
            error: response.error_details.clone(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.map(|s| s.is_terminal()).unwrap_or(false)
    }
}
