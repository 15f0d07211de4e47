//! Builders for backend payloads, jobs and trackers.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use jobdeck::api::{ApiError, JobStatusResponse, StartAnalysisResponse};
use jobdeck::{AnalysisType, Job, JobStatus, JobStore, JobTracker, JobUpdate, PollConfig};

use super::backend::{FakeBackend, Fetch};

pub fn status(job_id: &str, status: &str) -> Fetch {
    Ok(JobStatusResponse {
        job_id: job_id.to_string(),
        status: status.to_string(),
        message: None,
        progress: None,
        error_details: None,
        report: None,
    })
}

pub fn status_at(job_id: &str, status: &str, progress: u8) -> Fetch {
    Ok(JobStatusResponse {
        progress: Some(progress),
        ..self::status(job_id, status).unwrap()
    })
}

pub fn refused() -> Fetch {
    Err(ApiError::Connection("connection refused".to_string()))
}

pub fn started(job_id: &str, status: Option<&str>) -> Result<StartAnalysisResponse, ApiError> {
    Ok(StartAnalysisResponse {
        job_id: job_id.to_string(),
        report: Some("Proposed plan".to_string()),
        status: status.map(str::to_string),
    })
}

/// Poll settings with a 1 s interval and a small budget.
pub fn quick_poll(max_attempts: u32) -> PollConfig {
    PollConfig {
        interval: Duration::from_secs(1),
        max_attempts,
        ..PollConfig::default()
    }
}

pub fn tracker(backend: &Arc<FakeBackend>, max_attempts: u32) -> JobTracker {
    JobTracker::new(backend.clone(), JobStore::new(), quick_poll(max_attempts))
}

/// A job moved to `status` through the regular update path.
pub fn job_in(repository: &str, status: JobStatus) -> Job {
    let mut job = Job::new(repository, None, AnalysisType::Refactor);
    if status != JobStatus::Pending {
        job.apply_update(&JobUpdate::status(status));
    }
    job
}
