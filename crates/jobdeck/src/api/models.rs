//! Wire types for the analysis backend.
//!
//! Field names follow the backend's JSON exactly (snake_case, including the
//! Portuguese `instrucoes_extras`).

use serde::{Deserialize, Deserializer, Serialize};

use crate::jobs::AnalysisType;

/// Body of `POST /start-analysis`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StartAnalysisRequest {
    pub repo_name: String,
    pub analysis_type: AnalysisType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,
    /// Free-text extra instructions for the analysis agents.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instrucoes_extras: Option<String>,
}

/// Response of `POST /start-analysis`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StartAnalysisResponse {
    pub job_id: String,
    #[serde(default)]
    pub report: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Response of `GET /status/{job_id}`.
///
/// `status` stays a raw string here; parsing into the taxonomy happens when
/// the payload is applied to a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    /// Percentage reported by the backend, rounded and clamped to 0..=100.
    #[serde(default, deserialize_with = "lenient_progress")]
    pub progress: Option<u8>,
    #[serde(default)]
    pub error_details: Option<String>,
    #[serde(default)]
    pub report: Option<String>,
}

/// Accepts any JSON number for `progress`. Anything else reads as absent so a
/// malformed display field never fails the whole status payload.
fn lenient_progress<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value
        .as_f64()
        .filter(|p| p.is_finite())
        .map(|p| p.round().clamp(0.0, 100.0) as u8))
}

/// Action accepted by `POST /update-job-status`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobAction {
    Approve,
    Reject,
    Commit,
}

impl std::fmt::Display for JobAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobAction::Approve => write!(f, "approve"),
            JobAction::Reject => write!(f, "reject"),
            JobAction::Commit => write!(f, "commit"),
        }
    }
}

/// Body of `POST /update-job-status`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdateJobStatusRequest {
    pub job_id: String,
    pub action: JobAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_branch: Option<bool>,
}

impl UpdateJobStatusRequest {
    pub fn new(job_id: &str, action: JobAction) -> Self {
        Self {
            job_id: job_id.to_string(),
            action,
            commit_message: None,
            create_branch: None,
        }
    }
}

/// Response of `POST /update-job-status`. The backend echoes little, so
/// every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UpdateJobStatusResponse {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Response of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    #[serde(default)]
    pub agents_available: Option<Vec<String>>,
    #[serde(default)]
    pub active_jobs: Option<u32>,
}
