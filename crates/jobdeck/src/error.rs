use std::path::PathBuf;
use thiserror::Error;

use crate::api::ApiError;
use crate::jobs::JobStatus;
use crate::poller::PollError;

#[derive(Error, Debug)]
pub enum JobdeckError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Polling error: {0}")]
    Poll(#[from] PollError),

    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Invalid repository '{0}': expected 'owner/name' or 'org/project/name'")]
    InvalidRepository(String),

    #[error("Job '{0}' not found")]
    JobNotFound(String),

    #[error("Job '{job_id}' is already {status}")]
    JobFinished { job_id: String, status: JobStatus },

    #[error("Job '{0}' has not been accepted by the analysis service yet")]
    NotSubmitted(String),

    #[error("Analysis service error: {0}")]
    Api(#[from] ApiError),
}

pub type Result<T> = std::result::Result<T, JobdeckError>;
