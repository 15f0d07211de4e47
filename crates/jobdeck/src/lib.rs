pub mod api;
pub mod broadcast;
pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod poller;
pub mod sanitize;
pub mod telemetry;
pub mod tracker;

pub use api::{AnalysisClient, ApiError, JobBackend};
pub use broadcast::{JobEvent, JobEventBroadcaster, JobEventKind};
pub use config::{load_config, load_config_from_str, JobdeckConfig};
pub use error::{ConfigError, JobdeckError, Result, TrackerError};
pub use jobs::{
    status_to_label, status_to_progress, AnalysisType, Job, JobStatus, JobStore, JobUpdate,
    SyncIssue,
};
pub use poller::{CancelToken, JobPoller, PollConfig, PollError, PollOutcome, RetryPolicy};
pub use tracker::{JobTracker, StartAnalysisParams, Subscription};
