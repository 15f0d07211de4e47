//! Job records, status taxonomy and the local job store.

pub mod job;
pub mod status;
pub mod store;

pub use job::{Job, JobUpdate, SyncIssue, UpdateOutcome};
pub use status::{
    status_to_label, status_to_progress, AnalysisType, JobStatus, UnknownAnalysisType,
    UnknownStatus,
};
pub use store::{JobCounts, JobStore, RecordError};
