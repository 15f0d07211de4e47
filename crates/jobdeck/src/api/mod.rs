//! Analysis backend API: wire models, HTTP client and the backend seam used
//! by the poller and the tracker.

pub mod client;
pub mod error;
pub mod models;

use async_trait::async_trait;

pub use client::AnalysisClient;
pub use error::ApiError;
pub use models::{
    HealthResponse, JobAction, JobStatusResponse, StartAnalysisRequest, StartAnalysisResponse,
    UpdateJobStatusRequest, UpdateJobStatusResponse,
};

/// The four operations the analysis backend offers.
#[async_trait]
pub trait JobBackend: Send + Sync {
    async fn start_analysis(
        &self,
        request: &StartAnalysisRequest,
    ) -> error::Result<StartAnalysisResponse>;

    async fn job_status(&self, job_id: &str) -> error::Result<JobStatusResponse>;

    async fn update_job_status(
        &self,
        request: &UpdateJobStatusRequest,
    ) -> error::Result<UpdateJobStatusResponse>;

    async fn health(&self) -> error::Result<HealthResponse>;
}
