//! In-process stand-in for the analysis backend.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use jobdeck::api::{
    ApiError, HealthResponse, JobBackend, JobStatusResponse, StartAnalysisRequest,
    StartAnalysisResponse, UpdateJobStatusRequest, UpdateJobStatusResponse,
};

pub type Fetch = Result<JobStatusResponse, ApiError>;

/// Scripted backend. Status scripts are per backend job id; the last entry
/// of a script repeats forever.
#[derive(Default)]
pub struct FakeBackend {
    starts: Mutex<VecDeque<Result<StartAnalysisResponse, ApiError>>>,
    start_requests: Mutex<Vec<StartAnalysisRequest>>,
    scripts: Mutex<HashMap<String, VecDeque<Fetch>>>,
    status_calls: Mutex<HashMap<String, u32>>,
    actions: Mutex<Vec<UpdateJobStatusRequest>>,
    action_error: Mutex<Option<ApiError>>,
    next_id: AtomicU32,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the answer to the next `start_analysis` call.
    pub fn on_start(&self, response: Result<StartAnalysisResponse, ApiError>) {
        self.starts.lock().unwrap().push_back(response);
    }

    pub fn script(&self, backend_job_id: &str, fetches: Vec<Fetch>) {
        assert!(!fetches.is_empty(), "a script needs at least one entry");
        self.scripts
            .lock()
            .unwrap()
            .insert(backend_job_id.to_string(), fetches.into());
    }

    pub fn fail_actions_with(&self, error: ApiError) {
        *self.action_error.lock().unwrap() = Some(error);
    }

    pub fn status_calls(&self, backend_job_id: &str) -> u32 {
        self.status_calls
            .lock()
            .unwrap()
            .get(backend_job_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn start_requests(&self) -> Vec<StartAnalysisRequest> {
        self.start_requests.lock().unwrap().clone()
    }

    pub fn actions(&self) -> Vec<UpdateJobStatusRequest> {
        self.actions.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobBackend for FakeBackend {
    async fn start_analysis(
        &self,
        request: &StartAnalysisRequest,
    ) -> Result<StartAnalysisResponse, ApiError> {
        self.start_requests.lock().unwrap().push(request.clone());
        if let Some(response) = self.starts.lock().unwrap().pop_front() {
            return response;
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(StartAnalysisResponse {
            job_id: format!("job-{}", n),
            report: None,
            status: None,
        })
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse, ApiError> {
        *self
            .status_calls
            .lock()
            .unwrap()
            .entry(job_id.to_string())
            .or_insert(0) += 1;

        let mut scripts = self.scripts.lock().unwrap();
        let Some(script) = scripts.get_mut(job_id) else {
            return Err(ApiError::status(404, "unknown job"));
        };
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap()
        }
    }

    async fn update_job_status(
        &self,
        request: &UpdateJobStatusRequest,
    ) -> Result<UpdateJobStatusResponse, ApiError> {
        if let Some(error) = self.action_error.lock().unwrap().clone() {
            return Err(error);
        }
        self.actions.lock().unwrap().push(request.clone());
        Ok(UpdateJobStatusResponse {
            job_id: Some(request.job_id.clone()),
            status: None,
            message: None,
        })
    }

    async fn health(&self) -> Result<HealthResponse, ApiError> {
        Ok(HealthResponse {
            status: "ok".to_string(),
            message: "fake backend".to_string(),
            agents_available: Some(vec!["refactor".to_string()]),
            active_jobs: Some(0),
        })
    }
}
