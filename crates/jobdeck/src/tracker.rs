//! The job tracker: the surface a UI layer talks to.
//!
//! It owns the job store, starts analyses on the backend, runs one poller
//! per subscribed job and forwards approve / reject / commit actions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard};

use log::{debug, info, warn};
use regex::Regex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::api::{
    AnalysisClient, ApiError, HealthResponse, JobAction, JobBackend, StartAnalysisRequest,
    UpdateJobStatusRequest, UpdateJobStatusResponse,
};
use crate::broadcast::{JobEvent, JobEventBroadcaster};
use crate::config::{config_from_env, JobdeckConfig};
use crate::db::Database;
use crate::error::TrackerError;
use crate::jobs::{AnalysisType, Job, JobStatus, JobStore, JobUpdate, SyncIssue};
use crate::poller::{CancelToken, JobPoller, PollConfig, PollError, PollOutcome};

/// Two or three `/`-separated segments: `owner/name` on GitHub,
/// `organization/project/repository` on Azure Repos. Segments may contain
/// inner spaces but no leading or trailing whitespace.
static RE_REPOSITORY: LazyLock<Regex> = LazyLock::new(|| {
    let segment = r"[^/\s](?:[^/]*[^/\s])?";
    Regex::new(&format!(r"^{segment}(?:/{segment}){{1,2}}$")).unwrap()
});

/// Checks that `repository` looks like `owner/name` or `org/project/name`.
/// Anything finer is left to the backend.
pub fn validate_repository(repository: &str) -> Result<(), TrackerError> {
    if RE_REPOSITORY.is_match(repository) {
        Ok(())
    } else {
        Err(TrackerError::InvalidRepository(repository.to_string()))
    }
}

/// What to analyse.
#[derive(Debug, Clone, PartialEq)]
pub struct StartAnalysisParams {
    /// `owner/name` or `org/project/name`
    pub repository: String,
    pub analysis_type: AnalysisType,
    pub branch: Option<String>,
    /// Free-form instructions passed through to the analysis agents.
    pub extra_instructions: Option<String>,
}

impl StartAnalysisParams {
    pub fn new(repository: &str, analysis_type: AnalysisType) -> Self {
        Self {
            repository: repository.to_string(),
            analysis_type,
            branch: None,
            extra_instructions: None,
        }
    }

    pub fn with_branch(mut self, branch: &str) -> Self {
        self.branch = Some(branch.to_string());
        self
    }

    pub fn with_instructions(mut self, instructions: &str) -> Self {
        self.extra_instructions = Some(instructions.to_string());
        self
    }
}

/// Handle to a running poller. Dropping it leaves the poller running.
#[derive(Debug)]
pub struct Subscription {
    job_id: String,
    token: CancelToken,
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    fn finished(job_id: &str) -> Self {
        let token = CancelToken::new();
        token.cancel();
        Self {
            job_id: job_id.to_string(),
            token,
            handle: None,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Stops the poller. No callbacks are delivered afterwards.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled() && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Waits for the poller task to end.
    pub async fn wait(self) {
        if let Some(handle) = self.handle {
            if let Err(e) = handle.await {
                warn!("Poller for job {} ended abnormally: {}", self.job_id, e);
            }
        }
    }
}

struct ActivePoller {
    generation: u64,
    token: CancelToken,
}

type PollerMap = Arc<Mutex<HashMap<String, ActivePoller>>>;

fn lock_pollers(
    pollers: &Mutex<HashMap<String, ActivePoller>>,
) -> MutexGuard<'_, HashMap<String, ActivePoller>> {
    match pollers.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("Poller registry lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

/// Tracks analysis jobs against one backend.
pub struct JobTracker {
    backend: Arc<dyn JobBackend>,
    store: Arc<JobStore>,
    poller: JobPoller,
    events: JobEventBroadcaster,
    pollers: PollerMap,
    next_generation: AtomicU64,
}

impl JobTracker {
    /// Wires a tracker around `backend` and `store`. Store changes are
    /// published on the tracker's event channel.
    pub fn new(backend: Arc<dyn JobBackend>, store: JobStore, poll_config: PollConfig) -> Self {
        let events = JobEventBroadcaster::default();
        let store = Arc::new(store.with_events(events.clone()));
        Self {
            poller: JobPoller::new(Arc::clone(&backend), poll_config),
            backend,
            store,
            events,
            pollers: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Builds the HTTP client and the (optionally persistent) store from
    /// configuration.
    pub fn from_config(config: &JobdeckConfig) -> crate::Result<Self> {
        let client = AnalysisClient::new(&config.api)?;
        let store = match config.storage.resolved_database_path() {
            Some(path) => JobStore::with_database(Database::open(&path)?)?,
            None => {
                info!("Job persistence disabled, keeping jobs in memory");
                JobStore::new()
            }
        };
        Ok(Self::new(
            Arc::new(client),
            store,
            config.poll.to_poll_config(),
        ))
    }

    /// Default configuration with `JOBDECK_*` environment overrides applied.
    pub fn from_env() -> crate::Result<Self> {
        Self::from_config(&config_from_env()?)
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Starts an analysis and returns the local job id.
    ///
    /// The job is recorded as `pending` before the backend is called; if
    /// the call fails the record is marked `failed` and the error returned.
    pub async fn start_analysis(&self, params: StartAnalysisParams) -> Result<String, TrackerError> {
        validate_repository(&params.repository)?;

        let job = Job::new(
            &params.repository,
            params.branch.as_deref(),
            params.analysis_type,
        );
        let id = job.id.clone();
        self.store.upsert(job);

        let request = StartAnalysisRequest {
            repo_name: params.repository.clone(),
            analysis_type: params.analysis_type,
            branch_name: params.branch.clone(),
            instrucoes_extras: params.extra_instructions.clone(),
        };

        let response = self
            .backend
            .start_analysis(&request)
            .await
            .and_then(|response| {
                if response.job_id.trim().is_empty() {
                    Err(ApiError::Decode(
                        "start response carried an empty job_id".to_string(),
                    ))
                } else {
                    Ok(response)
                }
            });
        let response = match response {
            Ok(response) => response,
            Err(e) => {
                warn!("Starting analysis for {} failed: {}", params.repository, e);
                let update = JobUpdate {
                    status: Some(JobStatus::Failed),
                    message: Some(format!("Failed to start analysis: {}", e)),
                    error: Some(e.to_string()),
                    ..Default::default()
                };
                self.store.apply_update(&id, &update);
                return Err(e.into());
            }
        };

        self.store.set_backend_job_id(&id, &response.job_id);
        if let Some(ref report) = response.report {
            self.store.set_initial_report(&id, report);
        }
        if let Some(ref status) = response.status {
            match status.parse::<JobStatus>() {
                Ok(status) => {
                    self.store.apply_update(&id, &JobUpdate::status(status));
                }
                Err(e) => warn!("{} in start response for {}", e, response.job_id),
            }
        }

        info!(
            "Tracking {} analysis of {} as job {} (backend {})",
            params.analysis_type, params.repository, id, response.job_id
        );
        Ok(id)
    }

    /// Starts polling job `id`; every applied update is stored and then
    /// handed to `on_update`. Must be called from within a tokio runtime.
    ///
    /// A second subscription to the same job replaces the first. A job
    /// that is already finished gets an inactive subscription and no
    /// request is made.
    pub fn subscribe_to_job<F>(&self, id: &str, on_update: F) -> Result<Subscription, TrackerError>
    where
        F: FnMut(&Job) + Send + 'static,
    {
        let job = self
            .store
            .get(id)
            .ok_or_else(|| TrackerError::JobNotFound(id.to_string()))?;
        if job.is_finished() {
            debug!("Job {} already {}, not polling", id, job.status);
            return Ok(Subscription::finished(id));
        }
        let backend_job_id = job
            .backend_job_id
            .clone()
            .filter(|backend_id| !backend_id.trim().is_empty())
            .ok_or_else(|| TrackerError::NotSubmitted(id.to_string()))?;

        let token = CancelToken::new();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        {
            let mut pollers = lock_pollers(&self.pollers);
            let previous = pollers.insert(
                id.to_string(),
                ActivePoller {
                    generation,
                    token: token.clone(),
                },
            );
            if let Some(previous) = previous {
                debug!("Replacing existing poller for job {}", id);
                previous.token.cancel();
            }
        }

        let handle = tokio::spawn(run_subscription(
            self.poller.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.pollers),
            id.to_string(),
            backend_job_id,
            generation,
            token.clone(),
            on_update,
        ));

        Ok(Subscription {
            job_id: id.to_string(),
            token,
            handle: Some(handle),
        })
    }

    /// Approves the plan of a job waiting for approval.
    pub async fn approve(&self, id: &str) -> Result<Job, TrackerError> {
        let response = self.send_action(id, JobAction::Approve, None, None).await?;
        self.apply_local(id, JobStatus::Approved, response.message.as_deref())
    }

    /// Rejects a job. The job becomes terminal and its poller stops.
    pub async fn reject(&self, id: &str) -> Result<Job, TrackerError> {
        let response = self.send_action(id, JobAction::Reject, None, None).await?;
        let job = self.apply_local(id, JobStatus::Rejected, response.message.as_deref())?;
        self.cancel_poller(id);
        Ok(job)
    }

    /// Asks the backend to commit the job's changes.
    pub async fn commit(
        &self,
        id: &str,
        commit_message: Option<&str>,
        create_branch: bool,
    ) -> Result<Job, TrackerError> {
        let response = self
            .send_action(id, JobAction::Commit, commit_message, Some(create_branch))
            .await?;

        match response.status.as_deref().map(str::parse::<JobStatus>) {
            Some(Ok(status)) => self.apply_local(id, status, response.message.as_deref()),
            _ => self
                .store
                .get(id)
                .ok_or_else(|| TrackerError::JobNotFound(id.to_string())),
        }
    }

    async fn send_action(
        &self,
        id: &str,
        action: JobAction,
        commit_message: Option<&str>,
        create_branch: Option<bool>,
    ) -> Result<UpdateJobStatusResponse, TrackerError> {
        let job = self
            .store
            .get(id)
            .ok_or_else(|| TrackerError::JobNotFound(id.to_string()))?;
        if job.is_finished() {
            return Err(TrackerError::JobFinished {
                job_id: id.to_string(),
                status: job.status,
            });
        }
        let backend_job_id = job
            .backend_job_id
            .ok_or_else(|| TrackerError::NotSubmitted(id.to_string()))?;

        let mut request = UpdateJobStatusRequest::new(&backend_job_id, action);
        request.commit_message = commit_message.map(str::to_string);
        request.create_branch = create_branch;

        Ok(self.backend.update_job_status(&request).await?)
    }

    fn apply_local(
        &self,
        id: &str,
        status: JobStatus,
        message: Option<&str>,
    ) -> Result<Job, TrackerError> {
        let mut update = JobUpdate::status(status);
        update.message = message.map(str::to_string);

        let (outcome, job) = self
            .store
            .apply_update(id, &update)
            .ok_or_else(|| TrackerError::JobNotFound(id.to_string()))?;
        if !outcome.is_applied() {
            debug!("Local {} for job {} was {:?}", status, id, outcome);
        }
        Ok(job)
    }

    /// All jobs, newest first.
    pub fn list_jobs(&self) -> Vec<Job> {
        self.store.list()
    }

    pub fn get_job(&self, id: &str) -> Option<Job> {
        self.store.get(id)
    }

    /// Removes a job and stops its poller. Unknown ids are ignored.
    pub fn remove_job(&self, id: &str) -> bool {
        self.cancel_poller(id);
        self.store.remove(id)
    }

    /// Removes every finished job. Returns how many were removed.
    pub fn clear_completed(&self) -> usize {
        self.store.clear_terminal()
    }

    pub async fn health(&self) -> Result<HealthResponse, TrackerError> {
        Ok(self.backend.health().await?)
    }

    /// Receives every applied store change.
    pub fn events(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Number of pollers currently registered.
    pub fn active_pollers(&self) -> usize {
        lock_pollers(&self.pollers).len()
    }

    fn cancel_poller(&self, id: &str) {
        if let Some(active) = lock_pollers(&self.pollers).remove(id) {
            debug!("Cancelling poller for job {}", id);
            active.token.cancel();
        }
    }

    /// Cancels every running poller.
    pub fn shutdown(&self) {
        let mut pollers = lock_pollers(&self.pollers);
        if !pollers.is_empty() {
            info!("Stopping {} job pollers", pollers.len());
        }
        for (_, active) in pollers.drain() {
            active.token.cancel();
        }
    }
}

impl Drop for JobTracker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_subscription<F>(
    poller: JobPoller,
    store: Arc<JobStore>,
    pollers: PollerMap,
    job_id: String,
    backend_job_id: String,
    generation: u64,
    token: CancelToken,
    mut on_update: F,
) where
    F: FnMut(&Job) + Send + 'static,
{
    let result = poller
        .poll(
            &backend_job_id,
            |response| {
                let update = JobUpdate::from_response(response);
                if let Some((outcome, job)) = store.apply_update(&job_id, &update) {
                    if outcome.is_applied() {
                        on_update(&job);
                    }
                }
            },
            &token,
        )
        .await;

    let issue = match result {
        Ok(PollOutcome::Finished(_)) | Ok(PollOutcome::Cancelled) => None,
        Err(PollError::TimedOut { attempts }) => Some(SyncIssue::TimedOut { attempts }),
        Err(PollError::ConnectionLost { failures, message }) => {
            Some(SyncIssue::Unreachable { failures, message })
        }
        Err(PollError::Api(e)) => Some(SyncIssue::Rejected {
            message: e.to_string(),
        }),
    };

    if let Some(issue) = issue {
        if !token.is_cancelled() {
            warn!("Lost track of job {}: {}", job_id, issue);
            if let Some(job) = store.set_sync_issue(&job_id, issue) {
                on_update(&job);
            }
        }
    }

    let mut pollers = lock_pollers(&pollers);
    if pollers.get(&job_id).map(|p| p.generation) == Some(generation) {
        pollers.remove(&job_id);
    }
}
