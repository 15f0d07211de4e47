//! Local job store: in-memory map with write-through SQLite persistence.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::broadcast::{JobEvent, JobEventBroadcaster};
use crate::db::job_repo::{self, JobRow};
use crate::db::{Database, DatabaseError};
use crate::jobs::job::{Job, JobUpdate, SyncIssue, UpdateOutcome};
use crate::jobs::status::{JobStatus, UnknownAnalysisType, UnknownStatus};

// ─── Row conversion ─────────────────────────────────────────────────────────

/// Why a persisted row could not be turned back into a `Job`.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("invalid {field} timestamp '{value}': {source}")]
    Timestamp {
        field: &'static str,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error(transparent)]
    Status(#[from] UnknownStatus),

    #[error(transparent)]
    AnalysisType(#[from] UnknownAnalysisType),

    #[error("progress {0} out of range")]
    Progress(i64),

    #[error("invalid sync issue: {0}")]
    SyncIssue(#[from] serde_json::Error),
}

fn parse_timestamp(field: &'static str, value: &str) -> Result<DateTime<Utc>, RecordError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|source| RecordError::Timestamp {
            field,
            value: value.to_string(),
            source,
        })
}

fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

impl TryFrom<&JobRow> for Job {
    type Error = RecordError;

    fn try_from(row: &JobRow) -> Result<Self, Self::Error> {
        let progress = u8::try_from(row.progress)
            .ok()
            .filter(|p| *p <= 100)
            .ok_or(RecordError::Progress(row.progress))?;
        let sync_issue = row
            .sync_issue
            .as_deref()
            .map(serde_json::from_str::<SyncIssue>)
            .transpose()?;
        let completed_at = row
            .completed_at
            .as_deref()
            .map(|s| parse_timestamp("completed_at", s))
            .transpose()?;

        Ok(Self {
            id: row.id.clone(),
            backend_job_id: row.backend_job_id.clone(),
            repository: row.repository.clone(),
            branch: row.branch.clone(),
            analysis_type: row.analysis_type.parse()?,
            status: row.status.parse()?,
            progress,
            message: row.message.clone(),
            report: row.report.clone(),
            initial_report: row.initial_report.clone(),
            error: row.error.clone(),
            sync_issue,
            created_at: parse_timestamp("created_at", &row.created_at)?,
            updated_at: parse_timestamp("updated_at", &row.updated_at)?,
            completed_at,
        })
    }
}

impl From<&Job> for JobRow {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            backend_job_id: job.backend_job_id.clone(),
            repository: job.repository.clone(),
            branch: job.branch.clone(),
            analysis_type: job.analysis_type.as_str().to_string(),
            status: job.status.as_str().to_string(),
            progress: i64::from(job.progress),
            message: job.message.clone(),
            report: job.report.clone(),
            initial_report: job.initial_report.clone(),
            error: job.error.clone(),
            sync_issue: job
                .sync_issue
                .as_ref()
                .and_then(|issue| serde_json::to_string(issue).ok()),
            created_at: format_timestamp(job.created_at),
            updated_at: format_timestamp(job.updated_at),
            completed_at: job.completed_at.map(format_timestamp),
        }
    }
}

// ─── Views ──────────────────────────────────────────────────────────────────

/// Job counts by lifecycle partition.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCounts {
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
    pub rejected: usize,
}

impl JobCounts {
    pub fn total(&self) -> usize {
        self.active + self.completed + self.failed + self.rejected
    }
}

// ─── JobStore ───────────────────────────────────────────────────────────────

/// Authoritative client-side map from job id to last known job record.
///
/// Every read-modify-write happens under a single write lock, so concurrent
/// pollers cannot interleave between the terminal-state check and the write.
pub struct JobStore {
    db: Option<Database>,
    events: Option<JobEventBroadcaster>,
    cache: RwLock<HashMap<String, Job>>,
}

impl JobStore {
    /// Creates an empty, memory-only store.
    pub fn new() -> Self {
        Self {
            db: None,
            events: None,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a store backed by `db` and loads every readable record.
    ///
    /// Malformed records are skipped with a warning.
    pub fn with_database(db: Database) -> Result<Self, DatabaseError> {
        let rows = job_repo::all(&db)?;

        let mut cache = HashMap::with_capacity(rows.len());
        let mut skipped = 0;
        for row in &rows {
            match Job::try_from(row) {
                Ok(job) => {
                    cache.insert(job.id.clone(), job);
                }
                Err(e) => {
                    skipped += 1;
                    log::warn!("Skipping malformed stored job {}: {}", row.id, e);
                }
            }
        }

        log::info!(
            "Loaded {} jobs from database ({} skipped)",
            cache.len(),
            skipped
        );

        Ok(Self {
            db: Some(db),
            events: None,
            cache: RwLock::new(cache),
        })
    }

    /// Publishes every applied change on `events`.
    pub fn with_events(mut self, events: JobEventBroadcaster) -> Self {
        self.events = Some(events);
        self
    }

    fn read_cache(&self) -> RwLockReadGuard<'_, HashMap<String, Job>> {
        match self.cache.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store cache lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_cache(&self) -> RwLockWriteGuard<'_, HashMap<String, Job>> {
        match self.cache.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store cache lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn persist(&self, job: &Job) {
        if let Some(ref db) = self.db {
            if let Err(e) = job_repo::upsert(db, &JobRow::from(job)) {
                log::error!("Failed to persist job {}: {}", job.id, e);
            }
        }
    }

    fn publish(&self, event: JobEvent) {
        if let Some(ref events) = self.events {
            events.send(event);
        }
    }

    /// Records the job after an applied change: persist, then notify.
    fn commit(&self, job: &Job) {
        self.persist(job);
        self.publish(JobEvent::updated(job));
    }

    // ─── Mutations ──────────────────────────────────────────────────────────

    /// Inserts `job`, or merges it into the existing record with the same id.
    ///
    /// A terminal record is never overwritten.
    pub fn upsert(&self, job: Job) -> UpdateOutcome {
        let mut cache = self.write_cache();

        let (outcome, snapshot) = match cache.get_mut(&job.id) {
            Some(existing) => {
                let outcome = existing.merge(&job);
                (outcome, existing.clone())
            }
            None => {
                let snapshot = job.clone();
                cache.insert(job.id.clone(), job);
                (UpdateOutcome::Applied, snapshot)
            }
        };

        if outcome.is_applied() {
            self.commit(&snapshot);
        } else {
            log::debug!("Dropped {:?} record for job {}", outcome, snapshot.id);
        }
        outcome
    }

    /// Applies a status update to the job `id`.
    ///
    /// Returns `None` when the job is not in the store.
    pub fn apply_update(&self, id: &str, update: &JobUpdate) -> Option<(UpdateOutcome, Job)> {
        let mut cache = self.write_cache();
        let job = cache.get_mut(id)?;

        let outcome = job.apply_update(update);
        let snapshot = job.clone();

        if outcome.is_applied() {
            self.commit(&snapshot);
        } else {
            log::debug!(
                "Dropped {:?} update ({:?}) for job {} in status {}",
                outcome,
                update.status,
                id,
                snapshot.status
            );
        }
        Some((outcome, snapshot))
    }

    /// Records the backend id for a job. Written at most once.
    pub fn set_backend_job_id(&self, id: &str, backend_job_id: &str) -> Option<Job> {
        let mut cache = self.write_cache();
        let job = cache.get_mut(id)?;

        if job.backend_job_id.is_none() {
            job.backend_job_id = Some(backend_job_id.to_string());
            job.updated_at = Utc::now();
            let snapshot = job.clone();
            self.commit(&snapshot);
        }
        Some(job.clone())
    }

    /// Stores the report returned by the start request. Written at most once.
    pub fn set_initial_report(&self, id: &str, report: &str) -> Option<Job> {
        let mut cache = self.write_cache();
        let job = cache.get_mut(id)?;

        if job.initial_report.is_none() {
            job.initial_report = Some(report.to_string());
            job.updated_at = Utc::now();
            let snapshot = job.clone();
            self.commit(&snapshot);
        }
        Some(job.clone())
    }

    /// Marks that polling for a job gave up. Leaves terminal jobs alone.
    pub fn set_sync_issue(&self, id: &str, issue: SyncIssue) -> Option<Job> {
        let mut cache = self.write_cache();
        let job = cache.get_mut(id)?;

        if !job.is_finished() {
            job.sync_issue = Some(issue);
            job.updated_at = Utc::now();
            let snapshot = job.clone();
            self.commit(&snapshot);
        }
        Some(job.clone())
    }

    /// Deletes a job. Removing an absent id is a no-op.
    pub fn remove(&self, id: &str) -> bool {
        let removed = self.write_cache().remove(id).is_some();

        if let Some(ref db) = self.db {
            if let Err(e) = job_repo::delete(db, id) {
                log::error!("Failed to delete job {} from database: {}", id, e);
            }
        }

        if removed {
            self.publish(JobEvent::removed(id));
        }
        removed
    }

    /// Removes every job in a terminal status. Returns how many were removed.
    pub fn clear_terminal(&self) -> usize {
        let removed = {
            let mut cache = self.write_cache();
            let before = cache.len();
            cache.retain(|_, job| !job.is_finished());
            before - cache.len()
        };

        if let Some(ref db) = self.db {
            let statuses: Vec<&str> = JobStatus::TERMINAL.iter().map(|s| s.as_str()).collect();
            if let Err(e) = job_repo::delete_by_statuses(db, &statuses) {
                log::error!("Failed to clear finished jobs from database: {}", e);
            }
        }

        if removed > 0 {
            log::info!("Cleared {} finished jobs", removed);
            self.publish(JobEvent::cleared(removed));
        }
        removed
    }

    // ─── Read views ─────────────────────────────────────────────────────────

    pub fn get(&self, id: &str) -> Option<Job> {
        self.read_cache().get(id).cloned()
    }

    pub fn find_by_backend_id(&self, backend_job_id: &str) -> Option<Job> {
        self.read_cache()
            .values()
            .find(|job| job.backend_job_id.as_deref() == Some(backend_job_id))
            .cloned()
    }

    /// All jobs, newest first.
    pub fn list(&self) -> Vec<Job> {
        self.collect(|_| true)
    }

    pub fn by_status(&self, status: JobStatus) -> Vec<Job> {
        self.collect(|job| job.status == status)
    }

    /// Jobs that are still running.
    pub fn active(&self) -> Vec<Job> {
        self.collect(|job| !job.is_finished())
    }

    /// Jobs in a terminal status.
    pub fn terminal(&self) -> Vec<Job> {
        self.collect(|job| job.is_finished())
    }

    pub fn counts(&self) -> JobCounts {
        let mut counts = JobCounts::default();
        for job in self.read_cache().values() {
            match job.status {
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
                JobStatus::Rejected => counts.rejected += 1,
                _ => counts.active += 1,
            }
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.read_cache().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn collect<F>(&self, predicate: F) -> Vec<Job>
    where
        F: Fn(&Job) -> bool,
    {
        let mut jobs: Vec<Job> = self
            .read_cache()
            .values()
            .filter(|job| predicate(job))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}
