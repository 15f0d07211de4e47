//! Job event broadcaster for reactive UI updates.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::jobs::Job;

/// What happened to the job store.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum JobEventKind {
    /// A job was created or changed. Carries the record after the change.
    Updated { job: Box<Job> },
    /// A job was deleted.
    #[serde(rename_all = "camelCase")]
    Removed { job_id: String },
    /// Terminal jobs were cleared in bulk.
    Cleared { count: usize },
}

/// A store change, stamped with when it was published.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    #[serde(flatten)]
    pub kind: JobEventKind,
    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    pub fn updated(job: &Job) -> Self {
        Self::now(JobEventKind::Updated {
            job: Box::new(job.clone()),
        })
    }

    pub fn removed(job_id: &str) -> Self {
        Self::now(JobEventKind::Removed {
            job_id: job_id.to_string(),
        })
    }

    pub fn cleared(count: usize) -> Self {
        Self::now(JobEventKind::Cleared { count })
    }

    fn now(kind: JobEventKind) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
        }
    }

    /// The job id this event concerns, if it is about a single job.
    pub fn job_id(&self) -> Option<&str> {
        match &self.kind {
            JobEventKind::Updated { job } => Some(&job.id),
            JobEventKind::Removed { job_id } => Some(job_id),
            JobEventKind::Cleared { .. } => None,
        }
    }
}

/// Broadcasts job store changes to any number of subscribers.
#[derive(Clone)]
pub struct JobEventBroadcaster {
    sender: Arc<broadcast::Sender<JobEvent>>,
}

impl JobEventBroadcaster {
    /// Creates a new broadcaster with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Sends an event to all subscribers.
    pub fn send(&self, event: JobEvent) {
        // No active receivers is fine
        let _ = self.sender.send(event);
    }

    /// Creates a new subscriber.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for JobEventBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}
