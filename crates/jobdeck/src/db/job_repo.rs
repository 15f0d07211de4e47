//! CRUD operations for the `jobs` table.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw job row from the database. Timestamps are RFC 3339 text.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRow {
    pub id: String,
    pub backend_job_id: Option<String>,
    pub repository: String,
    pub branch: Option<String>,
    pub analysis_type: String,
    pub status: String,
    pub progress: i64,
    pub message: String,
    pub report: Option<String>,
    pub initial_report: Option<String>,
    pub error: Option<String>,
    /// JSON-encoded `SyncIssue`.
    pub sync_issue: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            backend_job_id: row.get("backend_job_id")?,
            repository: row.get("repository")?,
            branch: row.get("branch")?,
            analysis_type: row.get("analysis_type")?,
            status: row.get("status")?,
            progress: row.get("progress")?,
            message: row.get("message")?,
            report: row.get("report")?,
            initial_report: row.get("initial_report")?,
            error: row.get("error")?,
            sync_issue: row.get("sync_issue")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            completed_at: row.get("completed_at")?,
        })
    }
}

/// Inserts a job row or overwrites every column of an existing one.
pub fn upsert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (id, backend_job_id, repository, branch, analysis_type, status,
             progress, message, report, initial_report, error, sync_issue, created_at,
             updated_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
             ON CONFLICT(id) DO UPDATE SET
                backend_job_id=excluded.backend_job_id, status=excluded.status,
                progress=excluded.progress, message=excluded.message, report=excluded.report,
                initial_report=excluded.initial_report, error=excluded.error,
                sync_issue=excluded.sync_issue, updated_at=excluded.updated_at,
                completed_at=excluded.completed_at",
            params![
                job.id,
                job.backend_job_id,
                job.repository,
                job.branch,
                job.analysis_type,
                job.status,
                job.progress,
                job.message,
                job.report,
                job.initial_report,
                job.error,
                job.sync_issue,
                job.created_at,
                job.updated_at,
                job.completed_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM jobs WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], JobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Returns every row, newest first.
///
/// Rows that fail to decode at the SQLite level are dropped with a warning
/// so one bad record cannot hide the rest.
pub fn all(db: &Database) -> Result<Vec<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM jobs ORDER BY created_at DESC")?;
        let rows = stmt
            .query_map([], JobRow::from_row)?
            .filter_map(|row| match row {
                Ok(row) => Some(row),
                Err(e) => {
                    log::warn!("Skipping unreadable job row: {}", e);
                    None
                }
            })
            .collect();
        Ok(rows)
    })
}

/// Deletes a job. Returns whether a row was removed.
pub fn delete(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute("DELETE FROM jobs WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    })
}

/// Deletes every job whose status is one of `statuses`. Returns the count.
pub fn delete_by_statuses(db: &Database, statuses: &[&str]) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let mut removed = 0;
        for status in statuses {
            removed += conn.execute("DELETE FROM jobs WHERE status = ?1", params![status])?;
        }
        Ok(removed)
    })
}
