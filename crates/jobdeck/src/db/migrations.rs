//! Schema versioning for the job database.
//!
//! Applied versions are recorded in `_migrations`; each step runs in its own
//! transaction together with its bookkeeping row.

use rusqlite::Connection;

use super::error::DatabaseError;

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_jobs_table",
        sql: include_str!("sql/001_create_jobs.sql"),
    },
    Migration {
        version: 2,
        description: "index_jobs_by_status_and_backend_id",
        sql: include_str!("sql/002_index_jobs.sql"),
    },
];

/// Newest schema version this build knows about.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

/// Highest version recorded in `_migrations`, 0 for a fresh database.
pub fn schema_version(conn: &Connection) -> Result<u32, DatabaseError> {
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?)
}

/// Brings the job schema up to [`latest_version`]. Returns how many steps ran.
pub fn run_all(conn: &Connection) -> Result<usize, DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        );",
    )?;

    let current = schema_version(conn)?;
    if current > latest_version() {
        log::warn!(
            "Job database is at schema v{} but this build only knows v{}",
            current,
            latest_version()
        );
    }

    let mut applied = 0;
    for step in MIGRATIONS.iter().filter(|m| m.version > current) {
        log::info!("Job schema v{}: {}", step.version, step.description);

        let fail = |source| DatabaseError::Migration {
            version: step.version,
            description: step.description,
            source,
        };
        let tx = conn.unchecked_transaction().map_err(fail)?;
        tx.execute_batch(step.sql).map_err(fail)?;
        tx.execute(
            "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
            rusqlite::params![step.version, step.description],
        )
        .map_err(fail)?;
        tx.commit().map_err(fail)?;
        applied += 1;
    }

    Ok(applied)
}
