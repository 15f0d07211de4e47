//! Table-driven tests for the job store's update rules and persistence.

mod common;

use common::*;
use jobdeck::db::job_repo::{self, JobRow};
use jobdeck::db::Database;
use jobdeck::jobs::UpdateOutcome;
use jobdeck::{status_to_progress, JobStatus, JobStore, JobUpdate};

/// One update offered to a job that is already in `from`.
struct UpdateCase {
    name: &'static str,
    from: JobStatus,
    update: JobStatus,
    outcome: UpdateOutcome,
    final_status: JobStatus,
}

const UPDATE_CASES: &[UpdateCase] = &[
    UpdateCase {
        name: "forward_phase",
        from: JobStatus::Approved,
        update: JobStatus::RefactoringCode,
        outcome: UpdateOutcome::Applied,
        final_status: JobStatus::RefactoringCode,
    },
    UpdateCase {
        name: "late_earlier_phase",
        from: JobStatus::GroupingTests,
        update: JobStatus::RefactoringCode,
        outcome: UpdateOutcome::IgnoredStale,
        final_status: JobStatus::GroupingTests,
    },
    UpdateCase {
        name: "running_to_completed",
        from: JobStatus::CommittingToGithub,
        update: JobStatus::Completed,
        outcome: UpdateOutcome::Applied,
        final_status: JobStatus::Completed,
    },
    UpdateCase {
        name: "failure_from_any_phase",
        from: JobStatus::Pending,
        update: JobStatus::Failed,
        outcome: UpdateOutcome::Applied,
        final_status: JobStatus::Failed,
    },
    UpdateCase {
        name: "completed_then_running",
        from: JobStatus::Completed,
        update: JobStatus::RefactoringCode,
        outcome: UpdateOutcome::IgnoredTerminal,
        final_status: JobStatus::Completed,
    },
    UpdateCase {
        name: "completed_then_failed",
        from: JobStatus::Completed,
        update: JobStatus::Failed,
        outcome: UpdateOutcome::IgnoredTerminal,
        final_status: JobStatus::Completed,
    },
    UpdateCase {
        name: "rejected_then_approved",
        from: JobStatus::Rejected,
        update: JobStatus::Approved,
        outcome: UpdateOutcome::IgnoredTerminal,
        final_status: JobStatus::Rejected,
    },
];

#[test]
fn update_rules() {
    for case in UPDATE_CASES {
        let store = JobStore::new();
        let job = job_in("acme/widgets", case.from);
        let id = job.id.clone();
        store.upsert(job);

        let (outcome, job) = store
            .apply_update(&id, &JobUpdate::status(case.update))
            .unwrap_or_else(|| panic!("{}: job missing", case.name));

        assert_eq!(outcome, case.outcome, "{}", case.name);
        assert_eq!(job.status, case.final_status, "{}", case.name);
        assert_eq!(store.get(&id).unwrap(), job, "{}", case.name);
    }
}

#[test]
fn terminal_record_is_frozen() {
    let store = JobStore::new();
    let job = job_in("acme/widgets", JobStatus::RefactoringCode);
    let id = job.id.clone();
    store.upsert(job);

    let mut done = JobUpdate::status(JobStatus::Completed).with_progress(100);
    done.report = Some("All green".to_string());
    store.apply_update(&id, &done);
    let frozen = store.get(&id).unwrap();

    let mut late = JobUpdate::status(JobStatus::WritingUnitTests).with_progress(55);
    late.report = Some("Other report".to_string());
    late.message = Some("Writing tests".to_string());
    store.apply_update(&id, &late);
    store.apply_update(&id, &JobUpdate::status(JobStatus::Failed));
    let mut stale = job_in("acme/widgets", JobStatus::Pending);
    stale.id = id.clone();
    assert_eq!(store.upsert(stale), UpdateOutcome::IgnoredTerminal);

    let after = store.get(&id).unwrap();
    assert_eq!(after, frozen);
    assert_eq!(after.progress, 100);
    assert_eq!(after.report.as_deref(), Some("All green"));
}

#[test]
fn out_of_order_delivery_keeps_terminal_status() {
    let store = JobStore::new();
    let job = job_in("acme/widgets", JobStatus::Approved);
    let id = job.id.clone();
    store.upsert(job);

    // `completed` arrives before a stale `refactoring_code`.
    store.apply_update(&id, &JobUpdate::status(JobStatus::Completed));
    let (outcome, job) = store
        .apply_update(&id, &JobUpdate::status(JobStatus::RefactoringCode))
        .unwrap();

    assert_eq!(outcome, UpdateOutcome::IgnoredTerminal);
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);
}

#[test]
fn clear_terminal_removes_exactly_finished_jobs() {
    let store = JobStore::new();
    let mut kept = Vec::new();
    for status in JobStatus::ALL {
        let job = job_in("acme/widgets", status);
        if !status.is_terminal() {
            kept.push(job.id.clone());
        }
        store.upsert(job);
    }

    assert_eq!(store.clear_terminal(), JobStatus::TERMINAL.len());
    assert_eq!(store.clear_terminal(), 0);

    let mut remaining: Vec<String> = store.list().into_iter().map(|j| j.id).collect();
    remaining.sort();
    kept.sort();
    assert_eq!(remaining, kept);
    assert_eq!(store.counts().active, kept.len());
}

#[test]
fn progress_follows_phase_order() {
    let phases: Vec<JobStatus> = JobStatus::ALL
        .into_iter()
        .filter(|s| !s.is_terminal())
        .collect();
    for pair in phases.windows(2) {
        assert!(
            status_to_progress(pair[0].as_str()) < status_to_progress(pair[1].as_str()),
            "{} should be before {}",
            pair[0],
            pair[1]
        );
    }
    assert_eq!(status_to_progress("completed"), 100);
    assert_eq!(status_to_progress("failed"), 0);
    assert!(status_to_progress("pending") < status_to_progress("writing_unit_tests"));
}

#[test]
fn store_reloads_and_skips_malformed_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jobdeck.db");

    let (good, finished) = {
        let store = JobStore::with_database(Database::open(&path).unwrap()).unwrap();
        let good = job_in("acme/widgets", JobStatus::GroupingCommits);
        let finished = job_in("acme/gadgets", JobStatus::Completed);
        store.upsert(good.clone());
        store.upsert(finished.clone());
        (good, finished)
    };

    let db = Database::open(&path).unwrap();
    let mut broken = JobRow::from(&good);
    broken.id = "broken-status".to_string();
    broken.status = "exploded".to_string();
    job_repo::upsert(&db, &broken).unwrap();

    let mut bad_time = JobRow::from(&good);
    bad_time.id = "broken-time".to_string();
    bad_time.created_at = "yesterday".to_string();
    job_repo::upsert(&db, &bad_time).unwrap();

    let store = JobStore::with_database(db.clone()).unwrap();
    assert_eq!(store.len(), 2);
    assert_eq!(store.get(&good.id).unwrap(), good);
    assert_eq!(store.get(&finished.id).unwrap(), finished);
    assert!(store.get("broken-status").is_none());

    // Clearing removes the finished job from disk too.
    assert_eq!(store.clear_terminal(), 1);
    assert!(job_repo::find_by_id(&db, &finished.id).unwrap().is_none());
    assert!(job_repo::find_by_id(&db, &good.id).unwrap().is_some());
}
