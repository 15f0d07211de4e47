//! Job status taxonomy and progress mapping.
//!
//! The backend owns the real workflow; these are the phases the client can
//! observe, in canonical order:
//!
//! ```text
//! pending → pending_approval → approved → refactoring_code → grouping_commits
//!   → writing_unit_tests → grouping_tests → populating_data
//!   → committing_to_github → completed
//! ```
//!
//! with side exits to `failed` and `rejected` from any non-terminal phase.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned when a status string is not part of the taxonomy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown job status '{0}'")]
pub struct UnknownStatus(pub String);

/// Returned when an analysis type string is not recognised.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown analysis type '{0}'")]
pub struct UnknownAnalysisType(pub String);

/// Lifecycle phase of an analysis job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    PendingApproval,
    Approved,
    RefactoringCode,
    GroupingCommits,
    WritingUnitTests,
    GroupingTests,
    PopulatingData,
    CommittingToGithub,
    Completed,
    Failed,
    Rejected,
}

impl JobStatus {
    /// Every status, in canonical order (terminal states last).
    pub const ALL: [JobStatus; 12] = [
        JobStatus::Pending,
        JobStatus::PendingApproval,
        JobStatus::Approved,
        JobStatus::RefactoringCode,
        JobStatus::GroupingCommits,
        JobStatus::WritingUnitTests,
        JobStatus::GroupingTests,
        JobStatus::PopulatingData,
        JobStatus::CommittingToGithub,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Rejected,
    ];

    /// Terminal statuses. No transition leaves these.
    pub const TERMINAL: [JobStatus; 3] =
        [JobStatus::Completed, JobStatus::Failed, JobStatus::Rejected];

    /// Wire name, as used by the backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::PendingApproval => "pending_approval",
            JobStatus::Approved => "approved",
            JobStatus::RefactoringCode => "refactoring_code",
            JobStatus::GroupingCommits => "grouping_commits",
            JobStatus::WritingUnitTests => "writing_unit_tests",
            JobStatus::GroupingTests => "grouping_tests",
            JobStatus::PopulatingData => "populating_data",
            JobStatus::CommittingToGithub => "committing_to_github",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Rejected => "rejected",
        }
    }

    /// Human-readable label for display.
    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Pending => "Pending",
            JobStatus::PendingApproval => "Awaiting approval",
            JobStatus::Approved => "Approved",
            JobStatus::RefactoringCode => "Refactoring code",
            JobStatus::GroupingCommits => "Grouping commits",
            JobStatus::WritingUnitTests => "Writing unit tests",
            JobStatus::GroupingTests => "Grouping tests",
            JobStatus::PopulatingData => "Populating data",
            JobStatus::CommittingToGithub => "Committing to GitHub",
            JobStatus::Completed => "Completed",
            JobStatus::Failed => "Failed",
            JobStatus::Rejected => "Rejected",
        }
    }

    /// Nominal progress percentage for this phase.
    ///
    /// `failed` and `rejected` map to 0. The job store keeps the last known
    /// progress for those instead of using this value.
    pub fn progress(&self) -> u8 {
        match self {
            JobStatus::Pending => 5,
            JobStatus::PendingApproval => 10,
            JobStatus::Approved => 20,
            JobStatus::RefactoringCode => 30,
            JobStatus::GroupingCommits => 45,
            JobStatus::WritingUnitTests => 55,
            JobStatus::GroupingTests => 70,
            JobStatus::PopulatingData => 80,
            JobStatus::CommittingToGithub => 90,
            JobStatus::Completed => 100,
            JobStatus::Failed | JobStatus::Rejected => 0,
        }
    }

    /// Position in the canonical phase order. Terminal states rank after
    /// every working phase.
    pub fn rank(&self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::PendingApproval => 1,
            JobStatus::Approved => 2,
            JobStatus::RefactoringCode => 3,
            JobStatus::GroupingCommits => 4,
            JobStatus::WritingUnitTests => 5,
            JobStatus::GroupingTests => 6,
            JobStatus::PopulatingData => 7,
            JobStatus::CommittingToGithub => 8,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Rejected => 9,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Rejected
        )
    }

    /// True for the two unsuccessful terminal states.
    pub fn is_unsuccessful(&self) -> bool {
        matches!(self, JobStatus::Failed | JobStatus::Rejected)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Maps a raw status string to a progress percentage.
///
/// Total over all strings: anything outside the taxonomy maps to 0.
pub fn status_to_progress(status: &str) -> u8 {
    status
        .parse::<JobStatus>()
        .map(|s| s.progress())
        .unwrap_or(0)
}

/// Maps a raw status string to a display label.
///
/// Total over all strings: anything outside the taxonomy is echoed back.
pub fn status_to_label(status: &str) -> String {
    match status.parse::<JobStatus>() {
        Ok(s) => s.label().to_string(),
        Err(_) => status.to_string(),
    }
}

/// Kind of analysis the backend is asked to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    Design,
    UnitTestReport,
    Refactor,
    WriteTests,
    SecurityAudit,
    Pentest,
    Documentation,
    Terraform,
}

impl AnalysisType {
    pub const ALL: [AnalysisType; 8] = [
        AnalysisType::Design,
        AnalysisType::UnitTestReport,
        AnalysisType::Refactor,
        AnalysisType::WriteTests,
        AnalysisType::SecurityAudit,
        AnalysisType::Pentest,
        AnalysisType::Documentation,
        AnalysisType::Terraform,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::Design => "design",
            AnalysisType::UnitTestReport => "unit_test_report",
            AnalysisType::Refactor => "refactor",
            AnalysisType::WriteTests => "write_tests",
            AnalysisType::SecurityAudit => "security_audit",
            AnalysisType::Pentest => "pentest",
            AnalysisType::Documentation => "documentation",
            AnalysisType::Terraform => "terraform",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AnalysisType::Design => "Design review",
            AnalysisType::UnitTestReport => "Unit test report",
            AnalysisType::Refactor => "Refactor",
            AnalysisType::WriteTests => "Write unit tests",
            AnalysisType::SecurityAudit => "Security audit",
            AnalysisType::Pentest => "Penetration test",
            AnalysisType::Documentation => "Documentation",
            AnalysisType::Terraform => "Terraform review",
        }
    }
}

impl std::fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisType {
    type Err = UnknownAnalysisType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AnalysisType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownAnalysisType(s.to_string()))
    }
}
