//! Job state and result.

use serde::{Deserialize, Serialize};

use super::errors::{BackupError, ErrorKind};
use super::target::TargetName;

/// State of one backup job.
///
/// `Pending → Producing → Uploading → CleaningUp → {Succeeded, Failed}`.
/// A target with a secondary artifact goes `CleaningUp → Producing` once more.
/// Cleanup problems never move a job to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Producing,
    Uploading,
    CleaningUp,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Pending, Producing)
                | (Producing, Uploading)
                | (Producing, Failed)
                | (Uploading, CleaningUp)
                | (Uploading, Failed)
                | (CleaningUp, Producing)
                | (CleaningUp, Succeeded)
        )
    }
}

/// Outcome of one job, collected by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub target: TargetName,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl JobResult {
    pub fn succeeded(target: TargetName) -> Self {
        Self {
            target,
            success: true,
            error: None,
            error_kind: None,
        }
    }

    pub fn failed(target: TargetName, error: &BackupError) -> Self {
        Self {
            target,
            success: false,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
        }
    }

    /// Failure that did not come from a `BackupError` (e.g. a panicking job).
    pub fn aborted(target: TargetName, reason: impl Into<String>) -> Self {
        Self {
            target,
            success: false,
            error: Some(reason.into()),
            error_kind: None,
        }
    }
}
