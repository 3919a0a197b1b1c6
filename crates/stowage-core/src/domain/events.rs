//! BackupEvent - core が EventSink に流す構造化イベント
//!
//! プロセス全体のロガーは使わず、各コンポーネントは注入された EventSink に
//! イベントを渡すだけにする。

use serde::Serialize;

use super::ids::{JobId, RunId};
use super::job::JobState;
use super::remote_path::RemotePath;
use super::target::TargetName;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BackupEvent {
    RunStarted {
        run_id: RunId,
        jobs: usize,
        parallelism: usize,
    },
    JobStateChanged {
        job_id: JobId,
        target: TargetName,
        from: JobState,
        to: JobState,
    },
    ArtifactProduced {
        job_id: JobId,
        target: TargetName,
        file_name: String,
        bytes: u64,
    },
    ArtifactUploaded {
        job_id: JobId,
        target: TargetName,
        path: RemotePath,
    },
    RetentionEvaluated {
        job_id: JobId,
        target: TargetName,
        matched: usize,
        max_backups: usize,
        to_delete: usize,
    },
    ArtifactPruned {
        job_id: JobId,
        target: TargetName,
        path: RemotePath,
    },
    CleanupFailed {
        job_id: JobId,
        target: TargetName,
        path: RemotePath,
        error: String,
    },
    /// 今回 upload した artifact 自身が削除対象に入った。
    /// alternate prefix が primary より辞書順で後ろにあると起きる。
    UploadSelectedForPruning {
        job_id: JobId,
        target: TargetName,
        path: RemotePath,
    },
    JobFinished {
        job_id: JobId,
        target: TargetName,
        success: bool,
        error: Option<String>,
    },
    RunFinished {
        run_id: RunId,
        succeeded: usize,
        failed: usize,
    },
}

impl BackupEvent {
    /// Warnings and failures that should stand out in logs.
    pub fn is_problem(&self) -> bool {
        match self {
            BackupEvent::CleanupFailed { .. } => true,
            BackupEvent::UploadSelectedForPruning { .. } => true,
            BackupEvent::JobFinished { success, .. } => !success,
            BackupEvent::RunFinished { failed, .. } => *failed > 0,
            _ => false,
        }
    }
}
