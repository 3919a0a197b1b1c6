//! EventSink implementations.

use std::sync::{Mutex, PoisonError};

use crate::domain::BackupEvent;
use crate::ports::EventSink;

/// Renders events as `tracing` records.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: BackupEvent) {
        match event {
            BackupEvent::RunStarted {
                run_id,
                jobs,
                parallelism,
            } => tracing::info!(%run_id, jobs, parallelism, "backup run started"),
            BackupEvent::JobStateChanged {
                job_id,
                target,
                from,
                to,
            } => tracing::debug!(%job_id, %target, ?from, ?to, "job state changed"),
            BackupEvent::ArtifactProduced {
                job_id,
                target,
                file_name,
                bytes,
            } => tracing::info!(%job_id, %target, %file_name, bytes, "artifact produced"),
            BackupEvent::ArtifactUploaded {
                job_id,
                target,
                path,
            } => tracing::info!(%job_id, %target, %path, "artifact uploaded"),
            BackupEvent::RetentionEvaluated {
                job_id,
                target,
                matched,
                max_backups,
                to_delete,
            } => tracing::info!(
                %job_id,
                %target,
                matched,
                max_backups,
                to_delete,
                "retention evaluated"
            ),
            BackupEvent::ArtifactPruned {
                job_id,
                target,
                path,
            } => tracing::info!(%job_id, %target, %path, "old artifact deleted"),
            BackupEvent::CleanupFailed {
                job_id,
                target,
                path,
                error,
            } => tracing::warn!(%job_id, %target, %path, %error, "cleanup failed"),
            BackupEvent::UploadSelectedForPruning {
                job_id,
                target,
                path,
            } => tracing::warn!(
                %job_id,
                %target,
                %path,
                "fresh upload sorts oldest and is being pruned; check alternate prefixes"
            ),
            BackupEvent::JobFinished {
                job_id,
                target,
                success: true,
                ..
            } => tracing::info!(%job_id, %target, "backup succeeded"),
            BackupEvent::JobFinished {
                job_id,
                target,
                error,
                ..
            } => tracing::error!(
                %job_id,
                %target,
                error = error.as_deref().unwrap_or("unknown"),
                "backup failed"
            ),
            BackupEvent::RunFinished {
                run_id,
                succeeded,
                failed,
            } => tracing::info!(%run_id, succeeded, failed, "backup run finished"),
        }
    }
}

/// Keeps every event in memory (tests).
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<BackupEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<BackupEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn problems(&self) -> Vec<BackupEvent> {
        self.events().into_iter().filter(BackupEvent::is_problem).collect()
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: BackupEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
