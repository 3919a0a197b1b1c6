//! BackupJob - 1 つの target のバックアップ
//!
//! # フロー（artifact 系列ごと）
//! 1. Producer::produce() で local artifact を作る（失敗したらここで終了）
//! 2. ArtifactStore::upload_ensuring_path() で destination を作りつつ upload
//! 3. list → RetentionPolicy → delete（失敗はイベントに記録するだけ）
//!
//! secondary（付随する database）があれば primary の後に同じ流れを繰り返す。
//! secondary の失敗は Job 全体の失敗として扱う。

use std::sync::Arc;

use async_trait::async_trait;

use super::registry::ProducerRegistry;
use super::scheduler::Job;
use crate::domain::{
    ArtifactSpec, BackupError, BackupEvent, JobId, JobState, ProducerError, RemotePath,
    StoreError, Target, TargetName,
};
use crate::ports::{ArtifactStore, EventSink};

/// Collaborators shared by every job of a run.
#[derive(Clone)]
pub struct JobContext {
    pub store: Arc<dyn ArtifactStore>,
    pub producers: Arc<ProducerRegistry>,
    pub events: Arc<dyn EventSink>,
}

pub struct BackupJob {
    id: JobId,
    target: Target,
    ctx: JobContext,
}

impl BackupJob {
    pub fn new(id: JobId, target: Target, ctx: JobContext) -> Self {
        Self { id, target, ctx }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn spec(&self) -> &Target {
        &self.target
    }

    async fn back_up(
        &self,
        spec: &ArtifactSpec,
        state: &mut StateTracker<'_>,
    ) -> Result<(), BackupError> {
        state.advance(JobState::Producing);
        let producer_failure = |source: ProducerError| BackupError::Producer {
            target: spec.name.to_string(),
            source,
        };

        let kind = spec.source.kind();
        let producer = self.ctx.producers.get(kind).ok_or_else(|| {
            producer_failure(ProducerError::Other(format!(
                "no producer registered for {kind} targets"
            )))
        })?;

        // TempDir の drop で local artifact も消える
        let workdir = tempfile::Builder::new()
            .prefix("stowage-")
            .tempdir()
            .map_err(|e| producer_failure(e.into()))?;
        let local = producer
            .produce(spec, workdir.path())
            .await
            .map_err(producer_failure)?;

        let bytes = tokio::fs::metadata(&local)
            .await
            .map(|m| m.len())
            .unwrap_or_default();
        self.ctx.events.emit(BackupEvent::ArtifactProduced {
            job_id: self.id,
            target: spec.name.clone(),
            file_name: local
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            bytes,
        });

        state.advance(JobState::Uploading);
        let remote = self
            .ctx
            .store
            .upload_ensuring_path(&local, &spec.destination)
            .await
            .map_err(|e| BackupError::transport("upload", spec.destination.as_str(), e))?;
        self.ctx.events.emit(BackupEvent::ArtifactUploaded {
            job_id: self.id,
            target: spec.name.clone(),
            path: remote.clone(),
        });

        state.advance(JobState::CleaningUp);
        self.prune(spec, &remote).await;
        Ok(())
    }

    /// Best-effort retention. The new artifact is already on the store, so
    /// nothing here fails the job.
    async fn prune(&self, spec: &ArtifactSpec, uploaded: &RemotePath) {
        let names = match self.ctx.store.list(&spec.destination).await {
            Ok(names) => names,
            Err(err) => {
                self.cleanup_failed(spec, spec.destination.clone(), err);
                return;
            }
        };

        let policy = spec.retention();
        let doomed = policy.select_for_deletion(&names);
        self.ctx.events.emit(BackupEvent::RetentionEvaluated {
            job_id: self.id,
            target: spec.name.clone(),
            matched: policy.matched(names.iter().map(String::as_str)).len(),
            max_backups: policy.max_backups().get(),
            to_delete: doomed.len(),
        });
        if doomed.iter().any(|name| name == uploaded.name()) {
            self.ctx.events.emit(BackupEvent::UploadSelectedForPruning {
                job_id: self.id,
                target: spec.name.clone(),
                path: uploaded.clone(),
            });
        }

        for name in doomed {
            let path = spec.destination.file(&name);
            match self.ctx.store.delete(&path).await {
                Ok(()) => self.ctx.events.emit(BackupEvent::ArtifactPruned {
                    job_id: self.id,
                    target: spec.name.clone(),
                    path,
                }),
                Err(err) => self.cleanup_failed(spec, path, err),
            }
        }
    }

    fn cleanup_failed(&self, spec: &ArtifactSpec, path: RemotePath, source: StoreError) {
        let error = BackupError::Cleanup {
            path: path.to_string(),
            source,
        };
        self.ctx.events.emit(BackupEvent::CleanupFailed {
            job_id: self.id,
            target: spec.name.clone(),
            path,
            error: error.to_string(),
        });
    }
}

#[async_trait]
impl Job for BackupJob {
    fn target(&self) -> &TargetName {
        &self.target.name
    }

    async fn execute(&self) -> Result<(), BackupError> {
        let mut state = StateTracker::new(self.id, &self.target.name, self.ctx.events.as_ref());

        let mut outcome = self.back_up(&self.target.primary, &mut state).await;
        if outcome.is_ok()
            && let Some(secondary) = &self.target.secondary
        {
            outcome = self.back_up(secondary, &mut state).await;
        }

        let error = outcome.as_ref().err().map(ToString::to_string);
        state.advance(if outcome.is_ok() {
            JobState::Succeeded
        } else {
            JobState::Failed
        });
        self.ctx.events.emit(BackupEvent::JobFinished {
            job_id: self.id,
            target: self.target.name.clone(),
            success: outcome.is_ok(),
            error,
        });
        outcome
    }
}

/// Tracks the job state and reports every transition.
struct StateTracker<'a> {
    job_id: JobId,
    target: &'a TargetName,
    events: &'a dyn EventSink,
    current: JobState,
}

impl<'a> StateTracker<'a> {
    fn new(job_id: JobId, target: &'a TargetName, events: &'a dyn EventSink) -> Self {
        Self {
            job_id,
            target,
            events,
            current: JobState::Pending,
        }
    }

    fn advance(&mut self, next: JobState) {
        debug_assert!(
            self.current.can_transition_to(next),
            "invalid job transition {:?} -> {:?}",
            self.current,
            next
        );
        self.events.emit(BackupEvent::JobStateChanged {
            job_id: self.job_id,
            target: self.target.clone(),
            from: self.current,
            to: next,
        });
        self.current = next;
    }
}
