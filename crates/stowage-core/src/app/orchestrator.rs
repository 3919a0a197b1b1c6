//! Orchestrator - target 集合から Job を作り、Scheduler に渡して集計する
//!
//! # フロー
//! 1. TargetFilter で絞り込み（選択が空なら ConfigurationFailure）
//! 2. 選ばれた target の種類すべてに Producer があるか検証
//! 3. target ごとに BackupJob を 1 つ作る
//! 4. Scheduler::run() → RunReport
//!
//! 2 までで失敗した場合は Job を 1 つも開始しない。

use std::sync::Arc;

use super::filter::TargetFilter;
use super::job::{BackupJob, JobContext};
use super::scheduler::Scheduler;
use super::status::RunReport;
use crate::domain::{BackupEvent, ConfigError, Target};
use crate::ports::IdGenerator;

pub struct Orchestrator {
    ctx: JobContext,
    ids: Arc<dyn IdGenerator>,
    scheduler: Scheduler,
}

impl Orchestrator {
    pub(crate) fn new(ctx: JobContext, ids: Arc<dyn IdGenerator>, scheduler: Scheduler) -> Self {
        Self {
            ctx,
            ids,
            scheduler,
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Build one job per selected target without running anything.
    pub fn plan(
        &self,
        targets: &[Target],
        filter: &TargetFilter,
    ) -> Result<Vec<BackupJob>, ConfigError> {
        let selected = filter.select(targets)?;

        for kind in selected.iter().flat_map(|t| t.kinds()) {
            if !self.ctx.producers.contains(kind) {
                return Err(ConfigError::MissingProducer(kind));
            }
        }

        Ok(selected
            .into_iter()
            .map(|target| {
                BackupJob::new(self.ids.generate_job_id(), target.clone(), self.ctx.clone())
            })
            .collect())
    }

    /// Back up every selected target.
    ///
    /// Only configuration problems surface as `Err`; job failures are in
    /// the report.
    pub async fn run(
        &self,
        targets: &[Target],
        filter: &TargetFilter,
    ) -> Result<RunReport, ConfigError> {
        let jobs = self.plan(targets, filter)?;
        let run_id = self.ids.generate_run_id();

        self.ctx.events.emit(BackupEvent::RunStarted {
            run_id,
            jobs: jobs.len(),
            parallelism: self.scheduler.effective_parallelism(jobs.len()),
        });

        let results = self.scheduler.run(jobs).await;
        let report = RunReport::new(run_id, results);

        self.ctx.events.emit(BackupEvent::RunFinished {
            run_id,
            succeeded: report.succeeded,
            failed: report.failed,
        });
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::builder::OrchestratorBuilder;
    use crate::domain::{
        ArtifactSpec, DatabaseEngine, DatabaseSource, DatasetSource, RemotePath, Source,
        SourceKind, TargetName, DEFAULT_MAX_BACKUPS,
    };
    use crate::impls::memory_store::InMemoryStore;
    use crate::impls::scripted::ScriptedProducer;
    use crate::impls::tracing_sink::RecordingEventSink;
    use crate::ports::{FixedClock, Producer};
    use chrono::{TimeZone, Utc};

    fn dataset(name: &str) -> Target {
        let name = TargetName::new(name);
        Target {
            group: name.owner().map(str::to_string),
            primary: ArtifactSpec {
                name: name.clone(),
                prefix: name.short_name().to_string(),
                alternate_prefixes: vec![],
                source: Source::Dataset(DatasetSource {
                    repo: name.to_string(),
                    token: None,
                    repo_type: None,
                }),
                destination: RemotePath::dir(&format!("/backup/{}", name.short_name())),
                max_backups: DEFAULT_MAX_BACKUPS,
            },
            secondary: None,
            name,
        }
    }

    fn sqlite(name: &str) -> Target {
        let name = TargetName::new(name);
        Target {
            group: Some("sqlite".to_string()),
            primary: ArtifactSpec {
                name: name.clone(),
                prefix: name.to_string(),
                alternate_prefixes: vec![],
                source: Source::Database(DatabaseSource {
                    engine: DatabaseEngine::Sqlite,
                    name: name.to_string(),
                    user: None,
                    password: None,
                    host: None,
                    port: None,
                    file: Some("/tmp/app.db".into()),
                    custom_cmd: None,
                    ssl_mode: None,
                }),
                destination: RemotePath::dir("/backup/sqlite"),
                max_backups: DEFAULT_MAX_BACKUPS,
            },
            secondary: None,
            name,
        }
    }

    fn orchestrator(
        kinds: &[SourceKind],
    ) -> (Orchestrator, Arc<InMemoryStore>, Arc<RecordingEventSink>) {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 3, 0, 0).unwrap()));
        let store = Arc::new(InMemoryStore::new());
        let events = Arc::new(RecordingEventSink::new());
        let producer: Arc<dyn Producer> = Arc::new(ScriptedProducer::new(clock.clone()));

        let mut builder = OrchestratorBuilder::new()
            .store(store.clone())
            .events(events.clone())
            .clock(clock);
        for &kind in kinds {
            builder = builder.producer(kind, producer.clone()).unwrap();
        }
        (builder.build().unwrap(), store, events)
    }

    #[tokio::test]
    async fn empty_target_list_runs_nothing() {
        let (orchestrator, store, events) = orchestrator(&[SourceKind::Dataset]);

        let report = orchestrator.run(&[], &TargetFilter::all()).await.unwrap();

        assert_eq!(report.total, 0);
        assert!(report.is_success());
        assert!(store.calls().is_empty());
        assert!(matches!(
            events.events().first(),
            Some(BackupEvent::RunStarted { jobs: 0, parallelism: 0, .. })
        ));
    }

    #[tokio::test]
    async fn plan_builds_one_job_per_selected_target() {
        let (orchestrator, _, _) = orchestrator(&[SourceKind::Dataset]);
        let targets = vec![dataset("alice/notes"), dataset("alice/chat"), dataset("bob/notes")];

        let jobs = orchestrator
            .plan(&targets, &TargetFilter::all().target("notes"))
            .unwrap();

        let names: Vec<&str> = jobs.iter().map(|j| j.spec().name.as_str()).collect();
        assert_eq!(names, vec!["alice/notes", "bob/notes"]);
        assert_ne!(jobs[0].id(), jobs[1].id());
    }

    #[tokio::test]
    async fn unmatched_selector_starts_no_job() {
        let (orchestrator, store, events) = orchestrator(&[SourceKind::Dataset]);
        let targets = vec![dataset("alice/notes")];

        let err = orchestrator
            .run(&targets, &TargetFilter::all().target("nope"))
            .await
            .unwrap_err();

        assert!(matches!(err, ConfigError::NoMatch(_)));
        assert!(store.calls().is_empty());
        assert!(events.events().is_empty());
    }

    #[tokio::test]
    async fn missing_producer_is_configuration_error() {
        let (orchestrator, store, _) = orchestrator(&[SourceKind::Dataset]);
        let targets = vec![dataset("alice/notes"), sqlite("shop")];

        let err = orchestrator.run(&targets, &TargetFilter::all()).await.unwrap_err();
        assert!(matches!(err, ConfigError::MissingProducer(SourceKind::Database)));
        assert!(store.calls().is_empty());

        // database を除外すれば実行できる
        let report = orchestrator
            .run(&targets, &TargetFilter::all().kind(SourceKind::Dataset))
            .await
            .unwrap();
        assert_eq!(report.total, 1);
        assert!(report.is_success());
    }

    #[tokio::test]
    async fn run_reports_counts_and_brackets_events() {
        let (orchestrator, _, events) = orchestrator(&[SourceKind::Dataset, SourceKind::Database]);
        let targets = vec![dataset("alice/notes"), sqlite("shop")];

        let report = orchestrator.run(&targets, &TargetFilter::all()).await.unwrap();

        assert_eq!((report.total, report.succeeded, report.failed), (2, 2, 0));
        let events = events.events();
        assert!(matches!(events.first(), Some(BackupEvent::RunStarted { jobs: 2, .. })));
        assert!(matches!(
            events.last(),
            Some(BackupEvent::RunFinished { succeeded: 2, failed: 0, run_id }) if *run_id == report.run_id
        ));
    }
}
