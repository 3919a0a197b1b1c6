//! stowage - back up every configured dataset and database once.
//!
//! Exit status is 0 when every job succeeded, 1 otherwise.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use stowage_core::app::{OrchestratorBuilder, RunReport, TargetFilter};
use stowage_core::config::{BackupConfig, DEFAULT_CONFIG_PATH};
use stowage_core::domain::SourceKind;
use stowage_core::impls::{
    DumpProducer, HubDatasetProducer, TracingEventSink, WebDavStore,
};
use stowage_core::observability::{LogFormat, init_logging};
use stowage_core::ports::{Clock, SystemClock};

#[derive(Debug, Parser)]
#[command(name = "stowage", version, about = "Back up datasets and databases to WebDAV")]
struct Cli {
    /// Configuration file.
    #[arg(long, short, env = "STOWAGE_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Maximum number of targets backed up at the same time.
    #[arg(long, short, default_value = "3")]
    parallel: NonZeroUsize,

    /// Back up only this target (`owner/name` or the short name).
    #[arg(long)]
    target: Option<String>,

    /// Back up only this group (account, project owner or database type).
    #[arg(long)]
    group: Option<String>,

    /// Back up only one kind of target.
    #[arg(long, value_enum)]
    only: Option<Only>,

    /// Report format.
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    format: ReportFormat,

    #[arg(long, value_enum, default_value_t = LogFormatArg::Pretty)]
    log_format: LogFormatArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Only {
    Datasets,
    Databases,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Json,
}

impl Cli {
    fn filter(&self) -> TargetFilter {
        TargetFilter {
            target: self.target.clone(),
            group: self.group.clone(),
            kind: self.only.map(|only| match only {
                Only::Datasets => SourceKind::Dataset,
                Only::Databases => SourceKind::Database,
            }),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Json => LogFormat::Json,
    });

    match run(&cli).await {
        Ok(report) => {
            print_report(&report, cli.format);
            if report.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            tracing::error!(error = format!("{err:#}"), "backup run aborted");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<RunReport> {
    let config = BackupConfig::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    let targets = config.targets().context("invalid target configuration")?;
    let store = WebDavStore::new(&config.store()?).context("failed to set up WebDAV client")?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let hub = HubDatasetProducer::new(&config.hub, clock.clone())
        .context("failed to set up hub client")?;

    let orchestrator = OrchestratorBuilder::new()
        .store(Arc::new(store))
        .producer(SourceKind::Dataset, Arc::new(hub))?
        .producer(SourceKind::Database, Arc::new(DumpProducer::new(clock.clone())))?
        .events(Arc::new(TracingEventSink))
        .clock(clock)
        .parallelism(cli.parallel)
        .expect_kinds(&config.kinds())
        .build()?;

    let report = orchestrator.run(&targets, &cli.filter()).await?;
    Ok(report)
}

fn print_report(report: &RunReport, format: ReportFormat) {
    if format == ReportFormat::Json {
        match serde_json::to_string_pretty(report) {
            Ok(json) => println!("{json}"),
            Err(err) => tracing::error!(error = %err, "failed to serialize report"),
        }
        return;
    }

    println!(
        "{} targets: {} succeeded, {} failed",
        report.total, report.succeeded, report.failed
    );
    for failure in &report.failures {
        println!(
            "  FAILED {}: {}",
            failure.target,
            failure.error.as_deref().unwrap_or("unknown error")
        );
    }
}
