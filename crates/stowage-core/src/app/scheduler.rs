//! Scheduler - 固定サイズの worker プールで Job を実行
//!
//! # 保証
//! - 各 Job はちょうど 1 回実行される
//! - 1 つの Job の失敗（panic を含む）は他の Job を止めない
//! - 結果は完了順（投入順ではない）
//! - リトライはしない（必要なら Producer 側で行う）

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::{BackupError, JobResult, TargetName};

/// A unit of work the scheduler can run.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    fn target(&self) -> &TargetName;

    async fn execute(&self) -> Result<(), BackupError>;
}

type JobQueue<J> = Arc<Mutex<VecDeque<Arc<J>>>>;

#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    parallelism: NonZeroUsize,
}

impl Scheduler {
    pub fn new(parallelism: NonZeroUsize) -> Self {
        Self { parallelism }
    }

    pub fn parallelism(&self) -> NonZeroUsize {
        self.parallelism
    }

    /// Number of workers actually started for `jobs` jobs.
    pub fn effective_parallelism(&self, jobs: usize) -> usize {
        self.parallelism.get().min(jobs)
    }

    /// Run every job and collect one result per job.
    ///
    /// No worker is started for an empty job list.
    pub async fn run<J: Job>(&self, jobs: Vec<J>) -> Vec<JobResult> {
        let total = jobs.len();
        let workers = self.effective_parallelism(total);
        if workers == 0 {
            return Vec::new();
        }

        let queue: JobQueue<J> = Arc::new(Mutex::new(jobs.into_iter().map(Arc::new).collect()));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut joins = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let queue = Arc::clone(&queue);
            let tx = tx.clone();
            joins.push(tokio::spawn(worker_loop(worker_id, queue, tx)));
        }
        // 全 worker の sender が drop されたら recv が None を返す
        drop(tx);

        let mut results = Vec::with_capacity(total);
        while let Some(result) = rx.recv().await {
            results.push(result);
        }
        for join in joins {
            let _ = join.await;
        }
        results
    }
}

async fn worker_loop<J: Job>(
    worker_id: usize,
    queue: JobQueue<J>,
    results: mpsc::UnboundedSender<JobResult>,
) {
    loop {
        // ロックは pop の間だけ（await を跨がない）
        let next = queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let Some(job) = next else {
            break;
        };

        let target = job.target().clone();
        // 別 task で実行して panic をこの Job の失敗に閉じ込める
        let running = Arc::clone(&job);
        let outcome = tokio::spawn(async move { running.execute().await }).await;

        let result = match outcome {
            Ok(Ok(())) => JobResult::succeeded(target),
            Ok(Err(err)) => JobResult::failed(target, &err),
            Err(join_err) => {
                JobResult::aborted(target, format!("job aborted on worker-{worker_id}: {join_err}"))
            }
        };

        if results.send(result).is_err() {
            break;
        }
    }
}
