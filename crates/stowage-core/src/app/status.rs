//! RunReport - run 全体の集計
//!
//! 成功・失敗の件数と、失敗した target ごとのエラー内容。

use serde::{Deserialize, Serialize};

use crate::domain::{JobResult, RunId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Failed jobs only, in completion order.
    pub failures: Vec<JobResult>,
    /// Completion order.
    pub results: Vec<JobResult>,
}

impl RunReport {
    pub fn new(run_id: RunId, results: Vec<JobResult>) -> Self {
        let failures: Vec<JobResult> = results.iter().filter(|r| !r.success).cloned().collect();
        Self {
            run_id,
            total: results.len(),
            succeeded: results.len() - failures.len(),
            failed: failures.len(),
            failures,
            results,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BackupError, StoreError, TargetName};
    use ulid::Ulid;

    #[test]
    fn counts_follow_results() {
        let err = BackupError::transport("upload", "/b/", StoreError::Other("down".to_string()));
        let report = RunReport::new(
            RunId::from_ulid(Ulid::new()),
            vec![
                JobResult::succeeded(TargetName::new("a")),
                JobResult::failed(TargetName::new("b"), &err),
                JobResult::succeeded(TargetName::new("c")),
            ],
        );

        assert_eq!(report.total, 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert!(!report.is_success());
        let failed: Vec<&str> = report.failures.iter().map(|r| r.target.as_str()).collect();
        assert_eq!(failed, vec!["b"]);
    }

    #[test]
    fn empty_run_is_success() {
        let report = RunReport::new(RunId::from_ulid(Ulid::new()), vec![]);
        assert!(report.is_success());
        assert_eq!(report.total, 0);
    }
}
