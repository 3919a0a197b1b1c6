//! App - アプリケーション層
//!
//! ports を組み合わせてバックアップの実行を組み立てます。
//!
//! # 主要コンポーネント
//! - **OrchestratorBuilder**: 構築とワイヤリング（起動時検証）
//! - **Orchestrator**: target → Job の組み立てと集計
//! - **Scheduler**: 並列度を制限した worker プール
//! - **BackupJob**: 1 target 分の produce → upload → retention
//! - **TargetFilter**: target / group / 種類による絞り込み
//! - **RunReport**: run の集計結果

pub mod builder;
pub mod filter;
pub mod job;
pub mod orchestrator;
pub mod registry;
pub mod scheduler;
pub mod status;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, OrchestratorBuilder, DEFAULT_PARALLELISM};
pub use self::filter::TargetFilter;
pub use self::job::{BackupJob, JobContext};
pub use self::orchestrator::Orchestrator;
pub use self::registry::{ProducerRegistry, RegistryError};
pub use self::scheduler::{Job, Scheduler};
pub use self::status::RunReport;
