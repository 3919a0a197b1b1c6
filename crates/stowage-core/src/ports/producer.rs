//! Producer port - バックアップ元から local artifact を作る
//!
//! # 実装
//! - `impls::hub_dataset::HubDatasetProducer`: dataset / project のスナップショット
//! - `impls::dump::DumpProducer`: データベースの dump
//!
//! リトライが必要なら Producer 側の責務（Scheduler は再実行しない）。

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::domain::{ArtifactSpec, ProducerError};

#[async_trait]
pub trait Producer: Send + Sync {
    /// Write the artifact for `spec` into `workdir` and return its path.
    ///
    /// The file name is the remote artifact name, so it must follow the
    /// `{prefix}_[backup_]{YYYYMMDD_HHMMSS}{ext}` convention.
    async fn produce(&self, spec: &ArtifactSpec, workdir: &Path) -> Result<PathBuf, ProducerError>;
}
