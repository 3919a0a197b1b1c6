//! ArtifactStore port - リモートのパス指向ストア（WebDAV / InMemory）
//!
//! core はこの trait 経由でのみストアに触る。
//!
//! # 実装
//! - `impls::webdav::WebDavStore`（本番用）
//! - `impls::memory_store::InMemoryStore`（テスト・ローカル用）

use std::path::Path;

use async_trait::async_trait;

use crate::domain::{RemotePath, StoreError};

/// ArtifactStore は artifact の一覧・upload・削除を行う
///
/// # 設計原則
/// - ディレクトリは `RemotePath::dir`、ファイルは `dir.file(name)` で指定
/// - 存在しないディレクトリの `list` は空の一覧を返す（エラーではない）
/// - 各呼び出しのタイムアウトは実装側が持つ
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn exists(&self, path: &RemotePath) -> Result<bool, StoreError>;

    /// Create one directory level. The parent must exist.
    async fn mkdir(&self, path: &RemotePath) -> Result<(), StoreError>;

    /// File names directly inside `dir`.
    async fn list(&self, dir: &RemotePath) -> Result<Vec<String>, StoreError>;

    async fn upload(&self, local: &Path, remote: &RemotePath) -> Result<(), StoreError>;

    async fn delete(&self, remote: &RemotePath) -> Result<(), StoreError>;

    /// mkdir -p: every missing level is created parent-then-child.
    ///
    /// Returns the directories that were created. A level that appears between
    /// the existence check and `mkdir` (another job got there first) is fine.
    async fn ensure_dir(&self, dir: &RemotePath) -> Result<Vec<RemotePath>, StoreError> {
        let mut created = Vec::new();
        for level in dir.ancestors() {
            if self.exists(&level).await? {
                continue;
            }
            if let Err(err) = self.mkdir(&level).await {
                if self.exists(&level).await? {
                    continue;
                }
                return Err(err);
            }
            created.push(level);
        }
        Ok(created)
    }

    /// Upload `local` into `dir`, creating `dir` first when needed.
    ///
    /// The remote file keeps the local file name.
    async fn upload_ensuring_path(
        &self,
        local: &Path,
        dir: &RemotePath,
    ) -> Result<RemotePath, StoreError> {
        let file_name = local
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StoreError::Other(format!("{} has no file name", local.display())))?;
        self.ensure_dir(dir).await?;
        let remote = dir.file(file_name);
        self.upload(local, &remote).await?;
        Ok(remote)
    }
}
