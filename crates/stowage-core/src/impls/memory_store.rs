//! InMemoryStore - テスト・ローカル用の ArtifactStore
//!
//! # 実装詳細
//! - ディレクトリ集合とファイル Map を Mutex で保護
//! - ロックは await を跨がない（upload はファイルを読んでからロック）
//! - 全呼び出しを `StoreCall` として記録し、テストで順序を検証できる
//! - WebDAV と同じく、親のない mkdir / upload は 409、既存への mkdir は 405

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::{RemotePath, StoreError};
use crate::ports::ArtifactStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Exists(RemotePath),
    Mkdir(RemotePath),
    List(RemotePath),
    Upload(RemotePath),
    Delete(RemotePath),
}

#[derive(Default)]
struct StoreState {
    dirs: BTreeSet<RemotePath>,
    files: BTreeMap<RemotePath, Vec<u8>>,
    calls: Vec<StoreCall>,
    failing_deletes: HashSet<RemotePath>,
    failing_lists: bool,
    failing_uploads: bool,
}

pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    /// Empty store; only the root directory exists.
    pub fn new() -> Self {
        let mut state = StoreState::default();
        state.dirs.insert(RemotePath::root());
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Put empty files named `names` into `dir`, creating `dir` as needed.
    /// Not recorded as calls.
    pub fn seed(&self, dir: &RemotePath, names: &[&str]) {
        let mut state = self.lock();
        for level in dir.ancestors() {
            state.dirs.insert(level);
        }
        for name in names {
            state.files.insert(dir.file(name), Vec::new());
        }
    }

    pub fn fail_delete(&self, path: &RemotePath) {
        self.lock().failing_deletes.insert(path.clone());
    }

    pub fn fail_lists(&self) {
        self.lock().failing_lists = true;
    }

    pub fn fail_uploads(&self) {
        self.lock().failing_uploads = true;
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    pub fn take_calls(&self) -> Vec<StoreCall> {
        std::mem::take(&mut self.lock().calls)
    }

    /// File names directly in `dir`, sorted. Not recorded as a call.
    pub fn files_in(&self, dir: &RemotePath) -> Vec<String> {
        let state = self.lock();
        names_in(&state, dir)
    }

    pub fn contents(&self, path: &RemotePath) -> Option<Vec<u8>> {
        self.lock().files.get(path).cloned()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn names_in(state: &StoreState, dir: &RemotePath) -> Vec<String> {
    state
        .files
        .keys()
        .filter_map(|path| {
            path.as_str()
                .strip_prefix(dir.as_str())
                .filter(|rest| !rest.is_empty() && !rest.contains('/'))
                .map(str::to_string)
        })
        .collect()
}

fn parent_of(path: &RemotePath) -> RemotePath {
    let trimmed = path.as_str().trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((parent, _)) => RemotePath::dir(parent),
        None => RemotePath::root(),
    }
}

fn status(method: &str, path: &RemotePath, status: u16) -> StoreError {
    StoreError::Status {
        method: method.to_string(),
        path: path.to_string(),
        status,
    }
}

#[async_trait]
impl ArtifactStore for InMemoryStore {
    async fn exists(&self, path: &RemotePath) -> Result<bool, StoreError> {
        let mut state = self.lock();
        state.calls.push(StoreCall::Exists(path.clone()));
        Ok(state.dirs.contains(path) || state.files.contains_key(path))
    }

    async fn mkdir(&self, path: &RemotePath) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.calls.push(StoreCall::Mkdir(path.clone()));
        if state.dirs.contains(path) {
            return Err(status("MKCOL", path, 405));
        }
        if !state.dirs.contains(&parent_of(path)) {
            return Err(status("MKCOL", path, 409));
        }
        state.dirs.insert(path.clone());
        Ok(())
    }

    async fn list(&self, dir: &RemotePath) -> Result<Vec<String>, StoreError> {
        let mut state = self.lock();
        state.calls.push(StoreCall::List(dir.clone()));
        if state.failing_lists {
            return Err(StoreError::Other(format!("listing {dir} refused")));
        }
        Ok(names_in(&state, dir))
    }

    async fn upload(&self, local: &Path, remote: &RemotePath) -> Result<(), StoreError> {
        let bytes = tokio::fs::read(local).await?;
        let mut state = self.lock();
        state.calls.push(StoreCall::Upload(remote.clone()));
        if state.failing_uploads {
            return Err(status("PUT", remote, 507));
        }
        if !state.dirs.contains(&parent_of(remote)) {
            return Err(status("PUT", remote, 409));
        }
        state.files.insert(remote.clone(), bytes);
        Ok(())
    }

    async fn delete(&self, remote: &RemotePath) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.calls.push(StoreCall::Delete(remote.clone()));
        if state.failing_deletes.contains(remote) {
            return Err(status("DELETE", remote, 423));
        }
        match state.files.remove(remote) {
            Some(_) => Ok(()),
            None => Err(status("DELETE", remote, 404)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ensure_dir_creates_missing_levels_only() {
        let store = InMemoryStore::new();
        store.seed(&RemotePath::dir("/backup"), &[]);

        let created = store
            .ensure_dir(&RemotePath::dir("/backup/alice/db"))
            .await
            .unwrap();

        assert_eq!(
            created,
            vec![RemotePath::dir("/backup/alice"), RemotePath::dir("/backup/alice/db")]
        );
        assert!(store.exists(&RemotePath::dir("/backup/alice/db")).await.unwrap());

        store.take_calls();
        let created = store
            .ensure_dir(&RemotePath::dir("/backup/alice/db"))
            .await
            .unwrap();
        assert!(created.is_empty());
        assert!(!store.calls().iter().any(|c| matches!(c, StoreCall::Mkdir(_))));
    }

    #[tokio::test]
    async fn upload_requires_parent() {
        let store = InMemoryStore::new();
        let tmp = tempfile::tempdir().unwrap();
        let local = tmp.path().join("shop_20240101_000000.sql");
        tokio::fs::write(&local, b"dump").await.unwrap();

        let remote = RemotePath::dir("/missing").file("shop_20240101_000000.sql");
        let err = store.upload(&local, &remote).await.unwrap_err();
        assert!(matches!(err, StoreError::Status { status: 409, .. }));

        let uploaded = store
            .upload_ensuring_path(&local, &RemotePath::dir("/missing"))
            .await
            .unwrap();
        assert_eq!(uploaded, remote);
        assert_eq!(store.contents(&remote), Some(b"dump".to_vec()));
    }

    #[tokio::test]
    async fn list_of_missing_dir_is_empty() {
        let store = InMemoryStore::new();
        let names = store.list(&RemotePath::dir("/nowhere")).await.unwrap();
        assert!(names.is_empty());
    }

    #[tokio::test]
    async fn list_excludes_nested_entries() {
        let store = InMemoryStore::new();
        store.seed(&RemotePath::dir("/b"), &["a_20240101_000000.zip"]);
        store.seed(&RemotePath::dir("/b/db"), &["a_20240101_000000.sql"]);

        let names = store.list(&RemotePath::dir("/b")).await.unwrap();
        assert_eq!(names, vec!["a_20240101_000000.zip".to_string()]);
    }
}
