//! RemotePath - ArtifactStore 上のパス
//!
//! ディレクトリは常に `/` で始まり `/` で終わる形に正規化される。
//! ファイルは `dir.file(name)` で作る（末尾 `/` なし）。

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemotePath(String);

impl RemotePath {
    /// Root of the store.
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Build a directory path. Repeated separators collapse and a trailing
    /// `/` is added.
    pub fn dir(path: &str) -> Self {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return Self::root();
        }
        Self(format!("/{}/", segments.join("/")))
    }

    /// File `name` inside this directory.
    pub fn file(&self, name: &str) -> Self {
        let dir = self.as_dir_str();
        Self(format!("{dir}{}", name.trim_start_matches('/')))
    }

    /// Sub directory `name` inside this directory.
    pub fn child_dir(&self, name: &str) -> Self {
        Self::dir(&format!("{}{}", self.as_dir_str(), name))
    }

    pub fn is_dir(&self) -> bool {
        self.0.ends_with('/')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment (file name or directory name).
    pub fn name(&self) -> &str {
        self.0
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
    }

    /// Every directory from the top level down to this one, root excluded.
    ///
    /// `/a/b/c/` → `[/a/, /a/b/, /a/b/c/]`
    pub fn ancestors(&self) -> Vec<RemotePath> {
        let mut out = Vec::new();
        let mut current = String::from("/");
        let dir = self.as_dir_str();
        for segment in dir.split('/').filter(|s| !s.is_empty()) {
            current.push_str(segment);
            current.push('/');
            out.push(RemotePath(current.clone()));
        }
        out
    }

    fn as_dir_str(&self) -> String {
        if self.is_dir() {
            self.0.clone()
        } else {
            format!("{}/", self.0)
        }
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
