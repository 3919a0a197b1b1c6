//! Target - バックアップ対象の定義
//!
//! 設定ファイルから一度だけ構築され、run の間は不変。
//! 対象の種類（dataset / database）は `Source` の tagged variant で表し、
//! どの Producer を使うかは `SourceKind` で決まる。

use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::remote_path::RemotePath;
use super::retention::RetentionPolicy;

/// Default number of artifacts kept per target.
pub const DEFAULT_MAX_BACKUPS: NonZeroUsize = NonZeroUsize::new(2).unwrap();

/// Archive formats produced by (or found in) a dataset repository.
pub const DATASET_EXTENSIONS: &[&str] = &[".zip", ".tar.gz", ".7z"];

/// Dump formats produced by the database tools.
pub const DATABASE_EXTENSIONS: &[&str] = &[".sql", ".dump", ".zip", ".db", ".backup", ".gz"];

/// Qualified name of a target, e.g. `alice/notes` or `shop`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetName(String);

impl TargetName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Part after the last `/` (`alice/notes` → `notes`).
    pub fn short_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Part before the first `/`, if any (`alice/notes` → `alice`).
    pub fn owner(&self) -> Option<&str> {
        self.0.split_once('/').map(|(owner, _)| owner)
    }
}

impl fmt::Display for TargetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Producer の選択キー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Dataset,
    Database,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Dataset => f.write_str("dataset"),
            SourceKind::Database => f.write_str("database"),
        }
    }
}

/// Repository type on the dataset hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoType {
    Dataset,
    Model,
    Space,
}

impl RepoType {
    /// Probe order when the type is not configured.
    pub const ALL: [RepoType; 3] = [RepoType::Dataset, RepoType::Model, RepoType::Space];

    /// `/api/<segment>/<repo>` on the hub.
    pub fn api_segment(self) -> &'static str {
        match self {
            RepoType::Dataset => "datasets",
            RepoType::Model => "models",
            RepoType::Space => "spaces",
        }
    }

    /// Prefix of `/<prefix><repo>/resolve/...` download URLs. Models have none.
    pub fn resolve_prefix(self) -> &'static str {
        match self {
            RepoType::Dataset => "datasets/",
            RepoType::Model => "",
            RepoType::Space => "spaces/",
        }
    }
}

impl fmt::Display for RepoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoType::Dataset => f.write_str("dataset"),
            RepoType::Model => f.write_str("model"),
            RepoType::Space => f.write_str("space"),
        }
    }
}

/// Hosted dataset / project snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSource {
    /// `owner/name` on the hub.
    pub repo: String,
    pub token: Option<String>,
    pub repo_type: Option<RepoType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseEngine {
    Mysql,
    Postgresql,
    Mongodb,
    Sqlite,
    Other,
}

impl DatabaseEngine {
    pub fn as_str(self) -> &'static str {
        match self {
            DatabaseEngine::Mysql => "mysql",
            DatabaseEngine::Postgresql => "postgresql",
            DatabaseEngine::Mongodb => "mongodb",
            DatabaseEngine::Sqlite => "sqlite",
            DatabaseEngine::Other => "other",
        }
    }

    /// Extension of the dump this engine's tool writes.
    pub fn dump_extension(self) -> &'static str {
        match self {
            DatabaseEngine::Mysql => ".sql",
            DatabaseEngine::Postgresql => ".dump",
            DatabaseEngine::Mongodb => ".archive.gz",
            DatabaseEngine::Sqlite => ".db",
            DatabaseEngine::Other => ".backup",
        }
    }
}

impl fmt::Display for DatabaseEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relational / document database reached through its dump tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSource {
    pub engine: DatabaseEngine,
    pub name: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    /// sqlite only.
    pub file: Option<PathBuf>,
    /// `other` only.
    pub custom_cmd: Option<String>,
    /// postgresql only; `PGSSLMODE`.
    pub ssl_mode: Option<String>,
}

/// Producer に渡す設定（core からは不透明）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Dataset(DatasetSource),
    Database(DatabaseSource),
}

impl Source {
    pub fn kind(&self) -> SourceKind {
        match self {
            Source::Dataset(_) => SourceKind::Dataset,
            Source::Database(_) => SourceKind::Database,
        }
    }

    /// Extensions an artifact of this source may carry on the store.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Source::Dataset(_) => DATASET_EXTENSIONS,
            Source::Database(_) => DATABASE_EXTENSIONS,
        }
    }
}

/// 1 つの artifact 系列（produce → upload → retention の単位）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSpec {
    /// Identity of this artifact series, used in logs and results.
    pub name: TargetName,
    /// Name prefix artifacts are written under.
    pub prefix: String,
    /// Historical prefixes the same series may still appear under.
    pub alternate_prefixes: Vec<String>,
    pub source: Source,
    pub destination: RemotePath,
    pub max_backups: NonZeroUsize,
}

impl ArtifactSpec {
    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy::new(
            self.prefix.clone(),
            self.alternate_prefixes.clone(),
            self.source.extensions().iter().map(|e| e.to_string()).collect(),
            self.max_backups,
        )
    }
}

/// バックアップ対象
///
/// primary は必須。secondary は dataset に付随する database（任意）で、
/// 独自の destination と retention を持つ。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub name: TargetName,
    /// Account for dataset targets, engine for database targets.
    pub group: Option<String>,
    pub primary: ArtifactSpec,
    pub secondary: Option<ArtifactSpec>,
}

impl Target {
    pub fn kind(&self) -> SourceKind {
        self.primary.source.kind()
    }

    /// Every source kind this target needs a producer for.
    pub fn kinds(&self) -> impl Iterator<Item = SourceKind> + '_ {
        std::iter::once(self.primary.source.kind())
            .chain(self.secondary.iter().map(|s| s.source.kind()))
    }
}
