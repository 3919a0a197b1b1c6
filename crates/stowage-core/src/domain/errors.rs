//! Errors - エラー型と分類
//!
//! # 分類
//! - Producer: バックアップ元から artifact を取得できない（Job 単位で失敗）
//! - Transport: upload / list / delete の呼び出し失敗（Job 単位で失敗）
//! - Cleanup: 古い artifact の削除失敗（ログのみ、Job は失敗しない）
//! - Configuration: target 定義の不備（Job 開始前に全体を中断）

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::target::SourceKind;

/// ErrorKind は BackupError の運用分類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Producer,
    Transport,
    Cleanup,
    Configuration,
}

/// BackupError は orchestration 全体で使うエラー
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("producer failed for {target}: {source}")]
    Producer {
        target: String,
        #[source]
        source: ProducerError,
    },

    #[error("{operation} failed on {path}: {source}")]
    Transport {
        operation: &'static str,
        path: String,
        #[source]
        source: StoreError,
    },

    #[error("cleanup failed on {path}: {source}")]
    Cleanup {
        path: String,
        #[source]
        source: StoreError,
    },

    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

impl BackupError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BackupError::Producer { .. } => ErrorKind::Producer,
            BackupError::Transport { .. } => ErrorKind::Transport,
            BackupError::Cleanup { .. } => ErrorKind::Cleanup,
            BackupError::Configuration(_) => ErrorKind::Configuration,
        }
    }

    pub fn transport(operation: &'static str, path: impl Into<String>, source: StoreError) -> Self {
        BackupError::Transport {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// ProducerError は local artifact を作れなかった理由
#[derive(Debug, Error)]
pub enum ProducerError {
    #[error("`{tool}` could not be started: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{tool}` exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("repository {repo} is not accessible as any of {tried:?}")]
    RepositoryNotFound { repo: String, tried: Vec<String> },

    #[error("hub request failed: {0}")]
    Request(String),

    #[error("hub returned status {status} for {url}")]
    HubStatus { status: u16, url: String },

    #[error("source file {0} does not exist")]
    MissingSource(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// StoreError は ArtifactStore 呼び出しの失敗
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("{method} {path} returned status {status}")]
    Status {
        method: String,
        path: String,
        status: u16,
    },

    #[error("malformed listing for {path}: {reason}")]
    MalformedListing { path: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// ConfigError は設定ファイルの読み込み・検証エラー
///
/// 起動時に一度だけ返され、Job は一つも開始されない。
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{context}: missing required field `{field}`")]
    MissingField {
        context: String,
        field: &'static str,
    },

    #[error("{context}: invalid `{field}`: {reason}")]
    InvalidField {
        context: String,
        field: &'static str,
        reason: String,
    },

    #[error("duplicate target `{0}`")]
    DuplicateTarget(String),

    #[error("`{first}` and `{second}` both keep `{prefix}` artifacts in {destination}")]
    ConflictingSeries {
        first: String,
        second: String,
        destination: String,
        prefix: String,
    },

    #[error("no target matches {0}")]
    NoMatch(String),

    #[error("no producer registered for {0} targets")]
    MissingProducer(SourceKind),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_follows_variant() {
        let err = BackupError::Producer {
            target: "alice/notes".to_string(),
            source: ProducerError::Other("boom".to_string()),
        };
        assert_eq!(err.kind(), ErrorKind::Producer);

        let err = BackupError::transport("upload", "/b/", StoreError::Other("x".to_string()));
        assert_eq!(err.kind(), ErrorKind::Transport);

        let err = BackupError::from(ConfigError::DuplicateTarget("shop".to_string()));
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn producer_error_message_carries_detail() {
        let err = BackupError::Producer {
            target: "shop".to_string(),
            source: ProducerError::ToolFailed {
                tool: "mysqldump".to_string(),
                status: "exit status: 2".to_string(),
                stderr: "access denied".to_string(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("shop"));
        assert!(msg.contains("mysqldump"));
        assert!(msg.contains("access denied"));
    }

    #[test]
    fn error_kind_serializes_snake_case() {
        let s = serde_json::to_string(&ErrorKind::Configuration).unwrap();
        assert_eq!(s, "\"configuration\"");
    }
}
