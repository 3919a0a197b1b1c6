//! ScriptedProducer - 決め打ちの artifact を作る Producer（テスト用）
//!
//! 外部ツールやネットワークなしで orchestrator 全体を動かすために使う。
//! `failing()` で指定した artifact 系列は ProducerError を返す。

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::domain::artifact::{archive_file_name, dump_file_name};
use crate::domain::{ArtifactSpec, ProducerError, Source, TargetName};
use crate::ports::{Clock, Producer};

pub struct ScriptedProducer {
    clock: Arc<dyn Clock>,
    failing: HashSet<String>,
    produced: Mutex<Vec<TargetName>>,
}

impl ScriptedProducer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            failing: HashSet::new(),
            produced: Mutex::new(Vec::new()),
        }
    }

    /// Make every `produce` for the series named `name` fail.
    pub fn failing(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    /// Series produced so far, in call order.
    pub fn produced(&self) -> Vec<TargetName> {
        self.produced
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Producer for ScriptedProducer {
    async fn produce(&self, spec: &ArtifactSpec, workdir: &Path) -> Result<PathBuf, ProducerError> {
        if self.failing.contains(spec.name.as_str()) {
            return Err(ProducerError::Other(format!("{} is unreachable", spec.name)));
        }

        let now = self.clock.now();
        let file_name = match &spec.source {
            Source::Dataset(_) => archive_file_name(&spec.prefix, now, ".tar.gz"),
            Source::Database(db) => dump_file_name(&spec.prefix, now, db.engine.dump_extension()),
        };
        let path = workdir.join(file_name);
        tokio::fs::write(&path, spec.name.as_str().as_bytes()).await?;

        self.produced
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(spec.name.clone());
        Ok(path)
    }
}
