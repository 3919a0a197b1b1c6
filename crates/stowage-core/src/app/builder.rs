//! OrchestratorBuilder - Orchestrator の構築とワイヤリング
//!
//! # 起動時検証（Fail-fast）
//! - store が無ければ BuildError::MissingStore
//! - expect_kinds() で宣言した種類の Producer が無ければ
//!   BuildError::MissingProducers
//! - 同じ種類の Producer を 2 回登録すると RegistryError
//!
//! # 使用例
//! ```ignore
//! let orchestrator = OrchestratorBuilder::new()
//!     .store(Arc::new(store))
//!     .producer(SourceKind::Dataset, Arc::new(hub))?
//!     .parallelism(NonZeroUsize::new(3).unwrap())
//!     .expect_kinds(&config.kinds())
//!     .build()?;
//! ```

use std::num::NonZeroUsize;
use std::sync::Arc;

use super::job::JobContext;
use super::orchestrator::Orchestrator;
use super::registry::{ProducerRegistry, RegistryError};
use super::scheduler::Scheduler;
use crate::domain::SourceKind;
use crate::ports::{
    ArtifactStore, Clock, EventSink, IdGenerator, NoopEventSink, Producer, SystemClock,
    UlidGenerator,
};

pub const DEFAULT_PARALLELISM: NonZeroUsize = NonZeroUsize::new(3).unwrap();

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no artifact store configured")]
    MissingStore,

    #[error("no producer registered for: {0:?}")]
    MissingProducers(Vec<SourceKind>),
}

pub struct OrchestratorBuilder {
    producers: ProducerRegistry,
    store: Option<Arc<dyn ArtifactStore>>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    parallelism: NonZeroUsize,
    expected_kinds: Vec<SourceKind>,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            producers: ProducerRegistry::new(),
            store: None,
            events: Arc::new(NoopEventSink),
            clock: Arc::new(SystemClock),
            parallelism: DEFAULT_PARALLELISM,
            expected_kinds: Vec::new(),
        }
    }

    pub fn producer(
        mut self,
        kind: SourceKind,
        producer: Arc<dyn Producer>,
    ) -> Result<Self, RegistryError> {
        self.producers.register(kind, producer)?;
        Ok(self)
    }

    pub fn store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Clock used for run / job ids.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn parallelism(mut self, parallelism: NonZeroUsize) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Source kinds the configured targets will need.
    pub fn expect_kinds(mut self, kinds: &[SourceKind]) -> Self {
        self.expected_kinds = kinds.to_vec();
        self
    }

    pub fn build(self) -> Result<Orchestrator, BuildError> {
        let store = self.store.ok_or(BuildError::MissingStore)?;

        let mut missing: Vec<SourceKind> = Vec::new();
        for kind in self.expected_kinds {
            if !self.producers.contains(kind) && !missing.contains(&kind) {
                missing.push(kind);
            }
        }
        if !missing.is_empty() {
            return Err(BuildError::MissingProducers(missing));
        }

        let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(self.clock));
        let ctx = JobContext {
            store,
            producers: Arc::new(self.producers),
            events: self.events,
        };
        Ok(Orchestrator::new(ctx, ids, Scheduler::new(self.parallelism)))
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::memory_store::InMemoryStore;
    use crate::impls::scripted::ScriptedProducer;

    fn producer() -> Arc<dyn Producer> {
        Arc::new(ScriptedProducer::new(Arc::new(SystemClock)))
    }

    #[test]
    fn build_success() {
        let orchestrator = OrchestratorBuilder::new()
            .store(Arc::new(InMemoryStore::new()))
            .producer(SourceKind::Dataset, producer())
            .unwrap()
            .expect_kinds(&[SourceKind::Dataset])
            .build();
        assert!(orchestrator.is_ok());
    }

    #[test]
    fn build_without_store_fails() {
        let result = OrchestratorBuilder::new()
            .producer(SourceKind::Dataset, producer())
            .unwrap()
            .build();
        assert!(matches!(result, Err(BuildError::MissingStore)));
    }

    #[test]
    fn build_missing_producers() {
        let result = OrchestratorBuilder::new()
            .store(Arc::new(InMemoryStore::new()))
            .producer(SourceKind::Dataset, producer())
            .unwrap()
            .expect_kinds(&[SourceKind::Dataset, SourceKind::Database])
            .build();
        assert!(matches!(
            result,
            Err(BuildError::MissingProducers(missing)) if missing == vec![SourceKind::Database]
        ));
    }

    #[test]
    fn duplicate_producer_is_rejected() {
        let result = OrchestratorBuilder::new().producer(SourceKind::Database, producer());
        let Ok(builder) = result else {
            panic!("first registration must succeed");
        };
        assert!(matches!(
            builder.producer(SourceKind::Database, producer()),
            Err(RegistryError::AlreadyRegistered(SourceKind::Database))
        ));
    }

    #[test]
    fn parallelism_defaults_to_three() {
        let orchestrator = OrchestratorBuilder::new()
            .store(Arc::new(InMemoryStore::new()))
            .build()
            .unwrap();
        assert_eq!(orchestrator.scheduler().parallelism().get(), 3);
    }
}
