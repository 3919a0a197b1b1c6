use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::SourceKind;
use crate::ports::Producer;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("a producer for {0} targets is already registered")]
    AlreadyRegistered(SourceKind),
}

/// Registry of producers (source kind -> producer).
///
/// Design:
/// - Built during initialization (mutable).
/// - Shared by every job during the run (immutable, behind `Arc`).
#[derive(Default)]
pub struct ProducerRegistry {
    producers: HashMap<SourceKind, Arc<dyn Producer>>,
}

impl ProducerRegistry {
    pub fn new() -> Self {
        Self {
            producers: HashMap::new(),
        }
    }

    pub fn register(
        &mut self,
        kind: SourceKind,
        producer: Arc<dyn Producer>,
    ) -> Result<(), RegistryError> {
        if self.producers.contains_key(&kind) {
            return Err(RegistryError::AlreadyRegistered(kind));
        }
        self.producers.insert(kind, producer);
        Ok(())
    }

    pub fn get(&self, kind: SourceKind) -> Option<&Arc<dyn Producer>> {
        self.producers.get(&kind)
    }

    pub fn contains(&self, kind: SourceKind) -> bool {
        self.producers.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.producers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.producers.is_empty()
    }
}
