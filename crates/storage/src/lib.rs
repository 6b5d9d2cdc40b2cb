use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use shared::domain::{Entity, EntityId, EntitySnapshot, Mutation};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

pub mod failure;

pub use failure::{
    CommitDecision, ConnectionSwitch, FailNext, FailurePolicy, NeverFail, RandomFailures,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommitError {
    #[error("transient failure committing {entity_id}: {reason}")]
    Transient { entity_id: EntityId, reason: String },
    #[error("entity {0} no longer exists")]
    Missing(EntityId),
}

/// Boundary between the confirmation protocol and whatever holds the data.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Absence is a normal answer, not an error.
    async fn find(&self, entity_id: &EntityId) -> Option<EntitySnapshot>;

    /// Applies `mutation` durably. On `Err` the record is left untouched.
    async fn commit(&self, entity_id: &EntityId, mutation: &Mutation) -> Result<(), CommitError>;
}

/// Simulated backend holding records in memory behind an unreliable link.
#[derive(Clone)]
pub struct InMemoryStore {
    entities: Arc<RwLock<HashMap<EntityId, Entity>>>,
    failures: Arc<dyn FailurePolicy>,
    commit_latency: Duration,
    commit_attempts: Arc<AtomicUsize>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(Arc::new(NeverFail))
    }
}

impl InMemoryStore {
    pub fn new(failures: Arc<dyn FailurePolicy>) -> Self {
        Self {
            entities: Arc::new(RwLock::new(HashMap::new())),
            failures,
            commit_latency: Duration::ZERO,
            commit_attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_commit_latency(mut self, latency: Duration) -> Self {
        self.commit_latency = latency;
        self
    }

    pub async fn seed(&self, entities: impl IntoIterator<Item = Entity>) {
        let mut guard = self.entities.write().await;
        for entity in entities {
            guard.insert(entity.id.clone(), entity);
        }
    }

    /// Inserts or replaces a record, returning the previous one.
    pub async fn insert(&self, entity: Entity) -> Option<Entity> {
        self.entities.write().await.insert(entity.id.clone(), entity)
    }

    pub async fn get(&self, entity_id: &EntityId) -> Option<Entity> {
        self.entities.read().await.get(entity_id).cloned()
    }

    pub async fn contains(&self, entity_id: &EntityId) -> bool {
        self.entities.read().await.contains_key(entity_id)
    }

    /// All records ordered by id.
    pub async fn list(&self) -> Vec<Entity> {
        let mut entities: Vec<_> = self.entities.read().await.values().cloned().collect();
        entities.sort_by(|a, b| a.id.cmp(&b.id));
        entities
    }

    pub async fn len(&self) -> usize {
        self.entities.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entities.read().await.is_empty()
    }

    /// Number of commit calls received, successful or not.
    pub fn commit_attempts(&self) -> usize {
        self.commit_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EntityStore for InMemoryStore {
    async fn find(&self, entity_id: &EntityId) -> Option<EntitySnapshot> {
        self.entities
            .read()
            .await
            .get(entity_id)
            .map(Entity::snapshot)
    }

    async fn commit(&self, entity_id: &EntityId, mutation: &Mutation) -> Result<(), CommitError> {
        self.commit_attempts.fetch_add(1, Ordering::SeqCst);
        if !self.commit_latency.is_zero() {
            tokio::time::sleep(self.commit_latency).await;
        }

        let mut entities = self.entities.write().await;
        if let CommitDecision::Fail(reason) = self.failures.decide(entity_id) {
            warn!(%entity_id, %reason, "simulated commit failure");
            return Err(CommitError::Transient {
                entity_id: entity_id.clone(),
                reason,
            });
        }

        match mutation {
            Mutation::Remove => {
                entities
                    .remove(entity_id)
                    .ok_or_else(|| CommitError::Missing(entity_id.clone()))?;
            }
            Mutation::Update { attributes } => {
                let entity = entities
                    .get_mut(entity_id)
                    .ok_or_else(|| CommitError::Missing(entity_id.clone()))?;
                entity
                    .attributes
                    .extend(attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }
        debug!(%entity_id, ?mutation, "commit applied");
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
