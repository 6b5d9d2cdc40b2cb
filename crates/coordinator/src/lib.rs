//! Two-phase confirm-then-commit protocol for consequential edits.
//!
//! `initiate` records the caller's intent under a fresh correlation token,
//! `confirm` applies it through the [`EntityStore`], `cancel` drops it. A
//! commit that fails transiently keeps the intent pending under the same
//! token so the caller can retry without asking the user again.

use std::{sync::Arc, time::Duration};

use shared::{
    domain::{CorrelationToken, EntityId, Mutation},
    error::ContractViolation,
    protocol::{CancelAck, ConfirmationRequest, Initiation, Outcome},
};
use storage::{CommitError, EntityStore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

mod registry;

pub use registry::{PendingMutation, PendingMutationRegistry};

#[derive(Debug, Clone, Default)]
pub struct CoordinatorConfig {
    /// Pending entries older than this read as invalid. `None` keeps them
    /// until confirmed or cancelled.
    pub pending_ttl: Option<Duration>,
}

#[derive(Clone)]
pub struct MutationCoordinator {
    store: Arc<dyn EntityStore>,
    registry: Arc<PendingMutationRegistry>,
}

impl MutationCoordinator {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self::with_config(store, CoordinatorConfig::default())
    }

    pub fn with_config(store: Arc<dyn EntityStore>, config: CoordinatorConfig) -> Self {
        Self {
            store,
            registry: Arc::new(PendingMutationRegistry::new(config.pending_ttl)),
        }
    }

    /// Starts a removal of `entity_id`.
    pub async fn initiate(&self, entity_id: &str) -> Result<Initiation, ContractViolation> {
        self.initiate_mutation(entity_id, Mutation::Remove).await
    }

    pub async fn initiate_mutation(
        &self,
        entity_id: &str,
        mutation: Mutation,
    ) -> Result<Initiation, ContractViolation> {
        let entity_id = EntityId::parse(entity_id)?;
        if matches!(&mutation, Mutation::Update { attributes } if attributes.is_empty()) {
            return Err(ContractViolation::EmptyUpdate);
        }

        let Some(snapshot) = self.store.find(&entity_id).await else {
            info!(%entity_id, "initiate on unknown entity");
            return Ok(Initiation::NotFound { entity_id });
        };

        let message = mutation.prompt(&snapshot);
        let token = self
            .registry
            .put(entity_id.clone(), mutation.clone(), snapshot.clone())
            .await;
        info!(%token, %entity_id, "mutation awaiting confirmation");

        Ok(Initiation::AwaitingConfirmation(ConfirmationRequest {
            token,
            message,
            snapshot,
            mutation,
        }))
    }

    /// Applies the pending mutation behind `token`.
    ///
    /// May wait on the backend; presenters on a render thread should use
    /// [`confirm_in_background`](Self::confirm_in_background). Dropping the
    /// returned future does not abandon the commit: it runs to completion on
    /// the runtime and the token ends up committed, released or pending again.
    pub async fn confirm(&self, token: &CorrelationToken) -> Outcome {
        let Some(entry) = self.registry.take_if_present(token).await else {
            debug!(%token, "confirm with unknown or consumed token");
            return Outcome::InvalidToken;
        };

        let fallback = entry.clone();
        let coordinator = self.clone();
        match tokio::spawn(async move { coordinator.settle(entry).await }).await {
            Ok(outcome) => outcome,
            Err(err) => {
                let reason = format!("commit task aborted: {err}");
                self.keep_pending(fallback, reason).await
            }
        }
    }

    /// Commits a claimed entry and moves its token to a terminal or pending
    /// state.
    async fn settle(&self, entry: PendingMutation) -> Outcome {
        let token = entry.token.clone();
        match self.store.commit(&entry.entity_id, &entry.mutation).await {
            Ok(()) => {
                self.registry.release(&token).await;
                info!(%token, entity_id = %entry.entity_id, "mutation committed");
                Outcome::Success {
                    entity_id: entry.entity_id,
                    mutation: entry.mutation,
                }
            }
            Err(CommitError::Missing(entity_id)) => {
                self.registry.release(&token).await;
                warn!(%token, %entity_id, "entity vanished before commit");
                Outcome::NotFound { entity_id }
            }
            Err(CommitError::Transient { reason, .. }) => self.keep_pending(entry, reason).await,
        }
    }

    async fn keep_pending(&self, entry: PendingMutation, reason: String) -> Outcome {
        let retry = entry.after_failed_attempt();
        let token = retry.token.clone();
        let entity_id = retry.entity_id.clone();
        let failed_attempts = retry.failed_attempts;
        let retryable = self.registry.restore(retry).await;
        warn!(
            %token,
            %entity_id,
            failed_attempts,
            retryable,
            %reason,
            "commit failed transiently"
        );
        Outcome::TransientFailure {
            entity_id,
            failed_attempts,
            retryable,
            reason,
        }
    }

    /// Runs [`confirm`](Self::confirm) on the runtime and hands back the
    /// outcome through the join handle.
    pub fn confirm_in_background(&self, token: CorrelationToken) -> JoinHandle<Outcome> {
        let coordinator = self.clone();
        tokio::spawn(async move { coordinator.confirm(&token).await })
    }

    /// Always acknowledges; cancelling a consumed or unknown token is a no-op.
    pub async fn cancel(&self, token: &CorrelationToken) -> CancelAck {
        let released = self.registry.discard(token).await;
        if released {
            info!(%token, "pending mutation cancelled");
        } else {
            debug!(%token, "cancel found nothing pending");
        }
        CancelAck {
            token: token.clone(),
            released,
        }
    }

    pub async fn pending(&self, token: &CorrelationToken) -> Option<PendingMutation> {
        self.registry.peek(token).await
    }

    pub async fn pending_count(&self) -> usize {
        self.registry.len().await
    }

    /// Tokens whose commit is currently running.
    pub async fn in_flight_count(&self) -> usize {
        self.registry.in_flight().await
    }

    pub async fn expire_stale(&self) -> usize {
        let expired = self.registry.expire_stale().await;
        if expired > 0 {
            info!(expired, "expired stale pending mutations");
        }
        expired
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
