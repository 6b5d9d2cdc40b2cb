use std::{collections::HashMap, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use shared::domain::{CorrelationToken, EntityId, EntitySnapshot, Mutation};
use tokio::sync::Mutex;
use tracing::debug;

/// A registered, not-yet-applied change, addressable only by its token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMutation {
    pub token: CorrelationToken,
    pub entity_id: EntityId,
    pub mutation: Mutation,
    pub snapshot: EntitySnapshot,
    pub created_at: DateTime<Utc>,
    pub failed_attempts: u32,
}

impl PendingMutation {
    /// Successor entry re-registered after a commit failed transiently.
    pub(crate) fn after_failed_attempt(self) -> Self {
        Self {
            failed_attempts: self.failed_attempts.saturating_add(1),
            ..self
        }
    }
}

enum Slot {
    Pending(PendingMutation),
    /// Claimed by a confirm whose commit has not finished yet.
    InFlight,
}

/// Owns the lifetime of every pending mutation.
///
/// A single mutex guards the slot map, so every check-and-remove below is
/// indivisible. No await happens while the lock is held.
pub struct PendingMutationRegistry {
    slots: Mutex<HashMap<CorrelationToken, Slot>>,
    ttl: Option<TimeDelta>,
}

impl Default for PendingMutationRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

impl PendingMutationRegistry {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            ttl: ttl.and_then(|ttl| TimeDelta::from_std(ttl).ok()),
        }
    }

    pub async fn put(
        &self,
        entity_id: EntityId,
        mutation: Mutation,
        snapshot: EntitySnapshot,
    ) -> CorrelationToken {
        let mut slots = self.slots.lock().await;
        let token = loop {
            let candidate = CorrelationToken::generate();
            if !slots.contains_key(&candidate) {
                break candidate;
            }
        };
        slots.insert(
            token.clone(),
            Slot::Pending(PendingMutation {
                token: token.clone(),
                entity_id,
                mutation,
                snapshot,
                created_at: Utc::now(),
                failed_attempts: 0,
            }),
        );
        token
    }

    pub async fn peek(&self, token: &CorrelationToken) -> Option<PendingMutation> {
        let slots = self.slots.lock().await;
        match slots.get(token) {
            Some(Slot::Pending(entry)) if !self.is_expired(entry, Utc::now()) => {
                Some(entry.clone())
            }
            _ => None,
        }
    }

    /// Claims the entry for commit. At most one caller gets `Some` per token;
    /// the token stays reserved until [`release`](Self::release) or
    /// [`restore`](Self::restore).
    pub async fn take_if_present(&self, token: &CorrelationToken) -> Option<PendingMutation> {
        let mut slots = self.slots.lock().await;
        match slots.remove(token) {
            Some(Slot::Pending(entry)) if self.is_expired(&entry, Utc::now()) => {
                debug!(%token, "pending mutation expired before confirm");
                None
            }
            Some(Slot::Pending(entry)) => {
                slots.insert(token.clone(), Slot::InFlight);
                Some(entry)
            }
            Some(Slot::InFlight) => {
                slots.insert(token.clone(), Slot::InFlight);
                None
            }
            None => None,
        }
    }

    /// Drops the token whatever its state. Returns true only when a live
    /// pending entry was removed; an in-flight claim is dropped too, which
    /// keeps a failing commit from restoring it.
    pub async fn discard(&self, token: &CorrelationToken) -> bool {
        let mut slots = self.slots.lock().await;
        match slots.remove(token) {
            Some(Slot::Pending(entry)) => !self.is_expired(&entry, Utc::now()),
            Some(Slot::InFlight) => {
                debug!(%token, "discarded while commit in flight");
                false
            }
            None => false,
        }
    }

    /// Puts an in-flight entry back under its own token. Refused when the
    /// claim was discarded in the meantime or the entry outlived its TTL; an
    /// expired claim is dropped.
    pub async fn restore(&self, entry: PendingMutation) -> bool {
        let mut slots = self.slots.lock().await;
        match slots.get_mut(&entry.token) {
            Some(slot) if matches!(slot, Slot::InFlight) => {
                if self.is_expired(&entry, Utc::now()) {
                    debug!(token = %entry.token, "pending mutation expired during commit");
                    slots.remove(&entry.token);
                    return false;
                }
                *slot = Slot::Pending(entry);
                true
            }
            _ => false,
        }
    }

    pub async fn release(&self, token: &CorrelationToken) {
        let mut slots = self.slots.lock().await;
        if matches!(slots.get(token), Some(Slot::InFlight)) {
            slots.remove(token);
        }
    }

    /// Removes pending entries older than the TTL. In-flight claims are left
    /// alone.
    pub async fn expire_stale(&self) -> usize {
        if self.ttl.is_none() {
            return 0;
        }
        let now = Utc::now();
        let mut slots = self.slots.lock().await;
        let before = slots.len();
        slots.retain(|_, slot| match slot {
            Slot::Pending(entry) => !self.is_expired(entry, now),
            Slot::InFlight => true,
        });
        before - slots.len()
    }

    /// Live pending entries, excluding in-flight claims.
    pub async fn len(&self) -> usize {
        let now = Utc::now();
        self.slots
            .lock()
            .await
            .values()
            .filter(|slot| matches!(slot, Slot::Pending(entry) if !self.is_expired(entry, now)))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn in_flight(&self) -> usize {
        self.slots
            .lock()
            .await
            .values()
            .filter(|slot| matches!(slot, Slot::InFlight))
            .count()
    }

    fn is_expired(&self, entry: &PendingMutation, now: DateTime<Utc>) -> bool {
        self.ttl
            .is_some_and(|ttl| now.signed_duration_since(entry.created_at) >= ttl)
    }
}

#[cfg(test)]
#[path = "tests/registry_tests.rs"]
mod tests;
