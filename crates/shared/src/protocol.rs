use serde::{Deserialize, Serialize};

use crate::domain::{CorrelationToken, EntityId, EntitySnapshot, Mutation};

/// Data a presenter needs to ask the user for confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationRequest {
    pub token: CorrelationToken,
    pub message: String,
    pub snapshot: EntitySnapshot,
    pub mutation: Mutation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Initiation {
    AwaitingConfirmation(ConfirmationRequest),
    NotFound { entity_id: EntityId },
}

impl Initiation {
    pub fn token(&self) -> Option<&CorrelationToken> {
        match self {
            Initiation::AwaitingConfirmation(request) => Some(&request.token),
            Initiation::NotFound { .. } => None,
        }
    }

    pub fn into_request(self) -> Option<ConfirmationRequest> {
        match self {
            Initiation::AwaitingConfirmation(request) => Some(request),
            Initiation::NotFound { .. } => None,
        }
    }
}

/// Result of confirming a pending mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Success {
        entity_id: EntityId,
        mutation: Mutation,
    },
    /// The record vanished between initiate and commit.
    NotFound { entity_id: EntityId },
    /// The commit did not go through. When `retryable` is set the same token
    /// is still pending and confirm may be called again.
    TransientFailure {
        entity_id: EntityId,
        failed_attempts: u32,
        retryable: bool,
        reason: String,
    },
    InvalidToken,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelAck {
    pub token: CorrelationToken,
    /// Whether a live pending entry was discarded by this call.
    pub released: bool,
}
