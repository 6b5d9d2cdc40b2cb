use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Caller bug detected at the protocol boundary. Expected outcomes such as a
/// missing entity or a stale token are never reported through this type.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractViolation {
    #[error("entity id must not be empty")]
    EmptyEntityId,
    #[error("update mutation must change at least one attribute")]
    EmptyUpdate,
}
