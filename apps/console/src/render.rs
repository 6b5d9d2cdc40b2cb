use serde::Serialize;
use shared::{
    domain::Entity,
    protocol::{CancelAck, Initiation, Outcome},
};

/// Turns protocol results into lines for the terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct Renderer {
    pub json: bool,
}

impl Renderer {
    pub fn initiation(&self, initiation: &Initiation) -> String {
        if self.json {
            return to_json(initiation);
        }
        match initiation {
            Initiation::AwaitingConfirmation(request) => format!(
                "{}\n  confirm with: confirm {}\n  abort with:   cancel {}",
                request.message, request.token, request.token
            ),
            Initiation::NotFound { entity_id } => format!("no record with id '{entity_id}'"),
        }
    }

    pub fn outcome(&self, outcome: &Outcome) -> String {
        if self.json {
            return to_json(outcome);
        }
        match outcome {
            Outcome::Success { entity_id, .. } => format!("done: {entity_id} committed"),
            Outcome::NotFound { entity_id } => {
                format!("{entity_id} no longer exists; nothing was changed")
            }
            Outcome::TransientFailure {
                entity_id,
                failed_attempts,
                retryable: true,
                reason,
            } => format!(
                "could not reach the backend for {entity_id} ({reason}, attempt {failed_attempts}); \
                 the request is still pending, confirm again to retry"
            ),
            Outcome::TransientFailure {
                entity_id, reason, ..
            } => format!(
                "could not reach the backend for {entity_id} ({reason}); the request was cancelled meanwhile"
            ),
            Outcome::InvalidToken => {
                "unknown or already used confirmation token; start the operation again".into()
            }
        }
    }

    pub fn cancel(&self, ack: &CancelAck) -> String {
        if self.json {
            return to_json(ack);
        }
        if ack.released {
            format!("cancelled {}", ack.token)
        } else {
            format!("nothing pending for {}", ack.token)
        }
    }

    pub fn entities(&self, entities: &[Entity]) -> String {
        if self.json {
            return to_json(entities);
        }
        if entities.is_empty() {
            return "(no records)".into();
        }
        entities
            .iter()
            .map(|entity| {
                let attributes = entity
                    .attributes
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join(" ");
                format!(
                    "{:<12} {:<12} {:<20} {attributes}",
                    entity.id, entity.kind, entity.label
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|err| format!("{{\"error\":\"serialization failed: {err}\"}}"))
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
