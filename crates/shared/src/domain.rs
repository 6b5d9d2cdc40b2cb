use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ContractViolation;

/// Caller-supplied identifier of a record held by an entity store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn parse(raw: impl Into<String>) -> Result<Self, ContractViolation> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(ContractViolation::EmptyEntityId);
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// Opaque single-use handle binding an initiate call to its confirm or cancel.
///
/// Tokens minted by the registry are UUID v4 text. Callers may wrap any
/// string they received back from a presenter; unknown values are simply
/// reported as invalid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationToken(String);

impl CorrelationToken {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for CorrelationToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for CorrelationToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// Authoritative record as held by a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub kind: String,
    pub label: String,
    pub attributes: BTreeMap<String, String>,
}

impl Entity {
    pub fn new(id: EntityId, kind: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id,
            kind: kind.into(),
            label: label.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn snapshot(&self) -> EntitySnapshot {
        EntitySnapshot {
            id: self.id.clone(),
            kind: self.kind.clone(),
            label: self.label.clone(),
            attributes: self.attributes.clone(),
            captured_at: Utc::now(),
        }
    }
}

/// Copy of a record taken at initiation, used to render confirmation details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub kind: String,
    pub label: String,
    pub attributes: BTreeMap<String, String>,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Mutation {
    #[default]
    Remove,
    Update {
        attributes: BTreeMap<String, String>,
    },
}

impl Mutation {
    /// Human readable prompt shown while the mutation awaits confirmation.
    pub fn prompt(&self, snapshot: &EntitySnapshot) -> String {
        match self {
            Mutation::Remove => format!(
                "Remove {} '{}' ({})? This cannot be undone.",
                snapshot.kind, snapshot.label, snapshot.id
            ),
            Mutation::Update { attributes } => {
                let changes = attributes
                    .iter()
                    .map(|(key, value)| {
                        let before = snapshot.attributes.get(key).map_or("<unset>", String::as_str);
                        format!("{key}: {before} -> {value}")
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "Apply changes to {} '{}' ({}): {changes}?",
                    snapshot.kind, snapshot.label, snapshot.id
                )
            }
        }
    }
}
