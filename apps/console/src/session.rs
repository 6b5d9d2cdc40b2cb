use std::{collections::BTreeMap, sync::Arc};

use coordinator::MutationCoordinator;
use shared::{
    domain::{CorrelationToken, EntityId, Mutation},
    protocol::Outcome,
};
use storage::{
    CommitDecision, ConnectionSwitch, FailurePolicy, InMemoryStore, NeverFail, RandomFailures,
};
use tokio::task::JoinHandle;

use crate::{
    config::{FailureMode, Settings},
    render::Renderer,
};

pub const HELP: &str = "\
commands:
  list                          show all records
  remove <id>                   ask to remove a record
  update <id> key=value ...     ask to change attributes of a record
  confirm <token>               apply a pending request
  cancel <token>                drop a pending request
  offline | online              cut or restore the backend link
  expire                        drop pending requests older than the ttl
  help                          show this text
  quit                          leave";

/// Offline switch in front of the configured failure policy.
struct ShellPolicy {
    switch: Arc<ConnectionSwitch>,
    inner: Arc<dyn FailurePolicy>,
}

impl FailurePolicy for ShellPolicy {
    fn decide(&self, entity_id: &EntityId) -> CommitDecision {
        match self.switch.decide(entity_id) {
            CommitDecision::Proceed => self.inner.decide(entity_id),
            failed => failed,
        }
    }
}

pub fn build_store(settings: &Settings) -> (InMemoryStore, Arc<ConnectionSwitch>) {
    let switch = Arc::new(ConnectionSwitch::default());
    let inner: Arc<dyn FailurePolicy> = match settings.failure_mode {
        FailureMode::Never => Arc::new(NeverFail),
        FailureMode::Random => Arc::new(match settings.failure_seed {
            Some(seed) => RandomFailures::seeded(settings.failure_rate, seed),
            None => RandomFailures::new(settings.failure_rate),
        }),
        FailureMode::Offline => {
            switch.set_connected(false);
            Arc::new(NeverFail)
        }
    };
    let policy = Arc::new(ShellPolicy {
        switch: switch.clone(),
        inner,
    });
    let store = InMemoryStore::new(policy).with_commit_latency(settings.commit_latency());
    (store, switch)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    List,
    Remove(String),
    Update {
        entity_id: String,
        attributes: BTreeMap<String, String>,
    },
    Confirm(CorrelationToken),
    Cancel(CorrelationToken),
    Offline,
    Online,
    Expire,
    Help,
    Quit,
}

/// `Ok(None)` for blank input.
pub fn parse_command(line: &str) -> Result<Option<ShellCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();

    let command = match (verb.to_ascii_lowercase().as_str(), rest.as_slice()) {
        ("list" | "ls", []) => ShellCommand::List,
        ("remove" | "rm", [id]) => ShellCommand::Remove((*id).to_string()),
        ("update", [id, pairs @ ..]) if !pairs.is_empty() => {
            let mut attributes = BTreeMap::new();
            for pair in pairs {
                let Some((key, value)) = pair.split_once('=') else {
                    return Err(format!("expected key=value, got '{pair}'"));
                };
                if key.is_empty() {
                    return Err(format!("missing attribute name in '{pair}'"));
                }
                attributes.insert(key.to_string(), value.to_string());
            }
            ShellCommand::Update {
                entity_id: (*id).to_string(),
                attributes,
            }
        }
        ("confirm" | "y", [token]) => ShellCommand::Confirm(CorrelationToken::from(*token)),
        ("cancel" | "n", [token]) => ShellCommand::Cancel(CorrelationToken::from(*token)),
        ("offline", []) => ShellCommand::Offline,
        ("online", []) => ShellCommand::Online,
        ("expire", []) => ShellCommand::Expire,
        ("help" | "?", []) => ShellCommand::Help,
        ("quit" | "exit", []) => ShellCommand::Quit,
        (verb, _) => return Err(format!("cannot parse '{verb}' here; type 'help'")),
    };
    Ok(Some(command))
}

pub enum Reply {
    Text(String),
    Confirming {
        token: CorrelationToken,
        handle: JoinHandle<Outcome>,
    },
    Quit,
}

/// One presenter session bound to a coordinator and its store.
pub struct Session {
    coordinator: MutationCoordinator,
    store: InMemoryStore,
    switch: Arc<ConnectionSwitch>,
    renderer: Renderer,
}

impl Session {
    pub fn new(
        coordinator: MutationCoordinator,
        store: InMemoryStore,
        switch: Arc<ConnectionSwitch>,
        renderer: Renderer,
    ) -> Self {
        Self {
            coordinator,
            store,
            switch,
            renderer,
        }
    }

    pub fn renderer(&self) -> Renderer {
        self.renderer
    }

    pub async fn execute(&self, command: ShellCommand) -> Reply {
        match command {
            ShellCommand::List => Reply::Text(self.renderer.entities(&self.store.list().await)),
            ShellCommand::Remove(entity_id) => {
                self.initiate(&entity_id, Mutation::Remove).await
            }
            ShellCommand::Update {
                entity_id,
                attributes,
            } => {
                self.initiate(&entity_id, Mutation::Update { attributes })
                    .await
            }
            ShellCommand::Confirm(token) => Reply::Confirming {
                handle: self.coordinator.confirm_in_background(token.clone()),
                token,
            },
            ShellCommand::Cancel(token) => {
                Reply::Text(self.renderer.cancel(&self.coordinator.cancel(&token).await))
            }
            ShellCommand::Offline => {
                self.switch.set_connected(false);
                Reply::Text("backend is now offline".into())
            }
            ShellCommand::Online => {
                self.switch.set_connected(true);
                Reply::Text("backend is back online".into())
            }
            ShellCommand::Expire => {
                let expired = self.coordinator.expire_stale().await;
                Reply::Text(format!("expired {expired} pending request(s)"))
            }
            ShellCommand::Help => Reply::Text(HELP.into()),
            ShellCommand::Quit => Reply::Quit,
        }
    }

    async fn initiate(&self, entity_id: &str, mutation: Mutation) -> Reply {
        match self.coordinator.initiate_mutation(entity_id, mutation).await {
            Ok(initiation) => Reply::Text(self.renderer.initiation(&initiation)),
            Err(violation) => Reply::Text(format!("rejected: {violation}")),
        }
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
