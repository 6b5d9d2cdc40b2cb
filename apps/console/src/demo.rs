use std::sync::Arc;

use anyhow::Result;
use coordinator::MutationCoordinator;
use storage::{FailNext, InMemoryStore};

use crate::{render::Renderer, seed::sample_entities};

/// Walks through confirm, not-found, cancel and retry-after-failure against
/// a freshly seeded store and returns what a presenter would print.
pub async fn run(renderer: Renderer) -> Result<Vec<String>> {
    let failures = Arc::new(FailNext::default());
    let store = InMemoryStore::new(failures.clone());
    store.seed(sample_entities()?).await;
    let coordinator = MutationCoordinator::new(Arc::new(store.clone()));
    let mut lines = Vec::new();

    lines.push("== remove site-42 and confirm".to_string());
    let initiation = coordinator.initiate("site-42").await?;
    lines.push(renderer.initiation(&initiation));
    if let Some(token) = initiation.token() {
        lines.push(renderer.outcome(&coordinator.confirm(token).await));
        lines.push(renderer.outcome(&coordinator.confirm(token).await));
    }

    lines.push("== remove ghost-1".to_string());
    lines.push(renderer.initiation(&coordinator.initiate("ghost-1").await?));

    lines.push("== remove site-7 and cancel".to_string());
    let initiation = coordinator.initiate("site-7").await?;
    lines.push(renderer.initiation(&initiation));
    if let Some(token) = initiation.token() {
        lines.push(renderer.cancel(&coordinator.cancel(token).await));
        lines.push(renderer.outcome(&coordinator.confirm(token).await));
    }

    lines.push("== remove site-9 with one backend failure".to_string());
    let initiation = coordinator.initiate("site-9").await?;
    lines.push(renderer.initiation(&initiation));
    if let Some(token) = initiation.token() {
        failures.arm(1);
        lines.push(renderer.outcome(&coordinator.confirm(token).await));
        lines.push(renderer.outcome(&coordinator.confirm(token).await));
    }

    lines.push("== remaining records".to_string());
    lines.push(renderer.entities(&store.list().await));
    Ok(lines)
}
