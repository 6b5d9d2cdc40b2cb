use std::{collections::HashSet, sync::Arc, time::Duration};

use coordinator::MutationCoordinator;
use futures::future::join_all;
use shared::{
    domain::{CorrelationToken, Entity, EntityId},
    protocol::{Initiation, Outcome},
};
use storage::{EntityStore, FailNext, InMemoryStore};

fn id(raw: &str) -> EntityId {
    EntityId::parse(raw).expect("id")
}

async fn bookmarks(failures: Arc<FailNext>) -> (MutationCoordinator, InMemoryStore) {
    let store = InMemoryStore::new(failures);
    store
        .seed([
            Entity::new(id("site-42"), "bookmark", "Colosseum"),
            Entity::new(id("site-7"), "bookmark", "Pantheon"),
            Entity::new(id("site-9"), "bookmark", "Trevi Fountain"),
        ])
        .await;
    (MutationCoordinator::new(Arc::new(store.clone())), store)
}

async fn initiate(coordinator: &MutationCoordinator, raw: &str) -> CorrelationToken {
    coordinator
        .initiate(raw)
        .await
        .expect("initiate")
        .token()
        .expect("awaiting confirmation")
        .clone()
}

#[tokio::test]
async fn confirmed_removal_applies_once() {
    let (coordinator, store) = bookmarks(Arc::new(FailNext::default())).await;

    let request = coordinator
        .initiate("site-42")
        .await
        .expect("initiate")
        .into_request()
        .expect("awaiting confirmation");
    assert_eq!(request.snapshot.id, id("site-42"));

    assert!(coordinator.confirm(&request.token).await.is_success());
    assert!(store.find(&id("site-42")).await.is_none());
    assert_eq!(coordinator.confirm(&request.token).await, Outcome::InvalidToken);

    let ack = coordinator.cancel(&request.token).await;
    assert!(!ack.released);
    assert_eq!(store.commit_attempts(), 1);
}

#[tokio::test]
async fn unknown_entity_is_not_found_and_registers_nothing() {
    let (coordinator, store) = bookmarks(Arc::new(FailNext::default())).await;
    let live = initiate(&coordinator, "site-7").await;

    let initiation = coordinator.initiate("ghost-1").await.expect("initiate");
    assert_eq!(
        initiation,
        Initiation::NotFound {
            entity_id: id("ghost-1")
        }
    );
    assert_eq!(coordinator.pending_count().await, 1);
    assert!(coordinator.pending(&live).await.is_some());
    assert_eq!(store.len().await, 3);
}

#[tokio::test]
async fn cancel_leaves_entity_untouched() {
    let (coordinator, store) = bookmarks(Arc::new(FailNext::default())).await;
    let before = store.find(&id("site-7")).await.expect("snapshot");
    let token = initiate(&coordinator, "site-7").await;

    let ack = coordinator.cancel(&token).await;
    assert!(ack.released);
    assert_eq!(ack.token, token);

    let after = store.find(&id("site-7")).await.expect("still present");
    assert_eq!(after.label, before.label);
    assert_eq!(after.attributes, before.attributes);
    assert_eq!(coordinator.confirm(&token).await, Outcome::InvalidToken);
    assert_eq!(store.commit_attempts(), 0);

    // Cancelling again stays an acknowledgment.
    assert!(!coordinator.cancel(&token).await.released);
}

#[tokio::test]
async fn transient_failure_keeps_token_for_retry() {
    let failures = Arc::new(FailNext::new(1));
    let (coordinator, store) = bookmarks(failures.clone()).await;
    let token = initiate(&coordinator, "site-9").await;

    match coordinator.confirm(&token).await {
        Outcome::TransientFailure {
            entity_id,
            retryable,
            ..
        } => {
            assert_eq!(entity_id, id("site-9"));
            assert!(retryable);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(store.find(&id("site-9")).await.is_some());

    assert!(coordinator.confirm(&token).await.is_success());
    assert!(store.find(&id("site-9")).await.is_none());
    assert_eq!(failures.remaining(), 0);
}

#[tokio::test]
async fn live_tokens_are_unique() {
    let (coordinator, _) = bookmarks(Arc::new(FailNext::default())).await;
    let mut tokens = HashSet::new();
    for raw in ["site-42", "site-7", "site-9"].iter().cycle().take(60) {
        assert!(tokens.insert(initiate(&coordinator, raw).await));
    }
    assert_eq!(coordinator.pending_count().await, 60);
}

#[tokio::test]
async fn tokens_not_issued_by_the_registry_are_invalid() {
    let (coordinator, store) = bookmarks(Arc::new(FailNext::default())).await;
    let forged = CorrelationToken::from("site-42");
    assert_eq!(coordinator.confirm(&forged).await, Outcome::InvalidToken);
    assert!(!coordinator.cancel(&forged).await.released);
    assert_eq!(store.commit_attempts(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_confirms_succeed_exactly_once() {
    let store = InMemoryStore::default().with_commit_latency(Duration::from_millis(10));
    store
        .seed([Entity::new(id("card-1"), "report_card", "Term 1")])
        .await;
    let coordinator = MutationCoordinator::new(Arc::new(store.clone()));
    let token = initiate(&coordinator, "card-1").await;

    let handles = (0..16).map(|_| coordinator.confirm_in_background(token.clone()));
    let outcomes: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("join"))
        .collect();

    assert_eq!(outcomes.iter().filter(|o| o.is_success()).count(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| **o == Outcome::InvalidToken)
            .count(),
        15
    );
    assert_eq!(store.commit_attempts(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn confirm_cancel_race_has_a_single_winner() {
    for _ in 0..25 {
        let (coordinator, store) = bookmarks(Arc::new(FailNext::default())).await;
        let token = initiate(&coordinator, "site-7").await;

        let confirm = coordinator.confirm_in_background(token.clone());
        let cancel = {
            let coordinator = coordinator.clone();
            let token = token.clone();
            tokio::spawn(async move { coordinator.cancel(&token).await })
        };
        let outcome = confirm.await.expect("confirm join");
        let ack = cancel.await.expect("cancel join");

        if outcome.is_success() {
            assert!(!ack.released);
            assert!(!store.contains(&id("site-7")).await);
        } else {
            assert_eq!(outcome, Outcome::InvalidToken);
            assert!(ack.released);
            assert!(store.contains(&id("site-7")).await);
        }
        assert_eq!(coordinator.confirm(&token).await, Outcome::InvalidToken);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn independent_tokens_do_not_interfere() {
    let store = InMemoryStore::default().with_commit_latency(Duration::from_millis(2));
    let ids: Vec<_> = (0..20).map(|n| id(&format!("news-{n}"))).collect();
    store
        .seed(ids.iter().map(|id| Entity::new(id.clone(), "news", "headline")))
        .await;
    let coordinator = MutationCoordinator::new(Arc::new(store.clone()));

    let mut tokens = Vec::new();
    for entity_id in &ids {
        tokens.push(initiate(&coordinator, entity_id.as_str()).await);
    }
    let (to_confirm, to_cancel) = tokens.split_at(10);

    let confirms = to_confirm
        .iter()
        .map(|token| coordinator.confirm_in_background(token.clone()));
    let cancels = to_cancel.iter().map(|token| coordinator.cancel(token));
    let (outcomes, acks) = futures::join!(join_all(confirms), join_all(cancels));

    assert!(outcomes
        .into_iter()
        .all(|joined| joined.expect("join").is_success()));
    assert!(acks.iter().all(|ack| ack.released));
    assert_eq!(store.len().await, 10);
    assert_eq!(coordinator.pending_count().await, 0);
}
