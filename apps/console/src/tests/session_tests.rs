use crate::seed::sample_entities;

use super::*;

async fn session(mode: FailureMode) -> Session {
    let settings = Settings {
        failure_mode: mode,
        commit_latency_ms: 0,
        ..Settings::default()
    };
    let (store, switch) = build_store(&settings);
    store.seed(sample_entities().expect("seed")).await;
    let coordinator =
        MutationCoordinator::with_config(Arc::new(store.clone()), settings.coordinator_config());
    Session::new(coordinator, store, switch, Renderer { json: true })
}

fn text(reply: Reply) -> String {
    match reply {
        Reply::Text(text) => text,
        Reply::Confirming { .. } => panic!("expected text reply"),
        Reply::Quit => panic!("unexpected quit"),
    }
}

async fn outcome(reply: Reply) -> Outcome {
    match reply {
        Reply::Confirming { handle, .. } => handle.await.expect("join"),
        _ => panic!("expected confirm reply"),
    }
}

fn token_of(json: &str) -> CorrelationToken {
    let value: serde_json::Value = serde_json::from_str(json).expect("json");
    let raw = value["token"].as_str().expect("token");
    CorrelationToken::from(raw)
}

#[test]
fn parses_commands() {
    assert_eq!(parse_command("   "), Ok(None));
    assert_eq!(parse_command("LIST"), Ok(Some(ShellCommand::List)));
    assert_eq!(
        parse_command("rm site-7"),
        Ok(Some(ShellCommand::Remove("site-7".into())))
    );
    assert_eq!(
        parse_command("update news-1 title=Open author=office"),
        Ok(Some(ShellCommand::Update {
            entity_id: "news-1".into(),
            attributes: BTreeMap::from([
                ("title".to_string(), "Open".to_string()),
                ("author".to_string(), "office".to_string()),
            ]),
        }))
    );
    assert_eq!(
        parse_command("confirm abc"),
        Ok(Some(ShellCommand::Confirm(CorrelationToken::from("abc"))))
    );
}

#[test]
fn rejects_malformed_commands() {
    assert!(parse_command("remove").is_err());
    assert!(parse_command("update news-1").is_err());
    assert!(parse_command("update news-1 title").is_err());
    assert!(parse_command("update news-1 =x").is_err());
    assert!(parse_command("frobnicate").is_err());
}

#[tokio::test]
async fn offline_then_online_retries_same_token() {
    let session = session(FailureMode::Never).await;
    let token = token_of(&text(
        session
            .execute(ShellCommand::Remove("card-3".into()))
            .await,
    ));

    text(session.execute(ShellCommand::Offline).await);
    match outcome(session.execute(ShellCommand::Confirm(token.clone())).await).await {
        Outcome::TransientFailure { retryable, .. } => assert!(retryable),
        other => panic!("unexpected outcome: {other:?}"),
    }

    text(session.execute(ShellCommand::Online).await);
    assert!(outcome(session.execute(ShellCommand::Confirm(token)).await)
        .await
        .is_success());

    let listing = text(session.execute(ShellCommand::List).await);
    assert!(!listing.contains("card-3"));
}

#[tokio::test]
async fn offline_mode_starts_disconnected() {
    let session = session(FailureMode::Offline).await;
    let token = token_of(&text(
        session
            .execute(ShellCommand::Remove("site-42".into()))
            .await,
    ));
    assert!(matches!(
        outcome(session.execute(ShellCommand::Confirm(token)).await).await,
        Outcome::TransientFailure { .. }
    ));
}

#[tokio::test]
async fn update_and_cancel_round_trip() {
    let session = session(FailureMode::Never).await;
    let token = token_of(&text(
        session
            .execute(ShellCommand::Update {
                entity_id: "news-1".into(),
                attributes: BTreeMap::from([("title".to_string(), "Closed".to_string())]),
            })
            .await,
    ));

    let ack = text(session.execute(ShellCommand::Cancel(token)).await);
    assert!(ack.contains("\"released\":true"));

    let listing = text(session.execute(ShellCommand::List).await);
    assert!(listing.contains("Open day"));
    assert!(!listing.contains("Closed"));
}

#[tokio::test]
async fn unknown_entity_reports_not_found() {
    let session = session(FailureMode::Never).await;
    let reply = text(session.execute(ShellCommand::Remove("ghost-1".into())).await);
    assert!(reply.contains("not_found"));
}

#[tokio::test]
async fn quit_ends_the_session() {
    let session = session(FailureMode::Never).await;
    assert!(matches!(session.execute(ShellCommand::Quit).await, Reply::Quit));
}
