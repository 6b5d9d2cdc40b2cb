use anyhow::{Context, Result};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader},
    task::JoinSet,
};
use tracing::error;

use crate::session::{parse_command, Reply, Session, HELP};

/// Reads commands from stdin until EOF or `quit`. Confirms run on the
/// runtime and print their outcome when the backend answers, so the prompt
/// stays responsive while a commit is slow.
pub async fn run(session: Session) -> Result<()> {
    println!("{HELP}");
    run_lines(&session, BufReader::new(tokio::io::stdin())).await
}

/// Drives `session` from `reader`. Returns only after every confirm started
/// here has reported its outcome.
pub async fn run_lines<R>(session: &Session, reader: R) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut confirms = JoinSet::new();

    while let Some(line) = lines.next_line().await.context("failed to read input")? {
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };

        match session.execute(command).await {
            Reply::Text(text) => println!("{text}"),
            Reply::Confirming { token, handle } => {
                println!("confirming {token} ...");
                let renderer = session.renderer();
                confirms.spawn(async move {
                    match handle.await {
                        Ok(outcome) => println!("{}", renderer.outcome(&outcome)),
                        Err(err) => error!(%token, %err, "confirm task failed"),
                    }
                });
            }
            Reply::Quit => break,
        }
    }

    while let Some(joined) = confirms.join_next().await {
        if let Err(err) = joined {
            error!(%err, "confirm printer failed");
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/shell_tests.rs"]
mod tests;
