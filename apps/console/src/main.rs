use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::{Parser, Subcommand};
use coordinator::MutationCoordinator;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod demo;
mod render;
mod seed;
mod session;
mod shell;

use config::load_settings;
use render::Renderer;
use session::{build_store, Session};

#[derive(Parser, Debug)]
#[command(name = "mutation-console", about = "Confirm-then-commit edits over a flaky backend")]
struct Cli {
    #[arg(long, default_value = "console.toml")]
    config: PathBuf,
    /// Print protocol results as JSON.
    #[arg(long)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the scripted walkthrough with deterministic failures.
    Demo,
    /// Interactive session against the seeded store.
    Shell,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli.config)?;

    let filter = EnvFilter::try_new(&settings.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let renderer = Renderer { json: cli.json };
    match cli.command {
        Command::Demo => {
            for line in demo::run(renderer).await? {
                println!("{line}");
            }
        }
        Command::Shell => {
            let (store, switch) = build_store(&settings);
            store.seed(seed::sample_entities()?).await;
            let coordinator = MutationCoordinator::with_config(
                Arc::new(store.clone()),
                settings.coordinator_config(),
            );
            info!(
                failure_mode = ?settings.failure_mode,
                failure_rate = settings.failure_rate,
                latency_ms = settings.commit_latency_ms,
                "console session started"
            );
            shell::run(Session::new(coordinator, store, switch, renderer)).await?;
        }
    }

    Ok(())
}
