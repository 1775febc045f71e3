//! `ollama-chat`: terminal client for a local Ollama server.

mod cli;
mod markdown;
mod repl;
mod terminal;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context as _, bail};
use clap::Parser as _;
use ollama_chat_core::{ChatSession, HttpTransport, init_observability};
use tracing::info;

use crate::cli::{Cli, Command, TurnArgs};
use crate::terminal::TerminalRenderer;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let _ = dotenvy::dotenv();
    init_observability("warn");

    let cli = Cli::parse();
    let config = cli.client_config()?;
    let consumer = config.stream_consumer();
    let transport = HttpTransport::new(config).context("failed to set up HTTP client")?;
    info!(base_url = %transport.config().base_url, "client ready");
    let session = ChatSession::new(Arc::new(transport)).with_consumer(consumer);

    match cli.command {
        Command::Models => {
            repl::print_models(&session)
                .await
                .context("could not list models")?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Status => {
            let status = session.check_connection().await;
            println!("{status}");
            Ok(if status.is_connected() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Ask(args) => {
            select_model(&session, &args.turn).await?;
            let mut renderer = TerminalRenderer::stdio(args.turn.output);
            let outcome =
                repl::send_interruptible(&session, &args.prompt_text(), &mut renderer).await?;
            Ok(if outcome.is_completed() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Chat(args) => {
            if let Err(err) = select_model(&session, &args.turn).await {
                eprintln!("⚠ {err:#}");
            }
            repl::run(&session, args.turn.output).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Uses `--model` when given, otherwise the first model the server lists.
async fn select_model(session: &ChatSession, turn: &TurnArgs) -> anyhow::Result<()> {
    if let Some(model) = &turn.model {
        session.select_model(model.as_str());
        return Ok(());
    }
    let models = session
        .load_models()
        .await
        .context("could not list models")?;
    if models.is_empty() || session.current_model().is_none() {
        bail!("no models installed; pull one with `ollama pull <model>`");
    }
    Ok(())
}
