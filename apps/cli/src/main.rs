use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{ClientError, GameApi, HttpGameClient};
use shared::domain::SessionId;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod play;
mod render;

use config::{load_settings, load_settings_from, Settings};
use play::{Console, PlayEnd};

#[derive(Parser, Debug)]
#[command(name = "captionquest", about = "Describe images, clear stages, climb the leaderboard")]
struct Args {
    /// Overrides the configured server URL.
    #[arg(long, global = true)]
    server_url: Option<String>,
    /// Config file to read instead of ./client.toml.
    #[arg(long, global = true)]
    config: Option<std::path::PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a new session, or resume one with --session.
    Play {
        #[arg(long, required_unless_present = "session", conflicts_with = "session")]
        name: Option<String>,
        #[arg(long)]
        session: Option<String>,
    },
    Leaderboard {
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Per-image results of a session.
    Results {
        #[arg(long)]
        session: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let args = Args::parse();

    let mut settings = match &args.config {
        Some(path) => load_settings_from(path, |key| std::env::var(key).ok())?,
        None => load_settings()?,
    };
    if let Some(url) = args.server_url {
        settings.server_url = url;
    }

    let base_url = settings.api_base_url()?;
    let client = HttpGameClient::with_timeout(base_url, settings.request_timeout())
        .context("failed to build http client")?;
    info!(base_url = client.base_url(), "using scoring service");
    let api: Arc<dyn GameApi> = Arc::new(client);

    match args.command {
        Command::Play { name, session } => play(api, &settings, name, session).await,
        Command::Leaderboard { limit } => {
            let rows = api
                .leaderboard(limit.unwrap_or(settings.leaderboard_limit))
                .await
                .context("failed to fetch leaderboard")?;
            println!("{}", render::leaderboard(&rows));
            Ok(())
        }
        Command::Results { session } => show_results(api.as_ref(), &SessionId::new(session)).await,
    }
}

async fn play(
    api: Arc<dyn GameApi>,
    settings: &Settings,
    name: Option<String>,
    session: Option<String>,
) -> Result<()> {
    let session_id = match (session, name) {
        (Some(session), _) => SessionId::new(session),
        (None, Some(name)) => match api.start(&name).await {
            Ok(started) => {
                println!("Welcome, {}! Session {}", name.trim(), started.session_id);
                started.session_id
            }
            Err(ClientError::AlreadyPlayed(err)) => {
                println!(
                    "{}",
                    err.detail.as_deref().unwrap_or("That name has already played.")
                );
                return Ok(());
            }
            Err(err) => return Err(err).context("failed to start session"),
        },
        (None, None) => anyhow::bail!("either --name or --session is required"),
    };

    let mut console = Console::new();
    let end = play::run(api.clone(), settings, session_id.clone(), &mut console).await?;
    info!(%session_id, ?end, "play finished");
    if end == PlayEnd::Redirected {
        println!("Showing the results of that session.");
    }
    show_results(api.as_ref(), &session_id).await
}

async fn show_results(api: &dyn GameApi, session_id: &SessionId) -> Result<()> {
    let status = api
        .status(session_id)
        .await
        .with_context(|| format!("failed to fetch results for session {session_id}"))?;
    println!("{}", render::results(&status));
    Ok(())
}
