//! Lenze - terminal client for streaming web search

mod render;
mod settings;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lenze_core::{
    ClientConfig, ConversationHistoryLoader, SearchApiClient, SearchSnapshot, SessionId,
    SessionStreamController,
};
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use render::AnswerPrinter;

/// Streaming web search in the terminal
#[derive(Parser)]
#[command(name = "lenze")]
#[command(version)]
struct Args {
    /// Search server root URL
    #[arg(long, env = "LENZE_BASE_URL", global = true)]
    base_url: Option<String>,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one search and stream the answer
    Search {
        query: String,
        /// Continue an existing session instead of starting a new one
        #[arg(long)]
        session: Option<String>,
    },
    /// Read queries line by line; each new line supersedes the running search
    Repl {
        #[arg(long)]
        session: Option<String>,
    },
    /// List past sessions
    Sessions,
    /// Show the completed turns of a session
    History { session: String },
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lenze=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging();

    let config = settings::resolve(args.config.as_deref(), args.base_url.as_deref())?;
    let client = SearchApiClient::new(config.endpoints()?);
    debug!("Using search server at {}", config.base_url);

    match args.command {
        Command::Search { query, session } => {
            let session = session_or_new(&client, session).await?;
            search(&config, session, query).await
        }
        Command::Repl { session } => {
            let session = session_or_new(&client, session).await?;
            repl(&config, session).await
        }
        Command::Sessions => list_sessions(&client).await,
        Command::History { session } => history(client, SessionId::new(session)).await,
    }
}

async fn session_or_new(client: &SearchApiClient, session: Option<String>) -> Result<SessionId> {
    match session {
        Some(id) => Ok(SessionId::new(id)),
        None => {
            let session = client
                .create_session()
                .await
                .context("Failed to start a new session")?;
            eprintln!("session {session}");
            Ok(session)
        }
    }
}

/// Forward every snapshot into a channel the command loop can select on
fn watch(
    controller: &SessionStreamController,
) -> Result<(lenze_core::Subscription, mpsc::UnboundedReceiver<SearchSnapshot>)> {
    let (tx, rx) = mpsc::unbounded_channel();
    let subscription = controller.subscribe(move |snapshot| {
        let _ = tx.send(snapshot.clone());
    })?;
    Ok((subscription, rx))
}

async fn search(config: &ClientConfig, session: SessionId, query: String) -> Result<()> {
    let controller = SessionStreamController::from_config(config)?;
    let (_subscription, mut snapshots) = watch(&controller)?;
    let mut printer = AnswerPrinter::new();
    let mut stdout = io::stdout();

    controller.start_search(session, query)?;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, cancelling search");
                controller.cancel();
                writeln!(stdout)?;
                break;
            }
            snapshot = snapshots.recv() => {
                let Some(snapshot) = snapshot else { break };
                if printer.render(&snapshot, &mut stdout)?.is_some() {
                    break;
                }
            }
        }
    }

    controller.dispose().await;
    Ok(())
}

async fn repl(config: &ClientConfig, session: SessionId) -> Result<()> {
    let controller = SessionStreamController::from_config(config)?;
    let (_subscription, mut snapshots) = watch(&controller)?;
    let mut printer = AnswerPrinter::new();
    let mut stdout = io::stdout();
    let mut lines = stdin_lines();
    let mut live = false;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                if !live {
                    break;
                }
                controller.cancel();
                writeln!(stdout)?;
                live = false;
            }
            line = lines.recv() => {
                let Some(line) = line else { break };
                let line = line.context("Failed to read input")?;
                let query = line.trim();
                if query.is_empty() {
                    continue;
                }
                controller.start_search(session.clone(), query)?;
                live = true;
            }
            snapshot = snapshots.recv() => {
                let Some(snapshot) = snapshot else { break };
                if printer.render(&snapshot, &mut stdout)?.is_some() {
                    live = false;
                }
            }
        }
    }

    controller.dispose().await;
    Ok(())
}

/// Stdin lines read on a dedicated thread, so a pending read never holds up
/// shutdown
fn stdin_lines() -> mpsc::UnboundedReceiver<io::Result<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

async fn list_sessions(client: &SearchApiClient) -> Result<()> {
    let sessions = client
        .list_sessions()
        .await
        .context("Failed to list sessions")?;
    let mut stdout = io::stdout().lock();
    for session in sessions {
        writeln!(stdout, "{}\t{}", session.session_id, session.first_query)?;
    }
    Ok(())
}

async fn history(client: SearchApiClient, session: SessionId) -> Result<()> {
    let loader = ConversationHistoryLoader::new(Arc::new(client));
    let load = loader.load(&session).await;
    if let Some(warning) = &load.warning {
        eprintln!("{warning}");
    }

    let mut stdout = io::stdout().lock();
    for (index, turn) in load.turns.iter().enumerate() {
        render::write_turn(index, turn, &mut stdout)?;
    }
    Ok(())
}
