use anyhow::Context;
use api_client::{ConnectionManager, CredentialStore, Method, RequestClient};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};
use configuration::Config;
use core_types::SessionStatus;
use events::{FeedMessage, LiveFeed};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// The main entry point for the Richer client.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A .env file is optional; it only supplies RICHER__* overrides.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = configuration::load_config().context("Failed to load configuration")?;
    // Keep the guard alive so buffered log lines are flushed on exit.
    let _log_guard = configuration::init_tracing(&config.logging)?;

    let credentials = CredentialStore::open(&config.credentials.path)
        .context("Failed to open the credentials file")?;
    let client = RequestClient::new(&config.api, credentials.clone())?;

    match cli.command {
        Commands::Login(args) => {
            client.login(&args.username, &args.password).await?;
            println!("Logged in as {}.", args.username);
        }
        Commands::Register(args) => {
            client.register(&args.username, &args.password).await?;
            println!("Registered and logged in as {}.", args.username);
        }
        Commands::Logout => {
            client.logout()?;
            println!("Logged out.");
        }
        Commands::Whoami => {
            let me = client.me().await?;
            println!("{} (id {})", me.username, me.id);
        }
        Commands::Request(args) => handle_request(&client, args).await?,
        Commands::Watch => handle_watch(&config, credentials).await?,
    }

    Ok(())
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// A command-line client for the Richer trading backend.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the credential pair.
    Login(AuthArgs),
    /// Create an account and store the credential pair.
    Register(AuthArgs),
    /// Forget the stored credential pair.
    Logout,
    /// Show the logged-in user.
    Whoami,
    /// Send an authenticated request to the REST API.
    Request(RequestArgs),
    /// Stream live session updates until Ctrl-C.
    Watch,
}

#[derive(Parser)]
struct AuthArgs {
    #[arg(long)]
    username: String,

    #[arg(long)]
    password: String,
}

#[derive(Parser)]
struct RequestArgs {
    /// The HTTP method (e.g., "GET", "POST").
    method: String,

    /// The path relative to the API base URL (e.g., "/trading/sessions").
    path: String,

    /// A JSON request body.
    #[arg(long)]
    body: Option<String>,
}

// ==============================================================================
// Command Logic
// ==============================================================================

async fn handle_request(client: &RequestClient, args: RequestArgs) -> anyhow::Result<()> {
    let method = Method::from_bytes(args.method.to_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method: {}", args.method))?;
    let body = args
        .body
        .as_deref()
        .map(serde_json::from_str::<Value>)
        .transpose()
        .context("The request body is not valid JSON")?;

    let response = client.request(method, &args.path, body.as_ref()).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

/// Runs the push channel and redraws the session table on every status update.
async fn handle_watch(config: &Config, credentials: CredentialStore) -> anyhow::Result<()> {
    let feed = Arc::new(LiveFeed::with_capacity(config.channel.history_capacity));
    let mut envelopes = feed.subscribe();
    let mut manager = ConnectionManager::from_config(&config.channel, credentials, Arc::clone(&feed))?;
    manager
        .start()
        .context("Not logged in. Run `richer login` first")?;

    loop {
        tokio::select! {
            received = envelopes.recv() => match received {
                Ok(envelope) => {
                    tracing::info!(kind = %envelope.kind, channel = %envelope.channel, "Received event.");
                    match envelope.message() {
                        Ok(FeedMessage::SessionStatus(_)) => {
                            println!("{}", render_sessions(&feed.sessions()));
                        }
                        Ok(FeedMessage::SessionStopped(stopped)) => {
                            feed.remove_session(stopped.session_id);
                            tracing::info!(session_id = stopped.session_id, "Session stopped.");
                        }
                        Ok(_) => {}
                        Err(e) => tracing::debug!(error = %e, "Ignoring undecodable payload."),
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event display fell behind.");
                }
                Err(RecvError::Closed) => break,
            },
            result = tokio::signal::ctrl_c() => {
                result?;
                tracing::info!("Shutdown requested.");
                break;
            }
        }
    }

    manager.stop().await;
    Ok(())
}

fn render_sessions(sessions: &[SessionStatus]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "Session", "Stock", "Status", "Price", "Signal", "Message", "Checked",
    ]);

    for session in sessions {
        table.add_row(vec![
            session.session_id.to_string(),
            format!("{} {}", session.stock_code, session.stock_name)
                .trim()
                .to_string(),
            session.status.as_str().to_string(),
            session
                .current_price
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string()),
            session
                .signal
                .map(|s| s.as_str().to_string())
                .unwrap_or_else(|| "-".to_string()),
            session.message.clone(),
            session
                .last_checked_at
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }

    table
}
