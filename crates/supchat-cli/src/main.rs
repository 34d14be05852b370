//! Terminal frontend for the supchat client.
//!
//! Thin presentation layer: collects the visitor identity, prints the
//! controller's event stream, and maps slash commands onto the session
//! operations. All session logic lives in `supchat-client`.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use supchat_client::{ChatEvent, ClientConfig, LifecycleState, SessionController};
use supchat_core::SenderRole;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "supchat", about = "supchat — terminal client for a support-chat backend")]
struct Cli {
    /// Path to an optional TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Base URL for the fallback HTTP API (overrides config)
    #[arg(long)]
    api_root: Option<String>,
    /// Explicit realtime origin, e.g. wss://support.example.com (overrides config)
    #[arg(long)]
    ws_url: Option<String>,
    /// Visitor name (prompted for when omitted)
    #[arg(long)]
    name: Option<String>,
    /// Visitor email (prompted for when omitted)
    #[arg(long)]
    email: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("supchat=warn")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            toml::from_str::<ClientConfig>(&raw).context("parsing config file")?
        }
        None => ClientConfig::default(),
    };
    if let Some(api_root) = cli.api_root {
        config.api_root = api_root;
    }
    if let Some(ws_url) = cli.ws_url {
        config.ws_url = Some(ws_url);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let name = match cli.name {
        Some(name) => name,
        None => prompt(&mut lines, "Name: ").await?,
    };
    let email = match cli.email {
        Some(email) => email,
        None => prompt(&mut lines, "Email: ").await?,
    };

    let mut controller = SessionController::new(config);
    let mut chat_events = controller
        .take_event_receiver()
        .context("chat event receiver already taken")?;
    let mut transport_events = controller
        .take_transport_events()
        .context("transport event receiver already taken")?;

    controller.start(&name, &email).await?;
    println!("Type a message, /end to finish, /quit to leave immediately.");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if handle_line(&mut controller, line.trim()).await? {
                    break;
                }
            }
            event = transport_events.recv() => {
                let Some(event) = event else { break };
                controller.handle_transport_event(event).await;
            }
            event = chat_events.recv() => {
                let Some(event) = event else { break };
                if print_event(&event) {
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Handles one input line; returns `true` when the loop should exit.
async fn handle_line(controller: &mut SessionController, line: &str) -> anyhow::Result<bool> {
    if line.is_empty() {
        return Ok(false);
    }
    match line.split_whitespace().next() {
        Some("/end") => {
            controller.end();
            if controller.state() == LifecycleState::Ending {
                println!("Rate your experience with /rate <0-5> [comment], or /skip.");
            }
        }
        Some("/rate") => {
            let rest = line.strip_prefix("/rate").unwrap_or("").trim();
            let mut parts = rest.splitn(2, ' ');
            match parts.next().unwrap_or("").parse::<u8>() {
                Ok(score) => {
                    let comment = parts.next().unwrap_or("").trim();
                    if let Err(e) = controller.submit_rating(score, comment).await {
                        eprintln!("{e}");
                    }
                }
                Err(_) => eprintln!("Usage: /rate <0-5> [comment]"),
            }
        }
        Some("/skip") => controller.skip_rating().await,
        Some("/quit") => {
            controller.end();
            controller.skip_rating().await;
            return Ok(true);
        }
        _ => {
            if let Err(e) = controller.send_message(line).await {
                eprintln!("{e}");
            }
        }
    }
    Ok(false)
}

/// Prints one chat event; returns `true` once the session is closed.
fn print_event(event: &ChatEvent) -> bool {
    match event {
        ChatEvent::MessageRendered { role, text } => {
            let tag = match role {
                SenderRole::Visitor => "you",
                SenderRole::Agent => "agent",
                SenderRole::System => "system",
            };
            println!("{tag}> {text}");
            false
        }
        ChatEvent::SystemNotice(text) => {
            println!("* {text}");
            false
        }
        ChatEvent::SessionActive => false,
        ChatEvent::SessionClosed => {
            println!("* Session closed. Bye!");
            true
        }
    }
}

async fn prompt(lines: &mut Lines<BufReader<Stdin>>, label: &str) -> anyhow::Result<String> {
    use std::io::Write;
    print!("{label}");
    std::io::stdout().flush()?;
    Ok(lines
        .next_line()
        .await?
        .unwrap_or_default()
        .trim()
        .to_string())
}
