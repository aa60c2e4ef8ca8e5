//! relaydesk — relay operator replies from a Telegram bot to WebSocket clients
//!
//! Usage:
//!   relaydesk serve [--config relay.toml] [--port 3000]
//!   relaydesk check-config
//!
//! The bot token comes from `telegram.bot_token` or `TELEGRAM_BOT_TOKEN`,
//! the port from `server.port`, `PORT` or `--port`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use relaydesk_channels::TelegramNotifier;
use relaydesk_core::{RelayConfig, Router};
use relaydesk_gateway::GatewayServer;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "relaydesk", version, about = "Telegram operator relay for WebSocket clients")]
struct Cli {
    /// Config file (defaults to <config dir>/relaydesk/config.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the gateway
    Serve {
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        bind: Option<String>,
    },
    /// Print the resolved configuration with secrets redacted
    CheckConfig,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .init();
}

fn resolve_config(path: Option<&PathBuf>) -> Result<RelayConfig> {
    let mut config =
        RelayConfig::load(path.map(|p| p.as_path())).context("Failed to load config")?;
    config
        .apply_env(|name| std::env::var(name).ok())
        .context("Invalid environment override")?;
    Ok(config)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

async fn serve(mut config: RelayConfig, port: Option<u16>, bind: Option<String>) -> Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    config.validate()?;

    let notifier = Arc::new(TelegramNotifier::from_config(&config.telegram)?);
    let operator_chat = config.telegram.operator_chat();
    let router = Arc::new(Router::new(notifier).with_operator_chat(operator_chat));

    match operator_chat {
        Some(chat) => info!("Client messages will be forwarded to chat {}", chat),
        None => info!("No operator chat configured, client messages are only logged"),
    }

    GatewayServer::new(config.listen_addr(), router)
        .start(shutdown_signal())
        .await
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    info!("relaydesk v{} starting", env!("CARGO_PKG_VERSION"));
    let config = resolve_config(cli.config.as_ref())?;

    match cli.command {
        Command::Serve { port, bind } => serve(config, port, bind).await,
        Command::CheckConfig => {
            let rendered = toml::to_string_pretty(&config.redacted())
                .context("Failed to render config")?;
            println!("{}", rendered);
            match config.validate() {
                Ok(()) => println!("# config OK"),
                Err(e) => println!("# config invalid: {}", e),
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_serve_flags() {
        let cli = Cli::parse_from(["relaydesk", "-v", "serve", "--port", "8080"]);
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Command::Serve {
                port: Some(8080),
                bind: None
            }
        ));
    }

    #[test]
    fn test_parse_global_config() {
        let cli = Cli::parse_from(["relaydesk", "check-config", "--config", "relay.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("relay.toml")));
        assert!(matches!(cli.command, Command::CheckConfig));
    }
}
