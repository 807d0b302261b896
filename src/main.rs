//! Operations console - Entry point
//!
//! Parses CLI arguments, loads the server directory, starts the MCP server on
//! stdio transport, and handles graceful shutdown.

use std::sync::Arc;

use clap::Parser;
use rmcp::service::ServiceExt;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ops_console::config::{Args, Config};
use ops_console::directory::StaticDirectory;
use ops_console::dispatch::SshConnector;
use ops_console::error::{ConsoleError, Result};
use ops_console::server::ConsoleServer;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries MCP JSON-RPC
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::from_args(args)?;

    info!("Operations console v{} starting...", env!("CARGO_PKG_VERSION"));

    let directory = StaticDirectory::load(&config.servers).await?;
    info!(
        "Connect timeout: {}s, command timeout: {}s, settle: {}s, max chars: {}",
        config.timeouts.connect.as_secs(),
        config.timeouts.command.as_secs(),
        config.settle.as_secs(),
        config
            .max_chars
            .map_or("unlimited".to_string(), |n| n.to_string())
    );
    if let Some(ref id) = config.default_server {
        info!("Default server: {}", id);
    }

    let connector = SshConnector::new(config.timeouts);
    let server = ConsoleServer::new(config, Arc::new(directory), Arc::new(connector));

    info!("Operations console running on stdio");

    let server_for_shutdown = server.clone();

    // Wait for Ctrl+C or SIGTERM
    let shutdown_handle = tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT (Ctrl+C), shutting down...");
            }
            _ = terminate() => {
                info!("Received SIGTERM, shutting down...");
            }
        }

        server_for_shutdown.shutdown().await;
    });

    match server.serve(rmcp::transport::io::stdio()).await {
        Ok(running_server) => {
            info!("MCP server is serving...");
            if let Err(e) = running_server.waiting().await {
                error!("Server error: {}", e);
            }
        }
        Err(e) => {
            error!("Failed to start MCP server: {}", e);
            return Err(ConsoleError::transport(e.to_string()));
        }
    }

    shutdown_handle.abort();

    info!("Operations console stopped");

    Ok(())
}

#[cfg(unix)]
async fn terminate() {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!("Failed to register SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
