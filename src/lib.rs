//! Operations console - SSH-driven status and control of named services
//!
//! This crate provides an MCP server that checks, starts, stops and restarts
//! services on managed Linux servers. Each request opens its own short-lived
//! SSH session, authenticated with exactly one explicit credential, and
//! closes it before answering.
//!
//! # Features
//!
//! - Service identifiers resolve to a family through an ordered rule table
//!   (`vue-frontend`, `postgres-main`, `celery-worker`, ...) plus the generic
//!   forms `systemd:<unit>`, `docker:<container>` and `http(s)://...`
//! - Start commands detach from the session and log to a per-service file
//! - Status output is classified by an ordered rule list; an explicit
//!   `NOT_RUNNING` sentinel always wins, and anything ambiguous is `stopped`
//! - Connectivity tests combine port, process and HTTP probes
//! - RSA, ECDSA and Ed25519 private keys, from a file or inline
//!
//! # MCP Tools
//!
//! - `service-status` - current status of a service
//! - `service-operation` - start, stop or restart a service
//! - `connectivity-test` - port, process and HTTP probes for a service
//! - `test-connection` - identity probe over SSH
//! - `list-servers` - server directory without credentials
//! - `tail-log` - last lines of a service's start log
//!
//! # Example Usage (CLI)
//!
//! ```bash
//! ops-console --servers=/etc/ops-console/servers.json --default-server=prod
//! ```
//!
//! # Example Usage (MCP Inspector)
//!
//! ```bash
//! npx @modelcontextprotocol/inspector ./target/release/ops-console -- \
//!   --servers=servers.json
//! ```

pub mod config;
pub mod directory;
pub mod dispatch;
pub mod error;
pub mod exec;
pub mod server;
pub mod services;
pub mod ssh;
pub mod tools;

// Re-exports for convenience
pub use config::{Args, Config};
pub use directory::{ServerDirectory, ServerRecord, StaticDirectory};
pub use dispatch::{Connector, ConnectivityRequest, Dispatcher, SshConnector};
pub use error::{ConsoleError, ErrorKind, Result};
pub use exec::{Executor, LocalExecutor};
pub use server::ConsoleServer;
pub use services::{ConnectivityReport, Operation, Verdict};
pub use ssh::{CommandResult, SshConfig, SshSession};
