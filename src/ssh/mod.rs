//! SSH session module
//!
//! Short-lived, explicitly authenticated SSH sessions: key loading, command
//! execution with batch output capture, and shell quoting helpers.

pub mod command;
pub mod config;
pub mod handler;
pub mod keys;
pub mod sanitize;
pub mod session;

// Re-exports
pub use command::CommandResult;
pub use config::{Credential, SshConfig};
pub use handler::SshHandler;
pub use keys::{parse_key, KeyParser, LoadedKey};
pub use sanitize::{sanitize_command, shell_quote};
pub use session::{SessionState, SessionTimeouts, SshSession};
