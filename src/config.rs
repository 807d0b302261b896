//! Configuration and CLI argument parsing for the operations console

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::dispatch::DEFAULT_SETTLE_SECS;
use crate::error::{ConsoleError, Result};
use crate::ssh::session::{DEFAULT_COMMAND_TIMEOUT_SECS, DEFAULT_CONNECT_TIMEOUT_SECS};
use crate::ssh::SessionTimeouts;

/// Default max characters for custom check commands (None = unlimited)
pub const DEFAULT_MAX_CHARS: Option<usize> = Some(1000);

/// Operations console CLI arguments
#[derive(Parser, Debug, Clone)]
#[command(name = "ops-console")]
#[command(version)]
#[command(about = "MCP server for checking and controlling services on managed servers over SSH")]
pub struct Args {
    /// Server directory file (JSON)
    #[arg(long, env = "OPS_CONSOLE_SERVERS")]
    pub servers: PathBuf,

    /// Server used when a request names none
    #[arg(long, env = "OPS_CONSOLE_DEFAULT_SERVER")]
    pub default_server: Option<String>,

    /// TCP connect + SSH handshake timeout in seconds
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS, env = "OPS_CONSOLE_CONNECT_TIMEOUT")]
    pub connect_timeout: u64,

    /// Remote command timeout in seconds
    #[arg(long, default_value_t = DEFAULT_COMMAND_TIMEOUT_SECS, env = "OPS_CONSOLE_COMMAND_TIMEOUT")]
    pub command_timeout: u64,

    /// Seconds to wait before the post-operation status check
    #[arg(long, default_value_t = DEFAULT_SETTLE_SECS, env = "OPS_CONSOLE_SETTLE")]
    pub settle: u64,

    /// Maximum characters for custom check commands.
    /// Use "none", "0", or negative value to disable limit.
    /// Default: 1000
    #[arg(long = "maxChars", env = "OPS_CONSOLE_MAX_CHARS")]
    pub max_chars: Option<String>,
}

/// Parsed and validated configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server directory file
    pub servers: PathBuf,

    pub default_server: Option<String>,

    pub timeouts: SessionTimeouts,

    /// Delay before the post-operation status check
    pub settle: Duration,

    /// Maximum custom check command length (None = unlimited)
    pub max_chars: Option<usize>,
}

impl Config {
    /// Create Config from CLI Args
    pub fn from_args(args: Args) -> Result<Self> {
        validate_args(&args)?;

        let max_chars = parse_max_chars(args.max_chars.as_deref());

        Ok(Config {
            servers: args.servers,
            default_server: args
                .default_server
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            timeouts: SessionTimeouts {
                connect: Duration::from_secs(args.connect_timeout),
                command: Duration::from_secs(args.command_timeout),
            },
            settle: Duration::from_secs(args.settle),
            max_chars,
        })
    }
}

/// Validate CLI arguments, reporting every problem at once
fn validate_args(args: &Args) -> Result<()> {
    let mut errors = Vec::new();

    if !args.servers.exists() {
        errors.push(format!(
            "Server directory file not found: {}",
            args.servers.display()
        ));
    }

    if args.connect_timeout == 0 {
        errors.push("--connect-timeout must be positive".to_string());
    }

    if args.command_timeout == 0 {
        errors.push("--command-timeout must be positive".to_string());
    }

    if !errors.is_empty() {
        return Err(ConsoleError::Config(format!(
            "Configuration error:\n{}",
            errors.join("\n")
        )));
    }

    Ok(())
}

/// Parse max_chars argument
///
/// - "none" (case-insensitive) → None (unlimited)
/// - "0" or negative → None (unlimited)
/// - positive integer → Some(value)
/// - None (not provided) → DEFAULT_MAX_CHARS
pub fn parse_max_chars(value: Option<&str>) -> Option<usize> {
    match value {
        None => DEFAULT_MAX_CHARS,
        Some(s) => {
            if s.eq_ignore_ascii_case("none") {
                return None;
            }

            match s.parse::<i64>() {
                Ok(n) if n <= 0 => None,
                Ok(n) => Some(n as usize),
                Err(_) => DEFAULT_MAX_CHARS,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(servers: PathBuf) -> Args {
        Args::parse_from([
            "ops-console".into(),
            "--servers".into(),
            servers.into_os_string(),
        ])
    }

    #[test]
    fn test_defaults() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = Config::from_args(args(file.path().to_path_buf())).unwrap();
        assert_eq!(config.timeouts.connect, Duration::from_secs(10));
        assert_eq!(config.timeouts.command, Duration::from_secs(60));
        assert_eq!(config.settle, Duration::from_secs(2));
        assert_eq!(config.max_chars, Some(1000));
        assert!(config.default_server.is_none());
    }

    #[test]
    fn test_blank_default_server_is_none() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut a = args(file.path().to_path_buf());
        a.default_server = Some("  ".to_string());
        assert!(Config::from_args(a).unwrap().default_server.is_none());
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let mut a = args(PathBuf::from("/nonexistent/servers.json"));
        a.connect_timeout = 0;
        a.command_timeout = 0;
        let err = Config::from_args(a).unwrap_err().to_string();
        assert!(err.contains("Server directory file not found"));
        assert!(err.contains("--connect-timeout"));
        assert!(err.contains("--command-timeout"));
    }

    #[test]
    fn test_parse_max_chars_none_string() {
        assert_eq!(parse_max_chars(Some("none")), None);
        assert_eq!(parse_max_chars(Some("None")), None);
        assert_eq!(parse_max_chars(Some("NONE")), None);
    }

    #[test]
    fn test_parse_max_chars_zero_or_negative() {
        assert_eq!(parse_max_chars(Some("0")), None);
        assert_eq!(parse_max_chars(Some("-1")), None);
    }

    #[test]
    fn test_parse_max_chars_positive() {
        assert_eq!(parse_max_chars(Some("500")), Some(500));
    }

    #[test]
    fn test_parse_max_chars_invalid_or_missing() {
        assert_eq!(parse_max_chars(Some("abc")), DEFAULT_MAX_CHARS);
        assert_eq!(parse_max_chars(Some("")), DEFAULT_MAX_CHARS);
        assert_eq!(parse_max_chars(None), DEFAULT_MAX_CHARS);
    }
}
