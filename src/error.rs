//! Error types for the operations console

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Main error type for the operations console
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// Connection parameters carry neither a password nor key material
    #[error("No credential supplied (require password, private key path, or private key content)")]
    CredentialMissing,

    /// The server rejected the supplied credential
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// TCP connect failed or timed out before the SSH handshake
    #[error("Host unreachable: {0}")]
    HostUnreachable(String),

    /// SSH protocol or channel failure after the socket was up
    #[error("SSH transport error: {0}")]
    Transport(String),

    /// Remote or local command did not finish in time
    #[error("Command timeout after {0}ms")]
    Timeout(u64),

    /// `execute` called on a session that is not connected
    #[error("No active connection")]
    NoActiveSession,

    /// Private key file path does not exist
    #[error("Private key file not found: {}", .0.display())]
    KeyFileNotFound(PathBuf),

    /// Key material did not parse as any supported algorithm
    #[error("Unable to parse private key: {0}")]
    KeyUnparseable(String),

    /// The catalog has no rule for this service/operation pair
    #[error("Operation '{operation}' is not available for service '{service}'")]
    ServiceUnsupported { service: String, operation: String },

    /// Server id unknown to the directory, or the server is inactive
    #[error("Server not found: {0}")]
    ServerNotFound(String),

    /// Invalid parameters provided
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using ConsoleError
pub type Result<T> = std::result::Result<T, ConsoleError>;

/// Machine-readable error kind, reported next to the human message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    CredentialMissing,
    AuthenticationFailed,
    HostUnreachable,
    TransportFailure,
    NoActiveSession,
    KeyFileNotFound,
    KeyUnparseable,
    ServiceUnsupported,
    ServerNotFound,
    InvalidParams,
    Config,
    Io,
}

/// Response class a transport maps an error kind onto
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Client,
    NotFound,
    Server,
}

impl ErrorKind {
    pub fn class(self) -> ErrorClass {
        match self {
            ErrorKind::InvalidParams | ErrorKind::ServiceUnsupported => ErrorClass::Client,
            ErrorKind::ServerNotFound => ErrorClass::NotFound,
            _ => ErrorClass::Server,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::CredentialMissing => "credential_missing",
            ErrorKind::AuthenticationFailed => "authentication_failed",
            ErrorKind::HostUnreachable => "host_unreachable",
            ErrorKind::TransportFailure => "transport_failure",
            ErrorKind::NoActiveSession => "no_active_session",
            ErrorKind::KeyFileNotFound => "key_file_not_found",
            ErrorKind::KeyUnparseable => "key_unparseable",
            ErrorKind::ServiceUnsupported => "service_unsupported",
            ErrorKind::ServerNotFound => "server_not_found",
            ErrorKind::InvalidParams => "invalid_params",
            ErrorKind::Config => "config",
            ErrorKind::Io => "io",
        }
    }
}

impl ConsoleError {
    /// Create an authentication error from a string
    pub fn auth(msg: impl Into<String>) -> Self {
        ConsoleError::AuthenticationFailed(msg.into())
    }

    /// Create a transport error from a string
    pub fn transport(msg: impl Into<String>) -> Self {
        ConsoleError::Transport(msg.into())
    }

    /// Create a host-unreachable error from a string
    pub fn unreachable(msg: impl Into<String>) -> Self {
        ConsoleError::HostUnreachable(msg.into())
    }

    /// Create an invalid params error from a string
    pub fn invalid_params(msg: impl Into<String>) -> Self {
        ConsoleError::InvalidParams(msg.into())
    }

    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        ConsoleError::Config(msg.into())
    }

    pub fn unsupported(service: impl Into<String>, operation: impl Into<String>) -> Self {
        ConsoleError::ServiceUnsupported {
            service: service.into(),
            operation: operation.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ConsoleError::CredentialMissing => ErrorKind::CredentialMissing,
            ConsoleError::AuthenticationFailed(_) => ErrorKind::AuthenticationFailed,
            ConsoleError::HostUnreachable(_) => ErrorKind::HostUnreachable,
            ConsoleError::Transport(_) | ConsoleError::Timeout(_) => ErrorKind::TransportFailure,
            ConsoleError::NoActiveSession => ErrorKind::NoActiveSession,
            ConsoleError::KeyFileNotFound(_) => ErrorKind::KeyFileNotFound,
            ConsoleError::KeyUnparseable(_) => ErrorKind::KeyUnparseable,
            ConsoleError::ServiceUnsupported { .. } => ErrorKind::ServiceUnsupported,
            ConsoleError::ServerNotFound(_) => ErrorKind::ServerNotFound,
            ConsoleError::InvalidParams(_) => ErrorKind::InvalidParams,
            ConsoleError::Config(_) => ErrorKind::Config,
            ConsoleError::Io(_) => ErrorKind::Io,
        }
    }
}

/// Serialisable failure body: human message plus structured kind
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: ErrorKind,
}

impl From<&ConsoleError> for ErrorBody {
    fn from(err: &ConsoleError) -> Self {
        Self {
            error: err.to_string(),
            kind: err.kind(),
        }
    }
}
