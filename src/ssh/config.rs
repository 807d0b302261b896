//! SSH connection parameters
//!
//! Host, user, port and the credential used to authenticate. Key material
//! always takes priority over a password when both are present.

use std::path::{Path, PathBuf};

use crate::error::{ConsoleError, Result};

/// Default SSH port
pub const DEFAULT_SSH_PORT: u16 = 22;

/// SSH connection parameters for one host
#[derive(Clone, Default)]
pub struct SshConfig {
    /// Remote hostname or IP address
    pub host: String,

    /// SSH port (default: 22)
    pub port: u16,

    /// Username for authentication
    pub username: String,

    /// Password for password authentication
    pub password: Option<String>,

    /// Path to a private key file
    pub private_key_path: Option<PathBuf>,

    /// Private key content (raw text)
    pub private_key: Option<String>,
}

/// The single credential a connection authenticates with
#[derive(Clone, Copy)]
pub enum Credential<'a> {
    KeyContent(&'a str),
    KeyFile(&'a Path),
    Password(&'a str),
}

impl Credential<'_> {
    pub fn method(&self) -> &'static str {
        match self {
            Credential::KeyContent(_) | Credential::KeyFile(_) => "publickey",
            Credential::Password(_) => "password",
        }
    }
}

impl SshConfig {
    /// Create a new SSH configuration with minimal required fields
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_SSH_PORT,
            username: username.into(),
            ..Self::default()
        }
    }

    /// Set the SSH port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set password authentication
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set private key authentication from key content
    pub fn with_private_key(mut self, key: impl Into<String>) -> Self {
        self.private_key = Some(key.into());
        self
    }

    /// Set private key authentication from a key file
    pub fn with_private_key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.private_key_path = Some(path.into());
        self
    }

    /// Pick the credential to authenticate with.
    ///
    /// Order: key content, key file, password. Empty strings count as absent.
    pub fn credential(&self) -> Result<Credential<'_>> {
        if let Some(key) = self.private_key.as_deref().filter(|k| !k.trim().is_empty()) {
            return Ok(Credential::KeyContent(key));
        }
        if let Some(path) = self
            .private_key_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
        {
            return Ok(Credential::KeyFile(path));
        }
        if let Some(password) = self.password.as_deref().filter(|p| !p.is_empty()) {
            return Ok(Credential::Password(password));
        }
        Err(ConsoleError::CredentialMissing)
    }

    /// `host:port` for logging and error messages
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Debug for SshConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("private_key_path", &self.private_key_path)
            .field("private_key", &self.private_key.as_ref().map(|_| "***"))
            .finish()
    }
}
