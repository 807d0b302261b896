//! SSH client handler implementation
//!
//! Implements the `russh::client::Handler` trait to handle SSH connection events.

use russh::keys::{HashAlg, PublicKey};
use tracing::debug;

/// SSH client handler for russh
///
/// Host keys are accepted without consulting any `known_hosts` file or agent,
/// so authentication depends only on the explicit connection parameters.
/// The key fingerprint is logged for audit.
#[derive(Debug, Clone)]
pub struct SshHandler {
    host: String,
}

impl SshHandler {
    /// Create a new SSH handler for `host`
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }
}

impl russh::client::Handler for SshHandler {
    type Error = anyhow::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        debug!(
            "Host key for {}: {}",
            self.host,
            server_public_key.fingerprint(HashAlg::Sha256)
        );
        Ok(true)
    }
}
