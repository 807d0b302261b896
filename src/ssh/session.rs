//! SSH Session
//!
//! One authenticated connection to one host for one logical operation:
//! connect, run one or more commands with batch output capture, close.
//! Sessions are never cached across requests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::keys::PrivateKeyWithHashAlg;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::command::{collect_channel_output, CommandResult};
use super::config::{Credential, SshConfig};
use super::handler::SshHandler;
use super::keys::load_credential_key;
use crate::error::{ConsoleError, Result};
use crate::exec::Executor;

/// Default bound on TCP connect, SSH handshake and authentication, in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default bound on a single remote command, in seconds
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 60;

/// Identity probe run by [`SshSession::test`]
pub const IDENTITY_PROBE: &str = "whoami && hostname";

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Timeouts applied to connect and execute
#[derive(Debug, Clone, Copy)]
pub struct SessionTimeouts {
    pub connect: Duration,
    pub command: Duration,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            command: Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS),
        }
    }
}

/// SSH Session
///
/// Owns zero or one live transport handle. Callers must `close()` on every
/// exit path; dropping a connected session still tears the transport down but
/// is logged as a leak.
pub struct SshSession {
    timeouts: SessionTimeouts,

    /// Active SSH session handle
    handle: Mutex<Option<Handle<SshHandler>>>,

    state: SessionState,

    /// `user@host:port` of the current or last connection
    target: String,
}

impl SshSession {
    /// Create a disconnected session
    pub fn new(timeouts: SessionTimeouts) -> Self {
        Self {
            timeouts,
            handle: Mutex::new(None),
            state: SessionState::Disconnected,
            target: String::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Open and authenticate a connection
    ///
    /// Any previous handle is closed first. The credential and key material
    /// are validated before any network traffic, so a missing credential or an
    /// unparseable key never opens a socket.
    pub async fn connect(&mut self, params: &SshConfig) -> Result<()> {
        self.close().await;

        let credential = params.credential()?;
        let key = load_credential_key(credential).await?;

        self.target = format!("{}@{}", params.username, params.address());
        self.state = SessionState::Connecting;

        match self.do_connect(params, credential, key).await {
            Ok(handle) => {
                *self.handle.get_mut() = Some(handle);
                self.state = SessionState::Connected;
                info!("Connected to {}", self.target);
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Disconnected;
                error!("SSH connection to {} failed: {}", self.target, e);
                Err(e)
            }
        }
    }

    /// Dial, handshake and authenticate under one connect deadline
    async fn do_connect(
        &self,
        params: &SshConfig,
        credential: Credential<'_>,
        key: Option<super::keys::LoadedKey>,
    ) -> Result<Handle<SshHandler>> {
        let addr = params.address();
        debug!("Connecting to SSH server {}...", addr);

        match timeout(self.timeouts.connect, open_authenticated(params, credential, key)).await {
            Ok(result) => result,
            Err(_) => Err(ConsoleError::unreachable(format!(
                "{}: connection timeout after {}s",
                addr,
                self.timeouts.connect.as_secs()
            ))),
        }
    }

    /// Run the identity probe to confirm the session is usably authenticated
    pub async fn test(&self) -> Result<CommandResult> {
        self.run(IDENTITY_PROBE).await
    }

    /// Run a command and capture stdout, stderr and exit status in full
    ///
    /// Opening the channel, starting the command and collecting its output
    /// share the command deadline.
    pub async fn run(&self, command: &str) -> Result<CommandResult> {
        let exchange = async {
            let channel = {
                let guard = self.handle.lock().await;
                let handle = guard.as_ref().ok_or(ConsoleError::NoActiveSession)?;
                handle.channel_open_session().await.map_err(|e| {
                    ConsoleError::transport(format!("Failed to open channel: {}", e))
                })?
            };

            channel
                .exec(true, command)
                .await
                .map_err(|e| ConsoleError::transport(format!("Failed to exec command: {}", e)))?;

            Ok::<_, ConsoleError>(collect_channel_output(channel).await)
        };

        match timeout(self.timeouts.command, exchange).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "Command on {} timed out after {}ms",
                    self.target,
                    self.timeouts.command.as_millis()
                );
                Err(ConsoleError::Timeout(self.timeouts.command.as_millis() as u64))
            }
        }
    }

    /// Release the transport handle. Idempotent.
    pub async fn shutdown(&mut self) {
        if let Some(handle) = self.handle.get_mut().take() {
            let _ = handle
                .disconnect(russh::Disconnect::ByApplication, "", "")
                .await;
            info!("SSH connection to {} closed", self.target);
        }
        self.state = SessionState::Disconnected;
    }
}

/// Open the transport and authenticate with the one configured credential
async fn open_authenticated(
    params: &SshConfig,
    credential: Credential<'_>,
    key: Option<super::keys::LoadedKey>,
) -> Result<Handle<SshHandler>> {
    // No agent, no ~/.ssh lookup: only the explicit credential is offered
    let ssh_config = Arc::new(client::Config::default());
    let mut handle = client::connect(
        ssh_config,
        (params.host.as_str(), params.port),
        SshHandler::new(&params.host),
    )
    .await
    .map_err(|e| classify_connect_error(e, &params.address()))?;

    let authenticated = match (credential, key) {
        (Credential::Password(password), _) => {
            debug!(
                "Attempting password authentication for user '{}'",
                params.username
            );
            handle
                .authenticate_password(&params.username, password)
                .await
                .map_err(|e| ConsoleError::transport(e.to_string()))?
                .success()
        }
        (_, Some(loaded)) => {
            debug!(
                "Attempting key authentication for user '{}' ({:?} key)",
                params.username, loaded.parser
            );
            let hash_alg = if loaded.is_rsa() {
                handle
                    .best_supported_rsa_hash()
                    .await
                    .ok()
                    .flatten()
                    .flatten()
            } else {
                None
            };
            let key_with_alg = PrivateKeyWithHashAlg::new(Arc::new(loaded.key), hash_alg);
            handle
                .authenticate_publickey(&params.username, key_with_alg)
                .await
                .map_err(|e| ConsoleError::transport(e.to_string()))?
                .success()
        }
        (_, None) => return Err(ConsoleError::CredentialMissing),
    };

    if !authenticated {
        let _ = handle
            .disconnect(russh::Disconnect::ByApplication, "", "")
            .await;
        return Err(ConsoleError::auth(format!(
            "{} authentication rejected for user '{}'",
            credential.method(),
            params.username
        )));
    }

    Ok(handle)
}

/// Separate "could not reach the host" from SSH-level failures
fn classify_connect_error(err: anyhow::Error, addr: &str) -> ConsoleError {
    let unreachable = err.downcast_ref::<std::io::Error>().is_some()
        || matches!(err.downcast_ref::<russh::Error>(), Some(russh::Error::IO(_)));
    if unreachable {
        ConsoleError::unreachable(format!("{}: {}", addr, err))
    } else {
        ConsoleError::transport(format!("{}: {}", addr, err))
    }
}

#[async_trait]
impl Executor for SshSession {
    async fn execute(&self, command: &str) -> Result<CommandResult> {
        self.run(command).await
    }

    async fn close(&mut self) {
        self.shutdown().await;
    }

    fn target(&self) -> String {
        self.target.clone()
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        if self.handle.get_mut().is_some() {
            warn!("SSH session to {} dropped without close()", self.target);
        }
    }
}

impl std::fmt::Debug for SshSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshSession")
            .field("target", &self.target)
            .field("state", &self.state)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}
