//! Command results
//!
//! Provides the `CommandResult` struct shared by SSH and local execution, and
//! batch collection of an exec channel's output.

use russh::{client, Channel, ChannelMsg};
use serde::Serialize;
use tracing::debug;

/// Outcome of one command execution
///
/// `success` is true iff `exit_status == Some(0)`. `error` is set when the
/// command exited non-zero or ended without reporting an exit status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_status: Option<u32>,
    pub error: Option<String>,
}

impl CommandResult {
    /// Build a result, deriving `success` and `error` from the exit status
    pub fn from_parts(
        stdout: impl Into<String>,
        stderr: impl Into<String>,
        exit_status: Option<u32>,
    ) -> Self {
        let stdout = stdout.into();
        let stderr = stderr.into();
        let error = match exit_status {
            Some(0) => None,
            Some(code) if stderr.trim().is_empty() => Some(format!("exit status {}", code)),
            Some(_) => Some(stderr.trim().to_string()),
            None => Some("command ended without an exit status".to_string()),
        };
        Self {
            success: exit_status == Some(0),
            stdout,
            stderr,
            exit_status,
            error,
        }
    }

    /// Get combined output (stdout + stderr)
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Collect output from an exec channel until it closes
pub(crate) async fn collect_channel_output(mut channel: Channel<client::Msg>) -> CommandResult {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut exit_status = None;

    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { data } => stdout.extend_from_slice(&data),
            ChannelMsg::ExtendedData { data, ext } => {
                // ext == 1 is SSH_EXTENDED_DATA_STDERR
                if ext == 1 {
                    stderr.extend_from_slice(&data);
                } else {
                    stdout.extend_from_slice(&data);
                }
            }
            ChannelMsg::ExitStatus { exit_status: code } => exit_status = Some(code),
            // Exit status may arrive after EOF, so only Close ends collection
            ChannelMsg::Close => break,
            _ => {}
        }
    }

    debug!(
        "Command completed: exit_status={:?}, stdout_len={}, stderr_len={}",
        exit_status,
        stdout.len(),
        stderr.len()
    );

    CommandResult::from_parts(
        String::from_utf8_lossy(&stdout),
        String::from_utf8_lossy(&stderr),
        exit_status,
    )
}
