//! Command executors
//!
//! The `Executor` trait is the seam between service logic and the transport:
//! an SSH session runs commands on a managed server, `LocalExecutor` runs the
//! same probes on the console's own host.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{ConsoleError, Result};
use crate::ssh::CommandResult;

/// Per-subprocess bound for local probes
pub const LOCAL_PROBE_TIMEOUT_SECS: u64 = 5;

/// Runs shell commands somewhere and captures their output in full
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run `command` through a shell and wait for it to finish
    async fn execute(&self, command: &str) -> Result<CommandResult>;

    /// Release the underlying transport. Safe to call more than once.
    async fn close(&mut self);

    /// Short label for logs, e.g. `deploy@10.0.0.5:22` or `local`
    fn target(&self) -> String;
}

/// Executor for commands on the console's own host
#[derive(Debug, Clone)]
pub struct LocalExecutor {
    timeout: Duration,
}

impl LocalExecutor {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(LOCAL_PROBE_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for LocalExecutor {
    async fn execute(&self, command: &str) -> Result<CommandResult> {
        debug!("Running local command: {}", command);

        let child = Command::new("/bin/sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        match timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => {
                let output = output?;
                let exit_status = output.status.code().and_then(|c| u32::try_from(c).ok());
                Ok(CommandResult::from_parts(
                    String::from_utf8_lossy(&output.stdout),
                    String::from_utf8_lossy(&output.stderr),
                    exit_status,
                ))
            }
            Err(_) => {
                warn!(
                    "Local command timed out after {}ms",
                    self.timeout.as_millis()
                );
                Err(ConsoleError::Timeout(self.timeout.as_millis() as u64))
            }
        }
    }

    async fn close(&mut self) {}

    fn target(&self) -> String {
        "local".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_executor_captures_output() {
        let executor = LocalExecutor::new();
        let result = executor
            .execute("echo out; echo err >&2; exit 3")
            .await
            .unwrap();
        assert_eq!(result.stdout, "out\n");
        assert_eq!(result.stderr, "err\n");
        assert_eq!(result.exit_status, Some(3));
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_local_executor_success() {
        let executor = LocalExecutor::new();
        let result = executor.execute("true").await.unwrap();
        assert!(result.success);
        assert_eq!(result.exit_status, Some(0));
    }

    #[tokio::test]
    async fn test_local_executor_times_out() {
        let executor = LocalExecutor::with_timeout(Duration::from_millis(200));
        let err = executor.execute("sleep 5").await.unwrap_err();
        assert!(matches!(err, ConsoleError::Timeout(200)));
    }

    #[tokio::test]
    async fn test_local_close_is_noop() {
        let mut executor = LocalExecutor::new();
        executor.close().await;
        executor.close().await;
        assert_eq!(executor.target(), "local");
    }
}
