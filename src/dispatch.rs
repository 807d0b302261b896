//! Request dispatch
//!
//! Resolves the server and service for a request, renders the commands,
//! opens one executor for the request and always closes it again, whatever
//! happened in between. Everything a transport needs to answer a request
//! goes through [`Dispatcher`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::directory::{ServerDirectory, ServerRecord, ServerSummary};
use crate::error::{ConsoleError, Result};
use crate::exec::{Executor, LocalExecutor};
use crate::services::catalog::{custom_check, RESTART_SETTLE_SECS};
use crate::services::connectivity::{self, ConnectivityPlan, ConnectivityReport};
use crate::services::{interpret, resolve, Operation, ServiceDescriptor, StatusCheck, Verdict};
use crate::ssh::sanitize::{sanitize_command, shell_quote};
use crate::ssh::session::IDENTITY_PROBE;
use crate::ssh::{CommandResult, SessionTimeouts, SshSession};

/// Default delay before the post-operation status check, in seconds
pub const DEFAULT_SETTLE_SECS: u64 = 2;

/// Default and maximum line counts for `tail_log`
pub const DEFAULT_TAIL_LINES: u32 = 200;
pub const MAX_TAIL_LINES: u32 = 2000;

/// Opens an executor for a server
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, server: &ServerRecord) -> Result<Box<dyn Executor>>;
}

/// SSH for remote servers, the local shell for `local` ones
#[derive(Debug, Clone, Copy, Default)]
pub struct SshConnector {
    timeouts: SessionTimeouts,
}

impl SshConnector {
    pub fn new(timeouts: SessionTimeouts) -> Self {
        Self { timeouts }
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn open(&self, server: &ServerRecord) -> Result<Box<dyn Executor>> {
        if server.local {
            return Ok(Box::new(LocalExecutor::new()));
        }
        let mut session = SshSession::new(self.timeouts);
        session.connect(&server.ssh_config()).await?;
        Ok(Box::new(session))
    }
}

/// Answer to a status request
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub success: bool,
    pub status: Verdict,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Answer to a start/stop/restart request
#[derive(Debug, Clone, Serialize)]
pub struct OperationReport {
    pub success: bool,
    pub operation: Operation,
    /// Verdict of the status check run after the settle delay
    pub status: Verdict,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Connectivity test inputs; absent fields fall back to the service's own
#[derive(Debug, Clone, Default)]
pub struct ConnectivityRequest {
    pub service_id: String,
    pub port: Option<u16>,
    pub health_check_url: Option<String>,
    /// Replaces the service's process probe
    pub check_command: Option<String>,
}

/// Tail of a service's dedicated start log
#[derive(Debug, Clone, Serialize)]
pub struct LogTail {
    pub success: bool,
    pub service: String,
    pub path: String,
    pub lines: u32,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Routes requests to executors
pub struct Dispatcher {
    directory: Arc<dyn ServerDirectory>,
    connector: Arc<dyn Connector>,
    settle: Duration,
    restart_pause: Duration,
    max_chars: Option<usize>,
}

/// What an operation executes before its status check
enum Commands {
    Single(String),
    Restart { stop: String, start: String },
}

impl Dispatcher {
    pub fn new(directory: Arc<dyn ServerDirectory>, connector: Arc<dyn Connector>) -> Self {
        Self {
            directory,
            connector,
            settle: Duration::from_secs(DEFAULT_SETTLE_SECS),
            restart_pause: Duration::from_secs(RESTART_SETTLE_SECS),
            max_chars: Some(1000),
        }
    }

    /// Delay between an operation and its status check
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Delay between the stop and start steps of a restart
    pub fn with_restart_pause(mut self, pause: Duration) -> Self {
        self.restart_pause = pause;
        self
    }

    /// Length limit for caller-supplied check commands
    pub fn with_max_chars(mut self, max_chars: Option<usize>) -> Self {
        self.max_chars = max_chars;
        self
    }

    pub fn list_servers(&self) -> Vec<ServerSummary> {
        self.directory
            .list()
            .iter()
            .map(|(id, record)| record.summary(id))
            .collect()
    }

    /// Run the identity probe on a server
    pub async fn test_connection(&self, server_id: &str) -> Result<CommandResult> {
        let server = self.directory.resolve(server_id)?;
        let mut executor = self.connector.open(&server).await?;
        let result = executor.execute(IDENTITY_PROBE).await;
        executor.close().await;

        let result = result?;
        info!(
            "Connection test for {}: success={}",
            server_id, result.success
        );
        Ok(result)
    }

    /// Current status of one service
    pub async fn status(&self, server_id: &str, service_id: &str) -> Result<StatusReport> {
        let server = self.directory.resolve(server_id)?;
        let check = describe(service_id, Operation::Status)?.status_check()?;

        let mut executor = self.connector.open(&server).await?;
        let result = executor.execute(&check.command).await;
        executor.close().await;

        let result = result?;
        let interpretation = interpret(&check, &result);
        debug!(
            "{} on {}: {} (rule {})",
            service_id, server_id, interpretation.verdict, interpretation.rule
        );

        let failed = interpretation.verdict == Verdict::Error;
        Ok(StatusReport {
            success: !failed,
            status: interpretation.verdict,
            output: result.combined_output().trim().to_string(),
            error: failed.then(|| result.error.clone().unwrap_or_default()),
        })
    }

    /// Start, stop or restart a service, then report its status
    ///
    /// The operation counts as successful when its command exits cleanly or
    /// the follow-up check already shows the intended state (`pkill` exits 1
    /// when there was nothing to stop).
    pub async fn operation(
        &self,
        server_id: &str,
        service_id: &str,
        operation: Operation,
    ) -> Result<OperationReport> {
        if operation == Operation::Status {
            return Err(ConsoleError::invalid_params(
                "status is not an operation; use the status request",
            ));
        }

        let server = self.directory.resolve(server_id)?;
        let descriptor = describe(service_id, operation)?;
        let commands = match operation {
            Operation::Restart => {
                let (stop, start) = descriptor.restart_steps(&server.project_path)?;
                Commands::Restart { stop, start }
            }
            _ => Commands::Single(descriptor.render(operation, &server.project_path)?),
        };
        let check = descriptor.status_check().ok();

        info!("{} {} on {}", operation, service_id, server_id);

        let mut executor = self.connector.open(&server).await?;
        let outcome = self
            .run_operation(executor.as_ref(), &commands, check.as_ref())
            .await;
        executor.close().await;

        let (result, verdict) = outcome?;
        let intended = match operation {
            Operation::Stop => Verdict::Stopped,
            _ => Verdict::Running,
        };
        let success = result.success || verdict == intended;
        if !success {
            warn!(
                "{} {} on {} failed: status {}",
                operation, service_id, server_id, verdict
            );
        }

        Ok(OperationReport {
            success,
            operation,
            status: verdict,
            output: result.combined_output().trim().to_string(),
            error: if success { None } else { result.error.clone() },
        })
    }

    async fn run_operation(
        &self,
        executor: &dyn Executor,
        commands: &Commands,
        check: Option<&StatusCheck>,
    ) -> Result<(CommandResult, Verdict)> {
        let result = match commands {
            Commands::Single(command) => executor.execute(command).await?,
            Commands::Restart { stop, start } => {
                restart(executor, stop, start, self.restart_pause).await?
            }
        };

        let Some(check) = check else {
            return Ok((result, Verdict::Unknown));
        };

        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }

        let verdict = match executor.execute(&check.command).await {
            Ok(status) => interpret(check, &status).verdict,
            Err(e) => {
                warn!("Post-operation status check failed: {}", e);
                Verdict::Unknown
            }
        };
        Ok((result, verdict))
    }

    /// Port, process and HTTP probes for one service
    pub async fn connectivity_test(
        &self,
        server_id: &str,
        request: &ConnectivityRequest,
    ) -> Result<ConnectivityReport> {
        let server = self.directory.resolve(server_id)?;
        let plan = self.plan(request)?;

        let mut executor = self.connector.open(&server).await?;
        let report = connectivity::run(executor.as_ref(), &plan).await;
        executor.close().await;

        info!(
            "Connectivity test for {} on {}: composite_success={}",
            request.service_id, server_id, report.composite_success
        );
        Ok(report)
    }

    fn plan(&self, request: &ConnectivityRequest) -> Result<ConnectivityPlan> {
        let descriptor = resolve(&request.service_id);

        let process_check = match request.check_command.as_deref() {
            Some(command) => Some(custom_check(&sanitize_command(command, self.max_chars)?)),
            None => descriptor.as_ref().and_then(ServiceDescriptor::process_probe),
        };

        let health_check_url = match request.health_check_url.as_deref() {
            Some(url) => Some(validate_url(url)?),
            None => descriptor.as_ref().and_then(|d| d.health_url.clone()),
        };

        let plan = ConnectivityPlan {
            port: request.port.or(descriptor.as_ref().and_then(|d| d.port)),
            process_check,
            health_check_url,
        };

        if plan.is_empty() {
            return Err(ConsoleError::unsupported(
                &request.service_id,
                "connectivity-test",
            ));
        }
        Ok(plan)
    }

    /// Last `lines` lines of a service's start log
    pub async fn tail_log(
        &self,
        server_id: &str,
        service_id: &str,
        lines: Option<u32>,
    ) -> Result<LogTail> {
        let lines = lines.unwrap_or(DEFAULT_TAIL_LINES);
        if !(1..=MAX_TAIL_LINES).contains(&lines) {
            return Err(ConsoleError::invalid_params(format!(
                "lines must be between 1 and {}, got {}",
                MAX_TAIL_LINES, lines
            )));
        }

        let server = self.directory.resolve(server_id)?;
        let path = describe(service_id, Operation::Status)?.log_path();
        let command = format!("tail -n {} {}", lines, shell_quote(&path));

        let mut executor = self.connector.open(&server).await?;
        let result = executor.execute(&command).await;
        executor.close().await;

        let result = result?;
        Ok(LogTail {
            success: result.success,
            service: service_id.to_string(),
            path,
            lines,
            content: result.stdout.clone(),
            error: result.error.clone(),
        })
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("settle", &self.settle)
            .field("restart_pause", &self.restart_pause)
            .field("max_chars", &self.max_chars)
            .finish()
    }
}

/// Run `stop`, wait `pause`, then run `start`, each as its own command
///
/// The stop step may find nothing to kill; only the start step decides the
/// exit status. Output of both steps is kept.
pub async fn restart(
    executor: &dyn Executor,
    stop: &str,
    start: &str,
    pause: Duration,
) -> Result<CommandResult> {
    let stopped = executor.execute(stop).await?;
    if !stopped.success {
        debug!(
            "Restart stop step on {}: {}",
            executor.target(),
            stopped.error.as_deref().unwrap_or("failed")
        );
    }

    if !pause.is_zero() {
        tokio::time::sleep(pause).await;
    }

    let started = executor.execute(start).await?;
    Ok(CommandResult::from_parts(
        join_lines(&stopped.stdout, &started.stdout),
        join_lines(&stopped.stderr, &started.stderr),
        started.exit_status,
    ))
}

fn join_lines(first: &str, second: &str) -> String {
    match (first.trim_end(), second.trim_end()) {
        ("", b) => b.to_string(),
        (a, "") => a.to_string(),
        (a, b) => format!("{}\n{}", a, b),
    }
}

fn describe(service_id: &str, operation: Operation) -> Result<ServiceDescriptor> {
    resolve(service_id).ok_or_else(|| ConsoleError::unsupported(service_id, operation.as_str()))
}

fn validate_url(url: &str) -> Result<String> {
    let url = url.trim();
    let lowered = url.to_lowercase();
    let scheme_ok = lowered.starts_with("http://") || lowered.starts_with("https://");
    if !scheme_ok || url.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ConsoleError::invalid_params(format!(
            "health_check_url must be an http(s) URL, got '{}'",
            url
        )));
    }
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert_eq!(
            validate_url(" http://127.0.0.1:3002/ ").unwrap(),
            "http://127.0.0.1:3002/"
        );
        assert!(validate_url("ftp://host/").is_err());
        assert!(validate_url("http://host/a b").is_err());
    }

    #[test]
    fn test_join_lines() {
        assert_eq!(join_lines("", "b\n"), "b");
        assert_eq!(join_lines("a\n", ""), "a");
        assert_eq!(join_lines("a\n", "b"), "a\nb");
    }

    #[test]
    fn test_describe_unknown_is_unsupported() {
        let err = describe("unknown-xyz-service", Operation::Start).unwrap_err();
        assert!(matches!(err, ConsoleError::ServiceUnsupported { .. }));
    }
}
