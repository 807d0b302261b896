//! Connectivity test aggregation
//!
//! Runs up to three independent probes against one service (port listen,
//! process/status check, HTTP status from the target host) and reduces them
//! to a composite verdict. A probe is skipped when its input is absent, and a
//! failing probe never prevents the others from running.

use serde::Serialize;
use tracing::{debug, warn};

use super::catalog::{http_check, port_check};
use super::status::{interpret, parse_http_code, StatusCheck, Verdict};
use crate::exec::Executor;

/// Outcome of a single probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeOutcome {
    Passed,
    /// Reachable but not quite right (HTTP 404); does not fail the composite
    Warning,
    Failed,
}

/// One itemised probe result
#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub success: bool,
    pub outcome: ProbeOutcome,
    pub message: String,
    pub command: String,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_code: Option<u16>,
}

impl ProbeResult {
    fn new(outcome: ProbeOutcome, message: impl Into<String>, command: &str, output: &str) -> Self {
        Self {
            success: outcome != ProbeOutcome::Failed,
            outcome,
            message: message.into(),
            command: command.to_string(),
            output: output.trim().to_string(),
            http_code: None,
        }
    }
}

/// Composite connectivity verdict with its sub-results
#[derive(Debug, Clone, Serialize)]
pub struct ConnectivityReport {
    pub port_check: Option<ProbeResult>,
    pub process_check: Option<ProbeResult>,
    pub http_check: Option<ProbeResult>,
    pub composite_success: bool,
}

impl ConnectivityReport {
    /// Build a report; the composite is the AND of every probe that ran
    pub fn from_probes(
        port_check: Option<ProbeResult>,
        process_check: Option<ProbeResult>,
        http_check: Option<ProbeResult>,
    ) -> Self {
        let composite_success = [&port_check, &process_check, &http_check]
            .into_iter()
            .flatten()
            .all(|probe| probe.success);
        Self {
            port_check,
            process_check,
            http_check,
            composite_success,
        }
    }
}

/// Which probes to run
#[derive(Debug, Clone, Default)]
pub struct ConnectivityPlan {
    pub port: Option<u16>,
    pub process_check: Option<StatusCheck>,
    pub health_check_url: Option<String>,
}

impl ConnectivityPlan {
    pub fn is_empty(&self) -> bool {
        self.port.is_none() && self.process_check.is_none() && self.health_check_url.is_none()
    }
}

/// HTTP code policy: 2xx-3xx pass, 404 warns, anything else fails
pub fn classify_http(code: Option<u16>) -> ProbeOutcome {
    match code {
        Some(200..=399) => ProbeOutcome::Passed,
        Some(404) => ProbeOutcome::Warning,
        _ => ProbeOutcome::Failed,
    }
}

/// Run every probe in `plan` on `executor`
pub async fn run(executor: &dyn Executor, plan: &ConnectivityPlan) -> ConnectivityReport {
    let port = match plan.port {
        Some(port) => Some(probe_port(executor, port).await),
        None => None,
    };
    let process = match &plan.process_check {
        Some(check) => Some(probe_process(executor, check).await),
        None => None,
    };
    let http = match &plan.health_check_url {
        Some(url) => Some(probe_http(executor, url).await),
        None => None,
    };

    let report = ConnectivityReport::from_probes(port, process, http);
    debug!(
        "Connectivity test on {}: composite_success={}",
        executor.target(),
        report.composite_success
    );
    report
}

async fn probe_port(executor: &dyn Executor, port: u16) -> ProbeResult {
    let check = port_check(port);
    match executor.execute(&check.command).await {
        Ok(result) => {
            let output = result.combined_output();
            match interpret(&check, &result).verdict {
                Verdict::Running => ProbeResult::new(
                    ProbeOutcome::Passed,
                    format!("port {} is listening", port),
                    &check.command,
                    &output,
                ),
                _ => ProbeResult::new(
                    ProbeOutcome::Failed,
                    format!("port {} is not listening", port),
                    &check.command,
                    &output,
                ),
            }
        }
        Err(e) => {
            warn!("Port probe for {} failed: {}", port, e);
            ProbeResult::new(ProbeOutcome::Failed, e.to_string(), &check.command, "")
        }
    }
}

async fn probe_process(executor: &dyn Executor, check: &StatusCheck) -> ProbeResult {
    match executor.execute(&check.command).await {
        Ok(result) => {
            let output = result.combined_output();
            let verdict = interpret(check, &result).verdict;
            let outcome = if verdict == Verdict::Running {
                ProbeOutcome::Passed
            } else {
                ProbeOutcome::Failed
            };
            ProbeResult::new(
                outcome,
                format!("service is {}", verdict),
                &check.command,
                &output,
            )
        }
        Err(e) => {
            warn!("Process probe failed: {}", e);
            ProbeResult::new(ProbeOutcome::Failed, e.to_string(), &check.command, "")
        }
    }
}

async fn probe_http(executor: &dyn Executor, url: &str) -> ProbeResult {
    let check = http_check(url);
    match executor.execute(&check.command).await {
        Ok(result) => {
            let output = result.combined_output();
            let code = parse_http_code(&output);
            let outcome = classify_http(code);
            let message = match (outcome, code) {
                (ProbeOutcome::Passed, Some(code)) => format!("HTTP {}", code),
                (ProbeOutcome::Warning, Some(code)) => {
                    format!("HTTP {}: reachable but not found", code)
                }
                (_, Some(code)) => format!("HTTP {}", code),
                (_, None) => format!("{} is unreachable", url),
            };
            ProbeResult {
                http_code: code,
                ..ProbeResult::new(outcome, message, &check.command, &output)
            }
        }
        Err(e) => {
            warn!("HTTP probe for {} failed: {}", url, e);
            ProbeResult::new(ProbeOutcome::Failed, e.to_string(), &check.command, "")
        }
    }
}
