//! Service operation catalog
//!
//! Renders the shell command for a (service, operation) pair. Start commands
//! detach the process from the SSH session and send its output to the
//! service's own log under [`LOG_DIR`]. Stop commands target a pattern that
//! names a port, script or unit. Restart is always stop, a fixed delay, then
//! start, built from the other two templates. The two halves must run as
//! separate commands: a shell running both carries the start half on its
//! command line, so the stop pattern would match and kill that shell.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::family::{resolve, Launch, ServiceDescriptor, LOG_DIR};
use super::status::{CheckKind, StatusCheck, NOT_RUNNING_SENTINEL};
use crate::error::{ConsoleError, Result};
use crate::ssh::sanitize::{self_excluding_pattern, shell_quote};

/// Seconds between the stop and start halves of a restart
pub const RESTART_SETTLE_SECS: u64 = 3;

/// `curl --max-time` for HTTP probes
pub const HTTP_PROBE_TIMEOUT_SECS: u64 = 5;

/// Service operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Status,
    Start,
    Stop,
    Restart,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Status => "status",
            Operation::Start => "start",
            Operation::Stop => "stop",
            Operation::Restart => "restart",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "status" => Ok(Operation::Status),
            "start" => Ok(Operation::Start),
            "stop" => Ok(Operation::Stop),
            "restart" => Ok(Operation::Restart),
            other => Err(ConsoleError::invalid_params(format!(
                "Unknown operation '{}' (expected status, start, stop or restart)",
                other
            ))),
        }
    }
}

/// Render the command for `operation` on `service_identifier`
pub fn render(service_identifier: &str, operation: Operation, project_path: &str) -> Result<String> {
    let descriptor = resolve(service_identifier)
        .ok_or_else(|| ConsoleError::unsupported(service_identifier, operation.as_str()))?;
    descriptor.render(operation, project_path)
}

impl ServiceDescriptor {
    /// Render the command for `operation` against this service
    pub fn render(&self, operation: Operation, project_path: &str) -> Result<String> {
        match operation {
            Operation::Status => self.status_check().map(|check| check.command),
            Operation::Start => self.start_command(project_path),
            Operation::Stop => self.stop_command(),
            Operation::Restart => {
                let (stop, start) = self.restart_steps(project_path)?;
                Ok(format!("{}; sleep {}; {}", stop, RESTART_SETTLE_SECS, start))
            }
        }
    }

    /// Stop and start commands of a restart, to be executed one after the other
    pub fn restart_steps(&self, project_path: &str) -> Result<(String, String)> {
        Ok((self.stop_command()?, self.start_command(project_path)?))
    }

    /// The status check this service uses
    ///
    /// When several strategies apply, preference is: port probe, process
    /// grep, init-system query, container query, HTTP probe.
    pub fn status_check(&self) -> Result<StatusCheck> {
        if let Some(port) = self.port {
            return Ok(port_check(port));
        }
        if let Some(pattern) = &self.process {
            return Ok(process_check(pattern, &self.keywords));
        }
        if let Some(unit) = &self.unit {
            return Ok(unit_check(unit));
        }
        if let Some(container) = &self.container {
            return Ok(container_check(container));
        }
        if let Some(url) = &self.health_url {
            return Ok(http_check(url));
        }
        Err(ConsoleError::unsupported(&self.identifier, "status"))
    }

    /// The service-specific check used as the connectivity "process" probe
    ///
    /// Port and HTTP probes run separately, so only process, unit and
    /// container checks qualify.
    pub fn process_probe(&self) -> Option<StatusCheck> {
        if let Some(pattern) = &self.process {
            return Some(process_check(pattern, &self.keywords));
        }
        if let Some(unit) = &self.unit {
            return Some(unit_check(unit));
        }
        self.container.as_deref().map(container_check)
    }

    fn start_command(&self, project_path: &str) -> Result<String> {
        let log = self.log_path();
        match self.launch {
            Launch::Detached { workdir, program } => {
                let project = validate_project_path(project_path)?;
                let dir = format!("{}/{}", project, workdir);
                let program = program.replace("{project}", &shell_quote(project));
                Ok(format!(
                    "mkdir -p {} && cd {} && {}",
                    LOG_DIR,
                    shell_quote(&dir),
                    detached(&program, &log)
                ))
            }
            Launch::Unit => {
                let unit = self.required(&self.unit, Operation::Start)?;
                Ok(format!(
                    "mkdir -p {} && {}",
                    LOG_DIR,
                    detached(&format!("sudo -n systemctl start {}", shell_quote(unit)), &log)
                ))
            }
            Launch::Container => {
                let name = self.required(&self.container, Operation::Start)?;
                Ok(format!(
                    "mkdir -p {} && {}",
                    LOG_DIR,
                    detached(&format!("docker start {}", shell_quote(name)), &log)
                ))
            }
            Launch::None => Err(ConsoleError::unsupported(&self.identifier, "start")),
        }
    }

    fn stop_command(&self) -> Result<String> {
        match self.launch {
            Launch::Detached { .. } => {
                let pattern = self.required(&self.process, Operation::Stop)?;
                Ok(format!(
                    "pkill -f {}",
                    shell_quote(&self_excluding_pattern(pattern))
                ))
            }
            Launch::Unit => {
                let unit = self.required(&self.unit, Operation::Stop)?;
                Ok(format!("sudo -n systemctl stop {}", shell_quote(unit)))
            }
            Launch::Container => {
                let name = self.required(&self.container, Operation::Stop)?;
                Ok(format!("docker stop {}", shell_quote(name)))
            }
            Launch::None => Err(ConsoleError::unsupported(&self.identifier, "stop")),
        }
    }

    fn required<'a>(&self, field: &'a Option<String>, operation: Operation) -> Result<&'a str> {
        field
            .as_deref()
            .ok_or_else(|| ConsoleError::unsupported(&self.identifier, operation.as_str()))
    }
}

/// Run `program` in the background, detached from the session, logging to `log`
///
/// The subshell returns at once, so the SSH channel closes while the
/// program keeps running.
fn detached(program: &str, log: &str) -> String {
    format!("(nohup {} > {} 2>&1 < /dev/null &)", program, shell_quote(log))
}

fn validate_project_path(project_path: &str) -> Result<&str> {
    let trimmed = project_path.trim().trim_end_matches('/');
    if !project_path.trim().starts_with('/') || trimmed.is_empty() {
        return Err(ConsoleError::invalid_params(format!(
            "project_path must be an absolute directory, got '{}'",
            project_path
        )));
    }
    Ok(trimmed)
}

/// Port-listen probe: prints the listening socket line or the sentinel
pub fn port_check(port: u16) -> StatusCheck {
    StatusCheck {
        kind: CheckKind::PortListen,
        command: format!(
            "(ss -ltn 2>/dev/null || netstat -ltn 2>/dev/null) | grep -E ':{}[[:space:]]' || echo {}",
            port, NOT_RUNNING_SENTINEL
        ),
        keywords: Vec::new(),
    }
}

/// Process-table grep for `pattern`
pub fn process_check(pattern: &str, keywords: &[String]) -> StatusCheck {
    StatusCheck {
        kind: CheckKind::ProcessGrep,
        command: format!(
            "ps -eo pid,args | grep -E {} || echo {}",
            shell_quote(&self_excluding_pattern(pattern)),
            NOT_RUNNING_SENTINEL
        ),
        keywords: keywords.to_vec(),
    }
}

/// `systemctl is-active` query
pub fn unit_check(unit: &str) -> StatusCheck {
    StatusCheck {
        kind: CheckKind::ServiceQuery,
        command: format!("systemctl is-active {} 2>&1", shell_quote(unit)),
        keywords: Vec::new(),
    }
}

/// `docker ps` state query for an exactly-named container
pub fn container_check(name: &str) -> StatusCheck {
    StatusCheck {
        kind: CheckKind::ContainerQuery,
        command: format!(
            "docker ps -a --filter {} --format '{{{{.Status}}}}' 2>&1 | grep . || echo {}",
            shell_quote(&format!("name=^{}$", name)),
            NOT_RUNNING_SENTINEL
        ),
        keywords: Vec::new(),
    }
}

/// HTTP status probe run from the target host
pub fn http_check(url: &str) -> StatusCheck {
    StatusCheck {
        kind: CheckKind::HttpProbe,
        command: format!(
            "curl -s -o /dev/null -w '%{{http_code}}' --max-time {} {} || echo {}",
            HTTP_PROBE_TIMEOUT_SECS,
            shell_quote(url),
            NOT_RUNNING_SENTINEL
        ),
        keywords: Vec::new(),
    }
}

/// Caller-supplied check command, judged by exit status
pub fn custom_check(command: &str) -> StatusCheck {
    StatusCheck {
        kind: CheckKind::Custom,
        command: command.to_string(),
        keywords: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROJECT: &str = "/srv/app";

    #[test]
    fn test_unknown_service_is_unsupported() {
        let err = render("unknown-xyz-service", Operation::Start, PROJECT).unwrap_err();
        assert!(matches!(err, ConsoleError::ServiceUnsupported { .. }));
        assert!(err.to_string().contains("unknown-xyz-service"));
    }

    #[test]
    fn test_start_is_detached_with_dedicated_log() {
        let cmd = render("django-backend", Operation::Start, PROJECT).unwrap();
        assert_eq!(
            cmd,
            "mkdir -p /tmp/ops-console && cd '/srv/app/backend' && \
             (nohup python3 manage.py runserver 0.0.0.0:8000 > \
             '/tmp/ops-console/django-backend.log' 2>&1 < /dev/null &)"
        );
    }

    #[test]
    fn test_every_start_template_detaches_and_logs() {
        for id in [
            "vue-frontend",
            "react-frontend",
            "scratch-editor",
            "scratch-runner",
            "judge-server",
            "heartbeat",
            "celery-worker",
            "postgres-main",
            "nginx",
            "backend",
            "systemd:redis-server",
            "docker:minio",
        ] {
            let cmd = render(id, Operation::Start, PROJECT).unwrap();
            assert!(cmd.contains("(nohup "), "{}: {}", id, cmd);
            assert!(cmd.contains("< /dev/null &)"), "{}: {}", id, cmd);
            let log = resolve(id).unwrap().log_path();
            assert!(cmd.contains(&log), "{}: {}", id, cmd);
        }
    }

    #[test]
    fn test_stop_targets_specific_pattern() {
        assert_eq!(
            render("vue-frontend", Operation::Stop, PROJECT).unwrap(),
            "pkill -f '[v]ite.*--port 3002'"
        );
        assert_eq!(
            render("scratch-runner", Operation::Stop, PROJECT).unwrap(),
            "pkill -f '[s]cratch-runner/server.js'"
        );
        assert_eq!(
            render("postgres-main", Operation::Stop, PROJECT).unwrap(),
            "sudo -n systemctl stop 'postgresql'"
        );
        assert_eq!(
            render("judge", Operation::Stop, PROJECT).unwrap(),
            "docker stop 'judge-server'"
        );
    }

    #[test]
    fn test_restart_is_stop_delay_start() {
        for id in ["vue-frontend", "heartbeat", "nginx", "judge", "docker:minio"] {
            let stop = render(id, Operation::Stop, PROJECT).unwrap();
            let start = render(id, Operation::Start, PROJECT).unwrap();
            let restart = render(id, Operation::Restart, PROJECT).unwrap();
            assert_eq!(
                restart,
                format!("{}; sleep {}; {}", stop, RESTART_SETTLE_SECS, start)
            );
            let steps = resolve(id).unwrap().restart_steps(PROJECT).unwrap();
            assert_eq!(steps, (stop, start));
        }
    }

    #[test]
    fn test_restart_stop_step_cannot_match_itself() {
        let (stop, start) = resolve("celery-worker")
            .unwrap()
            .restart_steps(PROJECT)
            .unwrap();
        assert_eq!(stop, "pkill -f '[c]elery -A oj worker'");
        assert!(!stop.contains("celery -A oj worker"));
        assert!(start.contains("celery -A oj worker"));
    }

    #[test]
    fn test_status_prefers_port_probe() {
        let d = resolve("postgres-main").unwrap();
        let check = d.status_check().unwrap();
        assert_eq!(check.kind, CheckKind::PortListen);
        assert!(check.command.contains(":5432[[:space:]]"));
        assert!(check.command.ends_with("|| echo NOT_RUNNING"));
    }

    #[test]
    fn test_status_strategies_by_family() {
        let kind = |id: &str| resolve(id).unwrap().status_check().unwrap().kind;
        assert_eq!(kind("vue-frontend"), CheckKind::PortListen);
        assert_eq!(kind("celery-worker"), CheckKind::ProcessGrep);
        assert_eq!(kind("nginx"), CheckKind::ServiceQuery);
        assert_eq!(kind("judge"), CheckKind::ContainerQuery);
        assert_eq!(kind("http://127.0.0.1:8601/"), CheckKind::HttpProbe);
    }

    #[test]
    fn test_process_probe_skips_port_and_http() {
        let probe = |id: &str| resolve(id).unwrap().process_probe().map(|c| c.kind);
        assert_eq!(probe("vue-frontend"), Some(CheckKind::ProcessGrep));
        assert_eq!(probe("postgres-main"), Some(CheckKind::ServiceQuery));
        assert_eq!(probe("judge"), Some(CheckKind::ContainerQuery));
        assert_eq!(probe("https://status.example.com/"), None);
    }

    #[test]
    fn test_process_check_command() {
        let check = resolve("heartbeat").unwrap().status_check().unwrap();
        assert_eq!(
            check.command,
            "ps -eo pid,args | grep -E '[m]anage.py heartbeat_monitor' || echo NOT_RUNNING"
        );
        assert_eq!(check.keywords, vec!["heartbeat".to_string()]);
    }

    #[test]
    fn test_container_check_command() {
        assert_eq!(
            container_check("judge-server").command,
            "docker ps -a --filter 'name=^judge-server$' --format '{{.Status}}' 2>&1 | grep . || echo NOT_RUNNING"
        );
    }

    #[test]
    fn test_http_check_command() {
        assert_eq!(
            http_check("http://127.0.0.1:8000/api/health").command,
            "curl -s -o /dev/null -w '%{http_code}' --max-time 5 'http://127.0.0.1:8000/api/health' || echo NOT_RUNNING"
        );
    }

    #[test]
    fn test_http_only_service_has_no_start_or_stop() {
        let url = "https://status.example.com/";
        assert!(render(url, Operation::Status, PROJECT).is_ok());
        for op in [Operation::Start, Operation::Stop, Operation::Restart] {
            let err = render(url, op, PROJECT).unwrap_err();
            assert!(matches!(err, ConsoleError::ServiceUnsupported { .. }));
        }
    }

    #[test]
    fn test_project_path_is_quoted() {
        let cmd = render("scratch-runner", Operation::Start, "/srv/it's here/").unwrap();
        assert!(cmd.contains("cd '/srv/it'\"'\"'s here/scratch-runner'"));
        assert!(cmd.contains("node '/srv/it'\"'\"'s here'/scratch-runner/server.js"));
    }

    #[test]
    fn test_relative_project_path_rejected() {
        let err = render("backend", Operation::Start, "srv/app").unwrap_err();
        assert!(matches!(err, ConsoleError::InvalidParams(_)));

        let err = render("backend", Operation::Start, "/").unwrap_err();
        assert!(matches!(err, ConsoleError::InvalidParams(_)));
    }

    #[test]
    fn test_operation_parse() {
        assert_eq!("Restart".parse::<Operation>().unwrap(), Operation::Restart);
        assert!("reload".parse::<Operation>().is_err());
        assert_eq!(Operation::Stop.to_string(), "stop");
    }
}
