//! Status interpretation
//!
//! Classifies the output of a status-check command into a verdict. The policy
//! is an ordered rule list evaluated against the evidence; the first rule that
//! decides wins. Nothing in here touches a transport.
//!
//! Order matters:
//! 1. an explicit `NOT_RUNNING` sentinel means stopped, whatever the exit code
//! 2. a check that produced no exit status is an error
//! 3. strategy-specific confirmation (port, process, unit/container token, HTTP code)
//! 4. anything left is treated as stopped

use serde::Serialize;
use tracing::debug;

use crate::ssh::CommandResult;

/// Literal emitted by check commands when the target is not running
pub const NOT_RUNNING_SENTINEL: &str = "NOT_RUNNING";

/// Tokens from `systemctl is-active` / `docker ps` meaning "down".
/// Checked before [`RUNNING_TOKENS`] since `inactive` contains `active`.
const STOPPED_TOKENS: &[&str] = &[
    "inactive",
    "failed",
    "dead",
    "exited",
    "stopped",
    "created",
    "not running",
    "no response",
];

const RUNNING_TOKENS: &[&str] = &["active", "running", "up", "accepting connections"];

/// Strategy a status check uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    /// Socket-listening inspection (`ss`/`netstat`)
    PortListen,
    /// Process table grep
    ProcessGrep,
    /// Init-system query (`systemctl is-active`)
    ServiceQuery,
    /// Container runtime query (`docker ps`)
    ContainerQuery,
    /// HTTP status code probe
    HttpProbe,
    /// Caller-supplied command; exit status decides
    Custom,
}

/// A rendered status-check command and what to expect from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCheck {
    pub kind: CheckKind,
    pub command: String,
    /// Process-grep confirmation words (case-insensitive)
    pub keywords: Vec<String>,
}

/// Service status verdict
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Running,
    Stopped,
    Error,
    #[default]
    Unknown,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Verdict::Running => "running",
            Verdict::Stopped => "stopped",
            Verdict::Error => "error",
            Verdict::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Verdict plus the rule that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interpretation {
    pub verdict: Verdict,
    pub rule: &'static str,
}

struct Evidence<'a> {
    check: &'a StatusCheck,
    result: &'a CommandResult,
    combined: String,
}

type Rule = fn(&Evidence<'_>) -> Option<Verdict>;

const RULES: &[(&str, Rule)] = &[
    ("sentinel", sentinel),
    ("no-exit-status", no_exit_status),
    ("port-listening", port_listening),
    ("process-confirmed", process_confirmed),
    ("state-token", state_token),
    ("http-code", http_code),
    ("custom-exit", custom_exit),
];

/// Fallback rule name when no rule decided
pub const AMBIGUOUS: &str = "ambiguous";

/// Classify a status-check result
pub fn interpret(check: &StatusCheck, result: &CommandResult) -> Interpretation {
    let evidence = Evidence {
        check,
        result,
        combined: result.combined_output(),
    };

    let mut verdict = Verdict::Unknown;
    let mut decided_by = AMBIGUOUS;
    for &(name, rule) in RULES {
        if let Some(v) = rule(&evidence) {
            verdict = v;
            decided_by = name;
            break;
        }
    }

    if verdict == Verdict::Unknown {
        debug!(
            "Ambiguous {:?} result (exit={:?}, {} bytes); treating as stopped",
            check.kind,
            result.exit_status,
            evidence.combined.len()
        );
        verdict = Verdict::Stopped;
    }

    Interpretation {
        verdict,
        rule: decided_by,
    }
}

fn sentinel(ev: &Evidence<'_>) -> Option<Verdict> {
    ev.combined
        .contains(NOT_RUNNING_SENTINEL)
        .then_some(Verdict::Stopped)
}

fn no_exit_status(ev: &Evidence<'_>) -> Option<Verdict> {
    ev.result.exit_status.is_none().then_some(Verdict::Error)
}

fn port_listening(ev: &Evidence<'_>) -> Option<Verdict> {
    (ev.check.kind == CheckKind::PortListen
        && ev.result.exit_status == Some(0)
        && !ev.combined.trim().is_empty())
    .then_some(Verdict::Running)
}

fn process_confirmed(ev: &Evidence<'_>) -> Option<Verdict> {
    if ev.check.kind != CheckKind::ProcessGrep || ev.result.exit_status != Some(0) {
        return None;
    }
    let haystack = ev.combined.to_lowercase();
    ev.check
        .keywords
        .iter()
        .any(|k| haystack.contains(&k.to_lowercase()))
        .then_some(Verdict::Running)
}

fn state_token(ev: &Evidence<'_>) -> Option<Verdict> {
    if !matches!(
        ev.check.kind,
        CheckKind::ServiceQuery | CheckKind::ContainerQuery
    ) {
        return None;
    }
    let haystack = ev.combined.to_lowercase();
    if STOPPED_TOKENS.iter().any(|t| contains_token(&haystack, t)) {
        Some(Verdict::Stopped)
    } else if RUNNING_TOKENS.iter().any(|t| contains_token(&haystack, t)) {
        Some(Verdict::Running)
    } else {
        None
    }
}

fn http_code(ev: &Evidence<'_>) -> Option<Verdict> {
    if ev.check.kind != CheckKind::HttpProbe {
        return None;
    }
    match parse_http_code(&ev.combined) {
        Some(code) if (200..400).contains(&code) => Some(Verdict::Running),
        Some(_) => Some(Verdict::Stopped),
        None => None,
    }
}

fn custom_exit(ev: &Evidence<'_>) -> Option<Verdict> {
    (ev.check.kind == CheckKind::Custom && ev.result.exit_status == Some(0))
        .then_some(Verdict::Running)
}

/// Single words match whole words only; phrases match as substrings
fn contains_token(haystack: &str, token: &str) -> bool {
    if token.contains(' ') {
        haystack.contains(token)
    } else {
        haystack
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|word| word == token)
    }
}

/// Extract the status code from `curl -w '%{http_code}'` output
///
/// `000` (curl could not connect) yields `None`.
pub fn parse_http_code(output: &str) -> Option<u16> {
    let digits: String = output
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.len() != 3 {
        return None;
    }
    digits.parse::<u16>().ok().filter(|code| *code >= 100)
}
