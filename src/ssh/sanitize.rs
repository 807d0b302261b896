//! Command sanitization and shell quoting utilities
//!
//! Everything interpolated into a remote shell command goes through here.

use crate::error::{ConsoleError, Result};

/// Sanitize a caller-supplied command before execution
///
/// Trims whitespace, rejects empty commands and enforces the optional
/// `max_chars` limit.
///
/// # Examples
/// ```
/// use ops_console::ssh::sanitize::sanitize_command;
///
/// let cmd = sanitize_command("  pgrep -af celery  ", Some(1000)).unwrap();
/// assert_eq!(cmd, "pgrep -af celery");
///
/// let result = sanitize_command("a".repeat(100).as_str(), Some(50));
/// assert!(result.is_err());
/// ```
pub fn sanitize_command(command: &str, max_chars: Option<usize>) -> Result<String> {
    let trimmed = command.trim();

    if trimmed.is_empty() {
        return Err(ConsoleError::invalid_params("Command cannot be empty"));
    }

    if let Some(max) = max_chars {
        if trimmed.len() > max {
            return Err(ConsoleError::invalid_params(format!(
                "Command is too long (max {} characters, got {})",
                max,
                trimmed.len()
            )));
        }
    }

    Ok(trimmed.to_string())
}

/// Wrap a value in single quotes for POSIX shells
///
/// Embedded single quotes become `'"'"'`: close quote, literal quote via
/// double quotes, reopen quote.
///
/// # Example
/// ```
/// use ops_console::ssh::sanitize::shell_quote;
///
/// assert_eq!(shell_quote("/srv/my app"), "'/srv/my app'");
/// assert_eq!(shell_quote("it's"), "'it'\"'\"'s'");
/// ```
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\"'\"'"))
}

/// True for unit/container names made of `[A-Za-z0-9@._-]`
pub fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '_' | '-'))
}

/// Rewrite a `grep -E`/`pkill -f` pattern so it cannot match its own command line
///
/// `manage.py runserver` becomes `[m]anage.py runserver`: the regex still
/// matches the target process but not the shell running the pattern.
pub fn self_excluding_pattern(pattern: &str) -> String {
    let mut chars = pattern.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphanumeric() => {
            format!("[{}]{}", first, chars.as_str())
        }
        _ => pattern.to_string(),
    }
}

/// Reduce a service identifier to `[a-z0-9-]` for use in file names
pub fn slug(identifier: &str) -> String {
    let mut out = String::with_capacity(identifier.len());
    for c in identifier.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        "service".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_command_trims_whitespace() {
        assert_eq!(sanitize_command("  ls -la  ", Some(1000)).unwrap(), "ls -la");
    }

    #[test]
    fn test_sanitize_command_empty() {
        let result = sanitize_command("   ", Some(1000));
        assert!(result.unwrap_err().to_string().contains("cannot be empty"));
    }

    #[test]
    fn test_sanitize_command_too_long() {
        let long_cmd = "a".repeat(100);
        let result = sanitize_command(&long_cmd, Some(50));
        assert!(result.unwrap_err().to_string().contains("too long"));
    }

    #[test]
    fn test_sanitize_command_exactly_at_limit() {
        assert!(sanitize_command(&"a".repeat(50), Some(50)).is_ok());
    }

    #[test]
    fn test_sanitize_command_unlimited() {
        assert!(sanitize_command(&"a".repeat(10000), None).is_ok());
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("plain"), "'plain'");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("a'b'c"), "'a'\"'\"'b'\"'\"'c'");
    }

    #[test]
    fn test_is_safe_name() {
        assert!(is_safe_name("redis-server"));
        assert!(is_safe_name("getty@tty1.service"));
        assert!(!is_safe_name(""));
        assert!(!is_safe_name("nginx; rm -rf /"));
        assert!(!is_safe_name("a b"));
    }

    #[test]
    fn test_self_excluding_pattern() {
        assert_eq!(
            self_excluding_pattern("manage.py runserver 0.0.0.0:8000"),
            "[m]anage.py runserver 0.0.0.0:8000"
        );
        assert_eq!(self_excluding_pattern("[c]elery"), "[c]elery");
        assert_eq!(self_excluding_pattern(""), "");
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("Vue-Frontend"), "vue-frontend");
        assert_eq!(slug("systemd:redis@6379"), "systemd-redis-6379");
        assert_eq!(slug("https://example.com/health"), "https-example-com-health");
        assert_eq!(slug("::"), "service");
    }
}
