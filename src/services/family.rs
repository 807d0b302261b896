//! Service families and identifier resolution
//!
//! A service identifier is matched against an ordered rule table by
//! case-insensitive substring test. Rules with more keywords come first so an
//! identifier such as `vue-admin-frontend` lands on its compound rule rather
//! than a single-keyword one. Three prefixed forms (`systemd:<unit>`,
//! `docker:<name>`, `http(s)://...`) name a generic service outright and are
//! recognised before the table; anything else that misses the table is
//! unsupported.

use serde::Serialize;

use crate::ssh::sanitize::{is_safe_name, slug};

/// Directory receiving per-service start logs on the target host
pub const LOG_DIR: &str = "/tmp/ops-console";

/// Classification of a service identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    Postgres,
    Backend,
    Worker,
    Frontend,
    Editor,
    Runner,
    Container,
    Proxy,
    Generic,
}

/// How a service is brought up and down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Launch {
    /// Background process started from `<project>/<workdir>`. `{project}` in
    /// `program` expands to the quoted project path.
    Detached {
        workdir: &'static str,
        program: &'static str,
    },
    /// systemd unit
    Unit,
    /// Existing docker container
    Container,
    /// Status only
    None,
}

/// Resolved description of one service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub identifier: String,
    pub family: Family,
    pub port: Option<u16>,
    /// Extended regex matching the service's command line
    pub process: Option<String>,
    /// Words that must appear in a process-grep hit to confirm it
    pub keywords: Vec<String>,
    pub unit: Option<String>,
    pub container: Option<String>,
    pub health_url: Option<String>,
    pub launch: Launch,
    /// File stem of the start log; services sharing a process share it
    pub log_name: String,
}

impl ServiceDescriptor {
    /// Dedicated start log for this service
    pub fn log_path(&self) -> String {
        format!("{}/{}.log", LOG_DIR, self.log_name)
    }
}

struct Profile {
    family: Family,
    port: Option<u16>,
    process: Option<&'static str>,
    keywords: &'static [&'static str],
    unit: Option<&'static str>,
    container: Option<&'static str>,
    launch: Launch,
    log_name: &'static str,
}

impl Profile {
    fn describe(&self, identifier: &str) -> ServiceDescriptor {
        ServiceDescriptor {
            identifier: identifier.to_string(),
            family: self.family,
            port: self.port,
            process: self.process.map(str::to_string),
            keywords: self.keywords.iter().map(|k| k.to_string()).collect(),
            unit: self.unit.map(str::to_string),
            container: self.container.map(str::to_string),
            health_url: None,
            launch: self.launch,
            log_name: self.log_name.to_string(),
        }
    }
}

const VUE_ADMIN: Profile = Profile {
    family: Family::Frontend,
    port: Some(3002),
    process: Some("vite.*--port 3002"),
    keywords: &["vite", "node"],
    unit: None,
    container: None,
    launch: Launch::Detached {
        workdir: "frontend-admin",
        program: "npm run dev -- --host 0.0.0.0 --port 3002",
    },
    log_name: "vue-admin",
};

const REACT: Profile = Profile {
    family: Family::Frontend,
    port: Some(3000),
    process: Some("vite.*--port 3000"),
    keywords: &["vite", "node"],
    unit: None,
    container: None,
    launch: Launch::Detached {
        workdir: "frontend",
        program: "npm run dev -- --host 0.0.0.0 --port 3000",
    },
    log_name: "react-frontend",
};

const EDITOR: Profile = Profile {
    family: Family::Editor,
    port: Some(8601),
    process: Some("webpack.*--port 8601"),
    keywords: &["webpack", "node"],
    unit: None,
    container: None,
    launch: Launch::Detached {
        workdir: "scratch-gui",
        program: "npx webpack serve --host 0.0.0.0 --port 8601",
    },
    log_name: "scratch-editor",
};

const RUNNER: Profile = Profile {
    family: Family::Runner,
    port: None,
    process: Some("scratch-runner/server.js"),
    keywords: &["scratch-runner", "node"],
    unit: None,
    container: None,
    launch: Launch::Detached {
        workdir: "scratch-runner",
        program: "node {project}/scratch-runner/server.js",
    },
    log_name: "scratch-runner",
};

const JUDGE: Profile = Profile {
    family: Family::Container,
    port: None,
    process: None,
    keywords: &[],
    unit: None,
    container: Some("judge-server"),
    launch: Launch::Container,
    log_name: "judge-server",
};

const HEARTBEAT: Profile = Profile {
    family: Family::Worker,
    port: None,
    process: Some("manage.py heartbeat_monitor"),
    keywords: &["heartbeat"],
    unit: None,
    container: None,
    launch: Launch::Detached {
        workdir: "backend",
        program: "python3 manage.py heartbeat_monitor",
    },
    log_name: "heartbeat",
};

const CELERY: Profile = Profile {
    family: Family::Worker,
    port: None,
    process: Some("celery -A oj worker"),
    keywords: &["celery"],
    unit: None,
    container: None,
    launch: Launch::Detached {
        workdir: "backend",
        program: "celery -A oj worker --loglevel=info",
    },
    log_name: "celery-worker",
};

const POSTGRES: Profile = Profile {
    family: Family::Postgres,
    port: Some(5432),
    process: None,
    keywords: &[],
    unit: Some("postgresql"),
    container: None,
    launch: Launch::Unit,
    log_name: "postgresql",
};

const NGINX: Profile = Profile {
    family: Family::Proxy,
    port: None,
    process: None,
    keywords: &[],
    unit: Some("nginx"),
    container: None,
    launch: Launch::Unit,
    log_name: "nginx",
};

const BACKEND: Profile = Profile {
    family: Family::Backend,
    port: Some(8000),
    process: Some("manage.py runserver 0.0.0.0:8000"),
    keywords: &["manage.py", "runserver"],
    unit: None,
    container: None,
    launch: Launch::Detached {
        workdir: "backend",
        program: "python3 manage.py runserver 0.0.0.0:8000",
    },
    log_name: "django-backend",
};

/// `(all of these keywords) -> profile`, most specific first
const RULES: &[(&[&str], &Profile)] = &[
    (&["vue", "frontend"], &VUE_ADMIN),
    (&["admin", "frontend"], &VUE_ADMIN),
    (&["react", "frontend"], &REACT),
    (&["scratch", "runner"], &RUNNER),
    (&["scratch", "editor"], &EDITOR),
    (&["frontend"], &REACT),
    (&["runner"], &RUNNER),
    (&["editor"], &EDITOR),
    (&["scratch"], &EDITOR),
    (&["judge"], &JUDGE),
    (&["heartbeat"], &HEARTBEAT),
    (&["celery"], &CELERY),
    (&["worker"], &CELERY),
    (&["postgres"], &POSTGRES),
    (&["nginx"], &NGINX),
    (&["proxy"], &NGINX),
    (&["django"], &BACKEND),
    (&["backend"], &BACKEND),
];

/// Resolve an identifier to its most specific descriptor
///
/// Returns `None` when neither a generic form nor the rule table applies.
pub fn resolve(identifier: &str) -> Option<ServiceDescriptor> {
    let trimmed = identifier.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lowered = trimmed.to_lowercase();

    if let Some(generic) = resolve_generic(trimmed, &lowered) {
        return generic;
    }

    RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().all(|k| lowered.contains(k)))
        .map(|(_, profile)| profile.describe(trimmed))
}

/// `Some(..)` when the identifier uses a generic prefix; the inner `None`
/// means the prefix was present but the name is unusable.
fn resolve_generic(identifier: &str, lowered: &str) -> Option<Option<ServiceDescriptor>> {
    let generic = |launch: Launch| ServiceDescriptor {
        identifier: identifier.to_string(),
        family: Family::Generic,
        port: None,
        process: None,
        keywords: Vec::new(),
        unit: None,
        container: None,
        health_url: None,
        launch,
        log_name: slug(identifier),
    };

    if lowered.starts_with("systemd:") {
        let unit = &identifier["systemd:".len()..];
        return Some(is_safe_name(unit).then(|| ServiceDescriptor {
            unit: Some(unit.to_string()),
            ..generic(Launch::Unit)
        }));
    }

    if lowered.starts_with("docker:") {
        let name = &identifier["docker:".len()..];
        return Some(is_safe_name(name).then(|| ServiceDescriptor {
            container: Some(name.to_string()),
            ..generic(Launch::Container)
        }));
    }

    if lowered.starts_with("http://") || lowered.starts_with("https://") {
        let valid = identifier
            .chars()
            .all(|c| !c.is_whitespace() && !c.is_control());
        return Some(valid.then(|| ServiceDescriptor {
            health_url: Some(identifier.to_string()),
            ..generic(Launch::None)
        }));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family_of(identifier: &str) -> Option<Family> {
        resolve(identifier).map(|d| d.family)
    }

    #[test]
    fn test_compound_rules_precede_single_keyword_rules() {
        let counts: Vec<usize> = RULES.iter().map(|(k, _)| k.len()).collect();
        assert!(counts.windows(2).all(|w| w[0] >= w[1]), "{:?}", counts);
    }

    #[test]
    fn test_compound_frontend_wins() {
        let vue = resolve("vue-frontend").unwrap();
        assert_eq!(vue.family, Family::Frontend);
        assert_eq!(vue.port, Some(3002));

        let admin = resolve("Admin-Frontend").unwrap();
        assert_eq!(admin.port, Some(3002));

        let plain = resolve("frontend").unwrap();
        assert_eq!(plain.port, Some(3000));
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        assert_eq!(family_of("PostgreSQL-Main"), Some(Family::Postgres));
        assert_eq!(family_of("NGINX"), Some(Family::Proxy));
    }

    #[test]
    fn test_families() {
        assert_eq!(family_of("postgres-main"), Some(Family::Postgres));
        assert_eq!(family_of("django-backend"), Some(Family::Backend));
        assert_eq!(family_of("heartbeat"), Some(Family::Worker));
        assert_eq!(family_of("celery-worker"), Some(Family::Worker));
        assert_eq!(family_of("scratch-editor"), Some(Family::Editor));
        assert_eq!(family_of("scratch-runner"), Some(Family::Runner));
        assert_eq!(family_of("judge-server"), Some(Family::Container));
        assert_eq!(family_of("edge-proxy"), Some(Family::Proxy));
    }

    #[test]
    fn test_specific_beats_generic_keyword() {
        // "heartbeat-worker" must not fall through to the celery worker rule
        let d = resolve("heartbeat-worker").unwrap();
        assert_eq!(d.process.as_deref(), Some("manage.py heartbeat_monitor"));

        // "scratch-runner" must not resolve as the editor
        assert_eq!(family_of("scratch-runner"), Some(Family::Runner));
    }

    #[test]
    fn test_unknown_identifier_is_unsupported() {
        assert!(resolve("unknown-xyz-service").is_none());
        assert!(resolve("").is_none());
        assert!(resolve("   ").is_none());
    }

    #[test]
    fn test_generic_forms() {
        let unit = resolve("systemd:redis-server").unwrap();
        assert_eq!(unit.family, Family::Generic);
        assert_eq!(unit.unit.as_deref(), Some("redis-server"));
        assert_eq!(unit.launch, Launch::Unit);

        let container = resolve("docker:minio").unwrap();
        assert_eq!(container.container.as_deref(), Some("minio"));
        assert_eq!(container.launch, Launch::Container);

        let http = resolve("https://status.example.com/healthz").unwrap();
        assert_eq!(
            http.health_url.as_deref(),
            Some("https://status.example.com/healthz")
        );
        assert_eq!(http.launch, Launch::None);
    }

    #[test]
    fn test_prefixed_forms_bypass_keyword_rules() {
        let unit = resolve("systemd:nginx").unwrap();
        assert_eq!(unit.family, Family::Generic);

        let http = resolve("http://10.0.0.5/backend/health").unwrap();
        assert_eq!(http.family, Family::Generic);
        assert_eq!(http.port, None);
    }

    #[test]
    fn test_generic_forms_reject_unsafe_names() {
        assert!(resolve("systemd:nginx;reboot").is_none());
        assert!(resolve("docker:judge server").is_none());
        assert!(resolve("docker:").is_none());
        assert!(resolve("http://host/a b").is_none());
    }

    #[test]
    fn test_log_path_follows_the_process() {
        let vue = resolve("vue-frontend").unwrap();
        let admin = resolve("admin-frontend").unwrap();
        assert_eq!(vue.log_path(), "/tmp/ops-console/vue-admin.log");
        assert_eq!(vue.log_path(), admin.log_path());

        let django = resolve("django").unwrap();
        let backend = resolve("backend-api").unwrap();
        assert_eq!(django.log_path(), backend.log_path());
        assert_ne!(django.log_path(), vue.log_path());
    }

    #[test]
    fn test_generic_log_path_from_identifier() {
        assert_eq!(
            resolve("systemd:redis-server").unwrap().log_path(),
            "/tmp/ops-console/systemd-redis-server.log"
        );
    }
}
