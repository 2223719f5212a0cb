//! Typed deployment model produced by [`super::load`].

use std::collections::BTreeSet;
use std::fmt;

use crate::error::ConfigError;

/// WSGI entry point used when an app does not declare `wsgi_app`.
pub const DEFAULT_WSGI_APP: &str = "config.wsgi:application";

/// Group shared between application processes and the reverse proxy.
pub const DEFAULT_WEB_GROUP: &str = "www-data";

/// SSH port used when the document does not name one.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Branch checked out when an app declares a repository without one.
pub const DEFAULT_BRANCH: &str = "main";

/// Celery application module used when `celery_app` is omitted.
pub const DEFAULT_CELERY_APP: &str = "config";

/// Connection and host-wide settings from the `server` section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    /// Target host name or address.
    pub host: String,
    /// SSH port.
    pub port: u16,
    /// Deploy user; owns project files and runs the services.
    pub user: String,
    /// Private key used to authenticate; `~/` expands at connection time.
    pub ssh_key_path: String,
    /// Group shared with the reverse proxy for socket access.
    pub web_group: String,
    /// Access log path template; may reference `{{ project_name }}`.
    pub access_log_template: String,
    /// Error log path template; may reference `{{ project_name }}`.
    pub error_log_template: String,
}

/// Whether the app process is always running or started on first request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tier {
    /// The service unit runs permanently.
    Hot,
    /// The socket unit is active and starts the service on demand.
    Cold,
}

impl Tier {
    /// Parses a tier name, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for anything other than `hot` or
    /// `cold`.
    pub fn parse(raw: &str, field: &str) -> Result<Self, ConfigError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "hot" => Ok(Self::Hot),
            "cold" => Ok(Self::Cold),
            _ => Err(ConfigError::InvalidValue {
                field: field.to_owned(),
                reason: format!("expected 'hot' or 'cold', got '{raw}'"),
            }),
        }
    }

    /// Returns the canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hot => "hot",
            Self::Cold => "cold",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gunicorn process pool settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessPool {
    /// Worker class, for example `gthread`.
    pub worker_class: String,
    /// Number of worker processes.
    pub workers: u32,
    /// Threads per worker.
    pub threads: u32,
    /// Worker timeout in seconds.
    pub timeout: u32,
    /// Graceful shutdown timeout in seconds.
    pub graceful_timeout: u32,
    /// Requests served before a worker is recycled.
    pub max_requests: u32,
    /// Random jitter added to `max_requests`.
    pub max_requests_jitter: u32,
}

/// Frontend process served by `node@NAME.service`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeSettings {
    /// Directory holding the frontend; relative paths resolve under the project dir.
    pub dir: String,
    /// Loopback port the frontend listens on.
    pub port: u16,
    /// Command that starts the frontend server.
    pub start_cmd: String,
}

/// Background worker served by `celery@NAME.service`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CelerySettings {
    /// Queue consumed by the worker.
    pub queue: String,
    /// Celery application module.
    pub app: String,
}

/// Repository checked out into the project directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceSpec {
    /// Clone URL.
    pub repo_url: String,
    /// Branch to track.
    pub branch: String,
}

/// One validated application deployment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppSpec {
    /// Unique name; derives every path and unit name.
    pub project_name: String,
    /// Public domain served by the proxy site.
    pub domain: String,
    /// Process tier.
    pub tier: Tier,
    /// URL prefixes proxied straight to the app socket, without trailing `/`.
    pub backend_paths: Vec<String>,
    /// Gunicorn pool settings.
    pub process: ProcessPool,
    /// systemd `MemoryMax` value.
    pub memory_limit: String,
    /// systemd `CPUQuota` value.
    pub cpu_quota: Option<String>,
    /// WSGI entry point passed to gunicorn.
    pub wsgi_app: String,
    /// Present when the frontend sidecar is enabled.
    pub node: Option<NodeSettings>,
    /// Present when the worker sidecar is enabled.
    pub celery: Option<CelerySettings>,
    /// Present when the app is deployed from a repository.
    pub source: Option<SourceSpec>,
    /// Former names whose host state is purged on every run.
    pub legacy_project_names: BTreeSet<String>,
    /// Raw cron entries in declaration order.
    pub cron: Vec<String>,
}

/// A parsed and validated deployment document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Manifest {
    /// Host settings.
    pub server: ServerConfig,
    /// Apps in declaration order.
    pub apps: Vec<AppSpec>,
}

impl Manifest {
    /// Looks up an app by project name.
    #[must_use]
    pub fn app(&self, name: &str) -> Option<&AppSpec> {
        self.apps.iter().find(|app| app.project_name == name)
    }
}
