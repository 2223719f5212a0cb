//! systemd drop-in overrides for the per-project instances of shared units.
//!
//! Each project runs as instances of the shared `app@`, `node@` and
//! `celery@` templates. What differs per project lives in one
//! `override.conf` per unit: environment variables, an optional replacement
//! `ExecStart`, and resource limits.

use crate::manifest::{AppSpec, CelerySettings, NodeSettings};
use crate::paths::ProjectPaths;
use crate::shell;

/// Ordered `KEY -> value` pairs; `None` values are skipped when rendering.
pub type Entries = Vec<(String, Option<String>)>;

/// The content of one `override.conf`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DropinSpec {
    /// Emitted as `Environment="KEY=VALUE"` lines.
    pub environment: Entries,
    /// Emitted as bare `KEY=VALUE` lines, for example `MemoryMax`.
    pub resource_directives: Entries,
    /// Replaces the base unit's `ExecStart` when set.
    pub exec_override: Option<String>,
}

impl DropinSpec {
    /// Builds the override for the gunicorn service.
    #[must_use]
    pub fn for_app(app: &AppSpec, paths: &ProjectPaths) -> Self {
        let pool = &app.process;
        let gunicorn_args = format!(
            "--worker-class {} --workers {} --threads {} --timeout {} --graceful-timeout {} \
             --max-requests {} --max-requests-jitter {} --bind unix:{}",
            pool.worker_class,
            pool.workers,
            pool.threads,
            pool.timeout,
            pool.graceful_timeout,
            pool.max_requests,
            pool.max_requests_jitter,
            paths.socket_path,
        );
        Self {
            environment: vec![
                entry("PROJECT_NAME", Some(&app.project_name)),
                entry("WSGI_APP", Some(&app.wsgi_app)),
                entry("GUNICORN_CMD_ARGS", Some(&gunicorn_args)),
            ],
            resource_directives: vec![
                entry("MemoryMax", Some(&app.memory_limit)),
                entry("CPUQuota", app.cpu_quota.as_deref()),
            ],
            exec_override: None,
        }
    }

    /// Builds the override for the frontend service.
    #[must_use]
    pub fn for_node(app: &AppSpec, node: &NodeSettings, paths: &ProjectPaths) -> Self {
        let script = format!(
            "cd {} && {}",
            shell::quote_arg(&paths.resolve(&node.dir)),
            node.start_cmd
        );
        Self {
            environment: vec![
                entry("PROJECT_NAME", Some(&app.project_name)),
                entry("NODE_ENV", Some("production")),
                entry("PORT", Some(&node.port.to_string())),
            ],
            resource_directives: vec![entry("MemoryMax", Some(&app.memory_limit))],
            exec_override: Some(format!("/bin/bash -lc {}", shell::quote(&script))),
        }
    }

    /// Builds the override for the worker service.
    #[must_use]
    pub fn for_celery(app: &AppSpec, celery: &CelerySettings) -> Self {
        Self {
            environment: vec![
                entry("PROJECT_NAME", Some(&app.project_name)),
                entry("CELERY_APP", Some(&celery.app)),
                entry("CELERY_QUEUE", Some(&celery.queue)),
            ],
            resource_directives: vec![
                entry("MemoryMax", Some(&app.memory_limit)),
                entry("CPUQuota", app.cpu_quota.as_deref()),
            ],
            exec_override: None,
        }
    }

    /// Renders the override file.
    #[must_use]
    pub fn render(&self) -> String {
        build(
            &self.environment,
            &self.resource_directives,
            self.exec_override.as_deref(),
        )
    }
}

/// Renders a `[Service]` override from its parts.
///
/// Output order is environment, exec override, then resource directives,
/// each in input order. Resource directive values are written verbatim; they
/// come from validated single-line document values.
#[must_use]
pub fn build(
    environment: &[(String, Option<String>)],
    directives: &[(String, Option<String>)],
    exec_override: Option<&str>,
) -> String {
    let mut lines = vec![String::from("[Service]")];

    lines.extend(environment.iter().filter_map(|(key, value)| {
        value
            .as_deref()
            .map(|v| format!("Environment=\"{}={}\"", escape(key), escape(v)))
    }));

    if let Some(command) = exec_override {
        lines.push(String::from("ExecStart="));
        lines.push(format!("ExecStart={}", command.replace('%', "%%")));
    }

    lines.extend(directives.iter().filter_map(|(key, value)| {
        value
            .as_deref()
            .map(|v| format!("{key}={v}"))
    }));

    let mut text = lines.join("\n");
    text.push('\n');
    text
}

/// Escapes a value for a double-quoted `Environment=` assignment.
///
/// Line breaks become C-style escapes so a value can never start a new
/// directive.
fn escape(value: &str) -> String {
    value
        .replace('\\', r"\\")
        .replace('"', "\\\"")
        .replace('%', "%%")
        .replace('\n', r"\n")
        .replace('\r', r"\r")
}

fn entry<V: AsRef<str>>(key: &str, value: Option<V>) -> (String, Option<String>) {
    (key.to_owned(), value.map(|v| v.as_ref().to_owned()))
}
