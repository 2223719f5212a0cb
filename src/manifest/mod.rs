//! Deployment document model and validation.
//!
//! A deployment document is a YAML file with two top-level keys:
//!
//! ```yaml
//! server:
//!   host: 203.0.113.7
//!   user: deploy
//!   ssh_key_path: ~/.ssh/deploy_ed25519
//!   access_log_template: /var/log/{{ project_name }}/access.log
//!   error_log_template: /var/log/{{ project_name }}/error.log
//!   defaults:
//!     tier: cold
//!     worker_class: gthread
//!
//! apps:
//!   acme:
//!     domain: acme.example
//!     backend_paths: [/api, /admin]
//!     # ...
//! ```
//!
//! `apps` may be a mapping keyed by project name or a sequence of entries
//! carrying `project_name` (or `name`). Keys from `server.defaults` fill any
//! key an app leaves unset before validation runs. Validation is total: every
//! problem surfaces as a [`ConfigError`] before anything touches the host.

pub mod defaults;
mod types;


use std::collections::BTreeSet;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use serde_yaml::{Mapping, Value};

use crate::coerce;
use crate::error::ConfigError;

pub use types::{
    AppSpec, CelerySettings, DEFAULT_BRANCH, DEFAULT_CELERY_APP, DEFAULT_SSH_PORT,
    DEFAULT_WEB_GROUP, DEFAULT_WSGI_APP, Manifest, NodeSettings, ProcessPool, ServerConfig,
    SourceSpec, Tier,
};

const SERVER_REQUIRED: &[&str] = &[
    "host",
    "user",
    "ssh_key_path",
    "access_log_template",
    "error_log_template",
];

const APP_REQUIRED: &[&str] = &[
    "domain",
    "tier",
    "worker_class",
    "workers",
    "threads",
    "timeout",
    "graceful_timeout",
    "max_requests",
    "max_requests_jitter",
    "memory_limit",
];

const NODE_REQUIRED: &[&str] = &["node_dir", "node_port", "node_start_cmd"];

const CELERY_REQUIRED: &[&str] = &["celery_queue"];

/// Reads and validates a deployment document from disk.
///
/// # Errors
///
/// Returns [`ConfigError::FileNotFound`] when the file does not exist,
/// [`ConfigError::ParseError`] when it cannot be read or is not YAML, and any
/// validation error from [`load`].
pub fn load_file(path: &Utf8Path) -> Result<Manifest, ConfigError> {
    let current_dir = Utf8PathBuf::from(".");
    let parent = match path.parent() {
        Some(dir) if !dir.as_str().is_empty() => dir,
        _ => current_dir.as_ref(),
    };
    let file_name = path.file_name().unwrap_or(path.as_str());

    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::FileNotFound {
                path: path.as_std_path().to_path_buf(),
            }
        } else {
            ConfigError::ParseError {
                message: format!("failed to open directory {parent}: {e}"),
            }
        }
    })?;

    let content = dir.read_to_string(file_name).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::FileNotFound {
                path: path.as_std_path().to_path_buf(),
            }
        } else {
            ConfigError::ParseError {
                message: format!("failed to read {path}: {e}"),
            }
        }
    })?;

    parse_str(&content)
}

/// Parses YAML text and validates it as a deployment document.
///
/// # Errors
///
/// Returns [`ConfigError::ParseError`] for malformed YAML and any validation
/// error from [`load`].
pub fn parse_str(source: &str) -> Result<Manifest, ConfigError> {
    let document: Value = serde_yaml::from_str(source).map_err(|e| ConfigError::ParseError {
        message: format!("invalid deployment document: {e}"),
    })?;
    load(&document)
}

/// Validates a parsed document and builds the typed model.
///
/// # Errors
///
/// Returns [`ConfigError`] for any structural problem, missing key, value of
/// the wrong shape, or duplicate project name. Strings carrying line breaks,
/// domains that are not hostnames, backend paths with characters outside a
/// URL path, and legacy names that match a declared app are rejected as
/// [`ConfigError::InvalidValue`].
pub fn load(document: &Value) -> Result<Manifest, ConfigError> {
    let root = document
        .as_mapping()
        .ok_or_else(|| invalid("document", "expected a mapping at the top level"))?;

    let server_map = match root.get("server") {
        None | Some(Value::Null) => {
            return Err(ConfigError::MissingRequired {
                field: String::from("server"),
            });
        }
        Some(value) => value
            .as_mapping()
            .ok_or_else(|| invalid("server", "expected a mapping"))?,
    };
    let server = parse_server(server_map)?;
    let defaults = match server_map.get("defaults") {
        None | Some(Value::Null) => Mapping::new(),
        Some(value) => value
            .as_mapping()
            .cloned()
            .ok_or_else(|| invalid("server.defaults", "expected a mapping"))?,
    };

    let entries = collect_entries(root.get("apps"))?;
    let mut apps = Vec::with_capacity(entries.len());
    let mut seen = BTreeSet::new();
    for (name, mut entry) in entries {
        defaults::apply_defaults(&mut entry, &defaults);
        let app = parse_app(name, &entry)?;
        if !seen.insert(app.project_name.clone()) {
            return Err(invalid(
                &format!("apps.{}", app.project_name),
                "duplicate project name",
            ));
        }
        apps.push(app);
    }
    reject_declared_legacy_names(&apps)?;

    Ok(Manifest { server, apps })
}

/// Returns the apps named in `only`, in the order given.
///
/// An empty `only` selects every app in declaration order. Repeated names
/// are collapsed to their first occurrence.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownApps`] naming every requested app the
/// document does not declare.
pub fn select<'a, S: AsRef<str>>(
    apps: &'a [AppSpec],
    only: &[S],
) -> Result<Vec<&'a AppSpec>, ConfigError> {
    if only.is_empty() {
        return Ok(apps.iter().collect());
    }

    let mut selected: Vec<&AppSpec> = Vec::with_capacity(only.len());
    let mut unknown: Vec<&str> = Vec::new();
    for requested in only {
        let name = requested.as_ref();
        if selected.iter().any(|app| app.project_name == name) || unknown.contains(&name) {
            continue;
        }
        match apps.iter().find(|app| app.project_name == name) {
            Some(app) => selected.push(app),
            None => unknown.push(name),
        }
    }

    if unknown.is_empty() {
        Ok(selected)
    } else {
        Err(ConfigError::UnknownApps {
            names: unknown.join(", "),
        })
    }
}

/// Returns whether `name` may be used as a project name.
///
/// Project names derive paths and unit names, so only ASCII letters, digits,
/// `-` and `_` are allowed.
#[must_use]
pub fn is_valid_project_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Returns whether `domain` is usable as an nginx `server_name` value.
///
/// One or more hostnames separated by spaces. Each is a dot-separated run of
/// ASCII letters, digits and `-`, optionally with a leading `*.` or `.`
/// wildcard.
#[must_use]
pub fn is_valid_domain(domain: &str) -> bool {
    domain.split(' ').all(is_valid_hostname)
}

fn is_valid_hostname(name: &str) -> bool {
    let host = name
        .strip_prefix("*.")
        .or_else(|| name.strip_prefix('.'))
        .unwrap_or(name);
    !host.is_empty()
        && host.split('.').all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

/// Returns whether `path` may appear in an nginx `location` prefix.
///
/// Unreserved and sub-delimiter URI characters only; nginx syntax such as
/// whitespace, `;`, `{`, `}`, quotes and `#` is excluded.
#[must_use]
pub fn is_valid_backend_path(path: &str) -> bool {
    path.starts_with('/')
        && path
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/-._~%@:+,=!$&*()".contains(c))
}

/// Returns whether `name` is a plausible Unix user or group name.
#[must_use]
pub fn is_valid_account_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

/// Key lookups on one mapping, with dotted field names for errors.
struct Fields<'a> {
    map: &'a Mapping,
    prefix: String,
}

impl<'a> Fields<'a> {
    const fn new(map: &'a Mapping, prefix: String) -> Self {
        Self { map, prefix }
    }

    fn path(&self, key: &str) -> String {
        format!("{}.{key}", self.prefix)
    }

    fn optional(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|value| !value.is_null())
    }

    /// Fails with every key in `keys` that is unset, reported together.
    fn ensure_present(&self, keys: &[&str], blank_is_missing: bool) -> Result<(), ConfigError> {
        let missing: Vec<String> = keys
            .iter()
            .filter(|key| match self.optional(key) {
                None => true,
                Some(Value::String(text)) => blank_is_missing && text.trim().is_empty(),
                Some(_) => false,
            })
            .map(|key| self.path(key))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingRequired {
                field: missing.join(", "),
            })
        }
    }

    fn required(&self, key: &str) -> Result<&'a Value, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingRequired {
                field: self.path(key),
            })
    }

    fn string(&self, key: &str) -> Result<String, ConfigError> {
        coerce::to_non_empty_string(self.required(key)?, &self.path(key))
    }

    fn optional_string(&self, key: &str) -> Result<Option<String>, ConfigError> {
        self.optional(key)
            .map(|value| coerce::to_string(value, &self.path(key)))
            .transpose()
            .map(|text| text.filter(|t| !t.is_empty()))
    }

    fn count(&self, key: &str) -> Result<u32, ConfigError> {
        coerce::to_u32(self.required(key)?, &self.path(key))
    }

    fn flag(&self, key: &str) -> Result<bool, ConfigError> {
        self.optional(key)
            .map_or(Ok(false), |value| coerce::to_bool(value, &self.path(key)))
    }

    fn list(&self, key: &str) -> Result<Vec<String>, ConfigError> {
        self.optional(key)
            .map_or(Ok(Vec::new()), |value| {
                coerce::to_string_list(value, &self.path(key))
            })
    }
}

fn parse_server(map: &Mapping) -> Result<ServerConfig, ConfigError> {
    let fields = Fields::new(map, String::from("server"));
    fields.ensure_present(SERVER_REQUIRED, true)?;

    let port = fields
        .optional("port")
        .map_or(Ok(DEFAULT_SSH_PORT), |value| {
            coerce::to_port(value, &fields.path("port"))
        })?;
    let web_group = fields
        .optional_string("web_group")?
        .unwrap_or_else(|| String::from(DEFAULT_WEB_GROUP));

    let user = fields.string("user")?;
    for (key, name) in [("user", &user), ("web_group", &web_group)] {
        if !is_valid_account_name(name) {
            return Err(invalid(
                &fields.path(key),
                &format!("'{name}' is not a valid account name"),
            ));
        }
    }

    Ok(ServerConfig {
        host: fields.string("host")?,
        port,
        user,
        ssh_key_path: fields.string("ssh_key_path")?,
        web_group,
        access_log_template: fields.string("access_log_template")?,
        error_log_template: fields.string("error_log_template")?,
    })
}

/// Normalises `apps` into `(name, entry)` pairs in declaration order.
fn collect_entries(apps: Option<&Value>) -> Result<Vec<(String, Mapping)>, ConfigError> {
    match apps {
        None | Some(Value::Null) => Err(ConfigError::MissingRequired {
            field: String::from("apps"),
        }),
        Some(Value::Mapping(map)) if map.is_empty() => Err(empty_apps()),
        Some(Value::Sequence(items)) if items.is_empty() => Err(empty_apps()),
        Some(Value::Mapping(map)) => map
            .iter()
            .map(|(key, entry)| {
                let key_name = coerce::to_non_empty_string(key, "apps")?;
                let field = format!("apps.{key_name}");
                let body = entry
                    .as_mapping()
                    .ok_or_else(|| invalid(&field, "expected a mapping"))?;
                let name = match body.get("project_name").filter(|v| !v.is_null()) {
                    Some(value) => {
                        coerce::to_non_empty_string(value, &format!("{field}.project_name"))?
                    }
                    None => key_name,
                };
                Ok((name, body.clone()))
            })
            .collect(),
        Some(Value::Sequence(items)) => items
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let field = format!("apps[{index}]");
                let body = entry
                    .as_mapping()
                    .ok_or_else(|| invalid(&field, "expected a mapping"))?;
                let name_value = body
                    .get("project_name")
                    .filter(|v| !v.is_null())
                    .or_else(|| body.get("name").filter(|v| !v.is_null()))
                    .ok_or_else(|| ConfigError::MissingRequired {
                        field: format!("{field}.project_name"),
                    })?;
                let name =
                    coerce::to_non_empty_string(name_value, &format!("{field}.project_name"))?;
                Ok((name, body.clone()))
            })
            .collect(),
        Some(_) => Err(invalid("apps", "expected a mapping or a list of apps")),
    }
}

fn parse_app(name: String, entry: &Mapping) -> Result<AppSpec, ConfigError> {
    let prefix = format!("apps.{name}");
    if !is_valid_project_name(&name) {
        return Err(invalid(
            &prefix,
            "project name may only contain letters, digits, '-' and '_'",
        ));
    }
    let fields = Fields::new(entry, prefix);

    let enable_node = fields.flag("enable_node")?;
    let enable_celery = fields.flag("enable_celery")?;

    let mut required: Vec<&str> = APP_REQUIRED.to_vec();
    if enable_node {
        required.extend_from_slice(NODE_REQUIRED);
    }
    if enable_celery {
        required.extend_from_slice(CELERY_REQUIRED);
    }
    fields.ensure_present(&required, false)?;

    let tier = Tier::parse(
        &coerce::to_string(fields.required("tier")?, &fields.path("tier"))?,
        &fields.path("tier"),
    )?;

    let process = ProcessPool {
        worker_class: fields.string("worker_class")?,
        workers: fields.count("workers")?,
        threads: fields.count("threads")?,
        timeout: fields.count("timeout")?,
        graceful_timeout: fields.count("graceful_timeout")?,
        max_requests: fields.count("max_requests")?,
        max_requests_jitter: fields.count("max_requests_jitter")?,
    };

    let node = if enable_node {
        Some(NodeSettings {
            dir: fields.string("node_dir")?,
            port: coerce::to_port(fields.required("node_port")?, &fields.path("node_port"))?,
            start_cmd: fields.string("node_start_cmd")?,
        })
    } else {
        None
    };

    let celery = if enable_celery {
        Some(CelerySettings {
            queue: fields.string("celery_queue")?,
            app: fields
                .optional_string("celery_app")?
                .unwrap_or_else(|| String::from(DEFAULT_CELERY_APP)),
        })
    } else {
        None
    };

    let source = fields
        .optional_string("repo_url")?
        .map(|repo_url| {
            fields.optional_string("branch").map(|branch| SourceSpec {
                repo_url,
                branch: branch.unwrap_or_else(|| String::from(DEFAULT_BRANCH)),
            })
        })
        .transpose()?;

    let backend_paths = normalise_backend_paths(
        fields.list("backend_paths")?,
        &fields.path("backend_paths"),
    )?;
    let legacy_project_names = legacy_names(&fields, &name)?;
    let cron = cron_entries(&fields)?;
    let domain = fields.string("domain")?;
    if !is_valid_domain(&domain) {
        return Err(invalid(
            &fields.path("domain"),
            &format!("'{domain}' is not a valid hostname"),
        ));
    }

    Ok(AppSpec {
        domain,
        tier,
        backend_paths,
        process,
        memory_limit: fields.string("memory_limit")?,
        cpu_quota: fields.optional_string("cpu_quota")?,
        wsgi_app: fields
            .optional_string("wsgi_app")?
            .unwrap_or_else(|| String::from(DEFAULT_WSGI_APP)),
        node,
        celery,
        source,
        legacy_project_names,
        cron,
        project_name: name,
    })
}

fn normalise_backend_paths(raw: Vec<String>, field: &str) -> Result<Vec<String>, ConfigError> {
    let mut paths: Vec<String> = Vec::with_capacity(raw.len());
    for entry in raw {
        if !entry.starts_with('/') {
            return Err(invalid(field, &format!("'{entry}' must start with '/'")));
        }
        if !is_valid_backend_path(&entry) {
            return Err(invalid(
                field,
                &format!("'{entry}' contains characters not allowed in a URL path"),
            ));
        }
        let trimmed = entry.trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(invalid(field, "the root path cannot be a backend path"));
        }
        if !paths.iter().any(|existing| existing == trimmed) {
            paths.push(trimmed.to_owned());
        }
    }
    Ok(paths)
}

fn legacy_names(fields: &Fields<'_>, project_name: &str) -> Result<BTreeSet<String>, ConfigError> {
    let field = fields.path("legacy_project_names");
    let mut names = BTreeSet::new();
    for legacy in fields.list("legacy_project_names")? {
        if legacy == project_name {
            return Err(invalid(
                &field,
                &format!("'{legacy}' is the current project name"),
            ));
        }
        if !is_valid_project_name(&legacy) {
            return Err(invalid(
                &field,
                &format!("'{legacy}' is not a valid project name"),
            ));
        }
        names.insert(legacy);
    }
    Ok(names)
}

/// A legacy name that is also declared would be purged right after deploying.
fn reject_declared_legacy_names(apps: &[AppSpec]) -> Result<(), ConfigError> {
    for app in apps {
        if let Some(declared) = app
            .legacy_project_names
            .iter()
            .find(|legacy| apps.iter().any(|other| &other.project_name == *legacy))
        {
            return Err(invalid(
                &format!("apps.{}.legacy_project_names", app.project_name),
                &format!("'{declared}' is declared as an app in this document"),
            ));
        }
    }
    Ok(())
}

/// Cron entries contain commas in their schedules, so a bare string is one entry.
fn cron_entries(fields: &Fields<'_>) -> Result<Vec<String>, ConfigError> {
    let field = fields.path("cron");
    match fields.optional("cron") {
        None => Ok(Vec::new()),
        Some(Value::Sequence(items)) => items
            .iter()
            .enumerate()
            .map(|(index, item)| coerce::to_string(item, &format!("{field}[{index}]")))
            .collect(),
        Some(value) => coerce::to_string(value, &field).map(|entry| vec![entry]),
    }
}

fn empty_apps() -> ConfigError {
    invalid("apps", "at least one app must be declared")
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
}
