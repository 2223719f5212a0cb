//! nginx site generation.
//!
//! The site template receives a [`SiteContext`]. Backend paths become
//! `location ^~` blocks pointing at the gunicorn socket; everything else goes
//! to the upstream chosen by [`upstream`]. Values reaching this module have
//! already been validated by the manifest loader, apart from the rendered
//! log paths, which [`log_path`] checks here.

use serde::Serialize;

use crate::error::ConfigError;
use crate::manifest::AppSpec;
use crate::paths::ProjectPaths;

/// Values available to the site template.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct SiteContext {
    /// Project name.
    pub project_name: String,
    /// Public domain.
    pub domain: String,
    /// Checkout directory, for static and media aliases.
    pub project_dir: String,
    /// Gunicorn socket path.
    pub socket_path: String,
    /// Pre-rendered `location` blocks for backend paths.
    pub backend_locations: String,
    /// Target of the catch-all `location /`.
    pub upstream: String,
    /// Rendered access log path.
    pub access_log: String,
    /// Rendered error log path.
    pub error_log: String,
}

/// Renders one `location ^~ PATH/` block per backend path, proxying to `socket_path`.
///
/// Blocks are indented for the server block and each is preceded by a blank
/// line. An empty path list yields an empty string.
#[must_use]
pub fn backend_locations(backend_paths: &[String], socket_path: &str) -> String {
    backend_paths
        .iter()
        .map(|path| {
            format!(
                "\n    location ^~ {path}/ {{\n        proxy_pass http://unix:{socket_path}:;\n{}    }}\n",
                PROXY_HEADERS
            )
        })
        .collect()
}

/// Returns the catch-all upstream: the frontend port when node is enabled,
/// otherwise the gunicorn socket.
#[must_use]
pub fn upstream(app: &AppSpec, paths: &ProjectPaths) -> String {
    app.node.as_ref().map_or_else(
        || format!("http://unix:{}:", paths.socket_path),
        |node| format!("http://127.0.0.1:{}", node.port),
    )
}

/// Checks a rendered log path before it is spliced into the site file.
///
/// The path must be absolute and form a single nginx argument: no
/// whitespace, control characters, quotes, `;`, `{`, `}` or `#`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] naming `field` otherwise.
pub fn log_path(field: &str, rendered: &str) -> Result<String, ConfigError> {
    let safe = rendered.starts_with('/')
        && !rendered
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || "'\";{}#".contains(c));
    if safe {
        Ok(rendered.to_owned())
    } else {
        Err(ConfigError::InvalidValue {
            field: field.to_owned(),
            reason: format!("rendered log path '{rendered}' is not a single absolute path"),
        })
    }
}

const PROXY_HEADERS: &str = "        proxy_set_header Host $host;
        proxy_set_header X-Real-IP $remote_addr;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
        proxy_set_header X-Forwarded-Proto $scheme;
";
