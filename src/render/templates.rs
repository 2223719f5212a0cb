//! Built-in templates and per-file overrides.
//!
//! The site template and the four shared unit templates are compiled into
//! the binary. A templates directory may hold a file with the same name as
//! any of them (for example `nginx/site.conf.j2`); that file then replaces
//! the built-in text for the whole run. Overrides are read once, before
//! anything is rendered.
//!
//! Every render uses strict undefined behaviour and no auto-escaping: the
//! output is configuration text, and a missing value must fail the run
//! instead of producing an empty directive.

use std::collections::BTreeMap;
use std::io::ErrorKind;

use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use serde::Serialize;

use crate::error::RenderError;

/// Name of the nginx site template.
pub const SITE_TEMPLATE: &str = "nginx/site.conf.j2";

/// Shared unit templates as `(template name, installed file name)`.
pub const UNIT_TEMPLATES: &[(&str, &str)] = &[
    ("systemd/app@.service", "app@.service"),
    ("systemd/app@.socket", "app@.socket"),
    ("systemd/node@.service", "node@.service"),
    ("systemd/celery@.service", "celery@.service"),
];

const BUILTIN: &[(&str, &str)] = &[
    (
        SITE_TEMPLATE,
        include_str!("../../templates/nginx/site.conf.j2"),
    ),
    (
        "systemd/app@.service",
        include_str!("../../templates/systemd/app@.service"),
    ),
    (
        "systemd/app@.socket",
        include_str!("../../templates/systemd/app@.socket"),
    ),
    (
        "systemd/node@.service",
        include_str!("../../templates/systemd/node@.service"),
    ),
    (
        "systemd/celery@.service",
        include_str!("../../templates/systemd/celery@.service"),
    ),
];

/// The templates used to render host artifacts.
///
/// Every template is compiled into the binary. A file with the same relative
/// name under the templates directory replaces the built-in one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemplateSet {
    sources: BTreeMap<&'static str, String>,
}

impl Default for TemplateSet {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TemplateSet {
    /// Returns the built-in templates.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            sources: BUILTIN
                .iter()
                .map(|(name, source)| (*name, (*source).to_owned()))
                .collect(),
        }
    }

    /// Loads the built-in templates, applying overrides from `templates_dir`.
    ///
    /// Missing override files are not an error; the built-in template is kept.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::TemplateLoadFailed`] when the directory cannot
    /// be opened or an existing override cannot be read.
    pub fn load(templates_dir: Option<&Utf8Path>) -> Result<Self, RenderError> {
        let mut set = Self::builtin();
        let Some(root) = templates_dir else {
            return Ok(set);
        };

        let dir = Dir::open_ambient_dir(root, ambient_authority()).map_err(|e| {
            RenderError::TemplateLoadFailed {
                path: root.as_std_path().to_path_buf(),
                message: e.to_string(),
            }
        })?;

        for (name, source) in &mut set.sources {
            match dir.read_to_string(*name) {
                Ok(contents) => {
                    tracing::debug!(template = %name, dir = %root, "using template override");
                    *source = contents;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(RenderError::TemplateLoadFailed {
                        path: root.join(name).into_std_path_buf(),
                        message: e.to_string(),
                    });
                }
            }
        }
        Ok(set)
    }

    /// Returns the source of a template, if it exists.
    #[must_use]
    pub fn source(&self, name: &str) -> Option<&str> {
        self.sources.get(name).map(String::as_str)
    }

    /// Renders a named template.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::TemplateFailed`] when the template is unknown,
    /// fails to parse, or references a value missing from `context`.
    pub fn render<C: Serialize>(&self, name: &str, context: C) -> Result<String, RenderError> {
        let source = self.source(name).ok_or_else(|| RenderError::TemplateFailed {
            template: name.to_owned(),
            message: String::from("no such template"),
        })?;
        render_str(name, source, context)
    }
}

/// Renders `source` in strict mode; an undefined value is an error.
///
/// # Errors
///
/// Returns [`RenderError::TemplateFailed`] labelled with `name`.
pub fn render_str<C: Serialize>(name: &str, source: &str, context: C) -> Result<String, RenderError> {
    let failed = |e: minijinja::Error| RenderError::TemplateFailed {
        template: name.to_owned(),
        message: e.to_string(),
    };

    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_keep_trailing_newline(true);
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env.add_template(name, source).map_err(failed)?;
    let template = env.get_template(name).map_err(failed)?;
    template.render(context).map_err(failed)
}
