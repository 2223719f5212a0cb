//! Host artifact generation.
//!
//! Everything a deploy writes to the host is rendered here, up front and
//! without touching the network, so that a template or cron mistake in any
//! app fails the run before the first remote mutation.

pub mod dropin;
pub mod site;
pub mod templates;


use minijinja::context;

use crate::cron::{self, CronTable};
use crate::error::Result;
use crate::manifest::{AppSpec, ServerConfig};
use crate::paths::{self, ProjectPaths};

pub use dropin::DropinSpec;
pub use site::SiteContext;
pub use templates::{SITE_TEMPLATE, TemplateSet, UNIT_TEMPLATES, render_str};

/// A rendered file and its destination on the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedFile {
    /// Absolute destination path.
    pub path: String,
    /// File contents.
    pub contents: String,
}

impl RenderedFile {
    const fn new(path: String, contents: String) -> Self {
        Self { path, contents }
    }
}

/// Every artifact for one app.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactSet {
    /// Paths derived from the app's project name.
    pub paths: ProjectPaths,
    /// Shared unit templates, in [`UNIT_TEMPLATES`] order.
    pub unit_templates: Vec<RenderedFile>,
    /// Gunicorn service override.
    pub app_dropin: RenderedFile,
    /// Frontend service override, when node is enabled.
    pub node_dropin: Option<RenderedFile>,
    /// Worker service override, when celery is enabled.
    pub celery_dropin: Option<RenderedFile>,
    /// nginx site file.
    pub site: RenderedFile,
    /// Cron table for `/etc/cron.d`.
    pub cron: CronTable,
}

impl ArtifactSet {
    /// Renders every artifact for `app`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid cron entries or a log path
    /// that would not be a single nginx argument, and a render error for any
    /// template failure, including unresolved placeholders in the log path
    /// templates.
    pub fn build(server: &ServerConfig, app: &AppSpec, templates: &TemplateSet) -> Result<Self> {
        let project_paths = ProjectPaths::for_project(&app.project_name);
        let units = &project_paths.units;

        let unit_context = context! {
            user => &server.user,
            web_group => &server.web_group,
        };
        let unit_templates = UNIT_TEMPLATES
            .iter()
            .map(|(name, file_name)| {
                templates
                    .render(name, &unit_context)
                    .map(|contents| RenderedFile::new(paths::unit_template_path(file_name), contents))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let app_dropin = RenderedFile::new(
            paths::dropin_file(&units.app_service),
            DropinSpec::for_app(app, &project_paths).render(),
        );
        let node_dropin = app.node.as_ref().map(|node| {
            RenderedFile::new(
                paths::dropin_file(&units.node_service),
                DropinSpec::for_node(app, node, &project_paths).render(),
            )
        });
        let celery_dropin = app.celery.as_ref().map(|celery| {
            RenderedFile::new(
                paths::dropin_file(&units.celery_service),
                DropinSpec::for_celery(app, celery).render(),
            )
        });

        let log_context = context! { project_name => &app.project_name };
        let site_context = SiteContext {
            project_name: app.project_name.clone(),
            domain: app.domain.clone(),
            project_dir: project_paths.project_dir.clone(),
            socket_path: project_paths.socket_path.clone(),
            backend_locations: site::backend_locations(
                &app.backend_paths,
                &project_paths.socket_path,
            ),
            upstream: site::upstream(app, &project_paths),
            access_log: site::log_path(
                "server.access_log_template",
                &render_str(
                    "server.access_log_template",
                    &server.access_log_template,
                    &log_context,
                )?,
            )?,
            error_log: site::log_path(
                "server.error_log_template",
                &render_str(
                    "server.error_log_template",
                    &server.error_log_template,
                    &log_context,
                )?,
            )?,
        };
        let site = RenderedFile::new(
            project_paths.site_available.clone(),
            templates.render(SITE_TEMPLATE, &site_context)?,
        );

        let cron = cron::compile(&app.cron, &server.user, &project_paths)?;

        Ok(Self {
            paths: project_paths,
            unit_templates,
            app_dropin,
            node_dropin,
            celery_dropin,
            site,
            cron,
        })
    }

    /// Returns every file this set would write, in install order.
    ///
    /// The cron file is included only when the table has jobs.
    #[must_use]
    pub fn files(&self) -> Vec<RenderedFile> {
        let mut files = Vec::with_capacity(self.unit_templates.len() + 5);
        if self.cron.has_jobs() {
            files.push(RenderedFile::new(
                self.paths.cron_file.clone(),
                self.cron.render(),
            ));
        }
        files.extend(self.unit_templates.iter().cloned());
        files.push(self.app_dropin.clone());
        files.extend(self.node_dropin.iter().cloned());
        files.extend(self.celery_dropin.iter().cloned());
        files.push(self.site.clone());
        files
    }
}
