//! Orchestration API for stageops commands.
//!
//! One function per command: [`deploy`], [`validate`], [`render_app`] and
//! [`mint_token`]. They take library-owned types rather than clap types and
//! never print; the CLI adapter decides how to present what they return.
//!
//! Every command reads the deployment document and renders the selected
//! apps before anything else happens, so configuration errors always surface
//! before the host is touched.

mod deploy;
mod token;


pub use deploy::{DeployOutcome, DeployParams, deploy};
pub use token::{mint_token, needs_token};

use tracing::debug;

use crate::config::StageopsConfig;
use crate::error::{ConfigError, Result};
use crate::manifest::{self, Manifest, Tier};
use crate::reconcile::Plan;
use crate::render::{ArtifactSet, RenderedFile, TemplateSet};

/// The deployment document and templates a command works from.
#[derive(Clone, Debug)]
pub struct Workspace {
    /// The validated deployment document.
    pub manifest: Manifest,
    /// Built-in templates with any overrides applied.
    pub templates: TemplateSet,
}

impl Workspace {
    /// Reads the deployment document and templates named by `config`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for a missing or invalid document and
    /// `RenderError::TemplateLoadFailed` for an unreadable override.
    pub fn load(config: &StageopsConfig) -> Result<Self> {
        let path = config.deployment_file();
        debug!(path = %path, "reading deployment document");
        let manifest = manifest::load_file(path)?;
        let templates = TemplateSet::load(config.templates_dir.as_deref())?;
        Ok(Self {
            manifest,
            templates,
        })
    }

    /// Selects apps by name and renders every artifact for each of them.
    ///
    /// An empty `only` selects every app in document order.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownApps` for names not in the document and
    /// `RenderError` when an artifact cannot be rendered.
    pub fn plans<S: AsRef<str>>(&self, only: &[S]) -> Result<Vec<Plan<'_>>> {
        manifest::select(&self.manifest.apps, only)?
            .into_iter()
            .map(|app| {
                let artifacts = ArtifactSet::build(&self.manifest.server, app, &self.templates)?;
                Ok(Plan { app, artifacts })
            })
            .collect()
    }
}

/// What `validate` found for one app.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppSummary {
    /// Project name.
    pub project_name: String,
    /// Public domain.
    pub domain: String,
    /// Process tier.
    pub tier: Tier,
    /// Number of files the app would install.
    pub files: usize,
    /// Number of cron jobs.
    pub cron_jobs: usize,
}

/// Validates the document and renders the selected apps without touching the
/// host.
///
/// # Errors
///
/// Returns the first configuration or render error.
pub fn validate<S: AsRef<str>>(config: &StageopsConfig, only: &[S]) -> Result<Vec<AppSummary>> {
    let workspace = Workspace::load(config)?;
    let plans = workspace.plans(only)?;
    Ok(plans
        .iter()
        .map(|plan| AppSummary {
            project_name: plan.app.project_name.clone(),
            domain: plan.app.domain.clone(),
            tier: plan.app.tier,
            files: plan.artifacts.files().len(),
            cron_jobs: plan.artifacts.cron.jobs().len(),
        })
        .collect())
}

/// Renders every file one app would install, in installation order.
///
/// # Errors
///
/// Returns `ConfigError::UnknownApps` when `name` is not declared, or any
/// error from loading and rendering.
pub fn render_app(config: &StageopsConfig, name: &str) -> Result<Vec<RenderedFile>> {
    let workspace = Workspace::load(config)?;
    let app = workspace
        .manifest
        .app(name)
        .ok_or_else(|| ConfigError::UnknownApps {
            names: name.to_owned(),
        })?;
    let artifacts = ArtifactSet::build(&workspace.manifest.server, app, &workspace.templates)?;
    Ok(artifacts.files())
}
