//! Idempotent application of rendered artifacts to the host.
//!
//! [`Reconciler::apply`] brings one app to the state its [`ArtifactSet`]
//! describes. Steps run in a fixed order and every step is safe to repeat,
//! so a run that failed half way is fixed by running it again. Each command
//! states its own [`Tolerance`]: cleanup of state that may not exist is
//! tolerant, everything the app needs to serve traffic is fatal.

mod source;


use tracing::info;

use crate::error::{RemoteCommandError, Result};
use crate::manifest::{AppSpec, ServerConfig, Tier};
use crate::paths::{ProjectPaths, UnitNames};
use crate::remote::{CommandStats, RemoteExecutor, RemoteShell, Tolerance};
use crate::render::{ArtifactSet, RenderedFile};
use crate::shell;

const ROOT: &str = "root";
const FILE_MODE: &str = "0644";
const RUNTIME_DIR_MODE: &str = "2775";

/// Commands issued while applying one app.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApplyReport {
    /// The app that was applied.
    pub project_name: String,
    /// Commands run, including probes and tolerated failures.
    pub executed: usize,
    /// Tolerant commands that exited non-zero.
    pub tolerated: usize,
    /// Files uploaded.
    pub uploaded: usize,
}

impl ApplyReport {
    fn new(project_name: &str, stats: CommandStats) -> Self {
        Self {
            project_name: project_name.to_owned(),
            executed: stats.executed,
            tolerated: stats.tolerated,
            uploaded: stats.uploaded,
        }
    }
}

/// An app paired with its pre-rendered artifacts.
#[derive(Clone, Debug)]
pub struct Plan<'a> {
    /// The app to apply.
    pub app: &'a AppSpec,
    /// Its artifacts.
    pub artifacts: ArtifactSet,
}

/// Applies apps to one host through a [`RemoteExecutor`].
pub struct Reconciler<'a, E: RemoteExecutor + ?Sized> {
    executor: &'a E,
    server: &'a ServerConfig,
    clone_token: Option<String>,
}

impl<'a, E: RemoteExecutor + ?Sized> Reconciler<'a, E> {
    /// Creates a reconciler for the host described by `server`.
    #[must_use]
    pub const fn new(executor: &'a E, server: &'a ServerConfig) -> Self {
        Self {
            executor,
            server,
            clone_token: None,
        }
    }

    /// Supplies a token used to authenticate HTTPS clones and fetches.
    #[must_use]
    pub fn with_clone_token(mut self, token: Option<String>) -> Self {
        self.clone_token = token;
        self
    }

    /// Applies every plan in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by [`Self::apply`]; later apps are not
    /// touched.
    pub fn apply_all(&self, plans: &[Plan<'_>]) -> Result<Vec<ApplyReport>> {
        let mut reports = Vec::with_capacity(plans.len());
        for plan in plans {
            reports.push(self.apply(plan.app, &plan.artifacts)?);
        }
        Ok(reports)
    }

    /// Brings one app to the state described by `artifacts`.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteCommandError`] when a fatal command fails or the
    /// transport breaks.
    pub fn apply(
        &self,
        app: &AppSpec,
        artifacts: &ArtifactSet,
    ) -> std::result::Result<ApplyReport, RemoteCommandError> {
        let name = app.project_name.as_str();
        let paths = &artifacts.paths;
        let units = &paths.units;
        let mut sh = RemoteShell::new(self.executor);
        info!(app = name, tier = %app.tier, "applying app");

        info!(app = name, "preparing directories");
        self.prepare_directories(&mut sh, paths)?;

        if let Some(spec) = &app.source {
            info!(app = name, branch = %spec.branch, "syncing source");
            source::sync(&mut sh, app, spec, paths, self.clone_token.as_deref())?;
        }

        info!(app = name, jobs = artifacts.cron.jobs().len(), "installing cron file");
        if artifacts.cron.has_jobs() {
            install(&mut sh, &paths.cron_file, &artifacts.cron.render())?;
        } else {
            sh.root(
                &format!("rm -f {}", shell::quote_arg(&paths.cron_file)),
                Tolerance::Fatal,
            )?;
        }

        info!(app = name, "purging drop-in overrides");
        sh.root(
            &format!("rm -rf {}", shell::join_args(&paths.dropin_dirs())),
            Tolerance::Tolerant,
        )?;

        for legacy in &app.legacy_project_names {
            info!(app = name, legacy = %legacy, "purging legacy project");
            purge_legacy(&mut sh, &ProjectPaths::for_project(legacy))?;
        }

        info!(app = name, "installing unit templates");
        for file in &artifacts.unit_templates {
            install_rendered(&mut sh, file)?;
        }

        info!(app = name, "installing drop-in overrides");
        install_rendered(&mut sh, &artifacts.app_dropin)?;
        install_or_disable(&mut sh, artifacts.node_dropin.as_ref(), &units.node_service)?;
        install_or_disable(&mut sh, artifacts.celery_dropin.as_ref(), &units.celery_service)?;

        info!(app = name, domain = %app.domain, "installing site");
        install_rendered(&mut sh, &artifacts.site)?;
        sh.root(
            &format!(
                "ln -sf {} {}",
                shell::quote_arg(&paths.site_available),
                shell::quote_arg(&paths.site_enabled)
            ),
            Tolerance::Fatal,
        )?;

        info!(app = name, "enabling units");
        sh.root("systemctl daemon-reload", Tolerance::Fatal)?;
        enable_units(&mut sh, app, units)?;

        info!(app = name, "reloading nginx");
        sh.root("nginx -t", Tolerance::Fatal)?;
        sh.root("systemctl reload nginx", Tolerance::Fatal)?;

        info!(app = name, "restarting services");
        restart_units(&mut sh, app, units)?;

        let report = ApplyReport::new(name, sh.stats());
        info!(
            app = name,
            executed = report.executed,
            tolerated = report.tolerated,
            uploaded = report.uploaded,
            "app applied"
        );
        Ok(report)
    }

    fn prepare_directories(
        &self,
        sh: &mut RemoteShell<'_, E>,
        paths: &ProjectPaths,
    ) -> std::result::Result<(), RemoteCommandError> {
        let user = &self.server.user;
        sh.root(
            &format!(
                "mkdir -p {}",
                shell::join_args(&[&paths.project_dir, &paths.log_dir, &paths.runtime_dir])
            ),
            Tolerance::Fatal,
        )?;
        sh.root(
            &format!(
                "chown -R {} {}",
                shell::quote_arg(&format!("{user}:")),
                shell::join_args(&[&paths.project_dir, &paths.log_dir])
            ),
            Tolerance::Fatal,
        )?;
        let runtime_dir = shell::quote_arg(&paths.runtime_dir);
        sh.root(
            &format!(
                "chown {} {runtime_dir} && chmod {RUNTIME_DIR_MODE} {runtime_dir}",
                shell::quote_arg(&format!("{user}:{}", self.server.web_group)),
            ),
            Tolerance::Fatal,
        )?;
        Ok(())
    }
}

fn install<E: RemoteExecutor + ?Sized>(
    sh: &mut RemoteShell<'_, E>,
    dest: &str,
    contents: &str,
) -> std::result::Result<(), RemoteCommandError> {
    sh.install_file(contents, dest, ROOT, ROOT, FILE_MODE)
}

fn install_rendered<E: RemoteExecutor + ?Sized>(
    sh: &mut RemoteShell<'_, E>,
    file: &RenderedFile,
) -> std::result::Result<(), RemoteCommandError> {
    install(sh, &file.path, &file.contents)
}

fn install_or_disable<E: RemoteExecutor + ?Sized>(
    sh: &mut RemoteShell<'_, E>,
    dropin: Option<&RenderedFile>,
    unit: &str,
) -> std::result::Result<(), RemoteCommandError> {
    match dropin {
        Some(file) => install_rendered(sh, file),
        None => disable(sh, unit),
    }
}

fn disable<E: RemoteExecutor + ?Sized>(
    sh: &mut RemoteShell<'_, E>,
    unit: &str,
) -> std::result::Result<(), RemoteCommandError> {
    sh.root(
        &format!("systemctl disable --now {}", shell::quote_arg(unit)),
        Tolerance::Tolerant,
    )
    .map(|_| ())
}

fn systemctl<E: RemoteExecutor + ?Sized>(
    sh: &mut RemoteShell<'_, E>,
    verb: &str,
    unit: &str,
) -> std::result::Result<(), RemoteCommandError> {
    sh.root(
        &format!("systemctl {verb} {}", shell::quote_arg(unit)),
        Tolerance::Fatal,
    )
    .map(|_| ())
}

/// Removes every trace of a former project name from the host.
fn purge_legacy<E: RemoteExecutor + ?Sized>(
    sh: &mut RemoteShell<'_, E>,
    legacy: &ProjectPaths,
) -> std::result::Result<(), RemoteCommandError> {
    for unit in legacy.units.all() {
        disable(sh, unit)?;
    }
    let mut dirs = legacy.dropin_dirs();
    dirs.push(legacy.runtime_dir.clone());
    sh.root(
        &format!("rm -rf {}", shell::join_args(&dirs)),
        Tolerance::Tolerant,
    )?;
    sh.root(
        &format!(
            "rm -f {}",
            shell::join_args(&[&legacy.site_enabled, &legacy.site_available, &legacy.cron_file])
        ),
        Tolerance::Tolerant,
    )?;
    Ok(())
}

/// Enables exactly one of the service and socket units for the app's tier.
fn enable_units<E: RemoteExecutor + ?Sized>(
    sh: &mut RemoteShell<'_, E>,
    app: &AppSpec,
    units: &UnitNames,
) -> std::result::Result<(), RemoteCommandError> {
    match app.tier {
        Tier::Hot => {
            disable(sh, &units.app_socket)?;
            systemctl(sh, "enable --now", &units.app_service)?;
        }
        Tier::Cold => {
            disable(sh, &units.app_service)?;
            systemctl(sh, "enable --now", &units.app_socket)?;
        }
    }
    if app.node.is_some() {
        systemctl(sh, "enable --now", &units.node_service)?;
    }
    if app.celery.is_some() {
        systemctl(sh, "enable --now", &units.celery_service)?;
    }
    Ok(())
}

fn restart_units<E: RemoteExecutor + ?Sized>(
    sh: &mut RemoteShell<'_, E>,
    app: &AppSpec,
    units: &UnitNames,
) -> std::result::Result<(), RemoteCommandError> {
    match app.tier {
        Tier::Hot => systemctl(sh, "restart", &units.app_service)?,
        Tier::Cold => {
            systemctl(sh, "restart", &units.app_socket)?;
            systemctl(sh, "try-restart", &units.app_service)?;
        }
    }
    if app.node.is_some() {
        systemctl(sh, "restart", &units.node_service)?;
    }
    if app.celery.is_some() {
        systemctl(sh, "restart", &units.celery_service)?;
    }
    Ok(())
}
