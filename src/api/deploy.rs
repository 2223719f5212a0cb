//! Deployment orchestration.

use std::time::Duration;

use tracing::info;

use super::Workspace;
use super::token::clone_token;
use crate::config::StageopsConfig;
use crate::error::Result;
use crate::reconcile::{ApplyReport, Reconciler};
use crate::remote::{RecordedAction, RecordingExecutor, SshExecutor};

/// Parameters for [`deploy`].
pub struct DeployParams<'a, E: mockable::Env> {
    /// Tool configuration.
    pub config: &'a StageopsConfig,
    /// Apps to deploy; empty deploys every app.
    pub only: &'a [String],
    /// Record the plan instead of connecting to the host.
    pub dry_run: bool,
    /// Runtime used for the `GitHub` token request.
    pub runtime_handle: &'a tokio::runtime::Handle,
    /// Environment used to expand `~` in the SSH key path.
    pub env: &'a E,
}

/// What a deployment did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeployOutcome {
    /// Apps applied to the host, in order.
    Applied(Vec<ApplyReport>),
    /// Commands and uploads a real run would issue.
    Planned(Vec<RecordedAction>),
}

/// Renders the selected apps, then applies them to the host in order.
///
/// With `dry_run` set, the reconciler runs against a recorder: no
/// connection is opened and no token is minted.
///
/// # Errors
///
/// Returns any configuration or render error before connecting, and the
/// first connection or command failure afterwards.
pub fn deploy<E: mockable::Env>(params: DeployParams<'_, E>) -> Result<DeployOutcome> {
    let DeployParams {
        config,
        only,
        dry_run,
        runtime_handle,
        env,
    } = params;

    let workspace = Workspace::load(config)?;
    let plans = workspace.plans(only)?;
    let server = &workspace.manifest.server;

    if dry_run {
        info!(apps = plans.len(), "planning deployment");
        let recorder = RecordingExecutor::new();
        Reconciler::new(&recorder, server).apply_all(&plans)?;
        return Ok(DeployOutcome::Planned(recorder.actions()));
    }

    let token = clone_token(config, &plans, runtime_handle)?;
    let timeout = Duration::from_secs(config.ssh.connect_timeout_secs);
    let executor = SshExecutor::connect(server, timeout, env)?;
    info!(apps = plans.len(), host = executor.target(), "deploying");
    let reports = Reconciler::new(&executor, server)
        .with_clone_token(token)
        .apply_all(&plans)?;
    Ok(DeployOutcome::Applied(reports))
}
