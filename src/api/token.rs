//! `GitHub` App token minting for the CLI and for deployments.

use tracing::{debug, warn};

use crate::config::StageopsConfig;
use crate::error::{ConfigError, Result};
use crate::github::{is_https, mint_installation_token};
use crate::reconcile::Plan;

/// Mints an installation token from the configured `GitHub` App.
///
/// Blocks on `runtime_handle`; must not be called from async code.
///
/// # Errors
///
/// Returns `ConfigError::MissingRequired` when the App is not fully
/// configured, and `GitHubError` when minting fails.
pub fn mint_token(config: &StageopsConfig, runtime_handle: &tokio::runtime::Handle) -> Result<String> {
    let github = &config.github;
    github.validate()?;
    let (Some(app_id), Some(installation_id), Some(key_path)) = (
        github.app_id,
        github.installation_id,
        github.private_key_path.as_deref(),
    ) else {
        return Err(ConfigError::MissingRequired {
            field: String::from("github"),
        }
        .into());
    };
    let token = runtime_handle.block_on(mint_installation_token(app_id, installation_id, key_path))?;
    Ok(token)
}

/// Returns whether any plan clones over HTTPS.
#[must_use]
pub fn needs_token(plans: &[Plan<'_>]) -> bool {
    plans.iter().any(|plan| {
        plan.app
            .source
            .as_ref()
            .is_some_and(|source| is_https(&source.repo_url))
    })
}

/// Mints a clone token when an HTTPS checkout needs one and `GitHub` is
/// configured.
pub(super) fn clone_token(
    config: &StageopsConfig,
    plans: &[Plan<'_>],
    runtime_handle: &tokio::runtime::Handle,
) -> Result<Option<String>> {
    if !needs_token(plans) {
        return Ok(None);
    }
    if !config.github.is_configured() {
        warn!("HTTPS repositories found but GitHub App is not configured; cloning anonymously");
        return Ok(None);
    }
    debug!("minting clone token");
    mint_token(config, runtime_handle).map(Some)
}
