//! Tool settings for stageops.

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::{OrthoConfig, OrthoResult, PostMergeContext, PostMergeHook};
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

/// Deployment document read when neither the CLI nor the config names one.
pub const DEFAULT_DEPLOYMENT_FILE: &str = "deploy.yml";

/// `GitHub` App credentials used to mint clone tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct GitHubConfig {
    /// The `GitHub` App ID.
    pub app_id: Option<u64>,

    /// The installation ID of the App on the repository owner.
    pub installation_id: Option<u64>,

    /// Path to the App's PEM-encoded RSA private key.
    pub private_key_path: Option<Utf8PathBuf>,
}

impl GitHubConfig {
    /// Checks that every field is present and that the IDs are non-zero.
    ///
    /// `GitHub` never issues an ID of `0`, so `Some(0)` is treated as a
    /// placeholder left in a config file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` naming every missing field.
    pub fn validate(&self) -> crate::error::Result<()> {
        let mut missing = Vec::new();
        if !self.app_id.is_some_and(|id| id != 0) {
            missing.push("github.app_id");
        }
        if !self.installation_id.is_some_and(|id| id != 0) {
            missing.push("github.installation_id");
        }
        if self.private_key_path.is_none() {
            missing.push("github.private_key_path");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(crate::error::ConfigError::MissingRequired {
                field: missing.join(", "),
            }
            .into())
        }
    }

    /// Returns whether [`Self::validate`] would succeed.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, SmartDefault)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset, such as `info` or
    /// `stageops=debug`.
    #[default = "info"]
    pub level: String,
}

/// SSH transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, SmartDefault)]
#[serde(default)]
pub struct SshConfig {
    /// Seconds allowed for connecting, the handshake and authentication.
    #[default = 30]
    pub connect_timeout_secs: u64,
}

/// Root tool configuration.
///
/// Layers merge with precedence defaults < configuration file < `STAGEOPS_*`
/// environment variables < command-line flags. Files are discovered in this
/// order:
/// 1. The path in `STAGEOPS_CONFIG_PATH`
/// 2. `.stageops.toml` in the working directory
/// 3. `.stageops.toml` in the home directory
/// 4. `~/.config/stageops/config.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(
    prefix = "STAGEOPS",
    post_merge_hook,
    discovery(
        app_name = "stageops",
        env_var = "STAGEOPS_CONFIG_PATH",
        config_file_name = "config.toml",
        dotfile_name = ".stageops.toml",
        config_cli_long = "config",
        config_cli_visible = true,
    )
)]
pub struct StageopsConfig {
    /// The deployment document to read.
    pub deployment_file: Option<Utf8PathBuf>,

    /// Directory whose files override the built-in templates.
    pub templates_dir: Option<Utf8PathBuf>,

    /// Logging settings.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub log: LogConfig,

    /// SSH transport settings.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub ssh: SshConfig,

    /// `GitHub` App settings.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub github: GitHubConfig,
}

impl StageopsConfig {
    /// Returns the deployment document path, falling back to `deploy.yml`.
    #[must_use]
    pub fn deployment_file(&self) -> &Utf8Path {
        self.deployment_file
            .as_deref()
            .unwrap_or_else(|| Utf8Path::new(DEFAULT_DEPLOYMENT_FILE))
    }
}

impl PostMergeHook for StageopsConfig {
    fn post_merge(&mut self, _ctx: &PostMergeContext) -> OrthoResult<()> {
        // Blank strings from a file or the environment mean "unset".
        self.deployment_file = self
            .deployment_file
            .take()
            .filter(|path| !path.as_str().trim().is_empty());
        self.templates_dir = self
            .templates_dir
            .take()
            .filter(|path| !path.as_str().trim().is_empty());
        if self.log.level.trim().is_empty() {
            self.log = LogConfig::default();
        }
        Ok(())
    }
}
