//! Tool configuration for stageops.
//!
//! These settings describe how the tool runs, not what it deploys; the
//! deployment document is handled by [`crate::manifest`]. Layers merge with
//! precedence defaults < file < `STAGEOPS_*` environment < CLI flags.
//!
//! The configuration file is expected at `~/.config/stageops/config.toml` by
//! default.
//!
//! # Example Configuration
//!
//! ```toml
//! deployment_file = "/etc/stageops/deploy.yml"
//! templates_dir = "/etc/stageops/templates"
//!
//! [log]
//! level = "info"
//!
//! [ssh]
//! connect_timeout_secs = 30
//!
//! [github]
//! app_id = 12345
//! installation_id = 67890
//! private_key_path = "/etc/stageops/github-app.pem"
//! ```

mod cli;
mod loader;
mod types;

#[cfg(test)]
mod tests;

pub use cli::{Cli, Commands, DeployArgs, RenderArgs, SelectArgs};
pub use loader::{env_var_names, load_config, load_config_with_env};
pub use types::{DEFAULT_DEPLOYMENT_FILE, GitHubConfig, LogConfig, SshConfig, StageopsConfig};
