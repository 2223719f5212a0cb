//! Shared fixtures and helper functions for config tests.

use std::sync::Arc;

use camino::Utf8PathBuf;
use ortho_config::MergeComposer;
use ortho_config::serde_json::json;
use rstest::fixture;

use crate::config::{GitHubConfig, StageopsConfig};

/// A configuration parsed from a TOML file that sets every field.
#[fixture]
pub fn config_from_full_toml() -> StageopsConfig {
    let toml = r#"
        deployment_file = "/etc/stageops/prod.yml"
        templates_dir = "/etc/stageops/templates"

        [log]
        level = "stageops=debug"

        [ssh]
        connect_timeout_secs = 10

        [github]
        app_id = 12345
        installation_id = 67890
        private_key_path = "/etc/stageops/app.pem"
    "#;
    toml::from_str(toml).expect("TOML parsing should succeed")
}

/// A complete `GitHubConfig`.
#[fixture]
pub fn github_config_complete() -> GitHubConfig {
    GitHubConfig {
        app_id: Some(12345),
        installation_id: Some(67890),
        private_key_path: Some(Utf8PathBuf::from("/path/to/key.pem")),
    }
}

/// Creates a composer holding only the defaults layer.
pub fn composer_with_defaults() -> Result<MergeComposer, serde_json::Error> {
    let mut composer = MergeComposer::new();
    composer.push_defaults(ortho_config::serde_json::to_value(StageopsConfig::default())?);
    Ok(composer)
}

/// Creates a composer with defaults plus a file layer and an environment layer.
pub fn composer_with_file_and_env() -> Result<MergeComposer, serde_json::Error> {
    let mut composer = composer_with_defaults()?;
    composer.push_file(
        json!({
            "deployment_file": "from-file.yml",
            "templates_dir": "/from/file",
            "ssh": { "connect_timeout_secs": 5 }
        }),
        None,
    );
    composer.push_environment(json!({ "deployment_file": "from-env.yml" }));
    Ok(composer)
}

/// Merges every layer of `composer`.
pub fn merge(composer: MergeComposer) -> Result<StageopsConfig, Arc<ortho_config::OrthoError>> {
    StageopsConfig::merge_from_layers(composer.layers())
}
