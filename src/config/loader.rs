//! Configuration loading with layered precedence.
//!
//! Layers are composed by hand with `MergeComposer` rather than through
//! `OrthoConfig::load`, because the `Cli` owns subcommand parsing and
//! because typed environment values must fail loudly: Figment's environment
//! provider silently drops a value such as `STAGEOPS_SSH_CONNECT_TIMEOUT_SECS=soon`,
//! while this loader reports it.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use ortho_config::discovery::ConfigDiscovery;
use ortho_config::serde_json::{self, Map, Value};
use ortho_config::{MergeComposer, toml};
use tracing::debug;

use crate::config::{Cli, StageopsConfig};
use crate::error::{ConfigError, Result};

/// The type of value expected from an environment variable.
#[derive(Clone, Copy)]
enum EnvVarType {
    String,
    U64,
}

/// Maps one environment variable onto a path in the configuration.
struct EnvVarSpec {
    env_var: &'static str,
    path: &'static [&'static str],
    var_type: EnvVarType,
}

const ENV_VAR_SPECS: &[EnvVarSpec] = &[
    EnvVarSpec {
        env_var: "STAGEOPS_DEPLOYMENT_FILE",
        path: &["deployment_file"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "STAGEOPS_TEMPLATES_DIR",
        path: &["templates_dir"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "STAGEOPS_LOG_LEVEL",
        path: &["log", "level"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "STAGEOPS_SSH_CONNECT_TIMEOUT_SECS",
        path: &["ssh", "connect_timeout_secs"],
        var_type: EnvVarType::U64,
    },
    EnvVarSpec {
        env_var: "STAGEOPS_GITHUB_APP_ID",
        path: &["github", "app_id"],
        var_type: EnvVarType::U64,
    },
    EnvVarSpec {
        env_var: "STAGEOPS_GITHUB_INSTALLATION_ID",
        path: &["github", "installation_id"],
        var_type: EnvVarType::U64,
    },
    EnvVarSpec {
        env_var: "STAGEOPS_GITHUB_PRIVATE_KEY_PATH",
        path: &["github", "private_key_path"],
        var_type: EnvVarType::String,
    },
];

/// Returns every environment variable the loader reads, for tests that need
/// to clear them.
#[must_use]
pub fn env_var_names() -> Vec<&'static str> {
    ENV_VAR_SPECS.iter().map(|spec| spec.env_var).collect()
}

/// Loads configuration from the process environment.
///
/// # Errors
///
/// See [`load_config_with_env`].
pub fn load_config(cli: &Cli) -> Result<StageopsConfig> {
    load_config_with_env(cli, &mockable::DefaultEnv::new())
}

/// Loads configuration with full layer precedence, reading `STAGEOPS_*`
/// variables from `env`.
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` when `--config` names a missing file,
/// `ConfigError::ParseError` for an unreadable or malformed file,
/// `ConfigError::InvalidValue` for an unparseable typed variable, and
/// `ConfigError::OrthoConfig` when the merged layers do not deserialise.
pub fn load_config_with_env<E: mockable::Env>(cli: &Cli, env: &E) -> Result<StageopsConfig> {
    let mut composer = MergeComposer::new();

    let defaults =
        serde_json::to_value(StageopsConfig::default()).map_err(|e| ConfigError::ParseError {
            message: format!("failed to serialise defaults: {e}"),
        })?;
    composer.push_defaults(defaults);

    if let Some(path) = config_file(cli)? {
        debug!(path = %path, "loading configuration file");
        load_config_file(&path, &mut composer)?;
    }

    let env_values = collect_env_vars(env)?;
    if !env_values.is_null() {
        composer.push_environment(env_values);
    }

    let cli_overrides = build_cli_overrides(cli);
    if !cli_overrides.is_null() {
        composer.push_cli(cli_overrides);
    }

    let config =
        StageopsConfig::merge_from_layers(composer.layers()).map_err(ConfigError::OrthoConfig)?;
    Ok(config)
}

/// An explicit `--config` must exist; otherwise the first discovered
/// candidate that exists is used.
fn config_file(cli: &Cli) -> Result<Option<Utf8PathBuf>> {
    if let Some(path) = &cli.config {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.clone().into_std_path_buf(),
            }
            .into());
        }
        return Ok(Some(path.clone()));
    }
    let discovery = ConfigDiscovery::builder("stageops")
        .env_var("STAGEOPS_CONFIG_PATH")
        .config_file_name("config.toml")
        .dotfile_name(".stageops.toml")
        .build();
    Ok(discovery
        .candidates()
        .into_iter()
        .filter(|candidate| candidate.exists())
        .find_map(|candidate| Utf8PathBuf::try_from(candidate).ok()))
}

fn load_config_file(path: &Utf8Path, composer: &mut MergeComposer) -> Result<()> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path.file_name().unwrap_or(path.as_str());

    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|e| {
        ConfigError::ParseError {
            message: format!("failed to open directory {parent}: {e}"),
        }
    })?;
    let content = dir
        .read_to_string(file_name)
        .map_err(|e| ConfigError::ParseError {
            message: format!("failed to read {path}: {e}"),
        })?;
    let value = toml::from_str::<Value>(&content).map_err(|e| ConfigError::ParseError {
        message: format!("failed to parse {path}: {e}"),
    })?;

    composer.push_file(value, Some(path.to_owned()));
    Ok(())
}

fn collect_env_vars<E: mockable::Env>(env: &E) -> Result<Value> {
    let mut root = Map::new();
    for spec in ENV_VAR_SPECS {
        let Some(raw) = env.string(spec.env_var) else {
            continue;
        };
        let value = match spec.var_type {
            EnvVarType::String => Value::String(raw),
            EnvVarType::U64 => {
                let number = raw.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                    field: spec.env_var.to_owned(),
                    reason: format!("expected unsigned integer, got '{raw}'"),
                })?;
                Value::Number(number.into())
            }
        };
        insert_at_path(&mut root, spec.path, value);
    }
    Ok(if root.is_empty() {
        Value::Null
    } else {
        Value::Object(root)
    })
}

/// Inserts `value` at a nested path, creating intermediate objects.
fn insert_at_path(root: &mut Map<String, Value>, path: &[&str], value: Value) {
    let Some((&field, parents)) = path.split_last() else {
        return;
    };
    let mut current = root;
    for &segment in parents {
        let entry = current
            .entry(segment.to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
        let Some(object) = entry.as_object_mut() else {
            return;
        };
        current = object;
    }
    current.insert(field.to_owned(), value);
}

fn build_cli_overrides(cli: &Cli) -> Value {
    let mut overrides = Map::new();
    if let Some(file) = &cli.file {
        overrides.insert(
            String::from("deployment_file"),
            Value::String(file.to_string()),
        );
    }
    if let Some(dir) = &cli.templates_dir {
        overrides.insert(String::from("templates_dir"), Value::String(dir.to_string()));
    }
    if overrides.is_empty() {
        Value::Null
    } else {
        Value::Object(overrides)
    }
}
