//! Given and When step definitions for deployment document BDD tests.

use rstest_bdd_macros::{given, when};
use serde_yaml::{Mapping, Value};
use stageops::manifest::{self, Manifest};

use super::state::{LoadOutcome, ManifestState, StepResult};

const SERVER: &str = r"
host: 203.0.113.7
user: deploy
ssh_key_path: ~/.ssh/deploy_ed25519
access_log_template: /var/log/{{ project_name }}/access.log
error_log_template: /var/log/{{ project_name }}/error.log
defaults:
  worker_class: gthread
  threads: 4
  timeout: 30
  graceful_timeout: 20
  max_requests: 1000
  max_requests_jitter: 100
  memory_limit: 512M
";

fn apps(state: &ManifestState) -> Vec<(String, Mapping)> {
    state.apps.get().unwrap_or_default()
}

fn document(state: &ManifestState) -> StepResult<Value> {
    let server = state
        .server
        .get()
        .ok_or_else(|| String::from("server should be set"))?;
    let entries = apps(state);
    let apps_value = if state.as_list.get().unwrap_or(false) {
        Value::Sequence(
            entries
                .into_iter()
                .map(|(name, mut body)| {
                    body.insert(Value::from("name"), Value::from(name));
                    Value::Mapping(body)
                })
                .collect(),
        )
    } else {
        Value::Mapping(
            entries
                .into_iter()
                .map(|(name, body)| (Value::from(name), Value::Mapping(body)))
                .collect(),
        )
    };
    let mut root = Mapping::new();
    root.insert(Value::from("server"), server);
    root.insert(Value::from("apps"), apps_value);
    Ok(Value::Mapping(root))
}

fn loaded(manifest: &Manifest, names: Vec<String>) -> LoadOutcome {
    LoadOutcome::Loaded {
        names,
        apps: manifest
            .apps
            .iter()
            .map(|app| {
                (
                    app.project_name.clone(),
                    app.tier.as_str().to_owned(),
                    app.process.workers,
                )
            })
            .collect(),
    }
}

#[given("a server with default tier {tier} and {workers} workers")]
fn server_with_defaults(manifest_state: &ManifestState, tier: String, workers: u32) -> StepResult<()> {
    let mut server: Value =
        serde_yaml::from_str(SERVER).map_err(|e| format!("server YAML should parse: {e}"))?;
    let defaults = server
        .get_mut("defaults")
        .and_then(Value::as_mapping_mut)
        .ok_or_else(|| String::from("defaults should be a mapping"))?;
    defaults.insert(Value::from("tier"), Value::from(tier));
    defaults.insert(Value::from("workers"), Value::from(workers));
    manifest_state.server.set(server);
    Ok(())
}

#[given("an app {name} for domain {domain}")]
fn app_for_domain(manifest_state: &ManifestState, name: String, domain: String) {
    let mut entries = apps(manifest_state);
    let mut body = Mapping::new();
    body.insert(Value::from("domain"), Value::from(domain));
    entries.push((name, body));
    manifest_state.apps.set(entries);
}

#[given("app {name} sets {key} to {value}")]
fn app_sets(manifest_state: &ManifestState, name: String, key: String, value: String) -> StepResult<()> {
    let parsed: Value =
        serde_yaml::from_str(&value).map_err(|e| format!("'{value}' should parse as YAML: {e}"))?;
    let mut entries = apps(manifest_state);
    let (_, body) = entries
        .iter_mut()
        .find(|(declared, _)| *declared == name)
        .ok_or_else(|| format!("app {name} should be declared first"))?;
    body.insert(Value::from(key), parsed);
    manifest_state.apps.set(entries);
    Ok(())
}

#[given("the apps are declared as a list")]
fn apps_as_list(manifest_state: &ManifestState) {
    manifest_state.as_list.set(true);
}

#[when("the document is loaded")]
fn load_document(manifest_state: &ManifestState) -> StepResult<()> {
    let outcome = match manifest::load(&document(manifest_state)?) {
        Ok(manifest) => {
            let names = manifest
                .apps
                .iter()
                .map(|app| app.project_name.clone())
                .collect();
            loaded(&manifest, names)
        }
        Err(error) => LoadOutcome::Failed(error.to_string()),
    };
    manifest_state.outcome.set(outcome);
    Ok(())
}

#[when("apps {names} are selected")]
fn select_apps(manifest_state: &ManifestState, names: String) -> StepResult<()> {
    let manifest = manifest::load(&document(manifest_state)?)
        .map_err(|e| format!("document should load: {e}"))?;
    let only: Vec<&str> = names.split(',').collect();
    let outcome = match manifest::select(&manifest.apps, &only) {
        Ok(selected) => loaded(
            &manifest,
            selected
                .iter()
                .map(|app| app.project_name.clone())
                .collect(),
        ),
        Err(error) => LoadOutcome::Failed(error.to_string()),
    };
    manifest_state.outcome.set(outcome);
    Ok(())
}
