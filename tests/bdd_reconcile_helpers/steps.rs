//! Given and When step definitions for host reconciliation BDD tests.

use rstest_bdd_macros::{given, when};
use stageops::manifest;
use stageops::reconcile::Reconciler;
use stageops::remote::RecordingExecutor;
use stageops::render::{ArtifactSet, TemplateSet};

use super::state::{ReconcileState, StepResult};

fn document(tier: &str, name: &str) -> String {
    format!(
        r"
server:
  host: 203.0.113.7
  user: deploy
  ssh_key_path: ~/.ssh/deploy_ed25519
  access_log_template: /var/log/{{{{ project_name }}}}/access.log
  error_log_template: /var/log/{{{{ project_name }}}}/error.log
apps:
  {name}:
    domain: {name}.example
    tier: {tier}
    worker_class: gthread
    workers: 2
    threads: 4
    timeout: 30
    graceful_timeout: 20
    max_requests: 1000
    max_requests_jitter: 100
    memory_limit: 512M
"
    )
}

#[given("a cold app {name}")]
fn cold_app(reconcile_state: &ReconcileState, name: String) {
    reconcile_state.document.set(document("cold", &name));
}

#[given("a hot app {name}")]
fn hot_app(reconcile_state: &ReconcileState, name: String) {
    reconcile_state.document.set(document("hot", &name));
}

#[given("the app replaces the legacy project {legacy}")]
fn replaces_legacy(reconcile_state: &ReconcileState, legacy: String) -> StepResult<()> {
    let mut text = reconcile_state
        .document
        .get()
        .ok_or_else(|| String::from("an app should be declared first"))?;
    text.push_str(&format!("    legacy_project_names: [{legacy}]\n"));
    reconcile_state.document.set(text);
    Ok(())
}

#[given("the host fails commands containing {fragment}")]
fn host_fails(reconcile_state: &ReconcileState, fragment: String) {
    let mut failures = reconcile_state.failures.get().unwrap_or_default();
    failures.push(fragment);
    reconcile_state.failures.set(failures);
}

/// Applies every app in the document once against a fresh recorder.
fn apply_once(reconcile_state: &ReconcileState) -> StepResult<()> {
    let text = reconcile_state
        .document
        .get()
        .ok_or_else(|| String::from("an app should be declared first"))?;
    let loaded = manifest::parse_str(&text).map_err(|e| format!("document should load: {e}"))?;
    let recorder = reconcile_state
        .failures
        .get()
        .unwrap_or_default()
        .into_iter()
        .fold(RecordingExecutor::new(), |recorder, fragment| {
            recorder.fail_when(fragment, 1)
        });
    let templates = TemplateSet::builtin();
    let reconciler = Reconciler::new(&recorder, &loaded.server);

    for app in &loaded.apps {
        let artifacts = ArtifactSet::build(&loaded.server, app, &templates)
            .map_err(|e| format!("artifacts should render: {e}"))?;
        if let Err(error) = reconciler.apply(app, &artifacts) {
            reconcile_state.error.set(error.to_string());
            break;
        }
    }

    let mut runs = reconcile_state.runs.get().unwrap_or_default();
    runs.push(recorder.scripts());
    reconcile_state.runs.set(runs);
    Ok(())
}

#[when("the app is applied")]
fn app_is_applied(reconcile_state: &ReconcileState) -> StepResult<()> {
    apply_once(reconcile_state)
}

#[when("the app is applied twice")]
fn app_is_applied_twice(reconcile_state: &ReconcileState) -> StepResult<()> {
    apply_once(reconcile_state)?;
    apply_once(reconcile_state)
}
