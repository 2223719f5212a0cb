//! Then step definitions for deployment document BDD tests.

use rstest_bdd_macros::then;

use super::state::{LoadOutcome, ManifestState, StepResult};

fn loaded_app(state: &ManifestState, name: &str) -> StepResult<(String, u32)> {
    match state
        .outcome
        .get()
        .ok_or_else(|| String::from("outcome should be set"))?
    {
        LoadOutcome::Loaded { apps, .. } => apps
            .into_iter()
            .find(|(project, _, _)| project == name)
            .map(|(_, tier, workers)| (tier, workers))
            .ok_or_else(|| format!("app {name} should be loaded")),
        LoadOutcome::Failed(message) => Err(format!("expected the document to load, got: {message}")),
    }
}

#[then("app {name} uses tier {tier}")]
fn app_uses_tier(manifest_state: &ManifestState, name: String, tier: String) -> StepResult<()> {
    let (actual, _) = loaded_app(manifest_state, &name)?;
    if actual == tier {
        Ok(())
    } else {
        Err(format!("expected tier {tier} for {name}, got {actual}"))
    }
}

#[then("app {name} runs {workers} workers")]
fn app_runs_workers(manifest_state: &ManifestState, name: String, workers: u32) -> StepResult<()> {
    let (_, actual) = loaded_app(manifest_state, &name)?;
    if actual == workers {
        Ok(())
    } else {
        Err(format!("expected {workers} workers for {name}, got {actual}"))
    }
}

#[then("the loaded apps are {names}")]
fn loaded_apps_are(manifest_state: &ManifestState, names: String) -> StepResult<()> {
    match manifest_state
        .outcome
        .get()
        .ok_or_else(|| String::from("outcome should be set"))?
    {
        LoadOutcome::Loaded { names: actual, .. } if actual.join(",") == names => Ok(()),
        LoadOutcome::Loaded { names: actual, .. } => {
            Err(format!("expected apps {names}, got {}", actual.join(",")))
        }
        LoadOutcome::Failed(message) => Err(format!("expected the document to load, got: {message}")),
    }
}

#[then("loading fails mentioning {expected}")]
fn loading_fails(manifest_state: &ManifestState, expected: String) -> StepResult<()> {
    match manifest_state
        .outcome
        .get()
        .ok_or_else(|| String::from("outcome should be set"))?
    {
        LoadOutcome::Failed(message) if message.contains(&expected) => Ok(()),
        LoadOutcome::Failed(message) => {
            Err(format!("expected error to contain '{expected}', got: {message}"))
        }
        LoadOutcome::Loaded { .. } => Err(String::from("expected loading to fail")),
    }
}
