//! Then step definitions for host reconciliation BDD tests.

use rstest_bdd_macros::then;

use super::state::{ReconcileState, StepResult};

fn last_run(state: &ReconcileState) -> StepResult<Vec<String>> {
    state
        .runs
        .get()
        .and_then(|runs| runs.last().cloned())
        .ok_or_else(|| String::from("the app should have been applied"))
}

#[then("the run succeeds")]
fn run_succeeds(reconcile_state: &ReconcileState) -> StepResult<()> {
    match reconcile_state.error.get() {
        None => Ok(()),
        Some(message) => Err(format!("expected the run to succeed, got: {message}")),
    }
}

#[then("the run fails mentioning {expected}")]
fn run_fails(reconcile_state: &ReconcileState, expected: String) -> StepResult<()> {
    match reconcile_state.error.get() {
        Some(message) if message.contains(&expected) => Ok(()),
        Some(message) => Err(format!("expected error to contain '{expected}', got: {message}")),
        None => Err(String::from("expected the run to fail")),
    }
}

#[then("the host ran {script}")]
fn host_ran(reconcile_state: &ReconcileState, script: String) -> StepResult<()> {
    let scripts = last_run(reconcile_state)?;
    if scripts.contains(&script) {
        Ok(())
    } else {
        Err(format!("expected `{script}` in {scripts:#?}"))
    }
}

#[then("the host never ran {script}")]
fn host_never_ran(reconcile_state: &ReconcileState, script: String) -> StepResult<()> {
    let scripts = last_run(reconcile_state)?;
    if scripts.contains(&script) {
        Err(format!("`{script}` should not have run"))
    } else {
        Ok(())
    }
}

#[then("both runs issue identical commands")]
fn runs_are_identical(reconcile_state: &ReconcileState) -> StepResult<()> {
    let runs = reconcile_state.runs.get().unwrap_or_default();
    match runs.as_slice() {
        [first, second] if first == second => Ok(()),
        [_, _] => Err(String::from("the second run issued different commands")),
        _ => Err(format!("expected two runs, got {}", runs.len())),
    }
}
