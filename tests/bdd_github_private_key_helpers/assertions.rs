//! Then step definitions for GitHub private key loading BDD tests.

use rstest_bdd_macros::then;

use super::state::{KeyFileState, KeyLoadOutcome, StepResult};

fn outcome(state: &KeyFileState) -> StepResult<KeyLoadOutcome> {
    state
        .outcome
        .get()
        .ok_or_else(|| String::from("outcome should be set"))
}

fn failure_message(state: &KeyFileState) -> StepResult<String> {
    match outcome(state)? {
        KeyLoadOutcome::Failed { message } => Ok(message),
        KeyLoadOutcome::Success => Err(String::from("expected key load failure, got success")),
    }
}

#[then("the private key loads successfully")]
fn key_loads_successfully(key_file_state: &KeyFileState) -> StepResult<()> {
    match outcome(key_file_state)? {
        KeyLoadOutcome::Success => Ok(()),
        KeyLoadOutcome::Failed { message } => {
            Err(format!("expected successful key load, got: {message}"))
        }
    }
}

#[then("the private key load fails")]
fn key_load_fails(key_file_state: &KeyFileState) -> StepResult<()> {
    failure_message(key_file_state).map(|_| ())
}

#[then("the error mentions {expected}")]
fn error_mentions(
    key_file_state: &KeyFileState,
    expected: String,
) -> StepResult<()> {
    let message = failure_message(key_file_state)?;
    if message.contains(&expected) {
        Ok(())
    } else {
        Err(format!("expected error to contain '{expected}', got: {message}"))
    }
}
