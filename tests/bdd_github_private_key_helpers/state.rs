//! Scenario state for GitHub private key loading BDD tests.

use std::sync::Arc;

use camino::Utf8PathBuf;
use rstest_bdd::Slot;
use rstest_bdd_macros::ScenarioState;
use tempfile::TempDir;

/// Convenience alias for step outcomes.
pub type StepResult<T> = Result<T, String>;

/// Outcome of a private key load attempt.
#[derive(Clone, Debug)]
pub enum KeyLoadOutcome {
    /// The key parsed as an RSA signing key.
    Success,
    /// Loading failed.
    Failed {
        /// The `Display` representation of the error.
        message: String,
    },
}

/// Scratch key file and load result for one scenario.
#[derive(Default, ScenarioState)]
pub struct KeyFileState {
    /// Keeps the scratch directory alive for the scenario.
    pub(crate) temp_dir: Slot<Arc<TempDir>>,
    /// Path handed to the loader.
    pub(crate) key_path: Slot<Utf8PathBuf>,
    /// Result of the most recent load.
    pub(crate) outcome: Slot<KeyLoadOutcome>,
}

/// Empty state; each scenario writes its own key file.
#[rstest::fixture]
pub fn key_file_state() -> KeyFileState {
    KeyFileState::default()
}
