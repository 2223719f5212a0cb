//! Scenario state for host reconciliation BDD tests.

use rstest_bdd::Slot;
use rstest_bdd_macros::ScenarioState;

/// Convenience alias for step outcomes.
pub type StepResult<T> = Result<T, String>;

/// State shared across reconciliation scenarios.
#[derive(Default, ScenarioState)]
pub struct ReconcileState {
    /// The deployment document under test.
    pub(crate) document: Slot<String>,
    /// Script fragments the recorded host fails.
    pub(crate) failures: Slot<Vec<String>>,
    /// Scripts run by each apply, in order.
    pub(crate) runs: Slot<Vec<Vec<String>>>,
    /// The error of the last apply, if it failed.
    pub(crate) error: Slot<String>,
}

/// Fixture providing fresh state for each scenario.
#[rstest::fixture]
pub fn reconcile_state() -> ReconcileState {
    ReconcileState::default()
}
