//! Scenario state for deployment document BDD tests.

use rstest_bdd::Slot;
use rstest_bdd_macros::ScenarioState;
use serde_yaml::Value;

/// Convenience alias for step outcomes.
pub type StepResult<T> = Result<T, String>;

/// Result of loading (and optionally selecting from) a document.
#[derive(Clone, Debug)]
pub enum LoadOutcome {
    /// The document validated; the apps are listed in result order.
    Loaded {
        /// Project names of the loaded or selected apps.
        names: Vec<String>,
        /// `(project name, tier, workers)` for each loaded app.
        apps: Vec<(String, String, u32)>,
    },
    /// Loading or selection failed with this message.
    Failed(String),
}

/// State shared across deployment document scenarios.
#[derive(Default, ScenarioState)]
pub struct ManifestState {
    /// The `server` section.
    pub(crate) server: Slot<Value>,
    /// App bodies keyed by the name used in the document.
    pub(crate) apps: Slot<Vec<(String, serde_yaml::Mapping)>>,
    /// Whether `apps` is written as a sequence instead of a mapping.
    pub(crate) as_list: Slot<bool>,
    /// Result of the most recent load.
    pub(crate) outcome: Slot<LoadOutcome>,
}

/// Fixture providing fresh state for each scenario.
#[rstest::fixture]
pub fn manifest_state() -> ManifestState {
    ManifestState::default()
}
