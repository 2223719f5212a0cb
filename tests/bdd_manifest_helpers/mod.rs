//! Behavioural step helpers for deployment document scenarios.

mod assertions;
mod state;
mod steps;

pub use state::{ManifestState, manifest_state};
