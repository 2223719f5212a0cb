//! Steps and state for the App key loading feature.

mod assertions;
mod state;
mod steps;

pub use state::{KeyFileState, key_file_state};
