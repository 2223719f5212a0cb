//! Steps and state for App client and token minting scenarios.

mod steps;

pub use state::{InstallationTokenState, installation_token_state};
