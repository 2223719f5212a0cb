//! Given and When step definitions for installation token BDD tests.

use std::sync::Arc;

use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use jsonwebtoken::EncodingKey;
use rstest_bdd_macros::{given, when};
use stageops::error::GitHubError;
use stageops::github::{
    BoxFuture, GitHubAppClient, build_app_client, load_private_key, mint_with_factory,
};

use super::state::{ApiBehaviour, InstallationTokenState, MintOutcome, StepResult};

// The crate's automock is only compiled for its own unit tests.
mockall::mock! {
    pub AppClient {}

    impl GitHubAppClient for AppClient {
        fn installation_token(
            &self,
            installation_id: u64,
        ) -> BoxFuture<'static, Result<String, GitHubError>>;
    }
}

fn mock_for(behaviour: ApiBehaviour) -> MockAppClient {
    let mut client = MockAppClient::new();
    match behaviour {
        ApiBehaviour::Issues {
            token,
            installation_id,
        } => {
            client
                .expect_installation_token()
                .withf(move |requested| *requested == installation_id)
                .times(1)
                .returning(move |_| {
                    let issued = token.clone();
                    Box::pin(async move { Ok(issued) })
                });
        }
        ApiBehaviour::IssuesEmpty => {
            client
                .expect_installation_token()
                .times(1)
                .returning(|_| Box::pin(async { Ok(String::new()) }));
        }
        ApiBehaviour::Rejects => {
            client.expect_installation_token().times(1).returning(|id| {
                Box::pin(async move {
                    Err(GitHubError::TokenAcquisitionFailed {
                        message: format!("installation {id}: 404 Not Found"),
                    })
                })
            });
        }
        ApiBehaviour::Untouched => {
            client.expect_installation_token().never();
        }
    }
    client
}

fn write_key(state: &InstallationTokenState, pem: &str) -> StepResult<()> {
    let tmp = tempfile::tempdir().map_err(|e| format!("should create temp dir: {e}"))?;
    let tmp_path = Utf8Path::from_path(tmp.path())
        .ok_or_else(|| String::from("temp dir path should be UTF-8"))?
        .to_owned();
    let dir = Dir::open_ambient_dir(&tmp_path, ambient_authority())
        .map_err(|e| format!("should open temp dir: {e}"))?;
    dir.write("app.pem", pem)
        .map_err(|e| format!("should write key file: {e}"))?;
    state.temp_dir.set(Arc::new(tmp));
    state.key_path.set(tmp_path.join("app.pem"));
    Ok(())
}

#[given("a valid RSA private key file exists at the configured path")]
fn valid_rsa_key_file(installation_token_state: &InstallationTokenState) -> StepResult<()> {
    write_key(
        installation_token_state,
        include_str!("../fixtures/test_rsa_private_key.pem"),
    )
}

#[given("an ECDSA private key file exists at the configured path")]
fn ecdsa_key_file(installation_token_state: &InstallationTokenState) -> StepResult<()> {
    write_key(
        installation_token_state,
        include_str!("../fixtures/test_ec_private_key.pem"),
    )
}

#[given("the GitHub App ID is {app_id}")]
fn set_app_id(installation_token_state: &InstallationTokenState, app_id: u64) {
    installation_token_state.app_id.set(app_id);
}

#[given("a GitHub API that issues token {token} for installation {installation_id}")]
fn api_issues(installation_token_state: &InstallationTokenState, token: String, installation_id: u64) {
    installation_token_state.api.set(ApiBehaviour::Issues {
        token,
        installation_id,
    });
}

#[given("a GitHub API that issues an empty token")]
fn api_issues_empty(installation_token_state: &InstallationTokenState) {
    installation_token_state.api.set(ApiBehaviour::IssuesEmpty);
}

#[given("a GitHub API that rejects the request")]
fn api_rejects(installation_token_state: &InstallationTokenState) {
    installation_token_state.api.set(ApiBehaviour::Rejects);
}

#[given("a GitHub API that must not be called")]
fn api_untouched(installation_token_state: &InstallationTokenState) {
    installation_token_state.api.set(ApiBehaviour::Untouched);
}

#[when("a token is minted for installation {installation_id}")]
fn mint(installation_token_state: &InstallationTokenState, installation_id: u64) -> StepResult<()> {
    let key_path = installation_token_state
        .key_path
        .get()
        .ok_or_else(|| String::from("key path should be set"))?;
    let app_id = installation_token_state
        .app_id
        .get()
        .ok_or_else(|| String::from("app_id should be set"))?;
    let behaviour = installation_token_state
        .api
        .get()
        .ok_or_else(|| String::from("API behaviour should be set"))?;

    let factory = move |received: u64, _key: EncodingKey| {
        if received == app_id {
            Ok(mock_for(behaviour))
        } else {
            Err(GitHubError::AuthenticationFailed {
                message: format!("app_id mismatch: expected {app_id}, received {received}"),
            })
        }
    };
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| format!("failed to create tokio runtime: {e}"))?;
    let result = rt.block_on(mint_with_factory(app_id, installation_id, &key_path, factory));

    installation_token_state.outcome.set(match result {
        Ok(token) => MintOutcome::Minted(token),
        Err(error) => MintOutcome::Failed(error.to_string()),
    });
    Ok(())
}

fn build_client(installation_token_state: &InstallationTokenState) -> StepResult<()> {
    let key_path = installation_token_state
        .key_path
        .get()
        .ok_or_else(|| String::from("key path should be set"))?;
    let app_id = installation_token_state
        .app_id
        .get()
        .ok_or_else(|| String::from("app_id should be set"))?;
    let key = load_private_key(&key_path).map_err(|e| format!("key load failed: {e}"))?;
    installation_token_state
        .client_error
        .set(build_app_client(app_id, key).err().map(|error| error.to_string()));
    Ok(())
}

#[when("the App client is built inside a runtime")]
fn build_inside_runtime(installation_token_state: &InstallationTokenState) -> StepResult<()> {
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| format!("failed to create tokio runtime: {e}"))?;
    let _guard = rt.enter();
    build_client(installation_token_state)
}

#[when("the App client is built without a runtime")]
fn build_without_runtime(installation_token_state: &InstallationTokenState) -> StepResult<()> {
    build_client(installation_token_state)
}
