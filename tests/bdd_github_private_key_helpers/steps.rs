//! Given and When step definitions for GitHub private key loading BDD tests.

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use rstest_bdd_macros::{given, when};

use super::state::{KeyFileState, KeyLoadOutcome, StepResult};

const KEY_FILE: &str = "app.pem";

/// Creates a temporary directory and opens it as a capability handle.
fn scratch_dir(state: &KeyFileState) -> StepResult<(Dir, Utf8PathBuf)> {
    let tmp = tempfile::tempdir().map_err(|e| format!("should create temp dir: {e}"))?;
    let tmp_path = Utf8Path::from_path(tmp.path())
        .ok_or_else(|| String::from("temp dir path should be UTF-8"))?
        .to_owned();
    let dir = Dir::open_ambient_dir(&tmp_path, ambient_authority())
        .map_err(|e| format!("should open temp dir: {e}"))?;
    state.temp_dir.set(Arc::new(tmp));
    Ok((dir, tmp_path))
}

fn write_key_file(state: &KeyFileState, contents: &str) -> StepResult<()> {
    let (dir, tmp_path) = scratch_dir(state)?;
    dir.write(KEY_FILE, contents)
        .map_err(|e| format!("should write key file: {e}"))?;
    state.key_path.set(tmp_path.join(KEY_FILE));
    Ok(())
}

/// A syntactically plausible PEM block; only the label matters here.
fn stub_pem(label: &str) -> String {
    format!("-----BEGIN {label}-----\nMIIBCgKCAQEAuV2b0w==\n-----END {label}-----\n")
}

#[given("a valid RSA private key file exists at the configured path")]
fn valid_rsa_key_file(key_file_state: &KeyFileState) -> StepResult<()> {
    let pem = include_str!("../fixtures/test_rsa_private_key.pem");
    write_key_file(key_file_state, pem)
}

#[given("no private key file exists at the configured path")]
fn missing_key_file(key_file_state: &KeyFileState) -> StepResult<()> {
    let (_dir, tmp_path) = scratch_dir(key_file_state)?;
    key_file_state.key_path.set(tmp_path.join(KEY_FILE));
    Ok(())
}

#[given("an empty private key file exists at the configured path")]
fn empty_key_file(key_file_state: &KeyFileState) -> StepResult<()> {
    write_key_file(key_file_state, "\n")
}

#[given("a file with invalid PEM content exists at the configured path")]
fn invalid_pem_file(key_file_state: &KeyFileState) -> StepResult<()> {
    write_key_file(key_file_state, "deploy key goes here")
}

#[given("an ECDSA private key file exists at the configured path")]
fn ecdsa_key_file(key_file_state: &KeyFileState) -> StepResult<()> {
    let pem = include_str!("../fixtures/test_ec_private_key.pem");
    write_key_file(key_file_state, pem)
}

#[given("an Ed25519 private key file exists at the configured path")]
fn ed25519_key_file(key_file_state: &KeyFileState) -> StepResult<()> {
    let pem = include_str!("../fixtures/test_ed25519_private_key.pem");
    write_key_file(key_file_state, pem)
}

#[given("a public key file exists at the configured path")]
fn public_key_file(key_file_state: &KeyFileState) -> StepResult<()> {
    write_key_file(key_file_state, &stub_pem("PUBLIC KEY"))
}

#[given("a certificate file exists at the configured path")]
fn certificate_file(key_file_state: &KeyFileState) -> StepResult<()> {
    write_key_file(key_file_state, &stub_pem("CERTIFICATE"))
}

#[given("an OpenSSH private key file exists at the configured path")]
fn openssh_key_file(key_file_state: &KeyFileState) -> StepResult<()> {
    write_key_file(key_file_state, &stub_pem("OPENSSH PRIVATE KEY"))
}

#[given("an encrypted private key file exists at the configured path")]
fn encrypted_key_file(key_file_state: &KeyFileState) -> StepResult<()> {
    write_key_file(key_file_state, &stub_pem("ENCRYPTED PRIVATE KEY"))
}

#[when("the private key is loaded")]
fn load_private_key(key_file_state: &KeyFileState) -> StepResult<()> {
    let key_path = key_file_state
        .key_path
        .get()
        .ok_or_else(|| String::from("key path should be set"))?;
    let outcome = match stageops::github::load_private_key(&key_path) {
        Ok(_) => KeyLoadOutcome::Success,
        Err(error) => KeyLoadOutcome::Failed {
            message: error.to_string(),
        },
    };
    key_file_state.outcome.set(outcome);
    Ok(())
}
