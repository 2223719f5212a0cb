//! Checkout and dependency installation for apps that name a repository.

use crate::error::RemoteCommandError;
use crate::github::authenticated_clone_url;
use crate::manifest::{AppSpec, SourceSpec};
use crate::paths::ProjectPaths;
use crate::remote::{Privilege, RemoteCommand, RemoteExecutor, RemoteShell, Tolerance};
use crate::shell::quote_arg;

/// Clones or fast-forwards the checkout, then installs dependencies.
///
/// A token is only ever written into the script; the command carries a
/// label with the plain URL so logs and errors never show it. The remote is
/// reset to the plain URL afterwards so the token is not left on disk.
pub(super) fn sync<E: RemoteExecutor + ?Sized>(
    sh: &mut RemoteShell<'_, E>,
    app: &AppSpec,
    source: &SourceSpec,
    paths: &ProjectPaths,
    token: Option<&str>,
) -> Result<(), RemoteCommandError> {
    let dir = quote_arg(&paths.project_dir);
    let branch = quote_arg(&source.branch);
    let plain = quote_arg(&source.repo_url);
    let url = quote_arg(
        &token.map_or_else(
            || source.repo_url.clone(),
            |token| authenticated_clone_url(&source.repo_url, token),
        ),
    );

    let checked_out = sh.probe(&format!("test -d {dir}/.git"), Privilege::User)?;
    let command = if checked_out {
        RemoteCommand::user(format!(
            "cd {dir} && git remote set-url origin {url} && git fetch origin {branch} \
             && git reset --hard origin/{branch} && git remote set-url origin {plain}"
        ))
        .with_label(format!(
            "git fetch origin {branch} && git reset --hard origin/{branch} (in {dir})"
        ))
    } else {
        RemoteCommand::user(format!(
            "git clone -b {branch} {url} {dir} && git -C {dir} remote set-url origin {plain}"
        ))
        .with_label(format!("git clone -b {branch} {plain} {dir}"))
    };
    sh.run(command, Tolerance::Fatal)?;

    let venv = quote_arg(&paths.venv_dir);
    if !sh.probe(&format!("test -x {venv}/bin/python"), Privilege::User)? {
        sh.user(&format!("python3 -m venv {venv}"), Tolerance::Fatal)?;
    }
    let pip = quote_arg(&format!("{}/pip", paths.venv_bin()));
    sh.user(&format!("{pip} install -U pip"), Tolerance::Fatal)?;
    sh.user(
        &format!("cd {dir} && {pip} install -r requirements.txt"),
        Tolerance::Tolerant,
    )?;

    if let Some(node) = &app.node {
        let node_dir = quote_arg(&paths.resolve(&node.dir));
        sh.user(
            &format!("cd {node_dir} && npm ci && npm run build"),
            Tolerance::Fatal,
        )?;
    }
    Ok(())
}
