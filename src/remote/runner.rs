//! Command sequencing with explicit failure tolerance.
//!
//! Every call through [`RemoteShell`] names a [`Tolerance`]. Fatal failures
//! become [`RemoteCommandError::CommandFailed`] carrying the status and
//! trimmed stderr; tolerant ones are logged at `warn` and counted in
//! [`CommandStats`]. Files are installed atomically through a staging path.

use tracing::{debug, warn};

use super::{Privilege, RemoteCommand, RemoteExecutor};
use crate::error::RemoteCommandError;
use crate::shell;

/// How a non-zero exit status is treated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tolerance {
    /// The failure aborts the run.
    Fatal,
    /// The failure is logged and the run continues.
    Tolerant,
}

/// Result of a command that did not abort the run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// The command exited `0`.
    Completed,
    /// A tolerant command exited non-zero.
    Tolerated {
        /// The exit status.
        status: i32,
    },
}

/// Counters for the commands a [`RemoteShell`] has issued.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommandStats {
    /// Commands run, including probes and tolerated failures.
    pub executed: usize,
    /// Tolerant commands that exited non-zero.
    pub tolerated: usize,
    /// Files uploaded.
    pub uploaded: usize,
}

/// Runs scripts through a [`RemoteExecutor`], applying a tolerance per call.
///
/// Transport errors are always fatal; tolerance only governs exit status.
pub struct RemoteShell<'a, E: RemoteExecutor + ?Sized> {
    executor: &'a E,
    stats: CommandStats,
}

impl<'a, E: RemoteExecutor + ?Sized> RemoteShell<'a, E> {
    /// Wraps an executor.
    #[must_use]
    pub const fn new(executor: &'a E) -> Self {
        Self {
            executor,
            stats: CommandStats {
                executed: 0,
                tolerated: 0,
                uploaded: 0,
            },
        }
    }

    /// Returns the counters accumulated so far.
    #[must_use]
    pub const fn stats(&self) -> CommandStats {
        self.stats
    }

    /// Runs a root script.
    ///
    /// # Errors
    ///
    /// See [`Self::run`].
    pub fn root(
        &mut self,
        script: &str,
        tolerance: Tolerance,
    ) -> Result<StepOutcome, RemoteCommandError> {
        self.run(RemoteCommand::root(script), tolerance)
    }

    /// Runs a script as the deploy user.
    ///
    /// # Errors
    ///
    /// See [`Self::run`].
    pub fn user(
        &mut self,
        script: &str,
        tolerance: Tolerance,
    ) -> Result<StepOutcome, RemoteCommandError> {
        self.run(RemoteCommand::user(script), tolerance)
    }

    /// Runs a command, treating a non-zero status according to `tolerance`.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteCommandError::CommandFailed`] when a fatal command
    /// exits non-zero, and any transport error from the executor.
    pub fn run(
        &mut self,
        command: RemoteCommand,
        tolerance: Tolerance,
    ) -> Result<StepOutcome, RemoteCommandError> {
        debug!(privilege = ?command.privilege, command = command.display(), "running remote command");
        self.stats.executed += 1;
        let output = self.executor.execute(&command)?;
        if output.succeeded() {
            return Ok(StepOutcome::Completed);
        }

        let stderr = output.stderr.trim().to_owned();
        match tolerance {
            Tolerance::Tolerant => {
                self.stats.tolerated += 1;
                warn!(
                    status = output.status,
                    command = command.display(),
                    stderr = %stderr,
                    "tolerated remote command failure"
                );
                Ok(StepOutcome::Tolerated {
                    status: output.status,
                })
            }
            Tolerance::Fatal => Err(RemoteCommandError::CommandFailed {
                command: command.display().to_owned(),
                status: output.status,
                stderr,
            }),
        }
    }

    /// Runs a check and reports whether it exited `0`.
    ///
    /// # Errors
    ///
    /// Returns any transport error from the executor.
    pub fn probe(&mut self, script: &str, privilege: Privilege) -> Result<bool, RemoteCommandError> {
        let command = RemoteCommand {
            script: script.to_owned(),
            privilege,
            label: None,
        };
        debug!(command = command.display(), "probing host");
        self.stats.executed += 1;
        Ok(self.executor.execute(&command)?.succeeded())
    }

    /// Installs `contents` at `dest` with the given ownership and mode.
    ///
    /// The file is uploaded to a staging path, installed beside the
    /// destination and renamed over it, so readers never see a partial file.
    /// Missing parent directories are created.
    ///
    /// # Errors
    ///
    /// Returns an error when the upload or the install command fails.
    pub fn install_file(
        &mut self,
        contents: &str,
        dest: &str,
        owner: &str,
        group: &str,
        mode: &str,
    ) -> Result<(), RemoteCommandError> {
        let staging = staging_path(dest);
        debug!(dest, staging = %staging, "uploading file");
        self.executor.upload(contents.as_bytes(), &staging)?;
        self.stats.uploaded += 1;

        let incoming = format!("{dest}.stageops-new");
        let script = format!(
            "install -D -o {} -g {} -m {} {} {} && mv -f {} {} && rm -f {}",
            shell::quote_arg(owner),
            shell::quote_arg(group),
            shell::quote_arg(mode),
            shell::quote_arg(&staging),
            shell::quote_arg(&incoming),
            shell::quote_arg(&incoming),
            shell::quote_arg(dest),
            shell::quote_arg(&staging),
        );
        self.root(&script, Tolerance::Fatal).map(|_| ())
    }
}

/// Returns the upload path used while installing `dest`.
#[must_use]
pub fn staging_path(dest: &str) -> String {
    format!(
        "/tmp/stageops{}",
        dest.replace('/', ".").replace(char::is_whitespace, "_")
    )
}
