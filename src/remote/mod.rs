//! Remote command channel to the target host.
//!
//! The reconciler only ever talks to the host through [`RemoteExecutor`]:
//! run a script, optionally as root, and upload a blob to a path. The SSH
//! implementation lives in [`ssh`]; [`RecordingExecutor`] records instead of
//! executing and backs `deploy --dry-run` and the tests. [`RemoteShell`]
//! sits on top of either and makes failure tolerance explicit at each call.

mod recording;
mod runner;
pub mod ssh;


use crate::error::RemoteCommandError;

pub use recording::{RecordedAction, RecordingExecutor};
pub use runner::{CommandStats, RemoteShell, StepOutcome, Tolerance};
pub use ssh::SshExecutor;

/// Who a script runs as on the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Privilege {
    /// The deploy user.
    User,
    /// Root, through non-interactive `sudo`.
    Root,
}

/// A shell script to run on the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteCommand {
    /// The script, passed to `bash -c`.
    pub script: String,
    /// Who runs it.
    pub privilege: Privilege,
    /// Shown in logs and errors instead of the script when it carries a secret.
    pub label: Option<String>,
}

impl RemoteCommand {
    /// Creates a command run as the deploy user.
    #[must_use]
    pub fn user(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            privilege: Privilege::User,
            label: None,
        }
    }

    /// Creates a command run as root.
    #[must_use]
    pub fn root(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            privilege: Privilege::Root,
            label: None,
        }
    }

    /// Replaces the script in logs and errors with `label`.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Returns the text safe to log: the label when set, otherwise the script.
    #[must_use]
    pub fn display(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.script)
    }
}

/// Exit status and captured output of a finished command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status; `0` is success.
    pub status: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns a successful output with no captured text.
    #[must_use]
    pub const fn success() -> Self {
        Self {
            status: 0,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    /// Returns a failed output with the given status and standard error.
    #[must_use]
    pub fn failure(status: i32, stderr: impl Into<String>) -> Self {
        Self {
            status,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Returns whether the command exited with status `0`.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.status == 0
    }
}

/// Runs commands and places files on the target host.
///
/// A non-zero exit status is reported through [`CommandOutput::status`], not
/// as an error; errors are reserved for transport failures.
#[cfg_attr(test, mockall::automock)]
pub trait RemoteExecutor {
    /// Runs `command` and waits for it to finish.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteCommandError`] when the transport fails.
    fn execute(&self, command: &RemoteCommand) -> Result<CommandOutput, RemoteCommandError>;

    /// Writes `contents` to `remote_path` as the deploy user.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteCommandError::UploadFailed`] when the transfer fails.
    fn upload(&self, contents: &[u8], remote_path: &str) -> Result<(), RemoteCommandError>;
}
