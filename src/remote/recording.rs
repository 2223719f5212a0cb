//! An executor that records instead of executing.
//!
//! Commands and probes succeed unless they match a fragment registered with
//! [`RecordingExecutor::fail_when`]. A dry run therefore plans against a host
//! that is already set up: existing checkouts are fetched, not cloned.

use std::sync::{Mutex, PoisonError};

use super::{CommandOutput, RemoteCommand, RemoteExecutor};
use crate::error::RemoteCommandError;

/// One call made against a [`RecordingExecutor`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordedAction {
    /// A script was run.
    Command(RemoteCommand),
    /// A file was uploaded.
    Upload {
        /// Destination on the host.
        path: String,
        /// Uploaded bytes, as text.
        contents: String,
    },
}

impl RecordedAction {
    /// Returns a one-line description for printing a plan.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Command(command) => match command.privilege {
                super::Privilege::Root => format!("[root] {}", command.display()),
                super::Privilege::User => format!("[user] {}", command.display()),
            },
            Self::Upload { path, contents } => {
                format!("[upload] {path} ({} bytes)", contents.len())
            }
        }
    }
}

/// Records every command and upload and reports success.
///
/// Scripts containing a fragment registered with [`Self::fail_when`] report
/// the registered status instead, which lets tests drive probes and failure
/// paths.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    actions: Mutex<Vec<RecordedAction>>,
    failures: Vec<(String, i32)>,
}

impl RecordingExecutor {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes any script containing `fragment` exit with `status`.
    #[must_use]
    pub fn fail_when(mut self, fragment: impl Into<String>, status: i32) -> Self {
        self.failures.push((fragment.into(), status));
        self
    }

    /// Returns every recorded action in call order.
    #[must_use]
    pub fn actions(&self) -> Vec<RecordedAction> {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the scripts of recorded commands in call order.
    #[must_use]
    pub fn scripts(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|action| match action {
                RecordedAction::Command(command) => Some(command.script),
                RecordedAction::Upload { .. } => None,
            })
            .collect()
    }

    /// Returns the upload destinations in call order.
    #[must_use]
    pub fn uploads(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|action| match action {
                RecordedAction::Upload { path, .. } => Some(path),
                RecordedAction::Command(_) => None,
            })
            .collect()
    }

    /// Discards everything recorded so far.
    pub fn clear(&self) {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn record(&self, action: RecordedAction) {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(action);
    }
}

impl RemoteExecutor for RecordingExecutor {
    fn execute(&self, command: &RemoteCommand) -> Result<CommandOutput, RemoteCommandError> {
        self.record(RecordedAction::Command(command.clone()));
        let failure = self
            .failures
            .iter()
            .find(|(fragment, _)| command.script.contains(fragment.as_str()));
        Ok(failure.map_or_else(CommandOutput::success, |(fragment, status)| {
            CommandOutput::failure(*status, format!("simulated failure for '{fragment}'"))
        }))
    }

    fn upload(&self, contents: &[u8], remote_path: &str) -> Result<(), RemoteCommandError> {
        self.record(RecordedAction::Upload {
            path: remote_path.to_owned(),
            contents: String::from_utf8_lossy(contents).into_owned(),
        });
        Ok(())
    }
}
