//! Semantic error types for the stageops application.
//!
//! This module defines the error hierarchy for stageops, following the principle
//! of using semantic error enums (via `thiserror`) for conditions the caller might
//! inspect or report, while reserving opaque errors (`eyre::Report`) for the
//! application boundary.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Errors that can occur while loading tool settings or the deployment document.
///
/// Every variant is raised before the first remote mutation of a run, so a
/// configuration mistake never leaves the host partially modified.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found at the expected path.
    #[error("configuration file not found: {path}")]
    FileNotFound {
        /// The path where the configuration file was expected.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("failed to parse configuration file: {message}")]
    ParseError {
        /// A description of the parse error.
        message: String,
    },

    /// One or more required configuration values are missing.
    #[error("missing required configuration: {field}")]
    MissingRequired {
        /// The dotted names of the missing fields, comma separated.
        field: String,
    },

    /// A configuration value failed validation.
    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue {
        /// The dotted name of the invalid field.
        field: String,
        /// The reason the value is invalid.
        reason: String,
    },

    /// Apps requested on the command line are not declared in the document.
    #[error("unknown app(s) requested: {names}")]
    UnknownApps {
        /// The requested names that are absent, comma separated.
        names: String,
    },

    /// The `OrthoConfig` library returned an error during configuration loading.
    ///
    /// This wraps errors from the layered settings system, including:
    /// - Configuration file parsing errors
    /// - Environment variable parsing errors
    /// - Missing required fields after layer merging
    #[error("configuration loading failed: {0}")]
    OrthoConfig(Arc<ortho_config::OrthoError>),
}

/// Errors raised by the remote command channel.
///
/// Only commands run with fatal tolerance surface as [`CommandFailed`];
/// tolerated failures are logged and counted instead. Connection and
/// authentication failures happen once per run, before any command.
///
/// [`CommandFailed`]: RemoteCommandError::CommandFailed
#[derive(Debug, Error)]
pub enum RemoteCommandError {
    /// A command that was not marked tolerant exited non-zero.
    #[error("remote command failed with status {status}: {command}: {stderr}")]
    CommandFailed {
        /// The script that was executed.
        command: String,
        /// The exit status reported by the remote shell.
        status: i32,
        /// Captured standard error, trimmed.
        stderr: String,
    },

    /// The transport could not reach the host.
    #[error("failed to connect to {host}: {message}")]
    ConnectionFailed {
        /// The target host, as `host:port`.
        host: String,
        /// A description of the connection failure.
        message: String,
    },

    /// The host rejected the configured key.
    #[error("authentication as '{user}' failed: {message}")]
    AuthenticationFailed {
        /// The remote user.
        user: String,
        /// A description of the authentication failure.
        message: String,
    },

    /// The transport failed while running a command, independent of its status.
    #[error("transport error while running '{command}': {message}")]
    TransportFailed {
        /// The script that was being executed.
        command: String,
        /// A description of the transport failure.
        message: String,
    },

    /// A file upload to the host failed.
    #[error("failed to upload {path}: {message}")]
    UploadFailed {
        /// The remote destination.
        path: String,
        /// A description of the upload failure.
        message: String,
    },
}

/// Errors raised while rendering host artifacts.
///
/// Templates render in strict mode, so a placeholder with no value is a
/// [`RenderError::TemplateFailed`] rather than text left in a generated file.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A template failed to parse or referenced an unresolved placeholder.
    #[error("failed to render template '{template}': {message}")]
    TemplateFailed {
        /// The template name.
        template: String,
        /// A description of the render failure.
        message: String,
    },

    /// A template override could not be read from the templates directory.
    #[error("failed to load template override '{path}': {message}")]
    TemplateLoadFailed {
        /// The override path.
        path: PathBuf,
        /// A description of the read failure.
        message: String,
    },
}

/// Errors that can occur while minting GitHub App installation tokens.
///
/// Messages never include the token itself.
#[derive(Debug, Error)]
pub enum GitHubError {
    /// GitHub App authentication failed.
    #[error("GitHub App authentication failed: {message}")]
    AuthenticationFailed {
        /// A description of the authentication failure.
        message: String,
    },

    /// Failed to load the GitHub App private key.
    #[error("failed to load private key from '{path}': {message}")]
    PrivateKeyLoadFailed {
        /// The path to the private key file.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// Failed to acquire an installation token.
    #[error("failed to acquire installation token: {message}")]
    TokenAcquisitionFailed {
        /// A description of the token acquisition failure.
        message: String,
    },
}

/// Top-level error type for the stageops application.
///
/// This enum aggregates all domain-specific errors into a single type that can
/// be used throughout the application. At the application boundary (main.rs),
/// these errors are converted to `eyre::Report` for human-readable reporting.
#[derive(Debug, Error)]
pub enum StageopsError {
    /// An error occurred during configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A remote step failed.
    #[error(transparent)]
    Remote(#[from] RemoteCommandError),

    /// An artifact could not be rendered.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// An error occurred during GitHub operations.
    #[error(transparent)]
    GitHub(#[from] GitHubError),
}

/// A specialised `Result` type for stageops operations.
pub type Result<T> = std::result::Result<T, StageopsError>;
