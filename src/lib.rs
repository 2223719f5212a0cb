//! Declarative deployment reconciler for single-host application stacks.
//!
//! `stageops` reads a YAML deployment document describing one server and
//! the apps it hosts, renders the systemd units, drop-in overrides, nginx
//! sites and cron files each app needs, and applies them to the host over
//! SSH. Every run converges the host to the document: re-running is safe,
//! and project names listed as legacy are purged completely.
//!
//! # Architecture
//!
//! Loading and rendering are pure and run to completion before the host is
//! contacted, so a broken document never leaves a half-applied host. The
//! reconciler talks to the host only through
//! [`remote::RemoteExecutor`], which has an SSH implementation and a
//! recording one used for dry runs and tests.
//!
//! # Modules
//!
//! - [`manifest`]: Deployment document loading, defaults and validation
//! - [`cron`]: Cron entry compilation
//! - [`render`]: Unit, drop-in and site rendering
//! - [`reconcile`]: Idempotent application of artifacts to the host
//! - [`remote`]: Command transport (SSH and recording)
//! - [`github`]: GitHub App installation tokens for private clones
//! - [`api`]: Library entry points for each CLI command
//! - [`config`]: Tool configuration with layered precedence
//! - [`error`]: Semantic error types for the application

pub mod api;
pub mod coerce;
pub mod config;
pub mod cron;
pub mod error;
pub mod github;
pub mod logging;
pub mod manifest;
pub mod paths;
pub mod reconcile;
pub mod remote;
pub mod render;
pub mod shell;

#[cfg(test)]
mod test_support;
