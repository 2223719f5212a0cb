//! SSH transport built on `ssh2`.
//!
//! One session is opened per run and authenticated with the private key
//! from the deployment document. Root scripts run through `sudo -n`, so the
//! deploy user needs passwordless sudo on the host.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use ssh2::Session;
use tracing::{debug, info};

use super::{CommandOutput, Privilege, RemoteCommand, RemoteExecutor};
use crate::error::RemoteCommandError;
use crate::manifest::ServerConfig;
use crate::shell;

/// Mode given to uploaded files before they are installed.
const UPLOAD_MODE: i32 = 0o600;

/// A live, authenticated SSH session.
pub struct SshExecutor {
    session: Session,
    target: String,
}

impl SshExecutor {
    /// Connects to the host in `server` and authenticates with its key.
    ///
    /// `connect_timeout` bounds the TCP connect, the handshake and
    /// authentication; commands themselves are not timed out.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteCommandError::ConnectionFailed`] when the host cannot
    /// be reached or the handshake fails, and
    /// [`RemoteCommandError::AuthenticationFailed`] when the key is rejected.
    pub fn connect<E: mockable::Env>(
        server: &ServerConfig,
        connect_timeout: Duration,
        env: &E,
    ) -> Result<Self, RemoteCommandError> {
        let target = format!("{}:{}", server.host, server.port);
        let connection_failed = |message: String| RemoteCommandError::ConnectionFailed {
            host: target.clone(),
            message,
        };

        let tcp = open_tcp(&server.host, server.port, connect_timeout)
            .map_err(|e| connection_failed(e.to_string()))?;

        let mut session =
            Session::new().map_err(|e| connection_failed(format!("failed to create SSH session: {e}")))?;
        session.set_timeout(timeout_millis(connect_timeout));
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| connection_failed(format!("SSH handshake failed: {e}")))?;

        let key_path = expand_home(&server.ssh_key_path, env);
        session
            .userauth_pubkey_file(&server.user, None, &key_path, None)
            .map_err(|e| RemoteCommandError::AuthenticationFailed {
                user: server.user.clone(),
                message: format!("key {}: {e}", key_path.display()),
            })?;
        if !session.authenticated() {
            return Err(RemoteCommandError::AuthenticationFailed {
                user: server.user.clone(),
                message: String::from("server did not accept the key"),
            });
        }
        session.set_timeout(0);

        info!(target = %target, user = %server.user, "connected to host");
        Ok(Self { session, target })
    }

    /// Returns `host:port` of the connected host.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    fn transport_error(command: &RemoteCommand, error: impl std::fmt::Display) -> RemoteCommandError {
        RemoteCommandError::TransportFailed {
            command: command.display().to_owned(),
            message: error.to_string(),
        }
    }
}

impl RemoteExecutor for SshExecutor {
    fn execute(&self, command: &RemoteCommand) -> Result<CommandOutput, RemoteCommandError> {
        let mut channel = self
            .session
            .channel_session()
            .map_err(|e| Self::transport_error(command, e))?;
        channel
            .exec(&wrap_script(command))
            .map_err(|e| Self::transport_error(command, e))?;

        let mut stdout = String::new();
        channel
            .read_to_string(&mut stdout)
            .map_err(|e| Self::transport_error(command, e))?;
        let mut stderr = String::new();
        channel
            .stderr()
            .read_to_string(&mut stderr)
            .map_err(|e| Self::transport_error(command, e))?;

        channel
            .wait_close()
            .map_err(|e| Self::transport_error(command, e))?;
        let status = channel
            .exit_status()
            .map_err(|e| Self::transport_error(command, e))?;
        debug!(status, "remote command finished");

        Ok(CommandOutput {
            status,
            stdout,
            stderr,
        })
    }

    fn upload(&self, contents: &[u8], remote_path: &str) -> Result<(), RemoteCommandError> {
        let failed = |e: &dyn std::fmt::Display| RemoteCommandError::UploadFailed {
            path: remote_path.to_owned(),
            message: e.to_string(),
        };
        let size = u64::try_from(contents.len()).map_err(|e| failed(&e))?;

        let mut channel = self
            .session
            .scp_send(Path::new(remote_path), UPLOAD_MODE, size, None)
            .map_err(|e| failed(&e))?;
        channel.write_all(contents).map_err(|e| failed(&e))?;
        channel.send_eof().map_err(|e| failed(&e))?;
        channel.wait_eof().map_err(|e| failed(&e))?;
        channel.close().map_err(|e| failed(&e))?;
        channel.wait_close().map_err(|e| failed(&e))?;
        Ok(())
    }
}

/// Builds the command line sent over the channel.
#[must_use]
pub fn wrap_script(command: &RemoteCommand) -> String {
    match command.privilege {
        Privilege::User => format!("bash -c {}", shell::quote(&command.script)),
        Privilege::Root => format!("sudo -n bash -c {}", shell::quote(&command.script)),
    }
}

/// Expands a leading `~/` using `HOME` from `env`.
///
/// The path is returned unchanged when it has no such prefix or `HOME` is
/// unset.
#[must_use]
pub fn expand_home<E: mockable::Env>(path: &str, env: &E) -> PathBuf {
    match (path.strip_prefix("~/"), env.string("HOME")) {
        (Some(rest), Some(home)) if !home.is_empty() => Path::new(&home).join(rest),
        _ => PathBuf::from(path),
    }
}

fn open_tcp(host: &str, port: u16, timeout: Duration) -> std::io::Result<TcpStream> {
    let mut last_error = None;
    for addr in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(e),
        }
    }
    Err(last_error.unwrap_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no addresses found for {host}"),
        )
    }))
}

fn timeout_millis(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX)
}
