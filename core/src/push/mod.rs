//! Pushing rendered configs to remote hosts.
//!
//! A `Transport` opens a `RemoteSession`: a byte sink wired to a remote
//! command's stdin. `Pusher` drives one session per push: it streams the
//! document in bounded chunks, closes the stream, and turns the session's exit
//! status and stderr into a typed result. Production uses `SshTransport`;
//! tests use `MockTransport`.

pub mod chunk;
pub mod mock;
pub mod ssh;
pub mod state;

use std::io::{self, Write};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::{RemoteSettings, MAX_TIMEOUT_SECS};
use crate::error::{DeployError, Result};
use crate::render::RenderedConfig;
use crate::types::{InstanceRecord, NodeRole};

pub use chunk::{write_chunked, DEFAULT_CHUNK_SIZE};
pub use mock::{MockRecorder, MockTransport, RecordedSession};
pub use ssh::SshTransport;
pub use state::{PushOutcome, PushState};

/// Exit status ssh uses for its own failures (connect, auth, host key).
pub const SSH_CONNECTION_FAILURE: i32 = 255;


// ---------------------------------------------------------------------------
// RemoteTarget
// ---------------------------------------------------------------------------

/// Where a push goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTarget {
    /// Label for logs (the role name).
    pub name: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    /// Private key passed with `-i`, if any.
    pub ssh_key: Option<String>,
}

impl RemoteTarget {
    /// Target for a resolved instance, reached on its public address.
    pub fn for_instance(role: NodeRole, record: &InstanceRecord, settings: &RemoteSettings) -> Self {
        let key = settings.key_path.trim();
        RemoteTarget {
            name: role.to_string(),
            host: record.public_address.clone(),
            port: settings.port,
            user: settings.user.clone(),
            ssh_key: if key.is_empty() { None } else { Some(key.to_string()) },
        }
    }

    /// Build the `user@host` string used on the ssh command line.
    pub fn user_at_host(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}


// ---------------------------------------------------------------------------
// Transport / RemoteSession
// ---------------------------------------------------------------------------

/// How a remote session ended.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionExit {
    /// Exit status, `None` if the process was killed by a signal.
    pub status: Option<i32>,
    /// Everything the session wrote to stderr.
    pub stderr: String,
    /// The session was killed for exceeding its deadline.
    pub timed_out: bool,
}

/// An open remote command. Bytes written go to the command's stdin.
///
/// Writes fail with `ErrorKind::TimedOut` once the session's deadline has
/// passed, and the session then reports `timed_out` from `finish`.
pub trait RemoteSession: Write {
    /// Close stdin and wait for the command to exit, killing it once the
    /// deadline passes.
    fn finish(self: Box<Self>) -> io::Result<SessionExit>;
}

/// Opens remote sessions.
pub trait Transport {
    /// Start `command` on `target` with a writable stdin. The session must not
    /// outlive `deadline`, whether it is writing or waiting for exit.
    ///
    /// Fails with `RemoteUnreachable` only if the session cannot even be
    /// started locally; connection failures surface from `finish`.
    fn open(
        &self,
        target: &RemoteTarget,
        command: &str,
        deadline: Instant,
    ) -> Result<Box<dyn RemoteSession>>;
}


// ---------------------------------------------------------------------------
// Pusher
// ---------------------------------------------------------------------------

/// What a successful push did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushReceipt {
    pub address: String,
    pub remote_path: String,
    pub bytes: usize,
    pub chunks: usize,
}

/// Streams rendered configs to remote hosts, one session per push.
pub struct Pusher {
    transport: Box<dyn Transport>,
    chunk_size: usize,
    session_timeout: Duration,
    state: PushState,
    transitions: Vec<PushState>,
}

impl Pusher {
    pub fn new(transport: Box<dyn Transport>, settings: &RemoteSettings) -> Self {
        Pusher {
            transport,
            chunk_size: settings.chunk_size,
            session_timeout: Duration::from_secs(settings.session_timeout_secs.min(MAX_TIMEOUT_SECS)),
            state: PushState::Idle,
            transitions: vec![PushState::Idle],
        }
    }

    /// State of the most recent push.
    pub fn state(&self) -> PushState {
        self.state
    }

    /// States the most recent push went through, starting at `Idle`.
    pub fn transitions(&self) -> &[PushState] {
        &self.transitions
    }

    /// Overwrite `remote_path` on `target` with `content`.
    ///
    /// No retries and no read-back. A failure here affects only this push.
    pub fn push(
        &mut self,
        target: &RemoteTarget,
        remote_path: &str,
        content: &RenderedConfig,
    ) -> Result<PushReceipt> {
        if self.state.is_terminal() {
            self.advance(PushState::Idle);
        }
        self.transitions = vec![PushState::Idle];

        let result = self.stream(target, remote_path, content);
        let outcome = match result {
            Ok(_) => PushOutcome::Success,
            Err(_) => PushOutcome::Failure,
        };
        self.advance(PushState::Closed(outcome));
        result
    }

    fn stream(
        &mut self,
        target: &RemoteTarget,
        remote_path: &str,
        content: &RenderedConfig,
    ) -> Result<PushReceipt> {
        let now = Instant::now();
        let deadline = now.checked_add(self.session_timeout).unwrap_or(now);
        let command = remote_write_command(remote_path);
        tracing::debug!(
            role = %target.name,
            target = %target.user_at_host(),
            %command,
            "opening session"
        );

        let mut session = self.transport.open(target, &command, deadline)?;
        self.advance(PushState::SessionOpen);

        self.advance(PushState::Streaming);
        let written = write_chunked(&mut session, content.as_bytes(), self.chunk_size);
        let exit = session.finish().map_err(|e| DeployError::RemoteWrite {
            address: target.host.clone(),
            remote_path: remote_path.to_string(),
            reason: format!("waiting for remote command: {}", e),
        })?;

        let chunks = self.classify(target, remote_path, written, &exit)?;
        Ok(PushReceipt {
            address: target.host.clone(),
            remote_path: remote_path.to_string(),
            bytes: content.len(),
            chunks,
        })
    }

    /// Map the stream result and session exit onto the error taxonomy.
    fn classify(
        &self,
        target: &RemoteTarget,
        remote_path: &str,
        written: io::Result<usize>,
        exit: &SessionExit,
    ) -> Result<usize> {
        let unreachable = |reason: String| DeployError::RemoteUnreachable {
            address: target.host.clone(),
            reason,
        };
        let write_error = |reason: String| DeployError::RemoteWrite {
            address: target.host.clone(),
            remote_path: remote_path.to_string(),
            reason,
        };
        let stderr = exit.stderr.trim();

        if exit.timed_out {
            return Err(unreachable(format!(
                "session timed out after {}s{}",
                self.session_timeout.as_secs(),
                suffix(stderr)
            )));
        }
        if exit.status == Some(SSH_CONNECTION_FAILURE) {
            let reason = if stderr.is_empty() {
                format!("ssh exited with status {}", SSH_CONNECTION_FAILURE)
            } else {
                stderr.to_string()
            };
            return Err(unreachable(reason));
        }
        let chunks = written
            .map_err(|e| write_error(format!("stream closed early: {}{}", e, suffix(stderr))))?;
        match exit.status {
            Some(0) => Ok(chunks),
            Some(code) => Err(write_error(format!(
                "remote command exited with status {}{}",
                code,
                suffix(stderr)
            ))),
            None => Err(write_error(format!(
                "remote command terminated by signal{}",
                suffix(stderr)
            ))),
        }
    }

    fn advance(&mut self, next: PushState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal push transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::trace!(from = ?self.state, to = ?next, "push state");
        self.state = next;
        self.transitions.push(next);
    }
}

fn suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {}", stderr)
    }
}

/// Remote shell command that overwrites `remote_path` with its stdin.
pub fn remote_write_command(remote_path: &str) -> String {
    match remote_path.strip_prefix("~/") {
        Some(rest) => format!("cat - > ~/{}", shell_escape(rest)),
        None => format!("cat - > {}", shell_escape(remote_path)),
    }
}

/// Escape a string for safe use in a remote shell command.
///
/// Wraps the value in single quotes and escapes any embedded single quotes
/// using the `'\''` idiom. Plain paths are returned bare.
pub fn shell_escape(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    if s.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':'))
    {
        return s.to_string();
    }
    let escaped = s.replace('\'', "'\\''");
    format!("'{}'", escaped)
}
