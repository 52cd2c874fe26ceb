//! Mock transport for testing.
//!
//! Records every session and the exact writes it received, and lets tests
//! script per-host failures: ssh-level connection failure, a refused spawn,
//! a non-zero remote exit, a stream that breaks mid-way, or a hung session.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::Instant;

use super::{RemoteSession, RemoteTarget, SessionExit, Transport, SSH_CONNECTION_FAILURE};
use crate::error::{DeployError, Result};

/// One session as seen by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSession {
    pub host: String,
    pub user: String,
    pub command: String,
    /// Each `write` call's buffer, in order.
    pub writes: Vec<Vec<u8>>,
    pub finished: bool,
}

impl RecordedSession {
    /// Everything written, concatenated.
    pub fn content(&self) -> Vec<u8> {
        self.writes.concat()
    }
}

/// Shared view of the sessions a `MockTransport` opened. Stays valid after the
/// transport is boxed and moved into a `Pusher`.
#[derive(Clone, Default)]
pub struct MockRecorder(Rc<RefCell<Vec<RecordedSession>>>);

impl MockRecorder {
    pub fn sessions(&self) -> Vec<RecordedSession> {
        self.0.borrow().clone()
    }

    /// The most recent session opened against `host`.
    pub fn for_host(&self, host: &str) -> Option<RecordedSession> {
        self.0.borrow().iter().rev().find(|s| s.host == host).cloned()
    }
}

#[derive(Debug, Clone)]
enum Script {
    RefuseOpen,
    Exit { status: i32, stderr: String },
    BreakAfter(usize),
    Hang,
}

/// A test-double transport.
#[derive(Default)]
pub struct MockTransport {
    scripts: HashMap<String, Script>,
    recorder: MockRecorder,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorder(&self) -> MockRecorder {
        self.recorder.clone()
    }

    /// ssh cannot reach `host`: the session exits with status 255.
    pub fn unreachable(self, host: &str) -> Self {
        let stderr = format!("ssh: connect to host {} port 22: Connection refused", host);
        self.exit_with(host, SSH_CONNECTION_FAILURE, &stderr)
    }

    /// The session cannot even be started for `host`.
    pub fn refuse_open(mut self, host: &str) -> Self {
        self.scripts.insert(host.to_string(), Script::RefuseOpen);
        self
    }

    /// The remote command on `host` exits with `status` and `stderr`.
    pub fn exit_with(mut self, host: &str, status: i32, stderr: &str) -> Self {
        self.scripts.insert(
            host.to_string(),
            Script::Exit {
                status,
                stderr: stderr.to_string(),
            },
        );
        self
    }

    /// `host` accepts `writes` writes, then its stdin breaks.
    pub fn break_after(mut self, host: &str, writes: usize) -> Self {
        self.scripts.insert(host.to_string(), Script::BreakAfter(writes));
        self
    }

    /// The session to `host` never exits before its deadline.
    pub fn hang(mut self, host: &str) -> Self {
        self.scripts.insert(host.to_string(), Script::Hang);
        self
    }
}

impl Transport for MockTransport {
    fn open(
        &self,
        target: &RemoteTarget,
        command: &str,
        _deadline: Instant,
    ) -> Result<Box<dyn RemoteSession>> {
        let script = self.scripts.get(&target.host).cloned();
        if let Some(Script::RefuseOpen) = script {
            return Err(DeployError::RemoteUnreachable {
                address: target.host.clone(),
                reason: "mock: refused to open session".into(),
            });
        }
        let mut sessions = self.recorder.0.borrow_mut();
        sessions.push(RecordedSession {
            host: target.host.clone(),
            user: target.user.clone(),
            command: command.to_string(),
            writes: Vec::new(),
            finished: false,
        });
        Ok(Box::new(MockSession {
            index: sessions.len() - 1,
            recorder: self.recorder.clone(),
            script,
        }))
    }
}

struct MockSession {
    index: usize,
    recorder: MockRecorder,
    script: Option<Script>,
}

impl Write for MockSession {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut sessions = self.recorder.0.borrow_mut();
        let session = &mut sessions[self.index];
        if let Some(Script::BreakAfter(limit)) = self.script {
            if session.writes.len() >= limit {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock: broken pipe"));
            }
        }
        session.writes.push(buf.to_vec());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl RemoteSession for MockSession {
    fn finish(self: Box<Self>) -> io::Result<SessionExit> {
        self.recorder.0.borrow_mut()[self.index].finished = true;
        let exit = match self.script {
            Some(Script::Exit { status, ref stderr }) => SessionExit {
                status: Some(status),
                stderr: stderr.clone(),
                timed_out: false,
            },
            Some(Script::Hang) => SessionExit {
                status: None,
                stderr: String::new(),
                timed_out: true,
            },
            Some(Script::BreakAfter(_)) => SessionExit {
                status: Some(1),
                stderr: String::new(),
                timed_out: false,
            },
            Some(Script::RefuseOpen) | None => SessionExit {
                status: Some(0),
                stderr: String::new(),
                timed_out: false,
            },
        };
        Ok(exit)
    }
}
