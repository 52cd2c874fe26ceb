//! ssh-backed transport.
//!
//! Each session is one `ssh` child process with piped stdin and stderr. A
//! helper thread drains stderr so a chatty remote cannot fill the pipe while
//! we are still writing. Another owns stdin and performs the blocking writes,
//! so a remote that stops reading cannot hold a push past its deadline. The
//! deadline covers connect, write and the remote command's exit; ssh's own
//! `ConnectTimeout` bounds the connect phase more tightly.

use std::io::{self, Read, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::{RemoteSession, RemoteTarget, SessionExit, Transport};
use crate::config::{HostKeyPolicy, RemoteSettings};
use crate::error::{DeployError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct SshTransport {
    program: String,
    host_key_policy: HostKeyPolicy,
    connect_timeout_secs: u64,
}

impl SshTransport {
    pub fn new(settings: &RemoteSettings) -> Self {
        SshTransport {
            program: settings.ssh_program.clone(),
            host_key_policy: settings.host_key_policy,
            connect_timeout_secs: settings.connect_timeout_secs,
        }
    }

    /// Full ssh argument vector, remote command last as a single argument so
    /// the remote shell handles the redirect.
    pub fn ssh_args(&self, target: &RemoteTarget, command: &str) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            format!("StrictHostKeyChecking={}", self.host_key_policy.ssh_option()),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout_secs),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-p".to_string(),
            target.port.to_string(),
        ];
        if let Some(ref key) = target.ssh_key {
            args.push("-i".to_string());
            args.push(key.clone());
        }
        args.push(target.user_at_host());
        args.push(command.to_string());
        args
    }
}

impl Transport for SshTransport {
    fn open(
        &self,
        target: &RemoteTarget,
        command: &str,
        deadline: Instant,
    ) -> Result<Box<dyn RemoteSession>> {
        let mut child = Command::new(&self.program)
            .args(self.ssh_args(target, command))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| DeployError::RemoteUnreachable {
                address: target.host.clone(),
                reason: format!("cannot start {}: {}", self.program, e),
            })?;

        let writer = child.stdin.take().map(StdinWriter::spawn);
        let stderr = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = String::new();
                let _ = pipe.read_to_string(&mut buf);
                buf
            })
        });
        Ok(Box::new(SshSession {
            child,
            writer,
            stderr,
            deadline,
            timed_out: false,
        }))
    }
}

/// Owns the child's stdin on a helper thread. Each chunk is acknowledged once
/// it has been fully written.
struct StdinWriter {
    chunks: Sender<Vec<u8>>,
    acks: Receiver<io::Result<()>>,
}

impl StdinWriter {
    fn spawn(mut stdin: ChildStdin) -> Self {
        let (chunks, incoming) = mpsc::channel::<Vec<u8>>();
        let (done, acks) = mpsc::channel();
        thread::spawn(move || {
            // Dropping `stdin` on exit is what sends EOF to the remote `cat`.
            for chunk in incoming {
                let result = stdin.write_all(&chunk).and_then(|_| stdin.flush());
                let failed = result.is_err();
                if done.send(result).is_err() || failed {
                    break;
                }
            }
        });
        StdinWriter { chunks, acks }
    }
}

struct SshSession {
    child: Child,
    writer: Option<StdinWriter>,
    stderr: Option<JoinHandle<String>>,
    deadline: Instant,
    timed_out: bool,
}

impl SshSession {
    /// Kill the session for overrunning its deadline.
    fn expire(&mut self) {
        self.timed_out = true;
        self.writer = None;
        let _ = self.child.kill();
        let _ = self.child.wait();
    }

    fn timed_out_error() -> io::Error {
        io::Error::new(io::ErrorKind::TimedOut, "ssh session deadline passed")
    }
}

impl Write for SshSession {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.timed_out {
            return Err(Self::timed_out_error());
        }
        let writer = self
            .writer
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "ssh stdin already closed"))?;
        if writer.chunks.send(buf.to_vec()).is_err() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "ssh stdin writer exited"));
        }
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        match writer.acks.recv_timeout(remaining) {
            Ok(Ok(())) => Ok(buf.len()),
            Ok(Err(e)) => Err(e),
            Err(RecvTimeoutError::Timeout) => {
                self.expire();
                Err(Self::timed_out_error())
            }
            Err(RecvTimeoutError::Disconnected) => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "ssh stdin writer exited",
            )),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        // The writer thread flushes after every chunk.
        if self.timed_out {
            return Err(Self::timed_out_error());
        }
        Ok(())
    }
}

impl RemoteSession for SshSession {
    fn finish(mut self: Box<Self>) -> io::Result<SessionExit> {
        // EOF on stdin ends `cat` on the far side.
        drop(self.writer.take());

        let status = if self.timed_out {
            None
        } else {
            loop {
                if let Some(status) = self.child.try_wait()? {
                    break status.code();
                }
                if Instant::now() >= self.deadline {
                    self.expire();
                    break None;
                }
                thread::sleep(POLL_INTERVAL);
            }
        };

        let stderr = self
            .stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        Ok(SessionExit {
            status,
            stderr,
            timed_out: self.timed_out,
        })
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
