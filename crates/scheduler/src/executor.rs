//! Process execution seam. Pipeline runners only talk to [`Executor`] and
//! [`ProcessHandle`], so tests can swap in a scripted fake.

use std::io;
use std::path::Path;
use std::process::Stdio;

use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    /// `code` is `None` when the process was ended by a signal.
    Exited { code: Option<i32> },
}

impl ProcessState {
    pub fn succeeded(&self) -> bool {
        matches!(self, ProcessState::Exited { code: Some(0) })
    }
}

/// Exclusive handle to one spawned stage. Owned by exactly one runner.
pub trait ProcessHandle: Send {
    /// Non-blocking status check.
    fn poll(&mut self) -> io::Result<ProcessState>;

    /// Send SIGTERM to the stage's whole process group. A group that has
    /// already exited is not an error.
    fn terminate_group(&mut self) -> io::Result<()>;
}

pub trait Executor: Send + Sync {
    /// Start `command` in `cwd` as the leader of a new process group.
    fn spawn(&self, command: &str, cwd: &Path) -> io::Result<Box<dyn ProcessHandle>>;
}

/// Runs stages through `sh -c`, so redirects and pipes in stage commands work.
#[derive(Debug, Clone, Default)]
pub struct ShellExecutor;

impl Executor for ShellExecutor {
    fn spawn(&self, command: &str, cwd: &Path) -> io::Result<Box<dyn ProcessHandle>> {
        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .process_group(0)
            .spawn()?;
        debug!(pid = ?child.id(), command, cwd = %cwd.display(), "spawned stage");
        Ok(Box::new(ShellProcess { child }))
    }
}

struct ShellProcess {
    child: Child,
}

impl ProcessHandle for ShellProcess {
    fn poll(&mut self) -> io::Result<ProcessState> {
        Ok(match self.child.try_wait()? {
            Some(status) => ProcessState::Exited { code: status.code() },
            None => ProcessState::Running,
        })
    }

    fn terminate_group(&mut self) -> io::Result<()> {
        // Already reaped: nothing left to signal.
        let Some(pid) = self.child.id() else {
            return Ok(());
        };
        // The child leads its own group, so its pid is the pgid.
        match killpg(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(io::Error::from(e)),
        }
    }
}
