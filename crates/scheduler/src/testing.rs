//! Scripted executor for deterministic runner and scheduler tests.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::executor::{Executor, ProcessHandle, ProcessState};

#[derive(Debug, Clone)]
pub struct SpawnRecord {
    pub command: String,
    pub cwd: PathBuf,
}

struct FakeProcess {
    command: String,
    state: ProcessState,
    terminated: bool,
}

#[derive(Default)]
struct Inner {
    spawned: Vec<SpawnRecord>,
    processes: Vec<Arc<Mutex<FakeProcess>>>,
    /// Command substring -> exit code applied at spawn time.
    scripted: Vec<(String, i32)>,
    auto_exit: bool,
    fail_spawn: bool,
    /// Spawning a command containing one of these panics.
    panic_on: Vec<String>,
}

/// Every spawn is recorded. In manual mode processes run until
/// [`finish`](Self::finish) or termination; in auto mode they exit at once
/// with status 0 unless a scripted exit code matches.
#[derive(Clone, Default)]
pub struct FakeExecutor {
    inner: Arc<Mutex<Inner>>,
}

impl FakeExecutor {
    pub fn manual() -> Self {
        Self::default()
    }

    pub fn auto() -> Self {
        let exec = Self::default();
        exec.inner.lock().unwrap().auto_exit = true;
        exec
    }

    /// Processes whose command contains `needle` exit with `code` immediately.
    pub fn exit_with(&self, needle: &str, code: i32) {
        self.inner.lock().unwrap().scripted.push((needle.to_string(), code));
    }

    pub fn panic_on(&self, needle: &str) {
        self.inner.lock().unwrap().panic_on.push(needle.to_string());
    }

    pub fn fail_spawns(&self) {
        self.inner.lock().unwrap().fail_spawn = true;
    }

    pub fn spawned(&self) -> Vec<SpawnRecord> {
        self.inner.lock().unwrap().spawned.clone()
    }

    pub fn spawned_commands(&self) -> Vec<String> {
        self.spawned().into_iter().map(|s| s.command).collect()
    }

    pub fn terminated_commands(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner
            .processes
            .iter()
            .filter_map(|p| {
                let p = p.lock().unwrap();
                p.terminated.then(|| p.command.clone())
            })
            .collect()
    }

    pub fn running_commands(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner
            .processes
            .iter()
            .filter_map(|p| {
                let p = p.lock().unwrap();
                (p.state == ProcessState::Running).then(|| p.command.clone())
            })
            .collect()
    }

    /// Exit the first running process whose command equals `command`.
    pub fn finish(&self, command: &str, code: i32) -> bool {
        let inner = self.inner.lock().unwrap();
        for proc in &inner.processes {
            let mut p = proc.lock().unwrap();
            if p.command == command && p.state == ProcessState::Running {
                p.state = ProcessState::Exited { code: Some(code) };
                return true;
            }
        }
        false
    }
}

impl Executor for FakeExecutor {
    fn spawn(&self, command: &str, cwd: &Path) -> io::Result<Box<dyn ProcessHandle>> {
        let mut inner = self.inner.lock().unwrap();
        if inner.panic_on.iter().any(|needle| command.contains(needle.as_str())) {
            // Release the lock first so other tests' accessors don't see poison.
            drop(inner);
            panic!("executor blew up spawning {command}");
        }
        if inner.fail_spawn {
            return Err(io::Error::new(io::ErrorKind::NotFound, "sh: not found"));
        }
        inner.spawned.push(SpawnRecord {
            command: command.to_string(),
            cwd: cwd.to_path_buf(),
        });
        let scripted = inner
            .scripted
            .iter()
            .find(|(needle, _)| command.contains(needle.as_str()))
            .map(|(_, code)| *code);
        let state = match (scripted, inner.auto_exit) {
            (Some(code), _) => ProcessState::Exited { code: Some(code) },
            (None, true) => ProcessState::Exited { code: Some(0) },
            (None, false) => ProcessState::Running,
        };
        let process = Arc::new(Mutex::new(FakeProcess {
            command: command.to_string(),
            state,
            terminated: false,
        }));
        inner.processes.push(Arc::clone(&process));
        Ok(Box::new(FakeHandle { process }))
    }
}

struct FakeHandle {
    process: Arc<Mutex<FakeProcess>>,
}

impl ProcessHandle for FakeHandle {
    fn poll(&mut self) -> io::Result<ProcessState> {
        Ok(self.process.lock().unwrap().state)
    }

    fn terminate_group(&mut self) -> io::Result<()> {
        let mut p = self.process.lock().unwrap();
        if p.state == ProcessState::Running {
            p.state = ProcessState::Exited { code: None };
            p.terminated = true;
        }
        Ok(())
    }
}

/// Poll `cond` until it holds or two seconds pass.
pub async fn eventually<F: FnMut() -> bool>(mut cond: F) -> bool {
    for _ in 0..400 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}
