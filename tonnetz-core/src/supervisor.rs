//! Task Supervisor: one cancellable background thread per task kind.
//!
//! Replacing a task signals the old one, waits a bounded time for it to
//! exit, then spawns the new one. A task that ignores its signal is logged
//! and detached rather than blocking reconfiguration.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How long to wait for a task to exit after signalling it.
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

const JOIN_POLL: Duration = Duration::from_millis(1);
const WAIT_SLICE: Duration = Duration::from_millis(10);

/// Cooperative stop signal shared between a task and its owner.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Sleep for `duration` in short slices. Returns false if cancelled meanwhile.
    pub fn wait(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(WAIT_SLICE));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Input,
    Arpeggiator,
    Navigator,
}

impl TaskKind {
    pub const ALL: [TaskKind; 3] = [TaskKind::Input, TaskKind::Arpeggiator, TaskKind::Navigator];

    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::Input => "input",
            TaskKind::Arpeggiator => "arpeggiator",
            TaskKind::Navigator => "navigator",
        }
    }
}

pub struct TaskHandle {
    kind: TaskKind,
    cancel: CancelToken,
    join: Option<JoinHandle<()>>,
}

impl TaskHandle {
    /// Spawn `task` on a named thread with a fresh cancel token.
    pub fn spawn<F>(kind: TaskKind, task: F) -> Result<Self, String>
    where
        F: FnOnce(CancelToken) + Send + 'static,
    {
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let join = thread::Builder::new()
            .name(format!("tonnetz-{}", kind.name()))
            .spawn(move || task(token))
            .map_err(|e| format!("failed to spawn {} thread: {}", kind.name(), e))?;
        log::debug!(target: "supervisor", "started {}", kind.name());
        Ok(Self {
            kind,
            cancel,
            join: Some(join),
        })
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, |j| j.is_finished())
    }

    /// Signal the task and wait up to `timeout` for it to exit.
    ///
    /// Returns true if the thread was joined, false if it was detached.
    pub fn stop(mut self, timeout: Duration) -> bool {
        self.cancel.cancel();
        let Some(join) = self.join.take() else {
            return true;
        };
        let deadline = Instant::now() + timeout;
        while !join.is_finished() {
            if Instant::now() >= deadline {
                log::warn!(
                    target: "supervisor",
                    "{} did not stop within {:?}; detaching",
                    self.kind.name(),
                    timeout
                );
                return false;
            }
            thread::sleep(JOIN_POLL);
        }
        if join.join().is_err() {
            log::warn!(target: "supervisor", "{} panicked", self.kind.name());
        }
        log::debug!(target: "supervisor", "stopped {}", self.kind.name());
        true
    }

    /// Stop this task (bounded by `timeout`) and start its replacement.
    pub fn stop_and_replace<F>(self, timeout: Duration, task: F) -> Result<TaskHandle, String>
    where
        F: FnOnce(CancelToken) + Send + 'static,
    {
        let kind = self.kind;
        self.stop(timeout);
        TaskHandle::spawn(kind, task)
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Owns at most one running task per `TaskKind`.
pub struct Supervisor {
    tasks: HashMap<TaskKind, TaskHandle>,
    timeout: Duration,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::with_timeout(JOIN_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            tasks: HashMap::new(),
            timeout,
        }
    }

    /// Start `task` as `kind`, replacing any task of that kind already running.
    pub fn start<F>(&mut self, kind: TaskKind, task: F) -> Result<(), String>
    where
        F: FnOnce(CancelToken) + Send + 'static,
    {
        let handle = match self.tasks.remove(&kind) {
            Some(old) => {
                log::info!(target: "supervisor", "restarting {}", kind.name());
                old.stop_and_replace(self.timeout, task)?
            }
            None => TaskHandle::spawn(kind, task)?,
        };
        self.tasks.insert(kind, handle);
        Ok(())
    }

    /// Stop the task of `kind`. Returns false when none was registered.
    pub fn stop(&mut self, kind: TaskKind) -> bool {
        match self.tasks.remove(&kind) {
            Some(handle) => {
                handle.stop(self.timeout);
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, kind: TaskKind) -> bool {
        self.tasks.get(&kind).map_or(false, |h| !h.is_finished())
    }

    pub fn stop_all(&mut self) {
        for kind in TaskKind::ALL {
            self.stop(kind);
        }
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.stop_all();
    }
}
