//! Per-process exit/wait record.
//!
//! A `ProcessInfo` outlives the process it describes so a parent can collect
//! the exit status after the child has been torn down. Each record carries
//! its own lock and wait channel; waiting on one child never touches the
//! process table lock.

use alloc::sync::{Arc, Weak};
use core::fmt;

use los_utils::{CondVar, Mutex};

use super::{Pid, Process};

/// Packed termination status as reported through `waitpid`.
///
/// Linux encoding: exit code in bits 8..16, low 7 bits zero for a normal exit.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct WaitStatus(i32);

impl WaitStatus {
    /// Status for a process that called exit with `code`.
    pub const fn exited(code: i32) -> Self {
        Self((code & 0xff) << 8)
    }

    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> i32 {
        self.0
    }

    /// `WIFEXITED`
    pub const fn is_exited(self) -> bool {
        self.0 & 0x7f == 0
    }

    /// `WEXITSTATUS`; only meaningful when [`is_exited`](Self::is_exited).
    pub const fn exit_code(self) -> i32 {
        (self.0 >> 8) & 0xff
    }
}

impl fmt::Debug for WaitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_exited() {
            write!(f, "WaitStatus(exited {})", self.exit_code())
        } else {
            write!(f, "WaitStatus(0x{:x})", self.0)
        }
    }
}

#[derive(Debug, Default)]
struct ExitState {
    /// Set exactly once, when the process exits
    status: Option<WaitStatus>,
    /// A waiter has collected the status
    reaped: bool,
}

/// Exit bookkeeping for exactly one process.
pub struct ProcessInfo {
    pid: Pid,
    parent_pid: Pid,
    /// Never upgraded to extend the process's life; stale means "gone"
    process: Weak<Process>,
    exit: Mutex<ExitState>,
    exited_cv: CondVar,
}

impl ProcessInfo {
    pub(crate) fn new(pid: Pid, parent_pid: Pid, process: Weak<Process>) -> Self {
        Self {
            pid,
            parent_pid,
            process,
            exit: Mutex::new(ExitState::default()),
            exited_cv: CondVar::new(),
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn parent_pid(&self) -> Pid {
        self.parent_pid
    }

    /// The live process, if it has not been torn down yet.
    pub fn process(&self) -> Option<Arc<Process>> {
        self.process.upgrade()
    }

    /// Whether this record describes `process`. A stale record matches nothing.
    pub fn refers_to(&self, process: &Arc<Process>) -> bool {
        self.process
            .upgrade()
            .is_some_and(|live| Arc::ptr_eq(&live, process))
    }

    pub fn has_exited(&self) -> bool {
        self.exit.lock().status.is_some()
    }

    pub fn exit_status(&self) -> Option<WaitStatus> {
        self.exit.lock().status
    }

    /// Record the exit status and wake every waiter.
    ///
    /// Flag write and broadcast share one critical section, so a waiter that
    /// saw "still running" is guaranteed to be woken. Returns false if the
    /// status was already published; the first status stands.
    pub(crate) fn publish_exit(&self, status: WaitStatus) -> bool {
        let mut state = self.exit.lock();
        if state.status.is_some() {
            return false;
        }
        state.status = Some(status);
        self.exited_cv.notify_all();
        true
    }

    /// Block until the process exits, then claim its status.
    ///
    /// Returns `None` if another waiter already claimed it.
    pub(crate) fn wait_and_reap<R: FnMut()>(&self, relax: R) -> Option<WaitStatus> {
        let state = self.exit.lock();
        let mut state =
            self.exited_cv
                .wait_while_with(&self.exit, state, |s| s.status.is_none(), relax);
        if state.reaped {
            return None;
        }
        state.reaped = true;
        state.status
    }
}

impl fmt::Debug for ProcessInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessInfo")
            .field("pid", &self.pid)
            .field("parent_pid", &self.parent_pid)
            .field("status", &self.exit_status())
            .finish()
    }
}
