//! Process table for parent-child tracking and waitpid.
//!
//! Maintains every process's [`ProcessInfo`], tracking:
//! - Parent-child relationships
//! - Exit status of zombie processes until their parent reaps them
//!
//! The table lock only covers membership. Waiting happens on a record's own
//! lock after `find` has returned, and whenever both are needed the table
//! lock is taken first.

use alloc::collections::BTreeMap;
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};

use los_utils::Mutex;

use super::process_info::ProcessInfo;
use super::{Pid, Process};
use crate::config::NO_PARENT;

pub struct ProcessTable {
    /// BTreeMap for deterministic iteration order
    entries: Mutex<BTreeMap<Pid, Arc<ProcessInfo>>>,
    next_pid: AtomicUsize,
}

impl ProcessTable {
    pub fn new(first_pid: Pid) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            next_pid: AtomicUsize::new(first_pid.max(NO_PARENT + 1)),
        }
    }

    /// Hand out a fresh pid. Pids are never reused.
    pub fn alloc_pid(&self) -> Pid {
        self.next_pid.fetch_add(1, Ordering::Relaxed)
    }

    /// Register a new process in the table.
    ///
    /// # Arguments
    /// * `pid` - The new process's PID (from [`alloc_pid`](Self::alloc_pid))
    /// * `parent_pid` - The parent process's PID, [`NO_PARENT`] for a root
    /// * `process` - Weak handle to the process shell
    pub fn register(&self, pid: Pid, parent_pid: Pid, process: Weak<Process>) -> Arc<ProcessInfo> {
        let info = Arc::new(ProcessInfo::new(pid, parent_pid, process));
        let previous = self.entries.lock().insert(pid, info.clone());
        debug_assert!(previous.is_none(), "pid {pid} registered twice");
        log::trace!("[PROC] registered pid={} parent={}", pid, parent_pid);
        info
    }

    /// Look up a record. The returned handle stays valid after the table
    /// lock is released, even if the record is later removed.
    pub fn find(&self, pid: Pid) -> Option<Arc<ProcessInfo>> {
        self.entries.lock().get(&pid).cloned()
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.entries.lock().contains_key(&pid)
    }

    /// Unconditionally drop a record (used to unwind a failed fork).
    pub fn remove(&self, pid: Pid) -> Option<Arc<ProcessInfo>> {
        self.entries.lock().remove(&pid)
    }

    /// Remove a reaped zombie, but only if the table still holds this record.
    pub fn reap(&self, info: &Arc<ProcessInfo>) {
        let mut table = self.entries.lock();
        if table.get(&info.pid()).is_some_and(|e| Arc::ptr_eq(e, info)) {
            table.remove(&info.pid());
        }
    }

    /// Drop records nobody can wait for any more once `pid` has exited.
    ///
    /// - children of `pid` that already exited are removed
    /// - `pid` itself is removed if its parent is gone or has exited
    ///
    /// Runs entirely under the table lock, so when a parent and child exit
    /// concurrently whichever gets here second sees the other's status and
    /// cleans up. Returns the number of records removed.
    pub fn release_exited(&self, pid: Pid, parent_pid: Pid) -> usize {
        let mut table = self.entries.lock();
        let before = table.len();

        table.retain(|_, info| !(info.parent_pid() == pid && info.has_exited()));

        let orphaned = parent_pid == NO_PARENT
            || table
                .get(&parent_pid)
                .is_none_or(|parent| parent.has_exited());
        if orphaned {
            table.remove(&pid);
        }

        before - table.len()
    }

    /// Pids of every registered child of `parent_pid`, ascending.
    pub fn children_of(&self, parent_pid: Pid) -> Vec<Pid> {
        self.entries
            .lock()
            .values()
            .filter(|info| info.parent_pid() == parent_pid)
            .map(|info| info.pid())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
