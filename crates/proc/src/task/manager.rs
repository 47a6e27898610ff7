//! Owner of the process table and the collaborators the lifecycle
//! syscalls call into.

use alloc::sync::Arc;

use los_utils::{CondVar, Mutex};

use super::{Pid, ProcError, Process, ProcessTable, Scheduler};
use crate::config::ProcConfig;
use crate::loader::Loader;
use crate::memory::Vm;

/// Process lifecycle state for one kernel instance.
///
/// Syscall entry points (`sys_fork`, `sys_execv`, `sys_exit`, `sys_waitpid`,
/// ...) are implemented on this type in `crate::syscall::process`.
pub struct ProcessManager {
    pub(crate) config: ProcConfig,
    pub(crate) table: ProcessTable,
    pub(crate) vm: Arc<dyn Vm>,
    pub(crate) loader: Arc<dyn Loader>,
    pub(crate) scheduler: Arc<dyn Scheduler>,
    /// Processes created and not yet exited
    live: Mutex<usize>,
    idle: CondVar,
}

impl ProcessManager {
    pub fn new(
        config: ProcConfig,
        vm: Arc<dyn Vm>,
        loader: Arc<dyn Loader>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            table: ProcessTable::new(config.first_pid),
            config,
            vm,
            loader,
            scheduler,
            live: Mutex::new(0),
            idle: CondVar::new(),
        }
    }

    pub fn config(&self) -> &ProcConfig {
        &self.config
    }

    pub fn table(&self) -> &ProcessTable {
        &self.table
    }

    /// Number of processes that have been created and have not exited.
    pub fn live_processes(&self) -> usize {
        *self.live.lock()
    }

    /// Block until every user process has exited.
    ///
    /// This is what the kernel menu thread sleeps on after launching a
    /// program; the last exiting process wakes it.
    pub fn wait_for_idle(&self) {
        let live = self.live.lock();
        let _live = self
            .idle
            .wait_while_with(&self.live, live, |n| *n > 0, || self.scheduler.yield_now());
    }

    /// Allocate a process shell and reserve a live slot for it.
    pub(crate) fn create_process(&self, name: &str) -> Result<Arc<Process>, ProcError> {
        {
            let mut live = self.live.lock();
            if let Some(max) = self.config.max_processes {
                if *live >= max {
                    log::warn!("[PROC] process limit {} reached", max);
                    return Err(ProcError::ProcessLimit);
                }
            }
            *live += 1;
        }
        let pid: Pid = self.table.alloc_pid();
        Ok(Arc::new(Process::new(pid, name)))
    }

    /// Undo [`create_process`](Self::create_process) for a process that
    /// never became runnable.
    pub(crate) fn discard_process(&self, process: Arc<Process>) {
        log::debug!("[PROC] discarding pid={}", process.pid());
        drop(process);
        self.release_slot();
    }

    /// Give back a live slot; the last one out wakes `wait_for_idle`.
    pub(crate) fn release_slot(&self) {
        let mut live = self.live.lock();
        *live = live.saturating_sub(1);
        if *live == 0 {
            log::debug!("[PROC] no user processes left");
            self.idle.notify_all();
        }
    }
}
