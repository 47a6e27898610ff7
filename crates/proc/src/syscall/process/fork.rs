//! Fork: duplicate the calling process.
//!
//! Every step that can fail unwinds what the earlier steps allocated, so a
//! failed fork leaves no half-built child, no table entry and no thread.

use alloc::boxed::Box;
use alloc::sync::Arc;

use crate::arch::SyscallFrame;
use crate::syscall::SyscallResultExt;
use crate::syscall_trace;
use crate::task::{Pid, ProcError, Process, ProcessManager, Scheduler, ThreadEntry};

impl ProcessManager {
    /// Create a child of `cur` that resumes from `frame` with a 0 return.
    ///
    /// Returns the child's pid. The child's table entry is visible before
    /// this returns, so the parent can `waitpid` on it immediately.
    pub fn fork_process(&self, cur: &Arc<Process>, frame: &SyscallFrame) -> Result<Pid, ProcError> {
        let parent_space = cur.address_space().ok_or(ProcError::NoAddressSpace)?;

        // 1. Process shell
        let child = self.create_process(cur.name())?;

        // 2. Copy of the parent's address space
        let child_space = match parent_space.duplicate() {
            Ok(space) => space,
            Err(e) => {
                log::debug!("[FORK] pid={}: address space copy failed: {}", cur.pid(), e);
                self.discard_process(child);
                return Err(ProcError::Vm(e));
            }
        };
        drop(parent_space);
        child.set_address_space(Some(child_space));

        // 3. Parent/child link, before the child can run
        let child_pid = child.pid();
        self.table
            .register(child_pid, cur.pid(), Arc::downgrade(&child));

        // 4. Child thread resuming at the instruction after the syscall
        let mut child_frame = *frame;
        child_frame.set_return(0);

        child.attach_thread();
        let scheduler = self.scheduler.clone();
        let entry_process = child.clone();
        let entry: ThreadEntry =
            Box::new(move || forked_entry(scheduler, entry_process, child_frame));

        if let Err(e) = self.scheduler.fork_thread(cur.name(), entry) {
            log::warn!("[FORK] pid={}: thread start failed: {}", cur.pid(), e);
            child.detach_thread();
            self.table.remove(child_pid);
            self.discard_process(child);
            return Err(e);
        }

        log::debug!("[FORK] pid={} -> child pid={}", cur.pid(), child_pid);
        Ok(child_pid)
    }

    /// sys_fork - Duplicate the calling process.
    ///
    /// # Returns
    /// Child PID to the parent (the child sees 0), or negative errno.
    pub fn sys_fork(&self, cur: &Arc<Process>, frame: &SyscallFrame) -> i64 {
        syscall_trace!("[SYSCALL] fork() pid={}", cur.pid());
        self.fork_process(cur, frame)
            .to_syscall_result(|pid| pid as i64)
    }
}

/// First code a forked child's thread runs.
fn forked_entry(scheduler: Arc<dyn Scheduler>, process: Arc<Process>, frame: SyscallFrame) {
    if let Some(space) = process.address_space() {
        space.activate();
    }
    scheduler.enter_forked(process, frame)
}
