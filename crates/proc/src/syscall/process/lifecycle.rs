//! Process lifecycle syscalls: exit, getpid, getppid, waitpid.

use alloc::sync::Arc;

use los_error::{Errno, errno};

use crate::config::NO_PARENT;
use crate::memory::user::write_user_i32;
use crate::syscall_trace;
use crate::task::{Pid, ProcError, Process, ProcessInfo, ProcessManager, WaitStatus};

impl ProcessManager {
    /// sys_exit - Terminate the calling process.
    ///
    /// Publishes the exit status to the process's record (waking a waiting
    /// parent), tears down the address space, detaches the thread and never
    /// returns.
    pub fn sys_exit(&self, cur: Arc<Process>, exit_code: i32) -> ! {
        syscall_trace!("[SYSCALL] exit({}) pid={}", exit_code, cur.pid());
        let pid = cur.pid();

        let parent_pid = match self.table.find(pid) {
            Some(info) => {
                info.publish_exit(WaitStatus::exited(exit_code));
                info.parent_pid()
            }
            None => {
                log::warn!("[EXIT] pid={} has no process record", pid);
                NO_PARENT
            }
        };

        // Clear the slot before destroying, so nothing can re-activate a
        // half-destroyed space.
        if let Some(space) = cur.set_address_space(None) {
            space.deactivate();
            drop(space);
        }

        cur.detach_thread();
        drop(cur);

        let released = self.table.release_exited(pid, parent_pid);
        log::debug!(
            "[EXIT] pid={} code={} ({} record(s) released)",
            pid,
            exit_code,
            released
        );

        self.release_slot();
        self.scheduler.exit_thread()
    }

    /// sys_getpid - Get process ID.
    pub fn sys_getpid(&self, cur: &Process) -> i64 {
        cur.pid() as i64
    }

    /// sys_getppid - Get parent process ID (0 for a root process).
    pub fn sys_getppid(&self, cur: &Process) -> i64 {
        self.table
            .find(cur.pid())
            .map_or(NO_PARENT, |info| info.parent_pid()) as i64
    }

    /// Validate a wait request and block until the child exits.
    ///
    /// Checks, in order: `options` must be 0, the pid must be registered,
    /// and it must be a child of the caller (never the caller itself).
    /// Collecting the status reaps the record.
    pub fn wait_for_child(
        &self,
        cur: &Arc<Process>,
        pid: i32,
        options: i32,
    ) -> Result<WaitStatus, ProcError> {
        if options != 0 {
            return Err(ProcError::InvalidArgument);
        }

        let target = self.lookup(pid).ok_or(ProcError::NoSuchProcess)?;
        if target.pid() == cur.pid() || target.refers_to(cur) || target.parent_pid() != cur.pid() {
            return Err(ProcError::NotChild);
        }

        // Table lock is already released; block on the record only.
        let status = target
            .wait_and_reap(|| self.scheduler.yield_now())
            .ok_or(ProcError::NoSuchProcess)?;
        self.table.reap(&target);

        log::debug!(
            "[WAITPID] pid={} reaped child={} status={:?}",
            cur.pid(),
            target.pid(),
            status
        );
        Ok(status)
    }

    /// sys_waitpid - Wait for a child process to exit.
    ///
    /// On success writes the wait status to `status_ptr` (skipped when null)
    /// and returns the child's pid.
    pub fn sys_waitpid(&self, cur: &Arc<Process>, pid: i32, status_ptr: usize, options: i32) -> i64 {
        syscall_trace!(
            "[SYSCALL] waitpid({}, 0x{:x}, {}) pid={}",
            pid,
            status_ptr,
            options,
            cur.pid()
        );

        let status = match self.wait_for_child(cur, pid, options) {
            Ok(status) => status,
            Err(e) => {
                log::debug!("[WAITPID] pid={} waitpid({}) failed: {}", cur.pid(), pid, e);
                return e.errno();
            }
        };

        if status_ptr != 0 {
            let Some(space) = cur.address_space() else {
                return errno::EFAULT;
            };
            if let Err(e) = write_user_i32(&*space, status_ptr, status.raw()) {
                return e.errno();
            }
        }

        i64::from(pid)
    }

    fn lookup(&self, pid: i32) -> Option<Arc<ProcessInfo>> {
        let pid = Pid::try_from(pid).ok().filter(|&p| p != NO_PARENT)?;
        self.table.find(pid)
    }
}
