//! Syscall entry for the process subsystem.
//!
//! Calls use the Linux AArch64 convention: number in `x8`, arguments in
//! `x0..x5`, result (value or negative errno) back in `x0`.

use alloc::sync::Arc;

use linux_raw_sys::general;

pub use los_error::{Errno, errno};

use crate::arch::SyscallFrame;
use crate::task::{Process, ProcessManager};

pub mod process;

const NR_EXIT: u64 = general::__NR_exit as u64;
const NR_EXIT_GROUP: u64 = general::__NR_exit_group as u64;
const NR_GETPID: u64 = general::__NR_getpid as u64;
const NR_GETPPID: u64 = general::__NR_getppid as u64;
const NR_WAIT4: u64 = general::__NR_wait4 as u64;
const NR_CLONE: u64 = general::__NR_clone as u64;
const NR_EXECVE: u64 = general::__NR_execve as u64;

/// Low byte of clone flags: signal sent to the parent on exit.
const CLONE_SIGNAL_MASK: u64 = 0xff;

/// Convert a subsystem result into a syscall return value.
pub trait SyscallResultExt<T> {
    /// On success, calls the provided closure to compute the return value.
    /// On error, converts the error to negative errno.
    fn to_syscall_result<F: FnOnce(T) -> i64>(self, on_success: F) -> i64;
}

impl<T, E: Errno> SyscallResultExt<T> for Result<T, E> {
    fn to_syscall_result<F: FnOnce(T) -> i64>(self, on_success: F) -> i64 {
        match self {
            Ok(v) => on_success(v),
            Err(e) => e.errno(),
        }
    }
}

/// Decode and run one process syscall from `frame`, storing the result.
///
/// `exit`/`exit_group` and a successful `execve` do not return. `clone` is
/// only accepted in its plain fork form (no flags besides the exit signal,
/// no new stack); `wait4` does not report resource usage.
pub fn dispatch(manager: &ProcessManager, cur: &Arc<Process>, frame: &mut SyscallFrame) {
    let nr = frame.syscall_number();
    let result = match nr {
        NR_EXIT | NR_EXIT_GROUP => manager.sys_exit(cur.clone(), frame.arg0() as i32),
        NR_GETPID => manager.sys_getpid(cur),
        NR_GETPPID => manager.sys_getppid(cur),
        NR_WAIT4 => {
            if frame.arg3() != 0 {
                errno::EINVAL
            } else {
                manager.sys_waitpid(
                    cur,
                    frame.arg0() as i32,
                    frame.arg1() as usize,
                    frame.arg2() as i32,
                )
            }
        }
        NR_CLONE => {
            if frame.arg0() & !CLONE_SIGNAL_MASK != 0 || frame.arg1() != 0 {
                errno::EINVAL
            } else {
                manager.sys_fork(cur, frame)
            }
        }
        NR_EXECVE => manager.sys_execv(cur, frame.arg0() as usize, frame.arg1() as usize),
        _ => {
            log::warn!("[SYSCALL] pid={}: unsupported syscall {}", cur.pid(), nr);
            errno::ENOSYS
        }
    };
    frame.set_return(result);
}
