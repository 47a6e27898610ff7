//! Tunables for the process subsystem.

use crate::task::Pid;

/// Parent pid recorded for processes started by the kernel itself.
pub const NO_PARENT: Pid = 0;

/// Process subsystem configuration.
///
/// Defaults mirror a small teaching kernel: pids start at 1, there is no
/// ceiling on the number of live processes, and exec arguments are bounded
/// the way `PATH_MAX` / `ARG_MAX` bound them on a Unix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcConfig {
    /// First pid handed out. Must be greater than [`NO_PARENT`].
    pub first_pid: Pid,
    /// Live process limit; `None` means unbounded.
    pub max_processes: Option<usize>,
    /// Longest program path accepted by exec, terminator included.
    pub path_max: usize,
    /// Total argv budget in bytes: every string with its terminator plus one
    /// pointer slot per argument.
    pub arg_max: usize,
}

impl Default for ProcConfig {
    fn default() -> Self {
        Self {
            first_pid: 1,
            max_processes: None,
            path_max: 1024,
            arg_max: 64 * 1024,
        }
    }
}

impl ProcConfig {
    #[must_use]
    pub fn with_first_pid(mut self, first_pid: Pid) -> Self {
        self.first_pid = first_pid.max(NO_PARENT + 1);
        self
    }

    #[must_use]
    pub fn with_max_processes(mut self, max: usize) -> Self {
        self.max_processes = Some(max);
        self
    }

    #[must_use]
    pub fn with_path_max(mut self, path_max: usize) -> Self {
        self.path_max = path_max;
        self
    }

    #[must_use]
    pub fn with_arg_max(mut self, arg_max: usize) -> Self {
        self.arg_max = arg_max;
        self
    }
}
