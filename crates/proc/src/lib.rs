//! Process lifecycle for LevitateOS user programs.
//!
//! Owns the pid table and the fork / exec / exit / waitpid paths. Address
//! spaces, program loading and thread switching are provided by the kernel
//! through the [`Vm`], [`Loader`] and [`Scheduler`] traits, which keeps this
//! crate buildable (and testable) on the host.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

pub mod arch;
pub mod config;
pub mod loader;
pub mod logger;
pub mod memory;
pub mod syscall;
pub mod task;

pub use arch::SyscallFrame;
pub use config::{NO_PARENT, ProcConfig};
pub use loader::{Executable, LoadError, Loader};
pub use memory::{AddressSpace, Vm, VmError};
pub use syscall::dispatch;
pub use task::{
    Pid, ProcError, Process, ProcessInfo, ProcessManager, ProcessTable, Scheduler, ThreadEntry,
    UserLaunch, WaitStatus,
};
