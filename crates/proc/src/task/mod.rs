//! Processes, their exit bookkeeping, and the scheduler boundary.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};

use los_error::define_kernel_error;
use los_utils::Mutex;

use crate::arch::SyscallFrame;
use crate::loader::LoadError;
use crate::memory::{AddressSpace, VmError};

pub mod manager;
pub mod process;
pub mod process_info;
pub mod process_table;

pub use manager::ProcessManager;
pub use process_info::{ProcessInfo, WaitStatus};
pub use process_table::ProcessTable;

/// Process ID type alias
pub type Pid = usize;

define_kernel_error! {
    /// Error type for process lifecycle operations.
    pub enum ProcError(0x05) {
        /// Pid not present in the process table
        NoSuchProcess = 0x01, ESRCH => "No such process",
        /// Target is the caller or not the caller's child
        NotChild = 0x02, ECHILD => "Not a child of caller",
        /// Unsupported option or malformed request
        InvalidArgument = 0x03, EINVAL => "Invalid argument",
        /// Live process limit reached
        ProcessLimit = 0x04, EAGAIN => "Too many processes",
        /// Scheduler could not start a thread
        ThreadStart = 0x05, EAGAIN => "Thread start failed",
        /// Caller has no user address space
        NoAddressSpace = 0x06, EINVAL => "No address space",
        /// Argument vector exceeds the exec budget
        ArgListTooLong = 0x07, E2BIG => "Argument list too long",
        /// Program path exceeds the path limit
        NameTooLong = 0x08, ENAMETOOLONG => "Path too long",
        /// Null or unmapped user pointer
        BadAddress = 0x09, EFAULT => "Bad address",
        /// Address space operation failed
        Vm(VmError) = 0x0A => "Address space operation failed",
        /// Program could not be opened or loaded
        Load(LoadError) = 0x0B => "Program load failed",
    }
}

/// Work item for a newly started kernel thread.
pub type ThreadEntry = Box<dyn FnOnce() + Send + 'static>;

/// Register state handed to a freshly loaded program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserLaunch {
    pub argc: usize,
    /// User address of `argv[0]`
    pub argv: usize,
    pub stack_pointer: usize,
    pub entry_point: usize,
}

/// Thread and context-switch primitives provided by the kernel.
pub trait Scheduler: Send + Sync {
    /// Start a new thread running `entry`.
    fn fork_thread(&self, name: &str, entry: ThreadEntry) -> Result<(), ProcError>;

    /// Give up the CPU; used while spinning on a wait channel.
    fn yield_now(&self);

    /// Return to user mode in a forked child with its copied frame.
    fn enter_forked(&self, process: Arc<Process>, frame: SyscallFrame) -> !;

    /// Warp into a freshly loaded program image.
    fn enter_new_process(&self, process: Arc<Process>, launch: UserLaunch) -> !;

    /// Terminate the calling thread.
    fn exit_thread(&self) -> !;
}

/// A process shell: identity plus the address space it currently runs in.
pub struct Process {
    pid: Pid,
    name: String,
    address_space: Mutex<Option<Arc<dyn AddressSpace>>>,
    threads: AtomicUsize,
}

impl Process {
    pub(crate) fn new(pid: Pid, name: &str) -> Self {
        Self {
            pid,
            name: String::from(name),
            address_space: Mutex::new(None),
            threads: AtomicUsize::new(0),
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Snapshot of the current address space.
    ///
    /// The lock is only held for the clone, so callers can copy through the
    /// returned space without blocking a concurrent switch.
    pub fn address_space(&self) -> Option<Arc<dyn AddressSpace>> {
        self.address_space.lock().clone()
    }

    /// Install `space` and return the previous one.
    pub fn set_address_space(
        &self,
        space: Option<Arc<dyn AddressSpace>>,
    ) -> Option<Arc<dyn AddressSpace>> {
        core::mem::replace(&mut *self.address_space.lock(), space)
    }

    pub fn thread_count(&self) -> usize {
        self.threads.load(Ordering::Acquire)
    }

    pub(crate) fn attach_thread(&self) {
        self.threads.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn detach_thread(&self) {
        // Detaching with no threads attached is a no-op; the count stays 0
        let _ = self
            .threads
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid)
            .field("name", &self.name)
            .field("threads", &self.thread_count())
            .finish_non_exhaustive()
    }
}
