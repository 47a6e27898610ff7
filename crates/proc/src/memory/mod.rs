//! Address space boundary.
//!
//! Page tables, frame allocation and the actual user copy primitives belong
//! to the VM system. This subsystem only needs the operations below; every
//! access to user memory goes through [`AddressSpace::copy_in`] /
//! [`AddressSpace::copy_out`], which fail with [`VmError::BadAddress`] on an
//! invalid user pointer.

use alloc::sync::Arc;

use los_error::define_kernel_error;

pub mod user;

define_kernel_error! {
    /// Error type for address space operations.
    pub enum VmError(0x02) {
        /// No memory for page tables or frames
        OutOfMemory = 0x01, ENOMEM => "Out of memory",
        /// User pointer not mapped or not accessible
        BadAddress = 0x02, EFAULT => "Bad user address",
        /// Could not map the user stack region
        StackSetup = 0x03, ENOMEM => "Stack setup failed",
    }
}

/// A user virtual address space owned by exactly one process at a time.
///
/// Dropping the last reference destroys the space.
pub trait AddressSpace: Send + Sync {
    /// Make this space the one the current CPU translates through.
    fn activate(&self);

    /// Stop translating through this space (flush TLB state for it).
    fn deactivate(&self);

    /// Create an independent copy: same contents, no shared writable pages.
    fn duplicate(&self) -> Result<Arc<dyn AddressSpace>, VmError>;

    /// Map the user stack region and return the initial stack pointer.
    fn define_stack(&self) -> Result<usize, VmError>;

    /// Copy `buf.len()` bytes from user address `addr` into `buf`.
    fn copy_in(&self, addr: usize, buf: &mut [u8]) -> Result<(), VmError>;

    /// Copy `bytes` to user address `addr`.
    fn copy_out(&self, addr: usize, bytes: &[u8]) -> Result<(), VmError>;
}

/// Factory for fresh, empty address spaces.
pub trait Vm: Send + Sync {
    fn create(&self) -> Result<Arc<dyn AddressSpace>, VmError>;
}
