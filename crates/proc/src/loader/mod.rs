//! Program image loading.
//!
//! The VFS and ELF loader live outside this subsystem; exec and the bootstrap
//! path only need to open an image by path and load it into an address space.

use alloc::boxed::Box;

use los_error::define_kernel_error;

use crate::memory::{AddressSpace, VmError};

define_kernel_error! {
    /// Error type for opening and loading program images.
    pub enum LoadError(0x04) {
        /// No file at the given path
        NotFound = 0x01, ENOENT => "Program not found",
        /// File is not a loadable executable
        NotExecutable = 0x02, ENOEXEC => "Not an executable",
        /// Reading the image failed
        Io = 0x03, EIO => "I/O error reading program",
        /// Mapping segments failed
        Vm(VmError) = 0x04 => "Segment mapping failed",
    }
}

impl From<VmError> for LoadError {
    fn from(e: VmError) -> Self {
        LoadError::Vm(e)
    }
}

/// An opened program image. Dropping it closes the underlying file.
pub trait Executable: Send {
    /// Map the image's segments into `space` and return the entry point.
    fn load(&self, space: &dyn AddressSpace) -> Result<usize, LoadError>;
}

/// Path-based program lookup (the VFS open step).
pub trait Loader: Send + Sync {
    fn open(&self, path: &str) -> Result<Box<dyn Executable>, LoadError>;
}
