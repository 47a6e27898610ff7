//! User memory helpers layered on the [`AddressSpace`] copy primitives.
//!
//! Nothing here dereferences a user address directly: user memory belongs to
//! a different address space than the executing kernel context, so all reads
//! and writes are boundary-crossing copies that may fail.

use alloc::string::String;
use alloc::vec::Vec;
use core::mem::{align_of, size_of};

use los_error::define_kernel_error;

use super::{AddressSpace, VmError};

define_kernel_error! {
    /// Error type for copying strings in from user space.
    pub enum CopyError(0x03) {
        /// The copy primitive rejected the address
        Fault(VmError) = 0x01 => "User copy faulted",
        /// No terminator within the allowed length
        TooLong = 0x02, ENAMETOOLONG => "String too long",
        /// Bytes were not valid UTF-8
        NotUtf8 = 0x03, EINVAL => "Invalid string encoding",
    }
}

impl From<VmError> for CopyError {
    fn from(e: VmError) -> Self {
        CopyError::Fault(e)
    }
}

/// Width of a user pointer slot on the stack.
pub const PTR_SIZE: usize = size_of::<usize>();

/// Read a null-terminated string from user space into a kernel buffer.
///
/// # Arguments
/// * `space` - Address space the pointer belongs to
/// * `user_ptr` - User virtual address of the string
/// * `max_len` - Maximum length including the terminator
pub fn read_user_cstring(
    space: &dyn AddressSpace,
    user_ptr: usize,
    max_len: usize,
) -> Result<String, CopyError> {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    for i in 0..max_len {
        let addr = user_ptr.checked_add(i).ok_or(VmError::BadAddress)?;
        space.copy_in(addr, &mut byte)?;
        if byte[0] == 0 {
            return String::from_utf8(buf).map_err(|_| CopyError::NotUtf8);
        }
        buf.push(byte[0]);
    }
    // Buffer full without finding null terminator
    Err(CopyError::TooLong)
}

/// Read one pointer-sized value from user space.
pub fn read_user_usize(space: &dyn AddressSpace, user_ptr: usize) -> Result<usize, VmError> {
    let mut raw = [0u8; PTR_SIZE];
    space.copy_in(user_ptr, &mut raw)?;
    Ok(usize::from_ne_bytes(raw))
}

/// Write an `i32` (e.g. a wait status) to user space.
pub fn write_user_i32(space: &dyn AddressSpace, user_ptr: usize, value: i32) -> Result<(), VmError> {
    space.copy_out(user_ptr, &value.to_ne_bytes())
}

/// Lay out `args` on a fresh user stack and return the `argv` pointer.
///
/// Layout, from `stack_top` downward:
/// 1. each string with its terminator, first argument highest, recording
///    the address each one landed at
/// 2. padding down to pointer alignment
/// 3. a null pointer, then the recorded addresses from last to first, so
///    `argv[0]..argv[argc]` read upward in order
///
/// The returned stack pointer is the address of `argv[0]`.
pub fn setup_stack_args<S: AsRef<[u8]>>(
    space: &dyn AddressSpace,
    stack_top: usize,
    args: &[S],
) -> Result<usize, VmError> {
    let mut sp = stack_top;

    let push = |sp: &mut usize, bytes: &[u8]| -> Result<usize, VmError> {
        *sp = sp.checked_sub(bytes.len()).ok_or(VmError::BadAddress)?;
        space.copy_out(*sp, bytes)?;
        Ok(*sp)
    };

    let mut arg_ptrs = Vec::with_capacity(args.len());
    for arg in args {
        let bytes = arg.as_ref();
        sp = sp.checked_sub(1).ok_or(VmError::BadAddress)?;
        space.copy_out(sp, &[0])?;
        arg_ptrs.push(push(&mut sp, bytes)?);
    }

    sp &= !(align_of::<usize>() - 1);

    push(&mut sp, &0usize.to_ne_bytes())?;
    for ptr in arg_ptrs.iter().rev() {
        push(&mut sp, &ptr.to_ne_bytes())?;
    }

    log::trace!(
        "[EXEC] stack args: argc={} argv=0x{:x} top=0x{:x}",
        args.len(),
        sp,
        stack_top
    );

    Ok(sp)
}
