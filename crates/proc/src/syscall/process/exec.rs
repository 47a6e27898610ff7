//! Exec: replace the calling process's program image.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::convert::Infallible;

use los_error::Errno;

use crate::memory::AddressSpace;
use crate::memory::user::{CopyError, PTR_SIZE, read_user_cstring, read_user_usize};
use crate::syscall_trace;
use crate::task::{ProcError, Process, ProcessManager};

/// Map a string copy failure; `too_long` depends on what was being copied.
fn copy_error(e: CopyError, too_long: ProcError) -> ProcError {
    match e {
        CopyError::Fault(_) => ProcError::BadAddress,
        CopyError::TooLong => too_long,
        CopyError::NotUtf8 => ProcError::InvalidArgument,
    }
}

impl ProcessManager {
    /// Replace `cur`'s image with the program at `path_ptr`, passing the
    /// null-terminated pointer array at `argv_ptr` as its arguments.
    ///
    /// Only returns on failure. Failures up to and including creating the
    /// new address space leave the caller's image untouched; once the new
    /// space is installed the old one is gone and later failures are only
    /// reported.
    pub fn exec_program(
        &self,
        cur: &Arc<Process>,
        path_ptr: usize,
        argv_ptr: usize,
    ) -> Result<Infallible, ProcError> {
        if path_ptr == 0 {
            return Err(ProcError::BadAddress);
        }

        // 1. Copy path and arguments into kernel buffers
        let (path, args) = {
            let space = cur.address_space().ok_or(ProcError::NoAddressSpace)?;
            let path = read_user_cstring(&*space, path_ptr, self.config.path_max)
                .map_err(|e| copy_error(e, ProcError::NameTooLong))?;
            let args = self.copy_in_args(&*space, argv_ptr)?;
            (path, args)
        };
        log::debug!("[EXEC] pid={} '{}' argc={}", cur.pid(), path, args.len());

        // 2. Open the image
        let image = self.loader.open(&path).map_err(ProcError::Load)?;

        // 3. Fresh address space; switch to it, then destroy the old one
        let space = self.vm.create().map_err(ProcError::Vm)?;
        let old = cur.set_address_space(Some(space.clone()));
        space.activate();
        if let Some(old) = old {
            old.deactivate();
            drop(old);
        }

        // 4-6. Load, define the stack, marshal argv. No way back from here.
        let launch = match self.load_image(&*image, &*space, args.as_slice()) {
            Ok(launch) => launch,
            Err(e) => {
                log::warn!("[EXEC] pid={} '{}' failed after image switch: {}", cur.pid(), path, e);
                return Err(e);
            }
        };
        drop(image);
        drop(space);

        log::debug!(
            "[EXEC] pid={} entry=0x{:x} sp=0x{:x}",
            cur.pid(),
            launch.entry_point,
            launch.stack_pointer
        );

        // 7. Warp to user mode
        self.scheduler.enter_new_process(cur.clone(), launch)
    }

    /// sys_execv - Replace the current program.
    ///
    /// # Returns
    /// Does not return on success; negative errno otherwise.
    pub fn sys_execv(&self, cur: &Arc<Process>, path_ptr: usize, argv_ptr: usize) -> i64 {
        syscall_trace!(
            "[SYSCALL] execv(0x{:x}, 0x{:x}) pid={}",
            path_ptr,
            argv_ptr,
            cur.pid()
        );
        match self.exec_program(cur, path_ptr, argv_ptr) {
            Ok(never) => match never {},
            Err(e) => e.errno(),
        }
    }

    /// Copy a user argv array (null-terminated pointer list) into kernel
    /// strings. A null `argv_ptr` is an empty argument list.
    fn copy_in_args(&self, space: &dyn AddressSpace, argv_ptr: usize) -> Result<Vec<String>, ProcError> {
        let mut args = Vec::new();
        if argv_ptr == 0 {
            return Ok(args);
        }

        let mut budget = self.config.arg_max;
        loop {
            let slot = args
                .len()
                .checked_mul(PTR_SIZE)
                .and_then(|off| argv_ptr.checked_add(off))
                .ok_or(ProcError::BadAddress)?;
            let arg_ptr = read_user_usize(space, slot).map_err(|_| ProcError::BadAddress)?;
            if arg_ptr == 0 {
                break;
            }

            budget = budget
                .checked_sub(PTR_SIZE)
                .ok_or(ProcError::ArgListTooLong)?;
            let arg = read_user_cstring(space, arg_ptr, budget)
                .map_err(|e| copy_error(e, ProcError::ArgListTooLong))?;
            budget -= arg.len() + 1;
            args.push(arg);
        }

        Ok(args)
    }
}
