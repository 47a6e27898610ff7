//! Kernel-initiated process creation.
//!
//! Builds the first user processes (no parent) and the image-loading step
//! shared with exec: load segments, define the stack, marshal argv.

use alloc::boxed::Box;
use alloc::sync::Arc;

use super::{Pid, ProcError, Process, ProcessManager, Scheduler, ThreadEntry, UserLaunch};
use crate::config::NO_PARENT;
use crate::loader::Executable;
use crate::memory::AddressSpace;
use crate::memory::user::setup_stack_args;

impl ProcessManager {
    /// Create a root process with an empty address space.
    ///
    /// The calling thread becomes the process's only thread; use this when
    /// the kernel hands an existing thread over to user space.
    pub fn create_root_process(&self, name: &str) -> Result<Arc<Process>, ProcError> {
        let process = self.create_process(name)?;
        let space = match self.vm.create() {
            Ok(space) => space,
            Err(e) => {
                self.discard_process(process);
                return Err(ProcError::Vm(e));
            }
        };
        process.set_address_space(Some(space));
        self.table
            .register(process.pid(), NO_PARENT, Arc::downgrade(&process));
        process.attach_thread();
        log::debug!("[PROC] root process '{}' pid={}", name, process.pid());
        Ok(process)
    }

    /// Launch `path` as a new root process on its own thread.
    ///
    /// Everything that can fail happens before the thread starts; on error
    /// nothing is left registered.
    pub fn run_program(&self, path: &str, args: &[&str]) -> Result<Pid, ProcError> {
        let image = self.loader.open(path).map_err(ProcError::Load)?;

        let process = self.create_process(path)?;
        let space = match self.vm.create() {
            Ok(space) => space,
            Err(e) => {
                self.discard_process(process);
                return Err(ProcError::Vm(e));
            }
        };
        process.set_address_space(Some(space.clone()));

        let launch = match self.load_image(&*image, &*space, args) {
            Ok(launch) => launch,
            Err(e) => {
                log::debug!("[PROC] run_program '{}' failed: {}", path, e);
                self.discard_process(process);
                return Err(e);
            }
        };
        drop(image);

        let pid = process.pid();
        self.table.register(pid, NO_PARENT, Arc::downgrade(&process));
        process.attach_thread();

        let scheduler = self.scheduler.clone();
        let child = process.clone();
        let entry: ThreadEntry = Box::new(move || program_entry(scheduler, child, launch));
        if let Err(e) = self.scheduler.fork_thread(path, entry) {
            log::warn!("[PROC] run_program '{}': thread start failed: {}", path, e);
            process.detach_thread();
            self.table.remove(pid);
            self.discard_process(process);
            return Err(e);
        }

        log::debug!(
            "[PROC] run_program '{}' pid={} entry=0x{:x} argc={}",
            path,
            pid,
            launch.entry_point,
            launch.argc
        );
        Ok(pid)
    }

    /// Load `image` into `space` and build its initial stack.
    pub(crate) fn load_image<S: AsRef<[u8]>>(
        &self,
        image: &dyn Executable,
        space: &dyn AddressSpace,
        args: &[S],
    ) -> Result<UserLaunch, ProcError> {
        let entry_point = image.load(space).map_err(ProcError::Load)?;
        let stack_top = space.define_stack().map_err(ProcError::Vm)?;
        let argv = setup_stack_args(space, stack_top, args).map_err(ProcError::Vm)?;

        Ok(UserLaunch {
            argc: args.len(),
            argv,
            stack_pointer: argv,
            entry_point,
        })
    }
}

/// First code a launched program's thread runs.
fn program_entry(scheduler: Arc<dyn Scheduler>, process: Arc<Process>, launch: UserLaunch) {
    if let Some(space) = process.address_space() {
        space.activate();
    }
    scheduler.enter_new_process(process, launch)
}
