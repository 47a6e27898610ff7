//! Host machine for the process subsystem: flat mock address spaces, a
//! table-driven loader, and a scheduler that runs every kernel thread on a
//! std thread.
//!
//! "User programs" are closures keyed by an address: a forked child runs the
//! program at its frame's `pc`, an exec'd process runs the one at its entry
//! point. Whatever the program returns becomes its exit code.

#![allow(dead_code)]

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use los_proc::memory::user::{PTR_SIZE, read_user_cstring, read_user_usize};
use los_proc::{
    AddressSpace, Executable, LoadError, Loader, Pid, ProcConfig, ProcError, Process,
    ProcessManager, Scheduler, SyscallFrame, ThreadEntry, UserLaunch, Vm, VmError,
};

/// User window of every mock address space.
pub const USER_BASE: usize = 0x1000;
pub const USER_SIZE: usize = 0x4000;
pub const STACK_TOP: usize = USER_BASE + USER_SIZE;

/// Scratch addresses tests use for strings and pointer arrays.
pub const PATH_ADDR: usize = USER_BASE;
pub const ARGV_ADDR: usize = USER_BASE + 0x400;
pub const STRINGS_ADDR: usize = USER_BASE + 0x800;
pub const STATUS_ADDR: usize = USER_BASE + 0xF00;
pub const MARKER_ADDR: usize = USER_BASE + 0xF80;

/// Entry point the loader reports for images that fail to load.
pub const BROKEN_ENTRY: usize = 0xDEAD;

#[derive(Default)]
pub struct Counters {
    pub created: AtomicUsize,
    pub destroyed: AtomicUsize,
    pub activations: AtomicUsize,
}

#[derive(Default)]
pub struct Faults {
    pub fail_create: AtomicBool,
    pub fail_duplicate: AtomicBool,
    pub fail_thread: AtomicBool,
}

pub struct MockSpace {
    mem: Mutex<Vec<u8>>,
    counters: Arc<Counters>,
    faults: Arc<Faults>,
}

impl MockSpace {
    fn new(counters: Arc<Counters>, faults: Arc<Faults>, mem: Vec<u8>) -> Self {
        counters.created.fetch_add(1, Ordering::SeqCst);
        Self {
            mem: Mutex::new(mem),
            counters,
            faults,
        }
    }

    fn range(addr: usize, len: usize) -> Result<std::ops::Range<usize>, VmError> {
        let start = addr.checked_sub(USER_BASE).ok_or(VmError::BadAddress)?;
        let end = start.checked_add(len).ok_or(VmError::BadAddress)?;
        if end > USER_SIZE {
            return Err(VmError::BadAddress);
        }
        Ok(start..end)
    }
}

impl AddressSpace for MockSpace {
    fn activate(&self) {
        self.counters.activations.fetch_add(1, Ordering::SeqCst);
    }

    fn deactivate(&self) {}

    fn duplicate(&self) -> Result<Arc<dyn AddressSpace>, VmError> {
        if self.faults.fail_duplicate.load(Ordering::SeqCst) {
            return Err(VmError::OutOfMemory);
        }
        let mem = self.mem.lock().unwrap().clone();
        Ok(Arc::new(MockSpace::new(
            self.counters.clone(),
            self.faults.clone(),
            mem,
        )))
    }

    fn define_stack(&self) -> Result<usize, VmError> {
        Ok(STACK_TOP)
    }

    fn copy_in(&self, addr: usize, buf: &mut [u8]) -> Result<(), VmError> {
        let range = Self::range(addr, buf.len())?;
        buf.copy_from_slice(&self.mem.lock().unwrap()[range]);
        Ok(())
    }

    fn copy_out(&self, addr: usize, bytes: &[u8]) -> Result<(), VmError> {
        let range = Self::range(addr, bytes.len())?;
        self.mem.lock().unwrap()[range].copy_from_slice(bytes);
        Ok(())
    }
}

impl Drop for MockSpace {
    fn drop(&mut self) {
        self.counters.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct MockVm {
    counters: Arc<Counters>,
    faults: Arc<Faults>,
}

impl Vm for MockVm {
    fn create(&self) -> Result<Arc<dyn AddressSpace>, VmError> {
        if self.faults.fail_create.load(Ordering::SeqCst) {
            return Err(VmError::OutOfMemory);
        }
        Ok(Arc::new(MockSpace::new(
            self.counters.clone(),
            self.faults.clone(),
            vec![0; USER_SIZE],
        )))
    }
}

struct MockImage {
    entry: usize,
}

impl Executable for MockImage {
    fn load(&self, _space: &dyn AddressSpace) -> Result<usize, LoadError> {
        if self.entry == BROKEN_ENTRY {
            return Err(LoadError::NotExecutable);
        }
        Ok(self.entry)
    }
}

#[derive(Default)]
pub struct MockLoader {
    images: Mutex<HashMap<String, usize>>,
}

impl Loader for MockLoader {
    fn open(&self, path: &str) -> Result<Box<dyn Executable>, LoadError> {
        let entry = *self
            .images
            .lock()
            .unwrap()
            .get(path)
            .ok_or(LoadError::NotFound)?;
        Ok(Box::new(MockImage { entry }))
    }
}

/// What a user program sees when it starts.
pub struct Ctx {
    pub manager: Arc<ProcessManager>,
    pub process: Arc<Process>,
    /// `x0` at entry: 0 in a forked child
    pub retval: i64,
    pub args: Vec<String>,
}

impl Ctx {
    pub fn space(&self) -> Arc<dyn AddressSpace> {
        self.process.address_space().unwrap()
    }
}

pub type Program = Arc<dyn Fn(&Ctx) -> i32 + Send + Sync>;

/// One exec'd or launched program image as the scheduler saw it.
#[derive(Debug, Clone)]
pub struct Launch {
    pub pid: Pid,
    pub launch: UserLaunch,
    pub args: Vec<String>,
    /// `argv[argc]` read back as a null pointer
    pub terminated: bool,
}

/// Unwind payload that ends a kernel thread.
struct ThreadExited;

#[derive(Default)]
pub struct HostScheduler {
    manager: OnceLock<Weak<ProcessManager>>,
    programs: Mutex<HashMap<usize, Program>>,
    faults: Arc<Faults>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    pub launches: Mutex<Vec<Launch>>,
    /// (pid, code) for every program that returned, in exit order
    pub exits: Mutex<Vec<(Pid, i32)>>,
}

impl HostScheduler {
    fn manager(&self) -> Arc<ProcessManager> {
        self.manager.get().and_then(Weak::upgrade).unwrap()
    }

    fn run_user(&self, process: Arc<Process>, key: usize, retval: i64, args: Vec<String>) -> ! {
        let manager = self.manager();
        let program = self.programs.lock().unwrap().get(&key).cloned();
        let code = {
            let ctx = Ctx {
                manager: manager.clone(),
                process: process.clone(),
                retval,
                args,
            };
            match program {
                Some(program) => (*program)(&ctx),
                None => 127,
            }
        };
        self.exits.lock().unwrap().push((process.pid(), code));
        manager.sys_exit(process, code)
    }

    fn read_args(space: &dyn AddressSpace, launch: &UserLaunch) -> (Vec<String>, bool) {
        let mut args = Vec::new();
        for i in 0..launch.argc {
            let ptr = read_user_usize(space, launch.argv + i * PTR_SIZE).unwrap();
            args.push(read_user_cstring(space, ptr, 256).unwrap());
        }
        let terminator = read_user_usize(space, launch.argv + launch.argc * PTR_SIZE).unwrap();
        (args, terminator == 0)
    }
}

impl Scheduler for HostScheduler {
    fn fork_thread(&self, name: &str, entry: ThreadEntry) -> Result<(), ProcError> {
        if self.faults.fail_thread.load(Ordering::SeqCst) {
            return Err(ProcError::ThreadStart);
        }
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(entry)) {
                    if !payload.is::<ThreadExited>() {
                        panic::resume_unwind(payload);
                    }
                }
            })
            .map_err(|_| ProcError::ThreadStart)?;
        self.threads.lock().unwrap().push(handle);
        Ok(())
    }

    fn yield_now(&self) {
        thread::yield_now();
    }

    fn enter_forked(&self, process: Arc<Process>, frame: SyscallFrame) -> ! {
        self.run_user(process, frame.pc as usize, frame.return_value(), Vec::new())
    }

    fn enter_new_process(&self, process: Arc<Process>, launch: UserLaunch) -> ! {
        let space = process.address_space().unwrap();
        let (args, terminated) = Self::read_args(&*space, &launch);
        drop(space);
        self.launches.lock().unwrap().push(Launch {
            pid: process.pid(),
            launch,
            args: args.clone(),
            terminated,
        });
        self.run_user(process, launch.entry_point, 0, args)
    }

    fn exit_thread(&self) -> ! {
        panic::resume_unwind(Box::new(ThreadExited))
    }
}

pub struct Machine {
    pub manager: Arc<ProcessManager>,
    pub scheduler: Arc<HostScheduler>,
    pub loader: Arc<MockLoader>,
    pub counters: Arc<Counters>,
    pub faults: Arc<Faults>,
}

impl Machine {
    pub fn new() -> Self {
        Self::with_config(ProcConfig::default())
    }

    pub fn with_config(config: ProcConfig) -> Self {
        let counters = Arc::new(Counters::default());
        let faults = Arc::new(Faults::default());
        let vm = Arc::new(MockVm {
            counters: counters.clone(),
            faults: faults.clone(),
        });
        let loader = Arc::new(MockLoader::default());
        let scheduler = Arc::new(HostScheduler {
            faults: faults.clone(),
            ..HostScheduler::default()
        });
        let manager = Arc::new(ProcessManager::new(
            config,
            vm,
            loader.clone(),
            scheduler.clone(),
        ));
        let _ = scheduler.manager.set(Arc::downgrade(&manager));
        Self {
            manager,
            scheduler,
            loader,
            counters,
            faults,
        }
    }

    /// Register a user program at `key` (a fork `pc` or an image entry).
    pub fn program(&self, key: usize, f: impl Fn(&Ctx) -> i32 + Send + Sync + 'static) {
        self.scheduler
            .programs
            .lock()
            .unwrap()
            .insert(key, Arc::new(f));
    }

    /// Make `path` loadable, entering at `entry`.
    pub fn install(&self, path: &str, entry: usize) {
        self.loader
            .images
            .lock()
            .unwrap()
            .insert(path.to_string(), entry);
    }

    /// A parentless process driven by the calling test thread.
    pub fn root(&self) -> Arc<Process> {
        self.manager.create_root_process("test").unwrap()
    }

    /// Fork `cur` with the child resuming at program `key`.
    pub fn fork(&self, cur: &Arc<Process>, key: usize) -> i64 {
        self.manager.sys_fork(cur, &fork_frame(key))
    }

    /// waitpid through `cur`'s user memory; returns (result, raw status).
    pub fn wait(&self, cur: &Arc<Process>, pid: i64) -> (i64, i32) {
        let space = cur.address_space().unwrap();
        space.copy_out(STATUS_ADDR, &(-1i32).to_ne_bytes()).unwrap();
        let ret = self.manager.sys_waitpid(cur, pid as i32, STATUS_ADDR, 0);
        let mut raw = [0u8; 4];
        space.copy_in(STATUS_ADDR, &mut raw).unwrap();
        (ret, i32::from_ne_bytes(raw))
    }

    /// Join every thread started so far; panics if any of them panicked.
    pub fn join_all(&self) {
        loop {
            let handles: Vec<_> = self.scheduler.threads.lock().unwrap().drain(..).collect();
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                assert!(handle.join().is_ok(), "kernel thread panicked");
            }
        }
    }
}

pub fn fork_frame(key: usize) -> SyscallFrame {
    SyscallFrame {
        pc: key as u64,
        ..SyscallFrame::default()
    }
}

/// Write a NUL-terminated string at `addr`.
pub fn put_str(space: &dyn AddressSpace, addr: usize, s: &str) {
    space.copy_out(addr, s.as_bytes()).unwrap();
    space.copy_out(addr + s.len(), &[0]).unwrap();
}

/// Write `args` as strings plus a null-terminated pointer array at
/// [`ARGV_ADDR`].
pub fn put_argv(space: &dyn AddressSpace, args: &[&str]) -> usize {
    let mut at = STRINGS_ADDR;
    for (i, arg) in args.iter().enumerate() {
        put_str(space, at, arg);
        space
            .copy_out(ARGV_ADDR + i * PTR_SIZE, &at.to_ne_bytes())
            .unwrap();
        at += arg.len() + 1;
    }
    space
        .copy_out(ARGV_ADDR + args.len() * PTR_SIZE, &0usize.to_ne_bytes())
        .unwrap();
    ARGV_ADDR
}

/// Spin until `cond` holds; fails the test after a few seconds.
pub fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "condition never became true");
        thread::sleep(Duration::from_millis(1));
    }
}
