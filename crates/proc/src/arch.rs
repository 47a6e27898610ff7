//! Saved user register state at a syscall boundary.

/// Register snapshot taken when a process traps into the kernel.
///
/// Laid out like an AArch64 exception frame: `regs[0..6]` carry syscall
/// arguments, `regs[8]` the syscall number, and `regs[0]` the return value.
/// The exception link register already points past the `svc`, so resuming a
/// frame continues at the instruction after the syscall.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyscallFrame {
    pub regs: [u64; 31],
    pub sp: u64,
    pub pc: u64,
    pub pstate: u64,
}

impl SyscallFrame {
    pub fn syscall_number(&self) -> u64 {
        self.regs[8]
    }

    pub fn arg0(&self) -> u64 {
        self.regs[0]
    }

    pub fn arg1(&self) -> u64 {
        self.regs[1]
    }

    pub fn arg2(&self) -> u64 {
        self.regs[2]
    }

    pub fn arg3(&self) -> u64 {
        self.regs[3]
    }

    pub fn arg4(&self) -> u64 {
        self.regs[4]
    }

    /// Store a syscall result (value or negative errno) for the user.
    pub fn set_return(&mut self, value: i64) {
        self.regs[0] = value as u64;
    }

    pub fn return_value(&self) -> i64 {
        self.regs[0] as i64
    }
}
