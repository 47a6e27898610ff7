//! Process lifecycle syscalls, implemented as methods on
//! [`ProcessManager`](crate::task::ProcessManager).

mod exec;
mod fork;
mod lifecycle;
