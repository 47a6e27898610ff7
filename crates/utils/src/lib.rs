#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod condvar;

pub use condvar::CondVar;

// Re-export spin crate types as our lock API
pub use spin::Once;
pub use spin::{Mutex, MutexGuard};

// ============================================================================
// Unit Tests
// ============================================================================
