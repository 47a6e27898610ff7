//! Kernel error handling infrastructure.
//!
//! Provides the `define_kernel_error!` macro for consistent error type
//! definitions, plus the [`Errno`] mapping every syscall boundary relies on.
//!
//! ## Usage
//!
//! ### Simple errors (no inner data)
//! Every simple variant names the errno it surfaces as.
//! ```ignore
//! define_kernel_error! {
//!     pub enum VmError(0x02) {
//!         OutOfMemory = 0x01, ENOMEM => "Out of memory",
//!         BadAddress = 0x02, EFAULT => "Bad user address",
//!     }
//! }
//! ```
//!
//! ### Nested errors (with inner error type)
//! A nested variant without an errno reports whatever its inner error
//! reports; naming one overrides it.
//! ```ignore
//! define_kernel_error! {
//!     pub enum SpawnError(0x06) {
//!         Vm(VmError) = 0x01 => "Address space operation failed",
//!         Image(VmError) = 0x02, ENOEXEC => "Image could not be mapped",
//!     }
//! }
//! ```

#![no_std]

/// Negative errno values as returned across the syscall boundary.
///
/// Single source of truth for errno constants; values come from the Linux ABI.
pub mod errno {
    use linux_raw_sys::errno as abi;

    pub const ENOENT: i64 = -(abi::ENOENT as i64);
    pub const ESRCH: i64 = -(abi::ESRCH as i64);
    pub const EIO: i64 = -(abi::EIO as i64);
    pub const E2BIG: i64 = -(abi::E2BIG as i64);
    pub const ENOEXEC: i64 = -(abi::ENOEXEC as i64);
    pub const ECHILD: i64 = -(abi::ECHILD as i64);
    pub const EAGAIN: i64 = -(abi::EAGAIN as i64);
    pub const ENOMEM: i64 = -(abi::ENOMEM as i64);
    pub const EFAULT: i64 = -(abi::EFAULT as i64);
    pub const EINVAL: i64 = -(abi::EINVAL as i64);
    pub const ENAMETOOLONG: i64 = -(abi::ENAMETOOLONG as i64);
    pub const ENOSYS: i64 = -(abi::ENOSYS as i64);
}

/// Conversion of a kernel error into the negative errno userspace sees.
pub trait Errno {
    fn errno(&self) -> i64;
}

/// Macro to define a kernel error type with consistent handling.
///
/// Supports both simple variants and nested variants containing inner errors.
/// Inner error types must implement [`Errno`] unless the variant names its own.
#[macro_export]
macro_rules! define_kernel_error {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident($subsystem:literal) {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident $(($inner:ty))? = $code:literal $(, $errno:ident)? => $desc:literal
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant $(($inner))?,
            )*
        }

        impl $name {
            /// Subsystem identifier for this error type.
            pub const SUBSYSTEM: u8 = $subsystem;

            /// Get numeric error code for debugging.
            pub const fn code(&self) -> u16 {
                match self {
                    $(
                        $crate::define_kernel_error!(@pattern $variant $(($inner))? _unused) => {
                            (($subsystem as u16) << 8) | $code
                        }
                    )*
                }
            }

            /// Get error name for logging.
            pub const fn name(&self) -> &'static str {
                match self {
                    $(
                        $crate::define_kernel_error!(@pattern $variant $(($inner))? _unused) => {
                            $desc
                        }
                    )*
                }
            }
        }

        impl $crate::Errno for $name {
            fn errno(&self) -> i64 {
                match self {
                    $(
                        $crate::define_kernel_error!(@pattern $variant $(($inner))? inner) => {
                            $crate::define_kernel_error!(@errno [$($inner)?] [$($errno)?] inner)
                        }
                    )*
                }
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                match self {
                    $(
                        $crate::define_kernel_error!(@pattern $variant $(($inner))? inner) => {
                            $crate::define_kernel_error!(@display_body self f $desc $(($inner))? inner)
                        }
                    )*
                }
            }
        }

        impl core::error::Error for $name {}
    };

    // Helper to generate patterns
    (@pattern $variant:ident ($inner:ty) $bind:ident) => { Self::$variant($bind) };
    (@pattern $variant:ident $bind:ident) => { Self::$variant };

    // Helper to pick the errno: explicit name wins, otherwise delegate inward
    (@errno [] [$errno:ident] $bind:ident) => { $crate::errno::$errno };
    (@errno [$inner:ty] [] $bind:ident) => { $crate::Errno::errno($bind) };
    (@errno [$inner:ty] [$errno:ident] $bind:ident) => {{
        let _ = $bind;
        $crate::errno::$errno
    }};
    (@errno [] [] $bind:ident) => {
        compile_error!("simple error variants must name an errno")
    };

    // Helper to generate display bodies
    (@display_body $self:ident $f:ident $desc:literal ($inner:ty) $bind:ident) => {
        write!($f, "E{:04X}: {} ({})", $self.code(), $desc, $bind)
    };
    (@display_body $self:ident $f:ident $desc:literal $bind:ident) => {
        write!($f, "E{:04X}: {}", $self.code(), $desc)
    };
}
