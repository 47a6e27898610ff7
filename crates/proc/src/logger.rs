//! Kernel logger.
//!
//! Implements the `log::Log` trait and routes records to whatever console
//! the embedding kernel registers (a serial port on hardware, stdout or a
//! capture buffer on the host). Supports runtime log level filtering.

use core::fmt;

use log::{LevelFilter, Metadata, Record};
use los_utils::Once;

/// Output sink for log lines.
pub trait Console: Sync {
    fn write_line(&self, args: fmt::Arguments<'_>);
}

static CONSOLE: Once<&'static dyn Console> = Once::new();

/// Global logger instance
static LOGGER: KernelLogger = KernelLogger;

struct KernelLogger;

impl log::Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Some(console) = CONSOLE.get() {
            console.write_line(format_args!("{:<5} {}", record.level(), record.args()));
        }
    }

    fn flush(&self) {}
}

/// Initialize the logger.
///
/// The first registered console wins; later calls only adjust the level.
///
/// # Arguments
/// * `console` - Where formatted lines are written.
/// * `max_level` - The maximum log level to display.
pub fn init(console: &'static dyn Console, max_level: LevelFilter) -> Result<(), log::SetLoggerError> {
    CONSOLE.call_once(|| console);
    log::set_max_level(max_level);
    log::set_logger(&LOGGER)
}

/// Trace a syscall entry; compiled out unless `verbose-syscalls` is enabled.
#[macro_export]
macro_rules! syscall_trace {
    ($($arg:tt)*) => {
        #[cfg(feature = "verbose-syscalls")]
        {
            log::trace!($($arg)*);
        }
    };
}
