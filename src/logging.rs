//! Conditional logging macros gated on a module-level `ENABLE_LOGS` flag.
//!
//! Modules that want verbose logging define `const ENABLE_LOGS: bool`
//! and use the crate-root macros:
//!
//! ```rust
//! const ENABLE_LOGS: bool = true;
//! use readlens::{log_info, log_warn};
//!
//! log_info!("processing node {}", 3);
//! # let _ = ENABLE_LOGS;
//! ```

/// Initialize env_logger (reads RUST_LOG, defaults to Info).
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}

/// Info logging, compiled out of hot paths when the module flag is false.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// Warn logging gated on the module's `ENABLE_LOGS` const.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// Error logging gated on the module's `ENABLE_LOGS` const.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}
