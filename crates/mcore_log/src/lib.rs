//! Text logging for the measurement-core crates.
//!
//! * `trace`: spammy things, hot-path instrumentation
//! * `debug`: things that might be useful when debugging a measurement run
//! * `info`: things worth showing a user running the measurement
//! * `warn`: a [recoverable inconsistency](crate) — the operation returned a sentinel and kept going
//! * `error`: a problem that leads to loss of measurement data
//!
//! The `warn_once` etc. macros suppress repeated logging of the exact same message, which
//! matters on a hot path that might otherwise flood stderr once per event.

pub use tracing::{debug, error, info, trace, warn};

pub use log_once::{debug_once, error_once, info_once, trace_once, warn_once};

mod multi_logger;
pub use multi_logger::{add_boxed_logger, add_logger};

#[cfg(feature = "setup")]
mod setup;
#[cfg(feature = "setup")]
pub use setup::setup_native_logging;

pub use log::{Level, LevelFilter};

/// Default log filter used by [`setup_native_logging`], honoring `RUST_LOG` if set.
pub fn default_log_filter() -> String {
    std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_owned())
}

/// Extension trait to log an `Err` as a warning once, and drop it.
pub trait ResultExt<T> {
    /// Log a warning if this is an `Err`, but only the exact same message once.
    fn warn_on_err_once(self, msg: impl std::fmt::Display) -> Option<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn warn_on_err_once(self, msg: impl std::fmt::Display) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(err) => {
                warn_once!("{msg}: {err}");
                None
            }
        }
    }
}
