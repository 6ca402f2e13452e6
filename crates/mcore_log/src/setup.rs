//! Install a stderr logger in a measurement-core binary (the `info` tool, test harnesses, …).

use std::sync::Once;

/// Directs [`log`] calls to stderr. Idempotent: safe to call from every subsystem's init path.
pub fn setup_native_logging() {
    fn setup() {
        if cfg!(debug_assertions) && std::env::var("RUST_BACKTRACE").is_err() {
            std::env::set_var("RUST_BACKTRACE", "1");
        }

        crate::multi_logger::init().expect("failed to install multi logger");

        let log_filter = crate::default_log_filter();
        if log_filter.contains("trace") {
            log::set_max_level(log::LevelFilter::Trace);
        } else if log_filter.contains("debug") {
            log::set_max_level(log::LevelFilter::Debug);
        } else {
            log::set_max_level(log::LevelFilter::Info);
        }

        let mut stderr_logger = env_logger::Builder::new();
        stderr_logger.parse_filters(&log_filter);
        crate::add_boxed_logger(Box::new(stderr_logger.build()))
            .expect("failed to install stderr logger");

        if env_var_bool("MCORE_PANIC_ON_WARN") == Some(true) {
            crate::add_boxed_logger(Box::new(PanicOnWarn {}))
                .expect("failed to enable MCORE_PANIC_ON_WARN");
            crate::info!("MCORE_PANIC_ON_WARN: any warning or error will cause a panic.");
        }
    }

    static START: Once = Once::new();
    START.call_once(setup);
}

fn env_var_bool(name: &str) -> Option<bool> {
    std::env::var(name).ok().and_then(|s| match s.to_lowercase().as_str() {
        "0" | "false" | "off" | "no" => Some(false),
        "1" | "true" | "on" | "yes" => Some(true),
        _ => {
            crate::warn!(
                "invalid value for environment variable {name}={s:?}, expected 'on' or 'off'; ignoring"
            );
            None
        }
    })
}

struct PanicOnWarn {}

impl log::Log for PanicOnWarn {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        matches!(metadata.level(), log::Level::Error | log::Level::Warn)
    }

    fn log(&self, record: &log::Record<'_>) {
        let level = match record.level() {
            log::Level::Error => "error",
            log::Level::Warn => "warning",
            log::Level::Info | log::Level::Debug | log::Level::Trace => return,
        };
        panic!("{level} logged with MCORE_PANIC_ON_WARN: {}", record.args());
    }

    fn flush(&self) {}
}
