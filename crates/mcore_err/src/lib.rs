//! Error handling for the measurement core.
//!
//! The core distinguishes exactly three kinds of trouble, never more:
//!
//! 1. **Fatal** programmer/environment errors (out-of-range enum, stack underflow, a missing
//!    subsystem handle, an invariant violation). These abort the process after logging a
//!    diagnostic — see [`fatal`] and [`bug_on`].
//! 2. **Recoverable inconsistencies** (duplicate payload on insert, free of an unknown
//!    allocation, removal of an unregistered handle, an outlier timer frequency). These are
//!    logged as a warning through [`mcore_log`] and the call returns a sentinel — see
//!    [`Recoverable`].
//! 3. **Silent filtering**: a region collapsed onto the shared filtered-region sentinel. This is
//!    not an error at all and has no type here; see `mcore_filter`.
//!
//! There is no retry, no partial result, and no transient-vs-permanent distinction.

/// Format an error together with its full `source()` chain, one arrow per link.
///
/// Always prefer this over `Display`-ing an error directly when the message is user-facing:
/// a bare `{err}` only shows the outermost context and hides the root cause.
pub fn format_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut string = error.to_string();
    for source in std::iter::successors(error.source(), |error| error.source()) {
        string.push_str(" -> ");
        string.push_str(&source.to_string());
    }
    string
}

/// Abort the process with a diagnostic. The only response to a fatal programmer/environment
/// error: an out-of-range enum, a stack underflow, a missing subsystem handle, or any other
/// invariant violation the core itself guarantees will never happen in correct usage.
#[track_caller]
pub fn fatal(message: impl std::fmt::Display) -> ! {
    mcore_log::error!("fatal measurement-core error: {message}");
    panic!("fatal measurement-core error: {message}");
}

/// Abort with a diagnostic if `condition` holds. Mirrors the `UTILS_BUG_ON` idiom: callers read
/// this as "the following can never happen; if it does, something upstream is broken."
#[track_caller]
pub fn bug_on(condition: bool, message: impl std::fmt::Display) {
    if condition {
        fatal(message);
    }
}

/// A recoverable inconsistency: logged once as a warning, the triggering call then returns its
/// documented sentinel (`None`, a zero count, `false`, …) and measurement continues.
///
/// This is deliberately not wired through `?` — callers are expected to match on the sentinel,
/// since the whole point of "recoverable" is that there is no error to propagate.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Recoverable {
    #[error("duplicate payload on insert into {table}, replacing the older entry")]
    DuplicateInsert { table: &'static str },

    #[error("{what} not found")]
    NotFound { what: &'static str },

    #[error("region exited that was never entered")]
    UnbalancedExit,

    #[error("timer frequency outlier: {detail}")]
    TimerOutlier { detail: String },

    #[error("invalid value for {field}, falling back to the default")]
    InvalidConfig { field: &'static str },
}

impl Recoverable {
    /// Log this inconsistency as a warning (deduplicated by call site) and return it so the
    /// caller can still inspect it if useful, while the documented sentinel is what propagates.
    #[track_caller]
    pub fn warn(self) -> Self {
        mcore_log::warn_once!("{self}");
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(thiserror::Error, Debug)]
    #[error("inner")]
    struct Inner;

    #[derive(thiserror::Error, Debug)]
    #[error("outer")]
    struct Outer(#[source] Inner);

    #[test]
    fn format_chain_walks_sources() {
        let err = Outer(Inner);
        assert_eq!(format_chain(&err), "outer -> inner");
    }

    #[test]
    #[should_panic(expected = "fatal measurement-core error: boom")]
    fn fatal_panics() {
        fatal("boom");
    }

    #[test]
    fn bug_on_false_is_a_no_op() {
        bug_on(false, "unreachable");
    }
}
