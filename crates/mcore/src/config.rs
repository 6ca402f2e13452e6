//! Configuration ingress (spec.md §6, SPEC_FULL.md §1.3): the four environment variables the
//! core consumes, each with a documented default and a parser that never hard-fails.

use std::str::FromStr;

use mcore_timer::Backend;

/// Timer backend selection (`MCORE_TIMER=...`); `Auto` (the default) lets [`resolve`](Self::resolve)
/// choose the most precise backend compiled in, per SPEC_FULL.md §2.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerChoice {
    Auto,
    Tsc,
    ClockGetTimeMonotonic,
    ClockGetTime,
    GetTimeOfDay,
}

impl FromStr for TimerChoice {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s {
            "auto" => Ok(Self::Auto),
            "tsc" => Ok(Self::Tsc),
            "clock_gettime_monotonic" => Ok(Self::ClockGetTimeMonotonic),
            "clock_gettime" => Ok(Self::ClockGetTime),
            "gettimeofday" => Ok(Self::GetTimeOfDay),
            _ => Err(()),
        }
    }
}

impl TimerChoice {
    /// Resolve `Auto` to the most precise backend available on this target, per SPEC_FULL.md
    /// §2.2 ("prefer a true cycle counter over a syscall-backed clock").
    pub fn resolve(self) -> Backend {
        match self {
            Self::Auto if cfg!(target_arch = "x86_64") => Backend::Tsc,
            Self::Auto => Backend::ClockGetTimeMonotonic,
            Self::Tsc => Backend::Tsc,
            Self::ClockGetTimeMonotonic => Backend::ClockGetTimeMonotonic,
            Self::ClockGetTime => Backend::ClockGetTime,
            Self::GetTimeOfDay => Backend::GetTimeOfDay,
        }
    }
}

/// The four configuration variables the core consumes (spec.md §6), mirroring
/// `original_source/src/measurement/scorep_environment.c`'s documented defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub memory_recording: bool,
    pub timer: TimerChoice,
    pub thread_experimental_reuse: bool,
    pub thread_experimental_reuse_always: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            memory_recording: true,
            timer: TimerChoice::Auto,
            thread_experimental_reuse: false,
            thread_experimental_reuse_always: false,
        }
    }
}

fn parse_bool_field(raw: &str, field: &'static str, default: bool) -> bool {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => {
            mcore_err::Recoverable::InvalidConfig { field }.warn();
            default
        }
    }
}

impl Config {
    /// Read `MCORE_MEMORY_RECORDING`, `MCORE_TIMER`, `MCORE_THREAD_EXPERIMENTAL_REUSE`, and
    /// `MCORE_THREAD_EXPERIMENTAL_REUSE_ALWAYS`, falling back to the documented default (with a
    /// warning, never a hard failure) on any value that doesn't parse.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) but sourcing values from an arbitrary lookup function
    /// instead of the process environment, so parsing can be exercised in tests without mutating
    /// global state.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let default = Self::default();

        let timer = match lookup("MCORE_TIMER") {
            Some(raw) => raw.trim().to_ascii_lowercase().parse::<TimerChoice>().unwrap_or_else(|()| {
                mcore_err::Recoverable::InvalidConfig { field: "MCORE_TIMER" }.warn();
                default.timer
            }),
            None => default.timer,
        };

        let bool_field = |name: &'static str, current_default: bool| match lookup(name) {
            Some(raw) => parse_bool_field(&raw, name, current_default),
            None => current_default,
        };

        Self {
            memory_recording: bool_field("MCORE_MEMORY_RECORDING", default.memory_recording),
            timer,
            thread_experimental_reuse: bool_field(
                "MCORE_THREAD_EXPERIMENTAL_REUSE",
                default.thread_experimental_reuse,
            ),
            thread_experimental_reuse_always: bool_field(
                "MCORE_THREAD_EXPERIMENTAL_REUSE_ALWAYS",
                default.thread_experimental_reuse_always,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_scorep_environment_defaults() {
        let config = Config::default();
        assert!(config.memory_recording);
        assert_eq!(config.timer, TimerChoice::Auto);
        assert!(!config.thread_experimental_reuse);
        assert!(!config.thread_experimental_reuse_always);
    }

    #[test]
    fn auto_resolves_to_a_platform_backend() {
        let backend = TimerChoice::Auto.resolve();
        if cfg!(target_arch = "x86_64") {
            assert_eq!(backend, Backend::Tsc);
        } else {
            assert_eq!(backend, Backend::ClockGetTimeMonotonic);
        }
    }

    #[test]
    fn from_lookup_parses_every_field() {
        let values = std::collections::HashMap::from([
            ("MCORE_MEMORY_RECORDING", "false"),
            ("MCORE_TIMER", "clock_gettime"),
            ("MCORE_THREAD_EXPERIMENTAL_REUSE", "true"),
            ("MCORE_THREAD_EXPERIMENTAL_REUSE_ALWAYS", "1"),
        ]);
        let config = Config::from_lookup(|name| values.get(name).map(|v| v.to_string()));
        assert!(!config.memory_recording);
        assert_eq!(config.timer, TimerChoice::ClockGetTime);
        assert!(config.thread_experimental_reuse);
        assert!(config.thread_experimental_reuse_always);
    }

    #[test]
    fn an_unparseable_value_falls_back_to_the_default_instead_of_failing() {
        let values = std::collections::HashMap::from([("MCORE_TIMER", "not_a_backend")]);
        let config = Config::from_lookup(|name| values.get(name).map(|v| v.to_string()));
        assert_eq!(config.timer, TimerChoice::Auto);
    }
}
