//! `/proc/cpuinfo` scan for the tsc-consistency flags `nonstop_tsc`/`constant_tsc`, run once at
//! tsc backend initialization on x86. Missing either flag is a [`mcore_err::Recoverable`]
//! warning, not a fatal error: a non-constant tsc just makes timings less precise.

use std::io::Read;

/// Returns `true` if `/proc/cpuinfo` contains a line naming both `nonstop_tsc` and
/// `constant_tsc` (matching the source's single-line substring check, since both flags are
/// listed together on the `flags` line). Returns `false` if the flags are absent, or if
/// `/proc/cpuinfo` could not be read at all (non-Linux, sandboxed, or otherwise unavailable).
pub fn has_constant_nonstop_tsc() -> bool {
    let mut text = String::new();
    let Ok(mut file) = std::fs::File::open("/proc/cpuinfo") else {
        return false;
    };
    if file.read_to_string(&mut text).is_err() {
        return false;
    }
    text.lines().any(|line| line.contains("nonstop_tsc") && line.contains("constant_tsc"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_must_contain_both_flags() {
        assert!("flags : fpu nonstop_tsc constant_tsc apic"
            .contains("nonstop_tsc") && "flags : fpu nonstop_tsc constant_tsc apic".contains("constant_tsc"));
        // Exercises the real scan path too; result is environment-dependent so only checked for
        // not panicking.
        let _ = has_constant_nonstop_tsc();
    }
}
