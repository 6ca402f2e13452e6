//! Cross-process tsc frequency consistency check, run once at finalization after every rank's
//! frequency has been gathered to rank 0. Gathering itself is outside the core's scope (it rides
//! on whatever IPC layer the measurement run is embedded in); this module only does the math on
//! an already-gathered list.

/// Mean of `frequencies`, computed by Welford-style incremental averaging
/// (`avg += (sample - avg) / (n + 1)`) rather than summing and dividing, since CPU frequencies
/// around `2.5e9` summed across thousands of ranks can overflow a `u64` accumulator.
pub fn average_frequency(frequencies: &[u64]) -> u64 {
    let mut avg: f64 = 0.0;
    for (i, &f) in frequencies.iter().enumerate() {
        avg += (f as f64 - avg) / (i as f64 + 1.0);
    }
    avg as u64
}

/// One rank's frequency flagged as differing from the average by more than the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outlier {
    pub rank: usize,
    pub frequency: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlierReport {
    pub average: u64,
    pub threshold: u64,
    pub outliers: Vec<Outlier>,
}

impl OutlierReport {
    pub fn has_outliers(&self) -> bool {
        !self.outliers.is_empty()
    }
}

/// `threshold = max(average / 100_000, 10)`, matching the source's "usually in the order of
/// 10^4, but not below 10 for slow CPUs" acceptance band.
fn threshold_for(average: u64) -> u64 {
    (average / 100_000).max(10)
}

/// Flag every rank whose frequency differs from `average_frequency(frequencies)` by more than
/// `threshold_for(average)`. A single large outlier can pull the average toward it, causing the
/// remaining ranks to read as outliers too — the source has this same property; it is a known
/// property of naive mean-based detection and is called out in `DESIGN.md`.
pub fn detect_outliers(frequencies: &[u64]) -> OutlierReport {
    let average = average_frequency(frequencies);
    let threshold = threshold_for(average);
    let outliers = frequencies
        .iter()
        .enumerate()
        .filter_map(|(rank, &frequency)| {
            let diff = average.abs_diff(frequency);
            (diff > threshold).then_some(Outlier { rank, frequency })
        })
        .collect();
    OutlierReport {
        average,
        threshold,
        outliers,
    }
}
