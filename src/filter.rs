//! Date-range selection over a reading sequence.

use crate::models::{DateRange, Reading};

/// The subsequence of readings whose timestamp lies within the inclusive
/// [start, end] window, in original order. The input is left untouched.
pub fn filter_range(readings: &[Reading], range: &DateRange) -> Vec<Reading> {
    readings
        .iter()
        .filter(|r| range.contains(r.time))
        .cloned()
        .collect()
}
