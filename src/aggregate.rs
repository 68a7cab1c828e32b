//! Calendar-day bucketing of consumption values.

use crate::filter::filter_range;
use crate::models::{DailySummary, DateRange, PortId, Reading, SeriesSet};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use std::collections::BTreeMap;

fn day_start(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN))
}

/// Bucket an already-filtered, ordered reading sequence into calendar-day
/// totals.
///
/// The running bucket opens at the first reading's midnight. A reading
/// outside the bucket's 24-hour window closes it and opens a new bucket at
/// that reading's own day, so a multi-day gap collapses into a single new
/// bucket rather than a walk through the empty days. The final bucket is
/// always emitted, including the single-reading case.
pub fn aggregate_daily(readings: &[Reading]) -> Vec<DailySummary> {
    let mut summaries = Vec::new();
    let Some(first) = readings.first() else {
        return summaries;
    };

    let mut bucket_day = first.time.date_naive();
    let mut total = 0.0;

    for reading in readings {
        let start = day_start(bucket_day);
        if reading.time >= start && reading.time < start + Duration::hours(24) {
            total += reading.water_consumption;
        } else {
            summaries.push(DailySummary {
                day: bucket_day,
                total_consumption: total,
            });
            bucket_day = reading.time.date_naive();
            total = reading.water_consumption;
        }
    }

    summaries.push(DailySummary {
        day: bucket_day,
        total_consumption: total,
    });
    summaries
}

/// Recompute daily summaries for every port against a visible window.
///
/// Summaries always derive from the filtered sequence; they are never
/// cached across window changes.
pub fn daily_by_port(
    set: &SeriesSet,
    range: &DateRange,
) -> BTreeMap<PortId, Vec<DailySummary>> {
    set.ports
        .iter()
        .map(|(port, series)| {
            let visible = filter_range(&series.readings, range);
            (port.clone(), aggregate_daily(&visible))
        })
        .collect()
}
