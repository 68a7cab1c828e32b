//! CSV serialization of filtered readings with their daily totals.

use crate::error::Result;
use crate::models::{DailySummary, DateRange, PortId, SeriesSet};
use anyhow::anyhow;
use std::collections::BTreeMap;

pub const EXPORT_HEADER: [&str; 6] = [
    "Timestamp",
    "Forward Flow (Litres)",
    "Water Consumption (Litres)",
    "Port",
    "Battery Level",
    "Daily Consumption (Litres)",
];

/// Serialize every in-range reading across all ports into CSV text.
///
/// Ports appear in their natural order, readings in series order. The
/// daily-consumption column is matched by calendar day against that port's
/// summaries; a reading whose day has no summary gets 0. Timestamps are
/// RFC 3339 so the export stays machine-readable regardless of locale.
pub fn write_csv(
    set: &SeriesSet,
    range: &DateRange,
    daily: &BTreeMap<PortId, Vec<DailySummary>>,
) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(EXPORT_HEADER)?;

    for (port, series) in &set.ports {
        let summaries = daily.get(port).map(Vec::as_slice).unwrap_or(&[]);
        for reading in series.readings.iter().filter(|r| range.contains(r.time)) {
            let reading_day = reading.time.date_naive();
            let daily_value = summaries
                .iter()
                .find(|s| s.day == reading_day)
                .map(|s| s.total_consumption)
                .unwrap_or(0.0);

            writer.write_record(&[
                reading.time.to_rfc3339(),
                reading.forward_flow.to_string(),
                reading.water_consumption.to_string(),
                port.to_string(),
                reading.battery_level.to_string(),
                daily_value.to_string(),
            ])?;
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow!("finalizing csv writer: {e}"))?;
    String::from_utf8(bytes).map_err(|e| anyhow!("csv output is not utf-8: {e}").into())
}
