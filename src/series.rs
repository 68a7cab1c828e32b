//! Building per-port reading series from a raw sheet grid.
//!
//! Input order is taken as chronological; readings are never re-sorted, so
//! consumption deltas always relate a reading to the one the feed emitted
//! before it. Out-of-order timestamps are logged but left alone.

use crate::config::SheetLayout;
use crate::decode::decode_forward_flow;
use crate::models::{CellValue, PortId, PortSeries, Reading, SeriesSet};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Running build state for one port. The previous forward-flow value only
/// exists while the series is being built.
struct PortAccumulator {
    series: PortSeries,
    previous_forward_flow: Option<f64>,
}

impl PortAccumulator {
    fn new(port: PortId) -> Self {
        Self {
            series: PortSeries::new(port),
            previous_forward_flow: None,
        }
    }
}

/// Fold the raw grid into per-port series.
///
/// Row 0 is always discarded as the header. A row is accepted only when its
/// timestamp cell parses and its payload cell is text that decodes; anything
/// else is dropped and counted without touching any port's running state.
pub fn build(rows: &[Vec<CellValue>], layout: &SheetLayout) -> SeriesSet {
    let mut accumulators: BTreeMap<PortId, PortAccumulator> = BTreeMap::new();
    let mut set = SeriesSet::default();

    for (index, row) in rows.iter().enumerate() {
        if index == 0 {
            continue;
        }

        let Some(time) = cell(row, layout.timestamp_col).and_then(CellValue::as_timestamp)
        else {
            set.dropped_rows += 1;
            debug!(row = index, "dropping row without a parseable timestamp");
            continue;
        };
        let Some(payload) = cell(row, layout.payload_col).and_then(CellValue::as_text) else {
            set.dropped_rows += 1;
            debug!(row = index, "dropping row without a text payload");
            continue;
        };
        let forward_flow = match decode_forward_flow(payload) {
            Ok(value) => value,
            Err(e) => {
                set.dropped_rows += 1;
                debug!(row = index, error = %e, "dropping row with an undecodable payload");
                continue;
            }
        };

        let port = cell(row, layout.port_col)
            .and_then(PortId::from_cell)
            .unwrap_or(PortId::Number(layout.default_port));

        let acc = accumulators
            .entry(port.clone())
            .or_insert_with(|| PortAccumulator::new(port.clone()));

        if let Some(last) = acc.series.readings.last() {
            if time < last.time {
                warn!(
                    row = index,
                    port = %port,
                    "timestamp earlier than the previous reading; keeping input order"
                );
            }
        }

        // Decode divides by 10, the delta multiplies by 10. That asymmetry
        // is the feed's fixed scaling convention.
        let water_consumption = match acc.previous_forward_flow {
            Some(previous) => (forward_flow - previous) * 10.0,
            None => 0.0,
        };

        acc.series.readings.push(Reading {
            time,
            forward_flow,
            water_consumption,
            port: port.clone(),
            battery_level: layout.battery_level,
        });
        acc.previous_forward_flow = Some(forward_flow);

        set.first_seen = Some(match set.first_seen {
            Some(first) => first.min(time),
            None => time,
        });
        set.last_seen = Some(match set.last_seen {
            Some(last) => last.max(time),
            None => time,
        });
    }

    set.ports = accumulators
        .into_iter()
        .map(|(port, acc)| (port, acc.series))
        .collect();
    set
}

fn cell(row: &[CellValue], index: usize) -> Option<&CellValue> {
    row.get(index).filter(|c| !c.is_empty())
}
