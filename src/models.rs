use crate::error::{AppError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Accepted text timestamp formats, tried in order after RFC 3339.
const TIMESTAMP_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// One parsed sheet cell. CSV input only produces `Text` and `Empty`;
/// XLSX input carries the cell type the workbook stored.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    DateTime(NaiveDateTime),
    Empty,
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// The cell's text content, or None for non-text and blank cells.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) if !s.trim().is_empty() => Some(s.trim()),
            _ => None,
        }
    }

    /// Interpret the cell as a timestamp. Naive datetimes are taken as UTC.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            CellValue::DateTime(naive) => Some(Utc.from_utc_datetime(naive)),
            CellValue::Text(s) => parse_timestamp(s.trim()),
            _ => None,
        }
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in TIMESTAMP_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
    }
    None
}

/// Logical channel identifier multiplexed within one export file.
///
/// Numeric ports sort ascending and before named ones, which keeps the
/// export iteration order stable for the usual all-numeric files.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortId {
    Number(i64),
    Name(String),
}

impl PortId {
    /// Port identifier from a sheet cell; None for blank cells.
    pub fn from_cell(cell: &CellValue) -> Option<PortId> {
        match cell {
            CellValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(Self::from_text(trimmed))
                }
            }
            CellValue::Number(n) if n.fract() == 0.0 => Some(PortId::Number(*n as i64)),
            CellValue::Number(n) => Some(PortId::Name(n.to_string())),
            _ => None,
        }
    }

    pub fn from_text(value: &str) -> PortId {
        match value.parse::<i64>() {
            Ok(n) => PortId::Number(n),
            Err(_) => PortId::Name(value.to_string()),
        }
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortId::Number(n) => write!(f, "{}", n),
            PortId::Name(s) => write!(f, "{}", s),
        }
    }
}

/// One decoded meter reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub time: DateTime<Utc>,
    /// Cumulative forward-flow counter in litres.
    pub forward_flow: f64,
    /// Interval delta against the previous reading of the same port.
    pub water_consumption: f64,
    pub port: PortId,
    /// The feed carries no battery telemetry; this is its fixed placeholder.
    pub battery_level: f64,
}

/// All readings of one port, in the order they appeared in the sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortSeries {
    pub port: PortId,
    pub readings: Vec<Reading>,
}

impl PortSeries {
    pub fn new(port: PortId) -> Self {
        Self {
            port,
            readings: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.readings.iter().map(|r| r.time).collect()
    }

    pub fn forward_flows(&self) -> Vec<f64> {
        self.readings.iter().map(|r| r.forward_flow).collect()
    }

    pub fn consumptions(&self) -> Vec<f64> {
        self.readings.iter().map(|r| r.water_consumption).collect()
    }
}

/// Everything built from one ingested sheet.
#[derive(Debug, Clone, Default)]
pub struct SeriesSet {
    pub ports: BTreeMap<PortId, PortSeries>,
    /// Earliest timestamp across all accepted rows, any port.
    pub first_seen: Option<DateTime<Utc>>,
    /// Latest timestamp across all accepted rows, any port.
    pub last_seen: Option<DateTime<Utc>>,
    /// Rows rejected during the build (missing timestamp, bad payload).
    pub dropped_rows: usize,
}

impl SeriesSet {
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn get(&self, port: &PortId) -> Option<&PortSeries> {
        self.ports.get(port)
    }

    pub fn port_ids(&self) -> Vec<PortId> {
        self.ports.keys().cloned().collect()
    }

    pub fn total_readings(&self) -> usize {
        self.ports.values().map(|s| s.len()).sum()
    }

    /// The observed [min, max] window, or None when no row was accepted.
    pub fn date_range(&self) -> Option<DateRange> {
        match (self.first_seen, self.last_seen) {
            (Some(start), Some(end)) => Some(DateRange { start, end }),
            _ => None,
        }
    }
}

/// Inclusive [start, end] selection window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start > end {
            return Err(AppError::Validation(
                "Start date must not be after end date".to_string(),
            ));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }
}

/// Total consumption of all readings falling on one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub day: NaiveDate,
    pub total_consumption: f64,
}
