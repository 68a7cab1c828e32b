// End-to-end tests for the conversion pipeline: sheet file -> per-port
// series -> range filter -> daily aggregation -> CSV export.
//
// Fixtures are plain CSV files in the feed's default layout (timestamp in
// column 2, port in column 5, payload in column 6).

use chrono::{DateTime, Utc};
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use watermeter_report::models::{DateRange, PortId};
use watermeter_report::{aggregate, export, filter, series, sheet, Config};

const HEADER: &str = "Device,Meter,Timestamp,Signal,Status,Port,Payload";

fn ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

fn write_fixture(dir: &tempfile::TempDir, name: &str, rows: &[&str]) -> PathBuf {
    let mut content = String::from(HEADER);
    for row in rows {
        content.push('\n');
        content.push_str(row);
    }
    content.push('\n');
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn ingest(path: &PathBuf) -> watermeter_report::models::SeriesSet {
    let config = Config::default();
    let format = sheet::validate_upload(path).unwrap();
    let bytes = std::fs::read(path).unwrap();
    let rows = sheet::parse_sheet(&bytes, format).unwrap();
    series::build(&rows, &config.sheet)
}

#[test]
fn decodes_and_derives_consumption_from_a_csv_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(
        &dir,
        "export.csv",
        &[
            "dev,wm,2024-01-01T00:00:00Z,ok,ok,1,0000000003E8FF",
            "dev,wm,2024-01-01T01:00:00Z,ok,ok,1,00000000044CFF",
        ],
    );

    let set = ingest(&path);
    let series = set.get(&PortId::Number(1)).unwrap();

    assert_eq!(series.forward_flows(), vec![100.0, 110.0]);
    assert_eq!(series.consumptions(), vec![0.0, 100.0]);
    assert_eq!(set.dropped_rows, 0);
}

#[test]
fn filtering_with_the_observed_range_returns_every_reading() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(
        &dir,
        "export.csv",
        &[
            "dev,wm,2024-01-02T00:00:00Z,ok,ok,1,00000000044CFF",
            "dev,wm,2024-01-01T00:00:00Z,ok,ok,1,0000000003E8FF",
            "dev,wm,2024-01-03T00:00:00Z,ok,ok,1,0000000004B0FF",
        ],
    );

    let set = ingest(&path);
    let range = set.date_range().unwrap();
    let series = set.get(&PortId::Number(1)).unwrap();

    let visible = filter::filter_range(&series.readings, &range);
    assert_eq!(visible, series.readings);
}

#[test]
fn malformed_rows_are_dropped_and_the_rest_survive() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(
        &dir,
        "export.csv",
        &[
            "dev,wm,2024-01-01T00:00:00Z,ok,ok,1,0000000003E8FF",
            "dev,wm,,ok,ok,1,00000000044CFF",
            "dev,wm,garbage,ok,ok,1,00000000044CFF",
            "dev,wm,2024-01-01T01:00:00Z,ok,ok,1,short",
            "dev,wm,2024-01-01T02:00:00Z,ok,ok,1,00000000044CFF",
        ],
    );

    let set = ingest(&path);
    let series = set.get(&PortId::Number(1)).unwrap();

    assert_eq!(set.dropped_rows, 3);
    assert_eq!(series.forward_flows(), vec![100.0, 110.0]);
    // The surviving delta skips the dropped rows entirely.
    assert_eq!(series.consumptions(), vec![0.0, 100.0]);
}

#[test]
fn blank_port_cells_default_to_port_one() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(
        &dir,
        "export.csv",
        &[
            "dev,wm,2024-01-01T00:00:00Z,ok,ok,,0000000003E8FF",
            "dev,wm,2024-01-01T01:00:00Z,ok,ok,2,00000000044CFF",
        ],
    );

    let set = ingest(&path);
    assert_eq!(set.port_ids(), vec![PortId::Number(1), PortId::Number(2)]);
}

#[test]
fn daily_totals_follow_the_calendar_days_of_the_visible_window() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(
        &dir,
        "export.csv",
        &[
            // Day 1: 100.0 forward flow, then two deltas of 10 and 20.
            "dev,wm,2024-01-01T06:00:00Z,ok,ok,1,0000000003E8FF",
            "dev,wm,2024-01-01T12:00:00Z,ok,ok,1,0000000003F2FF",
            "dev,wm,2024-01-01T18:00:00Z,ok,ok,1,000000000406FF",
            // Day 2: one more reading, a delta of 30.
            "dev,wm,2024-01-02T06:00:00Z,ok,ok,1,000000000424FF",
        ],
    );

    let set = ingest(&path);
    let range = set.date_range().unwrap();
    let daily = aggregate::daily_by_port(&set, &range);

    let summaries = daily.get(&PortId::Number(1)).unwrap();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].day, "2024-01-01".parse().unwrap());
    assert_eq!(summaries[0].total_consumption, 30.0);
    assert_eq!(summaries[1].day, "2024-01-02".parse().unwrap());
    assert_eq!(summaries[1].total_consumption, 30.0);
}

#[test]
fn export_covers_all_ports_with_daily_lookups() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(
        &dir,
        "export.csv",
        &[
            "dev,wm,2024-01-01T00:00:00Z,ok,ok,1,0000000003E8FF",
            "dev,wm,2024-01-01T01:00:00Z,ok,ok,1,00000000044CFF",
            "dev,wm,2024-01-01T00:30:00Z,ok,ok,2,0000000007D0FF",
            "dev,wm,2024-02-01T00:00:00Z,ok,ok,2,0000000007DAFF",
        ],
    );

    let set = ingest(&path);
    let range = DateRange::new(
        ts("2024-01-01T00:00:00+00:00"),
        ts("2024-01-31T23:59:59+00:00"),
    )
    .unwrap();
    let daily = aggregate::daily_by_port(&set, &range);
    let text = export::write_csv(&set, &range, &daily).unwrap();

    let lines: Vec<&str> = text.lines().collect();
    // Header plus the three January readings; February is filtered out.
    assert_eq!(lines.len(), 4);
    assert_eq!(
        lines[0],
        "Timestamp,Forward Flow (Litres),Water Consumption (Litres),Port,Battery Level,Daily Consumption (Litres)"
    );
    assert_eq!(lines[1], "2024-01-01T00:00:00+00:00,100,0,1,3.65,100");
    assert_eq!(lines[2], "2024-01-01T01:00:00+00:00,110,100,1,3.65,100");
    assert_eq!(lines[3], "2024-01-01T00:30:00+00:00,200,0,2,3.65,0");
}

#[test]
fn a_sheet_with_no_valid_rows_builds_an_empty_set() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(
        &dir,
        "export.csv",
        &["dev,wm,,ok,ok,1,", "dev,wm,nope,ok,ok,1,zzz"],
    );

    let set = ingest(&path);
    assert!(set.is_empty());
    assert!(set.date_range().is_none());
    assert_eq!(set.dropped_rows, 2);
}

#[test]
fn unsupported_extensions_are_rejected_before_parsing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.txt");
    std::fs::write(&path, "anything").unwrap();

    assert!(sheet::validate_upload(&path).is_err());
}
