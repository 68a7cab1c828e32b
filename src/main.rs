use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use watermeter_report::models::{DateRange, PortId, Reading, SeriesSet};
use watermeter_report::{aggregate, export, filter, series, sheet, AppError, Config, Result};

#[derive(Parser)]
#[command(name = "watermeter-report")]
#[command(about = "Convert water-meter telemetry exports into consumption reports", long_about = None)]
struct Cli {
    /// Path to a YAML config file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a telemetry sheet into the consumption CSV
    Convert {
        /// Path to the exported .csv or .xlsx file
        input: PathBuf,
        /// Range start, YYYY-MM-DD or RFC 3339 (defaults to earliest reading)
        #[arg(long)]
        start: Option<String>,
        /// Range end, YYYY-MM-DD or RFC 3339 (defaults to latest reading)
        #[arg(long)]
        end: Option<String>,
        /// Output file; "-" writes to stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the ports observed in a telemetry sheet
    Ports {
        /// Path to the exported .csv or .xlsx file
        input: PathBuf,
        /// Emit JSON instead of plain text
        #[arg(long)]
        json: bool,
    },
    /// Print daily consumption totals for one port
    Summary {
        /// Path to the exported .csv or .xlsx file
        input: PathBuf,
        /// Port to summarize (defaults to the first observed port)
        #[arg(long)]
        port: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        /// Emit JSON instead of plain text
        #[arg(long)]
        json: bool,
    },
    /// Print the filtered readings table for one port
    Table {
        /// Path to the exported .csv or .xlsx file
        input: PathBuf,
        /// Port to show (defaults to the first observed port)
        #[arg(long)]
        port: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Convert {
            input,
            start,
            end,
            output,
        } => {
            let set = load_series(&input, &config).await?;
            let range = resolve_range(&set, start.as_deref(), end.as_deref())?;
            let daily = aggregate::daily_by_port(&set, &range);
            let text = export::write_csv(&set, &range, &daily)?;

            let line_count = text.lines().count().saturating_sub(1);
            if line_count == 0 {
                warn!("no readings fall within the selected range");
            }

            let output =
                output.unwrap_or_else(|| PathBuf::from(config.export.output.clone()));
            if output.as_os_str() == "-" {
                print!("{text}");
            } else {
                std::fs::write(&output, &text).map_err(AppError::Io)?;
                info!(path = %output.display(), rows = line_count, "export written");
            }
        }
        Commands::Ports { input, json } => {
            let set = load_series(&input, &config).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&set.port_ids())?);
            } else {
                for port in set.port_ids() {
                    let readings = set.get(&port).map(|s| s.len()).unwrap_or(0);
                    println!("Port {port} ({readings} readings)");
                }
            }
        }
        Commands::Summary {
            input,
            port,
            start,
            end,
            json,
        } => {
            let set = load_series(&input, &config).await?;
            let range = resolve_range(&set, start.as_deref(), end.as_deref())?;
            let port = resolve_port(&set, port.as_deref())?;
            let visible = port_window(&set, &port, &range)?;

            let summaries = aggregate::aggregate_daily(&visible);
            if json {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else {
                println!("Daily consumption for port {port} (litres):");
                for summary in summaries {
                    println!("{}  {:.1}", summary.day, summary.total_consumption);
                }
            }
        }
        Commands::Table {
            input,
            port,
            start,
            end,
        } => {
            let set = load_series(&input, &config).await?;
            let range = resolve_range(&set, start.as_deref(), end.as_deref())?;
            let port = resolve_port(&set, port.as_deref())?;
            let visible = port_window(&set, &port, &range)?;

            let summaries = aggregate::aggregate_daily(&visible);
            println!(
                "{:<25} {:>14} {:>14} {:>6} {:>9} {:>14}",
                "Timestamp", "Forward Flow", "Consumption", "Port", "Battery", "Daily Total"
            );
            for reading in &visible {
                let day = reading.time.date_naive();
                let daily_value = summaries
                    .iter()
                    .find(|s| s.day == day)
                    .map(|s| s.total_consumption)
                    .unwrap_or(0.0);
                println!(
                    "{:<25} {:>14.1} {:>14.1} {:>6} {:>8.2}V {:>14.1}",
                    reading.time.to_rfc3339(),
                    reading.forward_flow,
                    reading.water_consumption,
                    reading.port,
                    reading.battery_level,
                    daily_value
                );
            }
        }
    }

    Ok(())
}

/// Validate, read and ingest the input file into per-port series.
///
/// The file read is the pipeline's only suspension point; everything after
/// it operates on the in-memory grid.
async fn load_series(path: &Path, config: &Config) -> Result<SeriesSet> {
    let format = sheet::validate_upload(path)?;
    let bytes = tokio::fs::read(path).await?;
    let rows = sheet::parse_sheet(&bytes, format)?;
    let set = series::build(&rows, &config.sheet);

    if set.dropped_rows > 0 {
        warn!(dropped = set.dropped_rows, "some rows were malformed and skipped");
    }
    if set.is_empty() {
        return Err(AppError::NoData(
            "the sheet contains no valid readings".to_string(),
        ));
    }
    info!(
        ports = set.ports.len(),
        readings = set.total_readings(),
        "sheet ingested"
    );
    Ok(set)
}

/// The selection window: user bounds where given, the observed min/max
/// otherwise.
fn resolve_range(set: &SeriesSet, start: Option<&str>, end: Option<&str>) -> Result<DateRange> {
    let observed = set
        .date_range()
        .ok_or_else(|| AppError::NoData("the sheet contains no valid readings".to_string()))?;
    let start = match start {
        Some(value) => parse_bound(value, false)?,
        None => observed.start,
    };
    let end = match end {
        Some(value) => parse_bound(value, true)?,
        None => observed.end,
    };
    DateRange::new(start, end)
}

/// Parse a CLI date bound. Bare dates cover the whole day they name: the
/// start bound becomes midnight, the end bound the day's last second.
fn parse_bound(value: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        AppError::Validation(format!(
            "Invalid date '{value}', expected YYYY-MM-DD or RFC 3339"
        ))
    })?;
    let time = if end_of_day {
        NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
    } else {
        NaiveTime::MIN
    };
    Ok(Utc.from_utc_datetime(&date.and_time(time)))
}

/// The filtered view of one port; an empty window is surfaced as an
/// explicit no-data condition.
fn port_window(set: &SeriesSet, port: &PortId, range: &DateRange) -> Result<Vec<Reading>> {
    let series = set
        .get(port)
        .ok_or_else(|| AppError::NoData(format!("port {port} has no readings")))?;
    let visible = filter::filter_range(&series.readings, range);
    if visible.is_empty() {
        return Err(AppError::NoData(format!(
            "port {port} has no readings in the selected range"
        )));
    }
    Ok(visible)
}

/// The port addressed by the command: an explicit `--port` must exist in
/// the sheet; otherwise the first observed port is used.
fn resolve_port(set: &SeriesSet, port: Option<&str>) -> Result<PortId> {
    match port {
        Some(value) => {
            let port = PortId::from_text(value.trim());
            if set.get(&port).is_some() {
                Ok(port)
            } else {
                Err(AppError::NoData(format!("port {port} has no readings")))
            }
        }
        None => set
            .port_ids()
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NoData("the sheet contains no ports".to_string())),
    }
}
