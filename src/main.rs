//! CLI entry point for the feed auditor.
//!
//! Provides subcommands for ingesting raw feed dumps, compacting them,
//! validating round monotonicity and deltas, detecting depeg intervals,
//! and rendering charts.

use anyhow::Result;
use clap::{Parser, Subcommand};
use feed_auditor::compact::compact_records;
use feed_auditor::depeg::{DepegConfig, DepegInterval, detect_depegs};
use feed_auditor::ingest::dump_to_csv;
use feed_auditor::output::{print_json, print_pretty, read_rows, write_rows};
use feed_auditor::record::{
    CompactRecord, FeedRecord, local_datetime, parse_date_time_at, scale_to_int,
};
use feed_auditor::render::{
    DepegSpan, HistogramChart, PLAIN_SIZE, SERIES_SIZE, SeriesChart, render_histogram,
    render_series,
};
use feed_auditor::scan::{ScanConfig, scan_records};
use std::ffi::OsStr;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer, fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const DECIMALS: u32 = 8;
const MIN_VALUE: f64 = 0.95;
const MAX_DELTA: f64 = 0.015;
const WARN_DELTA: f64 = 0.0025;
const TRIGGER_VALUE: f64 = 0.99;
const RECOVER_VALUE: f64 = 0.95;
const PLOT_MIN_VALUE: f64 = 0.85;
const PLOT_MAX_VALUE: f64 = 1.04;
const MAX_DURATION: i64 = 1;

#[derive(Parser)]
#[command(name = "feed_auditor")]
#[command(about = "A tool to audit and chart oracle price-feed history", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a line-oriented feed dump into raw CSV
    Ingest {
        /// Feed dump input file, or "-" for stdin
        #[arg(value_name = "DUMP")]
        input: String,

        /// Raw CSV file to write
        #[arg(short, long, default_value = "feed.csv")]
        output: String,
    },
    /// Deduplicate a raw feed CSV by monotonic updatedAt
    Compact {
        /// Raw feed CSV input file
        csv_in: String,

        /// Compacted CSV output file
        csv_out: String,
    },
    /// Validate round monotonicity, answer bounds, and per-round deltas
    Validate {
        /// Raw feed CSV input file
        csv: String,

        /// Decimals for exchange rate resolution
        #[arg(long, default_value_t = DECIMALS)]
        decimals: u32,

        /// Lowest acceptable exchange rate
        #[arg(long, default_value_t = MIN_VALUE)]
        min_value: f64,

        /// Maximum delta between two consecutive values
        #[arg(long, default_value_t = MAX_DELTA)]
        max_delta: f64,

        /// Delta between two consecutive values that triggers a warning
        #[arg(long, default_value_t = WARN_DELTA)]
        warn_delta: f64,

        /// Print the scan report to stdout as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Detect depeg intervals and render an annotated time-series chart
    Analyze {
        /// Compacted feed CSV input file
        csv: String,

        /// Decimals for exchange rate resolution
        #[arg(long, default_value_t = DECIMALS)]
        decimals: u32,

        /// Depeg trigger exchange rate
        #[arg(long, default_value_t = TRIGGER_VALUE)]
        trigger_value: f64,

        /// Minimal exchange rate to auto-recover
        #[arg(long, default_value_t = RECOVER_VALUE)]
        recover_value: f64,

        /// Max days allowed below trigger
        #[arg(long, default_value_t = MAX_DURATION)]
        max_duration: i64,

        /// Plot y-axis minimum value
        #[arg(long, default_value_t = PLOT_MIN_VALUE)]
        plot_min_value: f64,

        /// Title for the chart
        #[arg(long)]
        title: Option<String>,

        /// Chart PNG output file
        #[arg(long, default_value = "out.png")]
        png_file: String,

        /// Print detected intervals to stdout as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Plot a compacted feed as a time-series chart
    Plot {
        /// Compacted feed CSV input file
        csv: String,

        /// Chart PNG output file
        png: String,

        /// Title for the chart
        #[arg(long)]
        title: Option<String>,
    },
    /// Render an answer-frequency histogram from a compacted feed
    Histogram {
        /// Compacted feed CSV input file
        csv: String,

        /// Histogram PNG output file
        png: String,

        /// Title for the histogram
        #[arg(long)]
        title: Option<String>,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/feed_auditor.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("feed_auditor.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest { input, output } => ingest(&input, &output),
        Commands::Compact { csv_in, csv_out } => compact(&csv_in, &csv_out),
        Commands::Validate {
            csv,
            decimals,
            min_value,
            max_delta,
            warn_delta,
            json,
        } => validate(
            &csv,
            ScanConfig {
                decimals,
                min_value,
                max_delta,
                warn_delta,
            },
            json,
        ),
        Commands::Analyze {
            csv,
            decimals,
            trigger_value,
            recover_value,
            max_duration,
            plot_min_value,
            title,
            png_file,
            json,
        } => analyze(
            &csv,
            DepegConfig {
                decimals,
                trigger_value,
                recover_value,
            },
            max_duration,
            plot_min_value,
            title.as_deref(),
            &png_file,
            json,
        ),
        Commands::Plot { csv, png, title } => plot(&csv, &png, title.as_deref()),
        Commands::Histogram { csv, png, title } => histogram(&csv, &png, title.as_deref()),
    }
}

fn ingest(input: &str, output: &str) -> Result<()> {
    let out = File::create(output)?;
    let rows = if input == "-" {
        dump_to_csv(std::io::stdin().lock(), out)?
    } else {
        dump_to_csv(BufReader::new(File::open(input)?), out)?
    };
    info!(input, output, rows, "Feed dump ingested");
    Ok(())
}

fn compact(csv_in: &str, csv_out: &str) -> Result<()> {
    let records: Vec<FeedRecord> = read_rows(csv_in)?;
    let summary = compact_records(records)?;
    info!(
        kept = summary.kept.len(),
        dropped = summary.dropped,
        gaps = summary.gaps,
        "Feed compacted"
    );
    write_rows(csv_out, &summary.kept)
}

fn validate(csv: &str, config: ScanConfig, json: bool) -> Result<()> {
    let thresholds = config.thresholds();
    info!(
        min_value = config.min_value,
        scaled = %thresholds.min_value,
        "minValue"
    );
    info!(
        max_delta = config.max_delta,
        scaled = %thresholds.max_delta,
        "maxDelta"
    );
    info!(
        warn_delta = config.warn_delta,
        scaled = %thresholds.warn_delta,
        "warnDelta"
    );

    let mut records: Vec<FeedRecord> = read_rows(csv)?;
    records.sort_by_key(|r| r.round_id);

    let report = scan_records(&records, &config)?;
    print_pretty(&report);
    info!(
        rounds = report.rounds,
        warnings = report.warnings.len(),
        "Feed validated"
    );

    if json {
        print_json(&report)?;
    }
    Ok(())
}

fn analyze(
    csv: &str,
    config: DepegConfig,
    max_duration: i64,
    plot_min_value: f64,
    title: Option<&str>,
    png_file: &str,
    json: bool,
) -> Result<()> {
    let thresholds = config.thresholds();
    info!(
        trigger_value = config.trigger_value,
        scaled = %thresholds.trigger_value,
        "triggerValue"
    );
    info!(
        recover_value = config.recover_value,
        scaled = %thresholds.recover_value,
        "recoverValue"
    );

    let mut records: Vec<CompactRecord> = read_rows(csv)?;
    records.sort_by_key(|r| r.round_id);

    let depegs = detect_depegs(&records, &thresholds);
    info!(depegs = depegs.len(), "Depeg detection finished");

    let points = series_points(&records)?;
    let spans = depeg_spans(&depegs, max_duration)?;
    let chart = SeriesChart {
        title,
        points: &points,
        y_range: Some((
            scale_to_int(plot_min_value, config.decimals) as f64,
            scale_to_int(PLOT_MAX_VALUE, config.decimals) as f64,
        )),
        trigger_line: Some(thresholds.trigger_value as f64),
        recover_line: Some(thresholds.recover_value as f64),
        spans: &spans,
    };
    render_series(&chart, png_file, SERIES_SIZE)?;
    info!(png_file, "Chart written");

    if json {
        print_json(&depegs)?;
    }
    Ok(())
}

fn plot(csv: &str, png: &str, title: Option<&str>) -> Result<()> {
    let mut records: Vec<CompactRecord> = read_rows(csv)?;
    records.sort_by_key(|r| r.round_id);

    let points = series_points(&records)?;
    let chart = SeriesChart {
        title,
        points: &points,
        y_range: None,
        trigger_line: None,
        recover_line: None,
        spans: &[],
    };
    render_series(&chart, png, PLAIN_SIZE)?;
    info!(png, "Chart written");
    Ok(())
}

fn histogram(csv: &str, png: &str, title: Option<&str>) -> Result<()> {
    let records: Vec<CompactRecord> = read_rows(csv)?;
    let values: Vec<f64> = records.iter().map(|r| r.answer as f64).collect();
    let chart = HistogramChart {
        title,
        values: &values,
    };
    render_histogram(&chart, png, PLAIN_SIZE)?;
    info!(png, "Histogram written");
    Ok(())
}

/// Pairs each record's `dateTimeAt` with its answer for plotting.
fn series_points(records: &[CompactRecord]) -> Result<Vec<(chrono::NaiveDateTime, f64)>> {
    records
        .iter()
        .map(|r| Ok((parse_date_time_at(&r.date_time_at)?, r.answer as f64)))
        .collect()
}

/// Converts detected intervals into shaded chart spans, classified by
/// duration against `max_duration` days.
fn depeg_spans(depegs: &[DepegInterval], max_duration: i64) -> Result<Vec<DepegSpan>> {
    depegs
        .iter()
        .map(|d| {
            Ok(DepegSpan {
                from: local_datetime(d.triggered_at)?,
                to: local_datetime(d.recovered_at)?,
                exceeded: d.exceeds_days(max_duration),
            })
        })
        .collect()
}
