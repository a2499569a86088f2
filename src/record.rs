//! CSV row types shared by every pass, plus timestamp and scaling helpers.
//!
//! Field order in these structs IS the CSV column order. Round ids are
//! 128-bit because live feeds pack the phase id into the high bits of
//! `roundId`, which overflows `u64`.

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};

/// One oracle round as found in a raw feed dump or raw CSV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedRecord {
    pub round_id: u128,
    pub answer: i128,
    pub started_at: i64,
    pub updated_at: i64,
    pub answered_in_round: u128,
    pub phase_id: u32,
    pub aggregator_round_id: u64,
}

/// One row of a compacted feed CSV: the raw record minus
/// `startedAt`/`answeredInRound`, plus the derived `dateTimeAt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactRecord {
    pub round_id: u128,
    pub answer: i128,
    pub updated_at: i64,
    pub phase_id: u32,
    pub aggregator_round_id: u64,
    pub date_time_at: String,
}

/// Scales a human-readable exchange rate into the feed's fixed-point
/// integer representation, truncating like the original tooling did.
pub fn scale_to_int(value: f64, decimals: u32) -> i128 {
    (value * 10f64.powi(decimals as i32)) as i128
}

/// The fixed-point representation of 1.0 at the given resolution.
pub fn unit_value(decimals: u32) -> i128 {
    10i128.pow(decimals)
}

/// Converts a Unix timestamp to local wall-clock time.
pub fn local_datetime(ts: i64) -> Result<NaiveDateTime> {
    match Local.timestamp_opt(ts, 0) {
        chrono::LocalResult::Single(dt) => Ok(dt.naive_local()),
        _ => bail!("timestamp {ts} out of range"),
    }
}

/// Formats `updatedAt` the way the compacted CSV stores it.
pub fn date_time_at(updated_at: i64) -> Result<String> {
    Ok(local_datetime(updated_at)?.format("%Y-%m-%d %H:%M:%S").to_string())
}

/// Parses a `dateTimeAt` column value back into a timestamp for plotting.
pub fn parse_date_time_at(value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .with_context(|| format!("invalid dateTimeAt {value:?}"))
}
