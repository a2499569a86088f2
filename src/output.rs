//! CSV reading/writing and report printing.

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::File;
use tracing::debug;

/// Reads every row of a headered CSV file into typed records.
pub fn read_rows<T: DeserializeOwned>(path: &str) -> Result<Vec<T>> {
    let file = File::open(path).with_context(|| format!("opening {path}"))?;
    let mut reader = csv::Reader::from_reader(file);

    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row.with_context(|| format!("reading {path}"))?);
    }

    debug!(path, rows = rows.len(), "CSV read");
    Ok(rows)
}

/// Writes records to a CSV file, headers included.
pub fn write_rows<T: Serialize>(path: &str, rows: &[T]) -> Result<()> {
    let mut writer =
        csv::WriterBuilder::new().from_path(path).with_context(|| format!("creating {path}"))?;

    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    debug!(path, rows = rows.len(), "CSV written");
    Ok(())
}

/// Logs a report using Rust's debug pretty-print format.
pub fn print_pretty<T: std::fmt::Debug>(report: &T) {
    debug!("{:#?}", report);
}

/// Prints a report to stdout as pretty-printed JSON.
pub fn print_json<T: Serialize>(report: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::CompactRecord;
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> String {
        format!("{}/{}", env::temp_dir().display(), name)
    }

    fn sample_rows() -> Vec<CompactRecord> {
        vec![
            CompactRecord {
                round_id: (1u128 << 64) + 1,
                answer: 100_000_000,
                updated_at: 1_650_000_000,
                phase_id: 1,
                aggregator_round_id: 1,
                date_time_at: "2022-04-15 06:40:00".to_string(),
            },
            CompactRecord {
                round_id: (1u128 << 64) + 2,
                answer: 99_900_000,
                updated_at: 1_650_003_600,
                phase_id: 1,
                aggregator_round_id: 2,
                date_time_at: "2022-04-15 07:40:00".to_string(),
            },
        ]
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let path = temp_path("feed_auditor_test_roundtrip.csv");
        let _ = fs::remove_file(&path);

        let rows = sample_rows();
        write_rows(&path, &rows).unwrap();
        let back: Vec<CompactRecord> = read_rows(&path).unwrap();
        assert_eq!(rows, back);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_write_rows_emits_compact_header() {
        let path = temp_path("feed_auditor_test_header.csv");
        let _ = fs::remove_file(&path);

        write_rows(&path, &sample_rows()).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(
            content.lines().next(),
            Some("roundId,answer,updatedAt,phaseId,aggregatorRoundId,dateTimeAt")
        );

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_read_rows_missing_file_names_path() {
        let err = read_rows::<CompactRecord>("/nonexistent/feed.csv").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/feed.csv"));
    }

    #[test]
    fn test_read_rows_rejects_malformed_field() {
        let path = temp_path("feed_auditor_test_malformed.csv");
        fs::write(
            &path,
            "roundId,answer,updatedAt,phaseId,aggregatorRoundId,dateTimeAt\n\
             oops,1,2,3,4,2022-01-01 00:00:00\n",
        )
        .unwrap();

        let result = read_rows::<CompactRecord>(&path);
        assert!(result.is_err());

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_print_json_does_not_panic() {
        print_json(&sample_rows()).unwrap();
    }
}
