//! Compaction pass: deduplicates a raw feed by monotonic `updatedAt`.

use anyhow::Result;
use tracing::debug;

use crate::record::{CompactRecord, FeedRecord, date_time_at};

/// Outcome of one compaction pass.
#[derive(Debug, Default)]
pub struct CompactSummary {
    pub kept: Vec<CompactRecord>,
    pub dropped: usize,
    pub gaps: usize,
}

/// Sorts records by `roundId` and keeps each row only if its `updatedAt`
/// has not regressed below the maximum seen so far. Dropped regressions
/// and `roundId` gaps are logged, never fatal.
pub fn compact_records(mut records: Vec<FeedRecord>) -> Result<CompactSummary> {
    records.sort_by_key(|r| r.round_id);

    let mut summary = CompactSummary::default();
    let mut updated_at_max = 0i64;
    let mut round_id_last = 0u128;

    for rec in records {
        if round_id_last != 0 && rec.round_id > round_id_last + 1 {
            debug!(
                round_id = %rec.round_id,
                gap = %(rec.round_id - round_id_last),
                "roundId gap"
            );
            summary.gaps += 1;
        }
        round_id_last = rec.round_id;

        if rec.updated_at < updated_at_max {
            debug!(
                round_id = %rec.round_id,
                gap = updated_at_max - rec.updated_at,
                "updatedAt regression, row dropped"
            );
            summary.dropped += 1;
            continue;
        }

        summary.kept.push(CompactRecord {
            round_id: rec.round_id,
            answer: rec.answer,
            updated_at: rec.updated_at,
            phase_id: rec.phase_id,
            aggregator_round_id: rec.aggregator_round_id,
            date_time_at: date_time_at(rec.updated_at)?,
        });

        if rec.updated_at > updated_at_max {
            updated_at_max = rec.updated_at;
        }
    }

    Ok(summary)
}
