//! Depeg detection: a two-threshold hysteresis state machine over a
//! sorted, compacted feed.
//!
//! A record at or below the trigger threshold opens an interval; recovery
//! is only evaluated on later records, and the first one at or above the
//! recover threshold closes it. A feed ending mid-depeg force-closes the
//! interval at the last seen `updatedAt`, marked unresolved.

use serde::Serialize;
use tracing::{info, warn};

use crate::record::{CompactRecord, scale_to_int};

const SECONDS_PER_DAY: i64 = 24 * 3600;

/// Detection thresholds as supplied on the command line.
#[derive(Debug, Clone, Copy)]
pub struct DepegConfig {
    pub decimals: u32,
    pub trigger_value: f64,
    pub recover_value: f64,
}

impl DepegConfig {
    /// Scales the thresholds into fixed-point integers.
    ///
    /// The documented convention is `trigger_value < recover_value`; an
    /// inverted pair is flagged here but accepted, since the original
    /// tooling shipped inverted defaults.
    pub fn thresholds(&self) -> DepegThresholds {
        let thresholds = DepegThresholds {
            trigger_value: scale_to_int(self.trigger_value, self.decimals),
            recover_value: scale_to_int(self.recover_value, self.decimals),
        };
        if thresholds.trigger_value >= thresholds.recover_value {
            warn!(
                trigger_value = %thresholds.trigger_value,
                recover_value = %thresholds.recover_value,
                "trigger threshold at or above recover threshold, hysteresis is inverted"
            );
        }
        thresholds
    }
}

/// Fixed-point detection thresholds.
#[derive(Debug, Clone, Copy)]
pub struct DepegThresholds {
    pub trigger_value: i128,
    pub recover_value: i128,
}

/// One depeg period. `resolved` is false when the feed ended while still
/// below the recover threshold and the close was forced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DepegInterval {
    pub triggered_at: i64,
    pub recovered_at: i64,
    pub ticks: u64,
    pub resolved: bool,
}

impl DepegInterval {
    pub fn duration(&self) -> i64 {
        self.recovered_at - self.triggered_at
    }

    /// Whether the interval lasted at least `max_duration` days.
    pub fn exceeds_days(&self, max_duration: i64) -> bool {
        self.duration() >= max_duration * SECONDS_PER_DAY
    }
}

/// Renders a duration in seconds as `{days}d {hours}:{minutes}:{seconds}`.
pub fn format_duration(seconds: i64) -> String {
    let minutes = seconds / 60;
    let hours = seconds / 3600;
    let days = seconds / SECONDS_PER_DAY;

    let remaining_hours = hours - days * 24;
    let remaining_minutes = minutes - hours * 60;
    let remaining_seconds = seconds % 60;

    format!("{days}d {remaining_hours}:{remaining_minutes}:{remaining_seconds}")
}

/// Runs the hysteresis state machine over records sorted by `roundId`,
/// returning every interval in trigger order.
pub fn detect_depegs(records: &[CompactRecord], thresholds: &DepegThresholds) -> Vec<DepegInterval> {
    let mut depegs = Vec::new();
    let mut open: Option<(i64, u64)> = None;
    let mut last_updated_at = 0i64;

    for rec in records {
        open = match open {
            None if rec.answer <= thresholds.trigger_value => {
                info!(
                    round_id = %rec.round_id,
                    answer = %rec.answer,
                    trigger = %thresholds.trigger_value,
                    date_time_at = %rec.date_time_at,
                    "TRIGGER"
                );
                Some((rec.updated_at, 0))
            }
            None => None,
            Some((triggered_at, ticks)) => {
                if rec.answer >= thresholds.recover_value {
                    let duration = rec.updated_at - triggered_at;
                    info!(
                        duration = %format_duration(duration),
                        ticks,
                        round_id = %rec.round_id,
                        answer = %rec.answer,
                        date_time_at = %rec.date_time_at,
                        "RECOVER"
                    );
                    depegs.push(DepegInterval {
                        triggered_at,
                        recovered_at: rec.updated_at,
                        ticks,
                        resolved: true,
                    });
                    None
                } else {
                    Some((triggered_at, ticks + 1))
                }
            }
        };
        last_updated_at = rec.updated_at;
    }

    if let Some((triggered_at, ticks)) = open {
        warn!(
            duration = %format_duration(last_updated_at - triggered_at),
            ticks,
            "depeg unresolved at end of data, closing at last updatedAt"
        );
        depegs.push(DepegInterval {
            triggered_at,
            recovered_at: last_updated_at,
            ticks,
            resolved: false,
        });
    }

    depegs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::date_time_at;

    // scale 1: answers are plain integers
    fn thresholds(trigger_value: i128, recover_value: i128) -> DepegThresholds {
        DepegThresholds {
            trigger_value,
            recover_value,
        }
    }

    fn feed(answers: &[i128]) -> Vec<CompactRecord> {
        answers
            .iter()
            .enumerate()
            .map(|(i, &answer)| {
                let updated_at = 1000 + i as i64 * 100;
                CompactRecord {
                    round_id: (1u128 << 64) + 1 + i as u128,
                    answer,
                    updated_at,
                    phase_id: 1,
                    aggregator_round_id: 1 + i as u64,
                    date_time_at: date_time_at(updated_at).unwrap(),
                }
            })
            .collect()
    }

    #[test]
    fn test_hysteresis_single_interval() {
        let records = feed(&[100, 99, 94, 96, 100]);
        let depegs = detect_depegs(&records, &thresholds(99, 95));
        assert_eq!(
            depegs,
            vec![DepegInterval {
                triggered_at: 1100,
                recovered_at: 1300,
                ticks: 1,
                resolved: true,
            }]
        );
    }

    #[test]
    fn test_trigger_row_is_not_recovery_checked() {
        // the triggering record itself sits above the recover threshold;
        // recovery must wait for the next record
        let records = feed(&[100, 99, 100]);
        let depegs = detect_depegs(&records, &thresholds(99, 95));
        assert_eq!(depegs.len(), 1);
        assert_eq!(depegs[0].triggered_at, 1100);
        assert_eq!(depegs[0].recovered_at, 1200);
        assert_eq!(depegs[0].ticks, 0);
        assert!(depegs[0].resolved);
    }

    #[test]
    fn test_trigger_on_equality() {
        let records = feed(&[100, 99]);
        let depegs = detect_depegs(&records, &thresholds(99, 95));
        assert_eq!(depegs.len(), 1);
        assert!(!depegs[0].resolved);
    }

    #[test]
    fn test_recover_on_equality() {
        let records = feed(&[100, 90, 95]);
        let depegs = detect_depegs(&records, &thresholds(94, 95));
        // 90 triggers, 95 recovers exactly at the threshold
        assert_eq!(depegs.len(), 1);
        assert!(depegs[0].resolved);
        assert_eq!(depegs[0].recovered_at, 1200);
    }

    #[test]
    fn test_unresolved_at_end_of_feed() {
        let records = feed(&[100, 90, 91, 92]);
        let depegs = detect_depegs(&records, &thresholds(94, 95));
        assert_eq!(
            depegs,
            vec![DepegInterval {
                triggered_at: 1100,
                recovered_at: 1300,
                ticks: 2,
                resolved: false,
            }]
        );
    }

    #[test]
    fn test_multiple_intervals() {
        let records = feed(&[100, 90, 96, 100, 89, 97, 100]);
        let depegs = detect_depegs(&records, &thresholds(94, 95));
        assert_eq!(depegs.len(), 2);
        assert_eq!(depegs[0].triggered_at, 1100);
        assert_eq!(depegs[0].recovered_at, 1200);
        assert_eq!(depegs[1].triggered_at, 1400);
        assert_eq!(depegs[1].recovered_at, 1500);
    }

    #[test]
    fn test_quiet_feed_yields_nothing() {
        let records = feed(&[100, 101, 100, 102]);
        assert!(detect_depegs(&records, &thresholds(94, 95)).is_empty());
    }

    #[test]
    fn test_tick_counting() {
        let records = feed(&[100, 90, 91, 92, 93, 96]);
        let depegs = detect_depegs(&records, &thresholds(94, 95));
        assert_eq!(depegs[0].ticks, 3);
    }

    #[test]
    fn test_exceeds_days_boundary() {
        let interval = DepegInterval {
            triggered_at: 0,
            recovered_at: SECONDS_PER_DAY,
            ticks: 0,
            resolved: true,
        };
        assert!(interval.exceeds_days(1));
        assert!(!interval.exceeds_days(2));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0d 0:0:0");
        assert_eq!(format_duration(90_061), "1d 1:1:1");
        assert_eq!(format_duration(86_399), "0d 23:59:59");
    }
}
