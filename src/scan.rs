//! Single-pass validation of a sorted feed: monotonicity, value bounds,
//! and per-round delta limits.
//!
//! The scan is a strict left-to-right fold. `ScanState` holds the previous
//! record's values; every check compares the current record against that
//! state, and the first violation aborts with a [`ValidationError`]
//! carrying the offending round id and values.

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::record::{FeedRecord, scale_to_int, unit_value};

/// Scan thresholds as supplied on the command line.
#[derive(Debug, Clone, Copy)]
pub struct ScanConfig {
    pub decimals: u32,
    pub min_value: f64,
    pub max_delta: f64,
    pub warn_delta: f64,
}

impl ScanConfig {
    /// Scales the human-readable thresholds into fixed-point integers.
    pub fn thresholds(&self) -> ScanThresholds {
        ScanThresholds {
            min_value: scale_to_int(self.min_value, self.decimals),
            max_delta: scale_to_int(self.max_delta, self.decimals),
            warn_delta: scale_to_int(self.warn_delta, self.decimals),
        }
    }
}

/// Fixed-point thresholds, comparable directly against `answer`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ScanThresholds {
    pub min_value: i128,
    pub max_delta: i128,
    pub warn_delta: i128,
}

/// A monotonicity, bounds, or delta violation. Halts the scan.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("roundId not incrementing (roundId {round_id}, roundIdLast {round_id_last})")]
    RoundIdNotIncrementing { round_id: u128, round_id_last: u128 },

    #[error("answer outside bounds (roundId {round_id}, answer {answer}, minValue {min_value})")]
    AnswerOutsideBounds {
        round_id: u128,
        answer: i128,
        min_value: i128,
    },

    #[error(
        "answeredInRound not incrementing (roundId {round_id}, answeredInRound {answered_in_round}, answeredInRoundLast {answered_in_round_last})"
    )]
    AnsweredInRoundNotIncrementing {
        round_id: u128,
        answered_in_round: u128,
        answered_in_round_last: u128,
    },

    #[error(
        "startedAt not incrementing (roundId {round_id}, startedAt {started_at}, startedAtLast {started_at_last})"
    )]
    StartedAtNotIncrementing {
        round_id: u128,
        started_at: i64,
        started_at_last: i64,
    },

    #[error(
        "updatedAt not incrementing (roundId {round_id}, updatedAt {updated_at}, updatedAtLast {updated_at_last})"
    )]
    UpdatedAtNotIncrementing {
        round_id: u128,
        updated_at: i64,
        updated_at_last: i64,
    },

    #[error(
        "phaseId unexpectedly changed (roundId {round_id}, phaseId {phase_id}, phaseIdLast {phase_id_last})"
    )]
    PhaseIdChanged {
        round_id: u128,
        phase_id: u32,
        phase_id_last: u32,
    },

    #[error(
        "phaseId not incrementing (roundId {round_id}, phaseId {phase_id}, phaseIdLast {phase_id_last})"
    )]
    PhaseIdNotIncrementing {
        round_id: u128,
        phase_id: u32,
        phase_id_last: u32,
    },

    #[error(
        "answer delta too big (roundId {round_id}, delta {delta}, maxDelta {max_delta}, answer {answer}, answerLast {answer_last})"
    )]
    DeltaTooLarge {
        round_id: u128,
        delta: i128,
        max_delta: i128,
        answer: i128,
        answer_last: i128,
    },
}

/// A large-but-acceptable answer move. Logged, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeltaWarning {
    pub round_id: u128,
    pub delta: i128,
    pub answer: i128,
    pub answer_last: i128,
}

/// Previous-record state threaded through the fold.
#[derive(Debug)]
pub struct ScanState {
    round_id_last: u128,
    answer_last: i128,
    started_at_last: i64,
    updated_at_last: i64,
    answered_in_round_last: u128,
    phase_id_last: u32,
}

impl ScanState {
    /// Initial state: everything zero except `answer_last`, which starts
    /// at the fixed-point representation of 1.0 so the very first record
    /// is delta-checked against parity.
    pub fn new(decimals: u32) -> Self {
        ScanState {
            round_id_last: 0,
            answer_last: unit_value(decimals),
            started_at_last: 0,
            updated_at_last: 0,
            answered_in_round_last: 0,
            phase_id_last: 0,
        }
    }

    /// Applies one record, advancing the state on success. Returns a
    /// [`DeltaWarning`] when the answer moved by at least `warn_delta`.
    pub fn step(
        &mut self,
        rec: &FeedRecord,
        thresholds: &ScanThresholds,
    ) -> Result<Option<DeltaWarning>, ValidationError> {
        if rec.round_id <= self.round_id_last {
            return Err(ValidationError::RoundIdNotIncrementing {
                round_id: rec.round_id,
                round_id_last: self.round_id_last,
            });
        }

        if rec.answer < thresholds.min_value {
            return Err(ValidationError::AnswerOutsideBounds {
                round_id: rec.round_id,
                answer: rec.answer,
                min_value: thresholds.min_value,
            });
        }

        if rec.answered_in_round < self.answered_in_round_last {
            return Err(ValidationError::AnsweredInRoundNotIncrementing {
                round_id: rec.round_id,
                answered_in_round: rec.answered_in_round,
                answered_in_round_last: self.answered_in_round_last,
            });
        }

        if rec.round_id == self.round_id_last + 1 {
            // contiguous round within a phase
            if rec.started_at < self.started_at_last {
                return Err(ValidationError::StartedAtNotIncrementing {
                    round_id: rec.round_id,
                    started_at: rec.started_at,
                    started_at_last: self.started_at_last,
                });
            }
            if rec.updated_at < self.updated_at_last {
                return Err(ValidationError::UpdatedAtNotIncrementing {
                    round_id: rec.round_id,
                    updated_at: rec.updated_at,
                    updated_at_last: self.updated_at_last,
                });
            }
            if rec.phase_id != self.phase_id_last {
                return Err(ValidationError::PhaseIdChanged {
                    round_id: rec.round_id,
                    phase_id: rec.phase_id,
                    phase_id_last: self.phase_id_last,
                });
            }
        } else if rec.phase_id <= self.phase_id_last {
            // a gap is only legal across a phase transition
            return Err(ValidationError::PhaseIdNotIncrementing {
                round_id: rec.round_id,
                phase_id: rec.phase_id,
                phase_id_last: self.phase_id_last,
            });
        }

        let delta = (rec.answer - self.answer_last).abs();
        if delta > thresholds.max_delta {
            return Err(ValidationError::DeltaTooLarge {
                round_id: rec.round_id,
                delta,
                max_delta: thresholds.max_delta,
                answer: rec.answer,
                answer_last: self.answer_last,
            });
        }

        let warning = (delta >= thresholds.warn_delta).then(|| DeltaWarning {
            round_id: rec.round_id,
            delta,
            answer: rec.answer,
            answer_last: self.answer_last,
        });

        self.round_id_last = rec.round_id;
        self.answer_last = rec.answer;
        self.started_at_last = rec.started_at;
        self.updated_at_last = rec.updated_at;
        self.answered_in_round_last = rec.answered_in_round;
        self.phase_id_last = rec.phase_id;

        Ok(warning)
    }
}

/// Result of a completed scan.
#[derive(Debug, Serialize)]
pub struct ScanReport {
    pub rounds: usize,
    pub thresholds: ScanThresholds,
    pub warnings: Vec<DeltaWarning>,
}

/// Validates records already sorted by `roundId`, halting on the first
/// violation. Delta warnings are logged as they occur and collected into
/// the report.
pub fn scan_records(
    records: &[FeedRecord],
    config: &ScanConfig,
) -> Result<ScanReport, ValidationError> {
    let thresholds = config.thresholds();
    let mut state = ScanState::new(config.decimals);
    let mut warnings = Vec::new();

    for rec in records {
        if let Some(w) = state.step(rec, &thresholds)? {
            warn!(
                round_id = %w.round_id,
                delta = %w.delta,
                warn_delta = %thresholds.warn_delta,
                answer = %w.answer,
                answer_last = %w.answer_last,
                "large answer delta"
            );
            warnings.push(w);
        }
    }

    Ok(ScanReport {
        rounds: records.len(),
        thresholds,
        warnings,
    })
}
