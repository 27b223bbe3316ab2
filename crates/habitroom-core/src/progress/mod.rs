//! Progress aggregate and level calculation.
//!
//! The aggregate is the single contended row per challenge. Every write goes
//! through the store with the version it was read at, see
//! [`crate::storage::ChallengeDb::update_progress_checked`].

pub mod strategy;

use serde::{Deserialize, Serialize};

use crate::challenge::ChallengeMode;

pub use strategy::{AggregationStrategy, PullRecount, PushDelta};

/// Highest level any policy hands out.
pub const MAX_LEVEL: u8 = 4;

const BAND_BOUNDS: [f64; 3] = [25.0, 50.0, 75.0];

/// Percentage of completed routines; `0.0` when there are none.
pub fn completion_percentage(completed: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    f64::from(completed) / f64::from(total) * 100.0
}

/// Level under the wall-clock policy (`<=25 -> 1`, `<=50 -> 2`, `<=75 -> 3`, else 4).
pub fn calculate_level(completed: u32, total: u32) -> u8 {
    LevelPolicy::Inclusive.level(completed, total)
}

/// How completion percentage maps onto levels.
///
/// The two variants disagree at band edges and on whether level 0 exists.
/// They are kept separate on purpose; each challenge mode picks one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelPolicy {
    /// Levels 1..=4, band edges belong to the lower level.
    Inclusive,
    /// Levels 0..=4, level 0 until something is completed, band edges
    /// belong to the upper level.
    Strict,
}

impl LevelPolicy {
    pub fn for_mode(mode: ChallengeMode) -> Self {
        match mode {
            ChallengeMode::WallClock => LevelPolicy::Inclusive,
            ChallengeMode::Simulated => LevelPolicy::Strict,
        }
    }

    pub fn level(self, completed: u32, total: u32) -> u8 {
        let pct = completion_percentage(completed, total);
        match self {
            LevelPolicy::Inclusive => {
                let band = BAND_BOUNDS.iter().position(|bound| pct <= *bound);
                band.map_or(MAX_LEVEL, |i| i as u8 + 1)
            }
            LevelPolicy::Strict => {
                if completed == 0 {
                    return 0;
                }
                let band = BAND_BOUNDS.iter().position(|bound| pct < *bound);
                band.map_or(MAX_LEVEL, |i| i as u8 + 1)
            }
        }
    }

    /// Percentage points left before the next level is reached.
    ///
    /// For strict level 0, and for an inclusive count sitting exactly on a
    /// band edge, this is the weight of a single routine.
    pub fn progress_to_next_level(self, completed: u32, total: u32) -> f64 {
        let level = self.level(completed, total);
        if level >= MAX_LEVEL || total == 0 {
            return 0.0;
        }
        let one_routine = 100.0 / f64::from(total);
        if level == 0 {
            return one_routine;
        }
        let bound = BAND_BOUNDS[usize::from(level) - 1];
        let left = bound - completion_percentage(completed, total);
        if left > 0.0 {
            left
        } else {
            one_routine
        }
    }
}

/// Derived completion counters for one challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressAggregate {
    pub id: i64,
    pub challenge_id: i64,
    pub completed_count: u32,
    pub total_count: u32,
    pub level: u8,
    /// Incremented by the store on every write.
    pub version: i64,
}

impl ProgressAggregate {
    /// A fresh aggregate for a challenge with `total_count` routines, not yet stored.
    pub fn initial(challenge_id: i64, total_count: u32, policy: LevelPolicy) -> Self {
        Self {
            id: 0,
            challenge_id,
            completed_count: 0,
            total_count,
            level: policy.level(0, total_count),
            version: 0,
        }
    }

    pub fn percentage(&self) -> f64 {
        completion_percentage(self.completed_count, self.total_count)
    }

    /// `completed_count + delta`, clamped into `[0, total_count]`.
    pub fn adjust_count(&self, delta: i64) -> u32 {
        let adjusted = i64::from(self.completed_count)
            .saturating_add(delta)
            .clamp(0, i64::from(self.total_count));
        // In range by the clamp above.
        u32::try_from(adjusted).unwrap_or(self.total_count)
    }

    /// Copy with `delta` applied to the completed count and the level recomputed.
    pub fn with_delta(&self, delta: i64, policy: LevelPolicy) -> Self {
        let completed_count = self.adjust_count(delta);
        Self {
            completed_count,
            level: policy.level(completed_count, self.total_count),
            ..self.clone()
        }
    }

    /// Copy with the completed count overwritten (still clamped to the total).
    pub fn with_completed(&self, completed: u32, policy: LevelPolicy) -> Self {
        let completed_count = completed.min(self.total_count);
        Self {
            completed_count,
            level: policy.level(completed_count, self.total_count),
            ..self.clone()
        }
    }

    /// Copy with `added` more routines in the total.
    pub fn with_added_total(&self, added: u32, policy: LevelPolicy) -> Self {
        let total_count = self.total_count.saturating_add(added);
        Self {
            total_count,
            level: policy.level(self.completed_count, total_count),
            ..self.clone()
        }
    }
}

/// Round a percentage to one decimal place for display.
pub fn round_percentage(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
