//! Challenge and routine-instance model plus the date-window math.
//!
//! A challenge is a fixed seven-day period owned by one user. Routine
//! instances reference their challenge by id; there is no object graph
//! between the two, storage joins them when an operation needs both.

pub mod schedule;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result, ValidationError};

pub use schedule::{generate_schedule, plan_extension, PlannedRoutine};

/// Length of every challenge in days.
pub const CHALLENGE_DAYS: u32 = 7;

/// Upper bound on routine names supplied at enrollment.
pub const MAX_INITIAL_ROUTINES: usize = 3;

/// Closed set of challenge categories, addressed by numeric id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeCategory {
    Health,
    Study,
    Mindfulness,
    Productivity,
    Lifestyle,
}

impl ChallengeCategory {
    pub const ALL: [ChallengeCategory; 5] = [
        ChallengeCategory::Health,
        ChallengeCategory::Study,
        ChallengeCategory::Mindfulness,
        ChallengeCategory::Productivity,
        ChallengeCategory::Lifestyle,
    ];

    pub fn from_id(id: u32) -> Result<Self, ValidationError> {
        match id {
            1 => Ok(ChallengeCategory::Health),
            2 => Ok(ChallengeCategory::Study),
            3 => Ok(ChallengeCategory::Mindfulness),
            4 => Ok(ChallengeCategory::Productivity),
            5 => Ok(ChallengeCategory::Lifestyle),
            other => Err(ValidationError::UnknownCategory(other)),
        }
    }

    pub fn id(self) -> u32 {
        match self {
            ChallengeCategory::Health => 1,
            ChallengeCategory::Study => 2,
            ChallengeCategory::Mindfulness => 3,
            ChallengeCategory::Productivity => 4,
            ChallengeCategory::Lifestyle => 5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ChallengeCategory::Health => "Health",
            ChallengeCategory::Study => "Study",
            ChallengeCategory::Mindfulness => "Mindfulness",
            ChallengeCategory::Productivity => "Productivity",
            ChallengeCategory::Lifestyle => "Lifestyle",
        }
    }
}

/// Which notion of "today" drives the challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeMode {
    /// "Today" comes from the injected clock
    WallClock,
    /// "Today" is the challenge's own virtual cursor
    Simulated,
}

impl ChallengeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ChallengeMode::WallClock => "wall_clock",
            ChallengeMode::Simulated => "simulated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "wall_clock" => Some(ChallengeMode::WallClock),
            "simulated" => Some(ChallengeMode::Simulated),
            _ => None,
        }
    }
}

/// Lifecycle position of a challenge.
///
/// `Created` and `Active` share the stored `active = true` flag; a challenge
/// is `Created` until its first day has begun.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
    Created,
    Active,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub id: i64,
    pub owner_id: String,
    pub category: ChallengeCategory,
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_days: u32,
    pub active: bool,
    pub mode: ChallengeMode,
    /// Only set for simulated challenges.
    pub virtual_current_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Challenge {
    /// Last day of a challenge starting on `start`.
    pub fn end_date_for(start: NaiveDate) -> NaiveDate {
        start + Duration::days(i64::from(CHALLENGE_DAYS) - 1)
    }

    pub fn is_owned_by(&self, owner_id: &str) -> bool {
        self.owner_id == owner_id
    }

    pub fn ensure_owner(&self, owner_id: &str) -> Result<()> {
        if self.is_owned_by(owner_id) {
            Ok(())
        } else {
            Err(CoreError::Unauthorized {
                owner_id: owner_id.to_string(),
                challenge_id: self.id,
            })
        }
    }

    /// The date this challenge treats as today.
    ///
    /// Simulated challenges ignore the clock and use their cursor.
    pub fn effective_today(&self, clock_today: NaiveDate) -> NaiveDate {
        match (self.mode, self.virtual_current_date) {
            (ChallengeMode::Simulated, Some(cursor)) => cursor,
            _ => clock_today,
        }
    }

    /// One-based day number, clamped to `1..=total_days`.
    pub fn current_day(&self, today: NaiveDate) -> u32 {
        if today < self.start_date {
            return 1;
        }
        let elapsed = (today - self.start_date).num_days() + 1;
        u32::try_from(elapsed)
            .unwrap_or(self.total_days)
            .min(self.total_days)
    }

    /// Last date that may currently be checked off: `min(today, end_date)`.
    ///
    /// `None` before the first day and for finished challenges.
    pub fn window_end(&self, today: NaiveDate) -> Option<NaiveDate> {
        if !self.active || today < self.start_date {
            return None;
        }
        Some(today.min(self.end_date))
    }

    /// Fails with `OUT_OF_PERIOD` unless `date` lies in `[start_date, window_end]`.
    pub fn ensure_in_window(&self, date: NaiveDate, today: NaiveDate) -> Result<()> {
        match self.window_end(today) {
            Some(end) if date >= self.start_date && date <= end => Ok(()),
            _ => Err(CoreError::OutOfPeriod {
                challenge_id: self.id,
                date,
            }),
        }
    }

    /// Days from `max(today, start_date)` through `end_date`, inclusive.
    pub fn remaining_days(&self, today: NaiveDate) -> Vec<NaiveDate> {
        let first = today.max(self.start_date);
        first
            .iter_days()
            .take_while(|day| *day <= self.end_date)
            .collect()
    }

    pub fn status(&self, today: NaiveDate) -> ChallengeStatus {
        if !self.active {
            ChallengeStatus::Completed
        } else if self.effective_today(today) < self.start_date {
            ChallengeStatus::Created
        } else {
            ChallengeStatus::Active
        }
    }
}

/// One (name, date) occurrence the owner can check off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutineInstance {
    pub id: i64,
    pub challenge_id: i64,
    pub name: String,
    pub scheduled_date: NaiveDate,
    pub complete: bool,
    /// Appended after enrollment by a custom-routine extension.
    pub custom: bool,
}

/// Trim `value` and check it is non-empty and at most `max_chars` long.
pub fn validate_text(field: &str, value: &str, max_chars: usize) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            message: "must not be empty".to_string(),
        });
    }
    let len = trimmed.chars().count();
    if len > max_chars {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            message: format!("must be at most {max_chars} characters (got {len})"),
        });
    }
    Ok(trimmed.to_string())
}
