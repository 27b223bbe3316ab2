//! Response shapes handed to the presentation layer.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::challenge::{
    Challenge, ChallengeCategory, ChallengeMode, ChallengeStatus, RoutineInstance,
};
use crate::cheer::CheerMessages;
use crate::error::{CoreError, Result};
use crate::progress::{round_percentage, LevelPolicy, ProgressAggregate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineView {
    pub routine_id: i64,
    pub name: String,
    pub scheduled_date: NaiveDate,
    pub complete: bool,
    pub custom: bool,
}

impl From<&RoutineInstance> for RoutineView {
    fn from(routine: &RoutineInstance) -> Self {
        Self {
            routine_id: routine.id,
            name: routine.name.clone(),
            scheduled_date: routine.scheduled_date,
            complete: routine.complete,
            custom: routine.custom,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedChallengeView {
    pub challenge_id: i64,
    pub title: String,
    pub category: ChallengeCategory,
    pub total_days: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_routine_count: u32,
    pub routines: Vec<RoutineView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChallengeDetail {
    pub challenge_id: i64,
    pub title: String,
    pub status: ChallengeStatus,
    pub current_day: u32,
    pub total_days: u32,
    pub progress_percentage: f64,
    pub level: u8,
    pub progress_to_next_level: f64,
    pub completed_count: u32,
    pub total_count: u32,
    pub today_routines: Vec<RoutineView>,
    pub cheering_message: String,
    /// Cursor of a simulated challenge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_date: Option<NaiveDate>,
}

impl ChallengeDetail {
    pub fn build(
        challenge: &Challenge,
        progress: &ProgressAggregate,
        today: NaiveDate,
        today_routines: &[RoutineInstance],
        cheers: &dyn CheerMessages,
    ) -> Self {
        let policy = LevelPolicy::for_mode(challenge.mode);
        let current_day = challenge.current_day(today);
        Self {
            challenge_id: challenge.id,
            title: challenge.title.clone(),
            status: challenge.status(today),
            current_day,
            total_days: challenge.total_days,
            progress_percentage: round_percentage(progress.percentage()),
            level: progress.level,
            progress_to_next_level: round_percentage(
                policy.progress_to_next_level(progress.completed_count, progress.total_count),
            ),
            completed_count: progress.completed_count,
            total_count: progress.total_count,
            today_routines: today_routines.iter().map(RoutineView::from).collect(),
            cheering_message: cheers.cheering(current_day, challenge.total_days),
            virtual_date: challenge.virtual_current_date,
        }
    }
}

/// One line of an owner's challenge history.
#[derive(Debug, Clone, Serialize)]
pub struct ChallengeSummary {
    pub challenge_id: i64,
    pub title: String,
    pub category: ChallengeCategory,
    pub category_label: &'static str,
    pub mode: ChallengeMode,
    pub status: ChallengeStatus,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl ChallengeSummary {
    pub fn new(challenge: &Challenge, today: NaiveDate) -> Self {
        Self {
            challenge_id: challenge.id,
            title: challenge.title.clone(),
            category: challenge.category,
            category_label: challenge.category.label(),
            mode: challenge.mode,
            status: challenge.status(today),
            start_date: challenge.start_date,
            end_date: challenge.end_date,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ToggleResult {
    pub routine_id: i64,
    pub name: String,
    pub complete: bool,
    pub message: String,
}

/// One desired state in a batch update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    pub routine_id: i64,
    pub complete: bool,
}

impl BatchItem {
    pub fn new(routine_id: i64, complete: bool) -> Self {
        Self {
            routine_id,
            complete,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    /// Final state of every requested routine, in request order.
    pub routines: Vec<RoutineView>,
    /// Every item in the batch, no-ops included.
    pub updated_count: usize,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtensionResult {
    pub challenge_id: i64,
    pub routine_name: String,
    pub added_count: u32,
    pub routines: Vec<RoutineView>,
    pub total_routine_count: u32,
}

/// Summary of a challenge that just became inactive.
#[derive(Debug, Clone, Serialize)]
pub struct FinishedChallenge {
    pub challenge_id: i64,
    pub active: bool,
    pub completed_count: u32,
    pub total_count: u32,
    pub level: u8,
}

impl FinishedChallenge {
    pub fn new(challenge_id: i64, progress: &ProgressAggregate) -> Self {
        Self {
            challenge_id,
            active: false,
            completed_count: progress.completed_count,
            total_count: progress.total_count,
            level: progress.level,
        }
    }
}

/// Outcome of moving a simulated challenge's cursor forward.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DayAdvance {
    NextDay(ChallengeDetail),
    /// The cursor passed the end date and the challenge is now inactive.
    Finished(FinishedChallenge),
}

impl DayAdvance {
    pub fn is_finished(&self) -> bool {
        matches!(self, DayAdvance::Finished(_))
    }

    /// Surface the terminal outcome as a `TERMINAL` error for callers that
    /// only deal in results.
    pub fn into_result(self) -> Result<ChallengeDetail> {
        match self {
            DayAdvance::NextDay(detail) => Ok(detail),
            DayAdvance::Finished(summary) => Err(CoreError::Terminal {
                challenge_id: summary.challenge_id,
            }),
        }
    }
}
