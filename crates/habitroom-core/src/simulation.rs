//! Simulated-time challenges.
//!
//! A simulated challenge carries its own "today" in `virtual_current_date`.
//! The cursor starts on the start date and only moves through
//! [`SimulatedChallengeService::advance_day`], which also finishes the
//! challenge once the cursor passes the end date.
//!
//! The aggregate is never adjusted incrementally here. Every toggle flips
//! the routine and then recounts completed routines from storage
//! ([`PullRecount`]), and [`SimulatedChallengeService::recalculate_statistics`]
//! runs the same recount on demand. Levels follow [`LevelPolicy::Strict`].

use chrono::Duration;
use tracing::{debug, info};

use crate::challenge::{Challenge, ChallengeMode};
use crate::error::{CoreError, Result};
use crate::progress::{AggregationStrategy, LevelPolicy, ProgressAggregate, PullRecount};
use crate::service::{
    active_detail, create_in_mode, require_mode, ChallengeDetail, ChallengeRequest,
    CreatedChallengeView, DayAdvance, FinishedChallenge, ServiceContext, ToggleResult,
};
use crate::storage::ChallengeDb;

/// Challenge operations driven by a per-challenge virtual cursor.
pub struct SimulatedChallengeService {
    db: ChallengeDb,
    ctx: ServiceContext,
    strategy: Box<dyn AggregationStrategy>,
}

impl SimulatedChallengeService {
    pub fn new(db: ChallengeDb, ctx: ServiceContext) -> Self {
        Self {
            db,
            ctx,
            strategy: Box::new(PullRecount),
        }
    }

    pub fn db(&self) -> &ChallengeDb {
        &self.db
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Enroll `owner_id` in a simulated challenge whose cursor starts today.
    pub fn start_challenge(
        &self,
        owner_id: &str,
        category_id: u32,
        title: &str,
        routine_names: &[String],
    ) -> Result<CreatedChallengeView> {
        create_in_mode(
            &self.db,
            &self.ctx,
            ChallengeMode::Simulated,
            ChallengeRequest {
                owner_id,
                category_id,
                title,
                routine_names,
            },
        )
    }

    /// Detail of the owner's simulated challenge as of its cursor.
    pub fn detail(&self, owner_id: &str) -> Result<ChallengeDetail> {
        let (challenge, progress) = self.active_simulated(owner_id)?;
        active_detail(&self.db, &self.ctx, &challenge, &progress)
    }

    /// Flip one routine, then recount the aggregate.
    ///
    /// # Errors
    /// `TERMINAL` once the challenge has finished; otherwise the same
    /// failures as a wall-clock toggle, with the window ending at the cursor.
    pub fn toggle_routine(&self, owner_id: &str, routine_id: i64) -> Result<ToggleResult> {
        self.db.transaction(|| {
            let target = self
                .db
                .fetch_routine_context(routine_id)?
                .ok_or_else(|| CoreError::not_found("routine", routine_id))?;
            let challenge = &target.challenge;
            challenge.ensure_owner(owner_id)?;
            require_mode(challenge, ChallengeMode::Simulated)?;
            if !challenge.active {
                return Err(CoreError::Terminal {
                    challenge_id: challenge.id,
                });
            }
            let today = challenge.effective_today(self.ctx.today());
            challenge.ensure_in_window(target.routine.scheduled_date, today)?;

            let complete = !target.routine.complete;
            let delta = if complete { 1 } else { -1 };
            let progress = self
                .db
                .set_routine_complete(routine_id, complete)
                .and_then(|()| {
                    self.strategy.settle(
                        &self.db,
                        &target.progress,
                        delta,
                        LevelPolicy::for_mode(challenge.mode),
                    )
                })
                .map_err(|e| e.busy_as_conflict(target.progress.id, target.progress.version))?;
            debug!(
                routine_id,
                complete,
                completed = progress.completed_count,
                level = progress.level,
                "simulated routine toggled"
            );

            Ok(ToggleResult {
                routine_id,
                name: target.routine.name.clone(),
                complete,
                message: self.ctx.cheers.toggled(&target.routine.name, complete),
            })
        })
    }

    /// Move the owner's cursor forward one day.
    ///
    /// Passing the end date deactivates the challenge and yields
    /// [`DayAdvance::Finished`]. The cursor move commits in both cases.
    pub fn advance_day(&self, owner_id: &str) -> Result<DayAdvance> {
        self.db.transaction(|| {
            let (mut challenge, progress) = self.active_simulated(owner_id)?;
            let cursor = challenge.effective_today(challenge.start_date) + Duration::days(1);
            self.db.set_virtual_date(challenge.id, cursor)?;
            challenge.virtual_current_date = Some(cursor);

            if cursor > challenge.end_date {
                self.db.set_challenge_active(challenge.id, false)?;
                info!(
                    challenge_id = challenge.id,
                    owner_id,
                    cursor = %cursor,
                    completed = progress.completed_count,
                    total = progress.total_count,
                    "simulated challenge finished"
                );
                return Ok(DayAdvance::Finished(FinishedChallenge::new(
                    challenge.id,
                    &progress,
                )));
            }

            debug!(challenge_id = challenge.id, cursor = %cursor, "virtual day advanced");
            active_detail(&self.db, &self.ctx, &challenge, &progress).map(DayAdvance::NextDay)
        })
    }

    /// Recount completed routines and overwrite the aggregate.
    ///
    /// Works on finished challenges too; the result does not depend on what
    /// the aggregate held before.
    pub fn recalculate_statistics(&self, challenge_id: i64) -> Result<ProgressAggregate> {
        self.db.transaction(|| {
            let challenge = self
                .db
                .get_challenge(challenge_id)?
                .ok_or_else(|| CoreError::not_found("challenge", challenge_id))?;
            require_mode(&challenge, ChallengeMode::Simulated)?;
            let progress = self
                .db
                .get_progress(challenge_id)?
                .ok_or_else(|| CoreError::not_found("progress", challenge_id))?;
            let recounted =
                PullRecount.settle(&self.db, &progress, 0, LevelPolicy::for_mode(challenge.mode))?;
            info!(
                challenge_id,
                previous = progress.completed_count,
                completed = recounted.completed_count,
                level = recounted.level,
                "statistics recalculated"
            );
            Ok(recounted)
        })
    }

    /// The owner's running simulated challenge.
    ///
    /// # Errors
    /// `TERMINAL` when nothing is running and the owner's latest challenge is
    /// a simulated one whose cursor already passed the end date; otherwise
    /// `NOT_FOUND`.
    fn active_simulated(&self, owner_id: &str) -> Result<(Challenge, ProgressAggregate)> {
        if let Some((challenge, progress)) = self.db.find_active_challenge(owner_id)? {
            require_mode(&challenge, ChallengeMode::Simulated)?;
            return Ok((challenge, progress));
        }
        let latest = self.db.list_challenges(owner_id)?.into_iter().next();
        match latest {
            Some(challenge) if is_past_end(&challenge) => Err(CoreError::Terminal {
                challenge_id: challenge.id,
            }),
            _ => Err(CoreError::not_found("active challenge", owner_id)),
        }
    }
}

fn is_past_end(challenge: &Challenge) -> bool {
    challenge.mode == ChallengeMode::Simulated
        && !challenge.active
        && challenge
            .virtual_current_date
            .is_some_and(|cursor| cursor > challenge.end_date)
}
