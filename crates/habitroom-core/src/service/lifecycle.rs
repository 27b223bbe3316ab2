//! Enrollment, detail lookup and explicit finishing.

use tracing::info;

use super::{
    require_mode, ChallengeDetail, ChallengeService, ChallengeSummary, CreatedChallengeView,
    FinishedChallenge, RoutineView, ServiceContext,
};
use crate::challenge::{
    generate_schedule, validate_text, Challenge, ChallengeCategory, ChallengeMode,
    MAX_INITIAL_ROUTINES,
};
use crate::error::{CoreError, Result, ValidationError};
use crate::progress::ProgressAggregate;
use crate::storage::{ChallengeDb, NewChallenge};

/// Raw enrollment input as it arrives from the boundary.
#[derive(Debug, Clone, Copy)]
pub struct ChallengeRequest<'a> {
    pub owner_id: &'a str,
    pub category_id: u32,
    pub title: &'a str,
    pub routine_names: &'a [String],
}

/// Validate `request` and store a challenge of `mode` starting today.
///
/// Shared by the wall-clock and simulated services; the challenge, its
/// aggregate and its routines are written in one transaction.
pub fn create_in_mode(
    db: &ChallengeDb,
    ctx: &ServiceContext,
    mode: ChallengeMode,
    request: ChallengeRequest<'_>,
) -> Result<CreatedChallengeView> {
    if !ctx.directory.exists(request.owner_id) {
        return Err(CoreError::not_found("owner", request.owner_id));
    }
    let category = ChallengeCategory::from_id(request.category_id)?;
    let title = validate_text("title", request.title, ctx.limits.max_title_len)?;

    if request.routine_names.is_empty() || request.routine_names.len() > MAX_INITIAL_ROUTINES {
        return Err(ValidationError::Cardinality {
            field: "routine_names".to_string(),
            min: 1,
            max: MAX_INITIAL_ROUTINES,
            len: request.routine_names.len(),
        }
        .into());
    }
    let names = request
        .routine_names
        .iter()
        .map(|name| validate_text("routine_name", name, ctx.limits.max_routine_name_len))
        .collect::<Result<Vec<_>, _>>()?;

    let start = ctx.today();
    let cap = ctx.limits.max_daily_routine_count;
    if names.len() as u32 > cap {
        return Err(CoreError::LimitExceeded {
            date: start,
            limit: cap,
        });
    }
    let plan = generate_schedule(&names, start)?;

    let new = NewChallenge {
        owner_id: request.owner_id.to_string(),
        category,
        title,
        start_date: start,
        mode,
    };

    let created = db.transaction(|| {
        if db.find_active_challenge(request.owner_id)?.is_some() {
            return Err(CoreError::DuplicateActive {
                owner_id: request.owner_id.to_string(),
            });
        }
        db.create_challenge(&new, &plan)
    })?;

    info!(
        challenge_id = created.challenge.id,
        owner_id = %created.challenge.owner_id,
        mode = mode.as_str(),
        routines = created.routines.len(),
        start = %created.challenge.start_date,
        "challenge created"
    );

    Ok(CreatedChallengeView {
        challenge_id: created.challenge.id,
        title: created.challenge.title.clone(),
        category: created.challenge.category,
        total_days: created.challenge.total_days,
        start_date: created.challenge.start_date,
        end_date: created.challenge.end_date,
        total_routine_count: created.progress.total_count,
        routines: created.routines.iter().map(RoutineView::from).collect(),
    })
}

/// Detail view of `challenge` as of its effective today.
pub fn active_detail(
    db: &ChallengeDb,
    ctx: &ServiceContext,
    challenge: &Challenge,
    progress: &ProgressAggregate,
) -> Result<ChallengeDetail> {
    let today = challenge.effective_today(ctx.today());
    let today_routines = db.list_routines_on(challenge.id, today)?;
    Ok(ChallengeDetail::build(
        challenge,
        progress,
        today,
        &today_routines,
        ctx.cheers.as_ref(),
    ))
}

impl ChallengeService {
    /// Enroll `owner_id` in a new seven-day challenge starting today.
    ///
    /// # Errors
    /// `VALIDATION` for a bad category, title or name list, `NOT_FOUND` for
    /// an unknown owner, `DUPLICATE_ACTIVE` if one is already running.
    pub fn create_challenge(
        &self,
        owner_id: &str,
        category_id: u32,
        title: &str,
        routine_names: &[String],
    ) -> Result<CreatedChallengeView> {
        create_in_mode(
            &self.db,
            &self.ctx,
            ChallengeMode::WallClock,
            ChallengeRequest {
                owner_id,
                category_id,
                title,
                routine_names,
            },
        )
    }

    pub fn get_active_challenge_detail(&self, owner_id: &str) -> Result<ChallengeDetail> {
        let (challenge, progress) = self.active_challenge(owner_id)?;
        active_detail(&self.db, &self.ctx, &challenge, &progress)
    }

    /// Every routine of the owner's active challenge, in position order.
    pub fn list_active_routines(&self, owner_id: &str) -> Result<Vec<RoutineView>> {
        let (challenge, _) = self.active_challenge(owner_id)?;
        let routines = self.db.list_routines(challenge.id)?;
        Ok(routines.iter().map(RoutineView::from).collect())
    }

    /// All of the owner's challenges, newest first, in either mode.
    pub fn challenge_history(&self, owner_id: &str) -> Result<Vec<ChallengeSummary>> {
        let today = self.ctx.today();
        let challenges = self.db.list_challenges(owner_id)?;
        Ok(challenges
            .iter()
            .map(|challenge| ChallengeSummary::new(challenge, today))
            .collect())
    }

    /// Mark the owner's active wall-clock challenge as completed.
    ///
    /// This is the only way a wall-clock challenge leaves the active state.
    pub fn finish_challenge(&self, owner_id: &str) -> Result<FinishedChallenge> {
        let finished = self.db.transaction(|| {
            let (challenge, progress) = self.active_challenge(owner_id)?;
            require_mode(&challenge, ChallengeMode::WallClock)?;
            self.db.set_challenge_active(challenge.id, false)?;
            Ok(FinishedChallenge::new(challenge.id, &progress))
        })?;
        info!(
            challenge_id = finished.challenge_id,
            owner_id,
            completed = finished.completed_count,
            total = finished.total_count,
            "challenge finished"
        );
        Ok(finished)
    }
}
