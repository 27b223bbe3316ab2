//! Single-routine completion toggle.

use tracing::{debug, warn};

use super::{require_mode, ChallengeService, ToggleResult};
use crate::challenge::ChallengeMode;
use crate::error::{CoreError, Result};
use crate::progress::LevelPolicy;
use crate::storage::RoutineContext;

impl ChallengeService {
    /// Flip one routine and move the aggregate by one, atomically.
    ///
    /// # Errors
    /// `NOT_FOUND`, `AUTHORIZATION`, `OUT_OF_PERIOD`, or `CONFLICT` when the
    /// aggregate changed after it was read. Conflicts are not retried.
    pub fn toggle_routine(&self, owner_id: &str, routine_id: i64) -> Result<ToggleResult> {
        self.db.transaction(|| {
            let target = self.load_toggle_target(owner_id, routine_id)?;
            self.apply_toggle(&target)
        })
    }

    fn load_toggle_target(&self, owner_id: &str, routine_id: i64) -> Result<RoutineContext> {
        let target = self
            .db
            .fetch_routine_context(routine_id)?
            .ok_or_else(|| CoreError::not_found("routine", routine_id))?;
        target.challenge.ensure_owner(owner_id)?;
        require_mode(&target.challenge, ChallengeMode::WallClock)?;
        let today = target.challenge.effective_today(self.ctx.today());
        target
            .challenge
            .ensure_in_window(target.routine.scheduled_date, today)?;
        Ok(target)
    }

    fn apply_toggle(&self, target: &RoutineContext) -> Result<ToggleResult> {
        let routine = &target.routine;
        let complete = !routine.complete;
        let delta = if complete { 1 } else { -1 };
        let policy = LevelPolicy::for_mode(target.challenge.mode);

        let written = self
            .db
            .set_routine_complete(routine.id, complete)
            .and_then(|()| {
                self.strategy
                    .settle(&self.db, &target.progress, delta, policy)
            })
            .map_err(|e| e.busy_as_conflict(target.progress.id, target.progress.version));

        let progress = match written {
            Ok(progress) => progress,
            Err(err) => {
                if err.is_retryable() {
                    warn!(
                        routine_id = routine.id,
                        progress_id = target.progress.id,
                        version = target.progress.version,
                        "toggle lost a concurrent update"
                    );
                }
                return Err(err);
            }
        };

        debug!(
            routine_id = routine.id,
            complete,
            completed = progress.completed_count,
            total = progress.total_count,
            level = progress.level,
            "routine toggled"
        );

        Ok(ToggleResult {
            routine_id: routine.id,
            name: routine.name.clone(),
            complete,
            message: self.ctx.cheers.toggled(&routine.name, complete),
        })
    }
}
