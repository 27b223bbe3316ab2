//! Custom routines appended to a running challenge.

use tracing::{info, warn};

use super::{require_mode, ChallengeService, ExtensionResult, RoutineView};
use crate::challenge::{plan_extension, validate_text, ChallengeMode};
use crate::error::{CoreError, Result};
use crate::progress::LevelPolicy;

impl ChallengeService {
    /// Add `name` to every remaining day of the owner's active challenge.
    ///
    /// The per-day cap is checked for every remaining day before anything is
    /// written; one full day rejects the whole extension.
    pub fn add_custom_routine(&self, owner_id: &str, name: &str) -> Result<ExtensionResult> {
        let name = validate_text("routine_name", name, self.ctx.limits.max_routine_name_len)?;
        let cap = self.ctx.limits.max_daily_routine_count;

        self.db.transaction(|| {
            let (challenge, progress) = self.active_challenge(owner_id)?;
            require_mode(&challenge, ChallengeMode::WallClock)?;

            let today = challenge.effective_today(self.ctx.today());
            let days = challenge.remaining_days(today);
            let Some(first) = days.first().copied() else {
                return Err(CoreError::OutOfPeriod {
                    challenge_id: challenge.id,
                    date: today,
                });
            };

            for day in &days {
                let scheduled = self.db.count_routines_on(challenge.id, *day)?;
                if scheduled + 1 > cap {
                    warn!(
                        challenge_id = challenge.id,
                        date = %day,
                        scheduled,
                        cap,
                        "custom routine rejected by daily cap"
                    );
                    return Err(CoreError::LimitExceeded {
                        date: *day,
                        limit: cap,
                    });
                }
            }

            let plan = plan_extension(&name, &days);
            let added = u32::try_from(plan.len()).unwrap_or(u32::MAX);
            let written = self
                .db
                .insert_routines(challenge.id, &plan, true)
                .and_then(|routines| {
                    let next = progress.with_added_total(added, LevelPolicy::for_mode(challenge.mode));
                    let stored = self.db.update_progress_checked(&next, progress.version)?;
                    Ok((routines, stored))
                })
                .map_err(|e| e.busy_as_conflict(progress.id, progress.version));
            let (routines, stored) = written?;

            info!(
                challenge_id = challenge.id,
                routine = %name,
                from = %first,
                added,
                total = stored.total_count,
                "custom routine added"
            );

            Ok(ExtensionResult {
                challenge_id: challenge.id,
                routine_name: name.clone(),
                added_count: added,
                routines: routines.iter().map(RoutineView::from).collect(),
                total_routine_count: stored.total_count,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::super::test_support::*;
    use super::*;
    use crate::clock::FixedClock;
    use crate::storage::{ChallengeDb, LimitsConfig};

    #[test]
    fn mid_challenge_extension_covers_remaining_days() {
        let (service, clock, created) = service_with_challenge();
        clock.advance_days(4);

        let result = service.add_custom_routine("alice", "  Stretch ").unwrap();
        assert_eq!(result.challenge_id, created.challenge_id);
        assert_eq!(result.routine_name, "Stretch");
        assert_eq!(result.added_count, 3);
        assert_eq!(result.total_routine_count, 24);
        let dates: Vec<_> = result.routines.iter().map(|r| r.scheduled_date).collect();
        assert_eq!(
            dates,
            vec![
                start() + Duration::days(4),
                start() + Duration::days(5),
                start() + Duration::days(6)
            ]
        );
        assert!(result.routines.iter().all(|r| r.custom && !r.complete));

        let progress = service.db().get_progress(created.challenge_id).unwrap().unwrap();
        assert_eq!(progress.total_count, 24);
    }

    #[test]
    fn cap_reached_exactly_then_rejected_without_writes() {
        // Three initial names leave room for two custom routines per day.
        let (service, _, created) = service_with_challenge();
        service.add_custom_routine("alice", "Walk").unwrap();
        let second = service.add_custom_routine("alice", "Journal").unwrap();
        assert_eq!(second.total_routine_count, 35);

        let err = service.add_custom_routine("alice", "Too much").unwrap_err();
        assert_eq!(err.code(), "LIMIT_EXCEEDED");
        assert_eq!(service.db().list_routines(created.challenge_id).unwrap().len(), 35);
        let progress = service.db().get_progress(created.challenge_id).unwrap().unwrap();
        assert_eq!(progress.total_count, 35);
    }

    #[test]
    fn configured_cap_is_respected() {
        let clock = Arc::new(FixedClock::new(start()));
        let ctx = context(clock).with_limits(LimitsConfig {
            max_daily_routine_count: 1,
            ..LimitsConfig::default()
        });
        let service = ChallengeService::new(ChallengeDb::open_memory().unwrap(), ctx);
        service
            .create_challenge("alice", 4, "Focus", &names(&["Plan"]))
            .unwrap();
        let err = service.add_custom_routine("alice", "Review").unwrap_err();
        assert!(matches!(err, CoreError::LimitExceeded { limit: 1, .. }));
    }

    #[test]
    fn rejects_bad_names_missing_challenge_and_finished_window() {
        let (service, clock, _) = service_with_challenge();
        assert_eq!(
            service.add_custom_routine("alice", "   ").unwrap_err().code(),
            "VALIDATION"
        );
        assert_eq!(
            service.add_custom_routine("bob", "Walk").unwrap_err().code(),
            "NOT_FOUND"
        );

        clock.advance_days(7);
        assert_eq!(
            service.add_custom_routine("alice", "Walk").unwrap_err().code(),
            "OUT_OF_PERIOD"
        );
    }
}
