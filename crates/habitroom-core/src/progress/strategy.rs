//! Strategies for bringing the aggregate in line after routine flips.
//!
//! [`PushDelta`] applies the net change the caller computed and relies on the
//! version check to catch lost updates. [`PullRecount`] ignores the caller's
//! arithmetic and recounts completed routines from storage.

use tracing::debug;

use super::{LevelPolicy, ProgressAggregate};
use crate::error::Result;
use crate::storage::ChallengeDb;

/// Settles the aggregate inside the caller's transaction.
pub trait AggregationStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Write the aggregate that results from `net_delta` flips applied
    /// after `read` was loaded. Returns the stored aggregate.
    ///
    /// Callers only settle when at least one routine actually changed, and
    /// after those routine rows have been written.
    ///
    /// # Errors
    /// Returns `CONFLICT` when the strategy version-checks and another
    /// writer got there first.
    fn settle(
        &self,
        db: &ChallengeDb,
        read: &ProgressAggregate,
        net_delta: i64,
        policy: LevelPolicy,
    ) -> Result<ProgressAggregate>;
}

/// Incremental, version-checked update.
#[derive(Debug, Clone, Copy, Default)]
pub struct PushDelta;

impl AggregationStrategy for PushDelta {
    fn name(&self) -> &'static str {
        "push_delta"
    }

    fn settle(
        &self,
        db: &ChallengeDb,
        read: &ProgressAggregate,
        net_delta: i64,
        policy: LevelPolicy,
    ) -> Result<ProgressAggregate> {
        // A zero net delta still bumps the version: routines may have
        // flipped in both directions and concurrent readers must notice.
        let next = read.with_delta(net_delta, policy);
        debug!(
            progress_id = read.id,
            net_delta,
            completed = next.completed_count,
            version = read.version,
            "pushing progress delta"
        );
        db.update_progress_checked(&next, read.version)
    }
}

/// Full recount, overwriting whatever the aggregate held.
#[derive(Debug, Clone, Copy, Default)]
pub struct PullRecount;

impl AggregationStrategy for PullRecount {
    fn name(&self) -> &'static str {
        "pull_recount"
    }

    fn settle(
        &self,
        db: &ChallengeDb,
        read: &ProgressAggregate,
        _net_delta: i64,
        policy: LevelPolicy,
    ) -> Result<ProgressAggregate> {
        let completed = db.count_completed(read.challenge_id)?;
        debug!(
            progress_id = read.id,
            previous = read.completed_count,
            recounted = completed,
            "recounting progress"
        );
        db.overwrite_progress(&read.with_completed(completed, policy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::{ChallengeCategory, PlannedRoutine};
    use crate::storage::NewChallenge;
    use chrono::NaiveDate;

    fn seeded() -> (ChallengeDb, ProgressAggregate, Vec<i64>) {
        let db = ChallengeDb::open_memory().unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let plan: Vec<PlannedRoutine> = (0..4)
            .map(|_| PlannedRoutine {
                name: "Read".to_string(),
                scheduled_date: start,
            })
            .collect();
        let created = db
            .create_challenge(&NewChallenge::wall_clock("owner", ChallengeCategory::Study, "Books", start), &plan)
            .unwrap();
        let ids = created.routines.iter().map(|r| r.id).collect();
        (db, created.progress, ids)
    }

    #[test]
    fn push_delta_checks_version() {
        let (db, progress, _) = seeded();
        let stored = PushDelta
            .settle(&db, &progress, 2, LevelPolicy::Inclusive)
            .unwrap();
        assert_eq!(stored.completed_count, 2);
        assert_eq!(stored.version, progress.version + 1);

        // Settling again from the stale read must fail.
        let err = PushDelta
            .settle(&db, &progress, 1, LevelPolicy::Inclusive)
            .unwrap_err();
        assert_eq!(err.code(), "CONFLICT");
    }

    #[test]
    fn push_delta_bumps_version_for_zero_net_delta() {
        let (db, progress, _) = seeded();
        let settled = PushDelta
            .settle(&db, &progress, 0, LevelPolicy::Inclusive)
            .unwrap();
        assert_eq!(settled.completed_count, progress.completed_count);
        let stored = db.get_progress(progress.challenge_id).unwrap().unwrap();
        assert_eq!(stored.version, progress.version + 1);
    }

    #[test]
    fn pull_recount_ignores_drift() {
        let (db, progress, ids) = seeded();
        db.set_routine_complete(ids[0], true).unwrap();
        db.set_routine_complete(ids[2], true).unwrap();

        // Pretend the stored counter drifted.
        let drifted = db
            .overwrite_progress(&progress.with_completed(4, LevelPolicy::Strict))
            .unwrap();
        let stored = PullRecount
            .settle(&db, &drifted, 99, LevelPolicy::Strict)
            .unwrap();
        assert_eq!(stored.completed_count, 2);
        assert_eq!(stored.level, 3);
    }
}
