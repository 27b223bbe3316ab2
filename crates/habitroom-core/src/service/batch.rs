//! All-or-nothing multi-routine update.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{debug, warn};

use super::{require_mode, BatchItem, BatchResult, ChallengeService, RoutineView};
use crate::challenge::ChallengeMode;
use crate::error::{CoreError, Result, ValidationError};
use crate::progress::LevelPolicy;
use crate::storage::RoutineContext;

/// Validated batch, ready to write.
struct BatchPlan {
    contexts: HashMap<i64, RoutineContext>,
    representative: i64,
    net_delta: i64,
    changed: Vec<BatchItem>,
}

fn check_items(items: &[BatchItem]) -> Result<()> {
    if items.is_empty() {
        return Err(ValidationError::EmptyCollection("items".to_string()).into());
    }
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item.routine_id) {
            return Err(ValidationError::DuplicateItem(item.routine_id).into());
        }
    }
    Ok(())
}

impl ChallengeService {
    /// Set the completion state of several routines of one challenge.
    ///
    /// Items already in the desired state count towards `updated_count` but
    /// write nothing. The aggregate moves once by the net delta, and any
    /// failure leaves every routine as it was.
    pub fn update_many(&self, owner_id: &str, items: &[BatchItem]) -> Result<BatchResult> {
        check_items(items)?;

        self.db.transaction(|| {
            let plan = self.plan_batch(owner_id, items)?;
            self.apply_batch(items, plan)
        })
    }

    fn plan_batch(&self, owner_id: &str, items: &[BatchItem]) -> Result<BatchPlan> {
        let ids: Vec<i64> = items.iter().map(|item| item.routine_id).collect();
        let contexts: HashMap<i64, RoutineContext> = self
            .db
            .fetch_routine_contexts(&ids)?
            .into_iter()
            .map(|ctx| (ctx.routine.id, ctx))
            .collect();

        if let Some(missing) = ids.iter().find(|id| !contexts.contains_key(id)) {
            return Err(CoreError::not_found("routine", missing));
        }

        let challenge_ids: BTreeSet<i64> =
            contexts.values().map(|ctx| ctx.challenge.id).collect();
        if challenge_ids.len() > 1 {
            return Err(CoreError::CrossChallenge {
                challenge_ids: challenge_ids.into_iter().collect(),
            });
        }

        let representative = ids[0];
        let head = &contexts[&representative];
        head.challenge.ensure_owner(owner_id)?;
        require_mode(&head.challenge, ChallengeMode::WallClock)?;
        let today = head.challenge.effective_today(self.ctx.today());
        for ctx in contexts.values() {
            head.challenge
                .ensure_in_window(ctx.routine.scheduled_date, today)?;
        }

        let mut net_delta = 0i64;
        let mut changed = Vec::new();
        for item in items {
            let current = contexts[&item.routine_id].routine.complete;
            if current == item.complete {
                continue;
            }
            net_delta += if item.complete { 1 } else { -1 };
            changed.push(*item);
        }

        Ok(BatchPlan {
            contexts,
            representative,
            net_delta,
            changed,
        })
    }

    fn apply_batch(&self, items: &[BatchItem], plan: BatchPlan) -> Result<BatchResult> {
        let head = &plan.contexts[&plan.representative];

        if !plan.changed.is_empty() {
            let policy = LevelPolicy::for_mode(head.challenge.mode);
            let written = plan
                .changed
                .iter()
                .try_for_each(|item| self.db.set_routine_complete(item.routine_id, item.complete))
                .and_then(|()| {
                    self.strategy
                        .settle(&self.db, &head.progress, plan.net_delta, policy)
                })
                .map_err(|e| e.busy_as_conflict(head.progress.id, head.progress.version));

            match written {
                Ok(progress) => debug!(
                    challenge_id = head.challenge.id,
                    items = items.len(),
                    changed = plan.changed.len(),
                    net_delta = plan.net_delta,
                    completed = progress.completed_count,
                    level = progress.level,
                    "batch applied"
                ),
                Err(err) => {
                    if err.is_retryable() {
                        warn!(
                            challenge_id = head.challenge.id,
                            progress_id = head.progress.id,
                            version = head.progress.version,
                            "batch lost a concurrent update"
                        );
                    }
                    return Err(err);
                }
            }
        }

        let routines = items
            .iter()
            .map(|item| {
                let mut view = RoutineView::from(&plan.contexts[&item.routine_id].routine);
                view.complete = item.complete;
                view
            })
            .collect();

        Ok(BatchResult {
            routines,
            updated_count: items.len(),
            message: self
                .ctx
                .cheers
                .batch_updated(items.len(), plan.changed.len()),
        })
    }
}
