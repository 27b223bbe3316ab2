//! Routine-instance queries on [`ChallengeDb`].

use chrono::NaiveDate;
use rusqlite::{params, params_from_iter, OptionalExtension};

use super::challenge_db::{
    format_date, row_to_challenge, row_to_progress, row_to_routine, ChallengeDb, RoutineContext,
    CHALLENGE_COLUMNS, CHALLENGE_WIDTH, PROGRESS_COLUMNS, ROUTINE_COLUMNS, ROUTINE_WIDTH,
};
use crate::challenge::{PlannedRoutine, RoutineInstance};
use crate::error::{CoreError, Result};

fn joined_select(filter: &str) -> String {
    format!(
        "SELECT {ROUTINE_COLUMNS}, {CHALLENGE_COLUMNS}, {PROGRESS_COLUMNS}
         FROM routines r
         JOIN challenges c ON c.id = r.challenge_id
         JOIN progress p ON p.challenge_id = c.id
         WHERE {filter}
         ORDER BY r.id"
    )
}

fn row_to_context(row: &rusqlite::Row) -> rusqlite::Result<RoutineContext> {
    Ok(RoutineContext {
        routine: row_to_routine(row, 0)?,
        challenge: row_to_challenge(row, ROUTINE_WIDTH)?,
        progress: row_to_progress(row, ROUTINE_WIDTH + CHALLENGE_WIDTH)?,
    })
}

impl ChallengeDb {
    /// Insert routines in plan order; ids ascend with position.
    pub fn insert_routines(
        &self,
        challenge_id: i64,
        plan: &[PlannedRoutine],
        custom: bool,
    ) -> Result<Vec<RoutineInstance>> {
        let mut stmt = self.conn().prepare_cached(
            "INSERT INTO routines (challenge_id, name, scheduled_date, complete, custom)
             VALUES (?1, ?2, ?3, 0, ?4)",
        )?;
        let mut inserted = Vec::with_capacity(plan.len());
        for planned in plan {
            stmt.execute(params![
                challenge_id,
                planned.name,
                format_date(planned.scheduled_date),
                custom,
            ])?;
            inserted.push(RoutineInstance {
                id: self.conn().last_insert_rowid(),
                challenge_id,
                name: planned.name.clone(),
                scheduled_date: planned.scheduled_date,
                complete: false,
                custom,
            });
        }
        Ok(inserted)
    }

    /// One read: the routine, its challenge and the challenge's aggregate.
    pub fn fetch_routine_context(&self, routine_id: i64) -> Result<Option<RoutineContext>> {
        let context = self
            .conn()
            .query_row(&joined_select("r.id = ?1"), params![routine_id], row_to_context)
            .optional()?;
        Ok(context)
    }

    /// One read for many routines. Missing ids are simply absent from the result.
    pub fn fetch_routine_contexts(&self, routine_ids: &[i64]) -> Result<Vec<RoutineContext>> {
        if routine_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; routine_ids.len()].join(", ");
        let sql = joined_select(&format!("r.id IN ({placeholders})"));
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(routine_ids.iter()), row_to_context)?;
        let mut contexts = Vec::with_capacity(routine_ids.len());
        for row in rows {
            contexts.push(row?);
        }
        Ok(contexts)
    }

    pub fn get_routine(&self, routine_id: i64) -> Result<Option<RoutineInstance>> {
        let sql = format!("SELECT {ROUTINE_COLUMNS} FROM routines r WHERE r.id = ?1");
        let routine = self
            .conn()
            .query_row(&sql, params![routine_id], |row| row_to_routine(row, 0))
            .optional()?;
        Ok(routine)
    }

    /// All routines of a challenge in position order.
    pub fn list_routines(&self, challenge_id: i64) -> Result<Vec<RoutineInstance>> {
        self.query_routines(
            &format!(
                "SELECT {ROUTINE_COLUMNS} FROM routines r WHERE r.challenge_id = ?1 ORDER BY r.id"
            ),
            params![challenge_id],
        )
    }

    pub fn list_routines_on(
        &self,
        challenge_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<RoutineInstance>> {
        self.query_routines(
            &format!(
                "SELECT {ROUTINE_COLUMNS} FROM routines r
                 WHERE r.challenge_id = ?1 AND r.scheduled_date = ?2
                 ORDER BY r.id"
            ),
            params![challenge_id, format_date(date)],
        )
    }

    fn query_routines(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<RoutineInstance>> {
        let mut stmt = self.conn().prepare(sql)?;
        let rows = stmt.query_map(params, |row| row_to_routine(row, 0))?;
        let mut routines = Vec::new();
        for row in rows {
            routines.push(row?);
        }
        Ok(routines)
    }

    pub fn set_routine_complete(&self, routine_id: i64, complete: bool) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE routines SET complete = ?1 WHERE id = ?2",
            params![complete, routine_id],
        )?;
        if changed == 0 {
            return Err(CoreError::not_found("routine", routine_id));
        }
        Ok(())
    }

    pub fn count_completed(&self, challenge_id: i64) -> Result<u32> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM routines WHERE challenge_id = ?1 AND complete = 1",
            params![challenge_id],
            |row| row.get::<_, u32>(0),
        )?;
        Ok(count)
    }

    pub fn count_routines_on(&self, challenge_id: i64, date: NaiveDate) -> Result<u32> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM routines WHERE challenge_id = ?1 AND scheduled_date = ?2",
            params![challenge_id, format_date(date)],
            |row| row.get::<_, u32>(0),
        )?;
        Ok(count)
    }
}
