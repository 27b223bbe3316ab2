//! SQLite-based storage for challenges, routine instances and progress aggregates.
//!
//! Every operation that mutates more than one row runs inside
//! [`ChallengeDb::transaction`]. Progress rows are written with
//! [`ChallengeDb::update_progress_checked`], which only succeeds when the
//! stored version still matches the one the caller read.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};

use super::data_dir;
use super::migrations;
use crate::challenge::{
    Challenge, ChallengeCategory, ChallengeMode, PlannedRoutine, RoutineInstance, CHALLENGE_DAYS,
};
use crate::error::{CoreError, DatabaseError, Result};
use crate::progress::{LevelPolicy, ProgressAggregate};

pub(super) const DATE_FORMAT: &str = "%Y-%m-%d";

pub(super) const CHALLENGE_COLUMNS: &str = "c.id, c.owner_id, c.category, c.title, c.start_date, \
     c.end_date, c.total_days, c.active, c.mode, c.virtual_current_date, c.created_at";
pub(super) const CHALLENGE_WIDTH: usize = 11;

pub(super) const ROUTINE_COLUMNS: &str =
    "r.id, r.challenge_id, r.name, r.scheduled_date, r.complete, r.custom";
pub(super) const ROUTINE_WIDTH: usize = 6;

pub(super) const PROGRESS_COLUMNS: &str =
    "p.id, p.challenge_id, p.completed_count, p.total_count, p.level, p.version";

// === Helper Functions ===

pub(super) fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn corrupt(idx: usize, column: &'static str, value: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        Box::new(DatabaseError::Corrupt { column, value }),
    )
}

pub(super) fn date_at(row: &Row, idx: usize, column: &'static str) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|_| corrupt(idx, column, raw))
}

/// Parse datetime from RFC3339 string with fallback to current time
fn parse_datetime_fallback(dt_str: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(dt_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Build a Challenge from `CHALLENGE_COLUMNS` starting at column `base`.
pub(super) fn row_to_challenge(row: &Row, base: usize) -> rusqlite::Result<Challenge> {
    let category_id: u32 = row.get(base + 2)?;
    let category = ChallengeCategory::from_id(category_id)
        .map_err(|_| corrupt(base + 2, "category", category_id.to_string()))?;

    let mode_str: String = row.get(base + 8)?;
    let mode =
        ChallengeMode::parse(&mode_str).ok_or_else(|| corrupt(base + 8, "mode", mode_str.clone()))?;

    let virtual_current_date = match row.get::<_, Option<String>>(base + 9)? {
        Some(raw) => Some(
            NaiveDate::parse_from_str(&raw, DATE_FORMAT)
                .map_err(|_| corrupt(base + 9, "virtual_current_date", raw))?,
        ),
        None => None,
    };

    let created_at: String = row.get(base + 10)?;

    Ok(Challenge {
        id: row.get(base)?,
        owner_id: row.get(base + 1)?,
        category,
        title: row.get(base + 3)?,
        start_date: date_at(row, base + 4, "start_date")?,
        end_date: date_at(row, base + 5, "end_date")?,
        total_days: row.get(base + 6)?,
        active: row.get(base + 7)?,
        mode,
        virtual_current_date,
        created_at: parse_datetime_fallback(&created_at),
    })
}

/// Build a RoutineInstance from `ROUTINE_COLUMNS` starting at column `base`.
pub(super) fn row_to_routine(row: &Row, base: usize) -> rusqlite::Result<RoutineInstance> {
    Ok(RoutineInstance {
        id: row.get(base)?,
        challenge_id: row.get(base + 1)?,
        name: row.get(base + 2)?,
        scheduled_date: date_at(row, base + 3, "scheduled_date")?,
        complete: row.get(base + 4)?,
        custom: row.get(base + 5)?,
    })
}

/// Build a ProgressAggregate from `PROGRESS_COLUMNS` starting at column `base`.
pub(super) fn row_to_progress(row: &Row, base: usize) -> rusqlite::Result<ProgressAggregate> {
    Ok(ProgressAggregate {
        id: row.get(base)?,
        challenge_id: row.get(base + 1)?,
        completed_count: row.get(base + 2)?,
        total_count: row.get(base + 3)?,
        level: row.get(base + 4)?,
        version: row.get(base + 5)?,
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

/// A challenge about to be inserted.
#[derive(Debug, Clone)]
pub struct NewChallenge {
    pub owner_id: String,
    pub category: ChallengeCategory,
    pub title: String,
    pub start_date: NaiveDate,
    pub mode: ChallengeMode,
}

impl NewChallenge {
    pub fn wall_clock(
        owner_id: impl Into<String>,
        category: ChallengeCategory,
        title: impl Into<String>,
        start_date: NaiveDate,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            category,
            title: title.into(),
            start_date,
            mode: ChallengeMode::WallClock,
        }
    }

    /// A simulated challenge; its cursor starts on `start_date`.
    pub fn simulated(
        owner_id: impl Into<String>,
        category: ChallengeCategory,
        title: impl Into<String>,
        start_date: NaiveDate,
    ) -> Self {
        Self {
            mode: ChallengeMode::Simulated,
            ..Self::wall_clock(owner_id, category, title, start_date)
        }
    }
}

/// Everything written when a challenge is created.
#[derive(Debug, Clone)]
pub struct CreatedChallenge {
    pub challenge: Challenge,
    pub progress: ProgressAggregate,
    pub routines: Vec<RoutineInstance>,
}

/// A routine joined with its owning challenge and that challenge's aggregate.
#[derive(Debug, Clone)]
pub struct RoutineContext {
    pub routine: RoutineInstance,
    pub challenge: Challenge,
    pub progress: ProgressAggregate,
}

/// SQLite database for challenge storage.
pub struct ChallengeDb {
    conn: Connection,
}

impl ChallengeDb {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/habitroom/habitroom.db`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(data_dir()?.join("habitroom.db"))
    }

    /// Open (or create) a database file at `path`.
    ///
    /// Each worker opens its own `ChallengeDb`; WAL lets readers proceed
    /// while one writer commits.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Create the base tables and apply pending migrations as one write.
    ///
    /// `BEGIN IMMEDIATE` takes the write lock before the version is read, so
    /// a second connection opening a fresh file waits, then finds the schema
    /// already current.
    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch("BEGIN IMMEDIATE TRANSACTION;")?;
        let applied = self.create_base_tables().and_then(|()| {
            migrations::migrate(&self.conn)
                .map_err(|e| CoreError::from(DatabaseError::MigrationFailed(e.to_string())))
        });
        match applied {
            Ok(()) => {
                if let Err(err) = self.conn.execute_batch("COMMIT;") {
                    let _ = self.conn.execute_batch("ROLLBACK;");
                    return Err(err.into());
                }
                Ok(())
            }
            Err(err) => {
                let _ = self.conn.execute_batch("ROLLBACK;");
                Err(err)
            }
        }
    }

    fn create_base_tables(&self) -> Result<()> {
        // v1 schema; later columns come from migrations
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS challenges (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id    TEXT NOT NULL,
                category    INTEGER NOT NULL,
                title       TEXT NOT NULL,
                start_date  TEXT NOT NULL,
                end_date    TEXT NOT NULL,
                total_days  INTEGER NOT NULL DEFAULT 7,
                active      INTEGER NOT NULL DEFAULT 1,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS routines (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                challenge_id   INTEGER NOT NULL REFERENCES challenges(id),
                name           TEXT NOT NULL,
                scheduled_date TEXT NOT NULL,
                complete       INTEGER NOT NULL DEFAULT 0,
                custom         INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS progress (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                challenge_id    INTEGER NOT NULL UNIQUE REFERENCES challenges(id),
                completed_count INTEGER NOT NULL DEFAULT 0,
                total_count     INTEGER NOT NULL DEFAULT 0,
                level           INTEGER NOT NULL DEFAULT 0,
                version         INTEGER NOT NULL DEFAULT 0,
                CHECK (completed_count >= 0 AND completed_count <= total_count)
            );

            -- At most one active challenge per owner
            CREATE UNIQUE INDEX IF NOT EXISTS idx_challenges_active_owner
                ON challenges(owner_id) WHERE active = 1;
            CREATE INDEX IF NOT EXISTS idx_routines_challenge_date
                ON routines(challenge_id, scheduled_date);",
        )?;
        Ok(())
    }

    /// Run `f` inside one transaction, committing on `Ok` and rolling back on `Err`.
    ///
    /// The transaction is deferred: reads take no write lock, so concurrent
    /// writers are detected by version checks rather than blocked up front.
    pub fn transaction<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        self.conn.execute_batch("BEGIN DEFERRED TRANSACTION;")?;
        match f() {
            Ok(value) => {
                if let Err(err) = self.conn.execute_batch("COMMIT;") {
                    let _ = self.conn.execute_batch("ROLLBACK;");
                    return Err(err.into());
                }
                Ok(value)
            }
            Err(err) => {
                let _ = self.conn.execute_batch("ROLLBACK;");
                Err(err)
            }
        }
    }

    // === Challenges ===

    /// Insert a challenge, its aggregate and its initial routines.
    ///
    /// Call inside [`Self::transaction`] so the three land together.
    ///
    /// # Errors
    /// `DUPLICATE_ACTIVE` if the owner already has an active challenge.
    pub fn create_challenge(
        &self,
        new: &NewChallenge,
        plan: &[PlannedRoutine],
    ) -> Result<CreatedChallenge> {
        let created_at = Utc::now();
        let end_date = Challenge::end_date_for(new.start_date);
        let cursor = match new.mode {
            ChallengeMode::Simulated => Some(format_date(new.start_date)),
            ChallengeMode::WallClock => None,
        };

        let inserted = self.conn.execute(
            "INSERT INTO challenges (owner_id, category, title, start_date, end_date, total_days,
                                     active, created_at, mode, virtual_current_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?8, ?9)",
            params![
                new.owner_id,
                new.category.id(),
                new.title,
                format_date(new.start_date),
                format_date(end_date),
                CHALLENGE_DAYS,
                created_at.to_rfc3339(),
                new.mode.as_str(),
                cursor,
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(err) if is_constraint_violation(&err) => {
                return Err(CoreError::DuplicateActive {
                    owner_id: new.owner_id.clone(),
                })
            }
            Err(err) => return Err(err.into()),
        }
        let challenge_id = self.conn.last_insert_rowid();

        let challenge = Challenge {
            id: challenge_id,
            owner_id: new.owner_id.clone(),
            category: new.category,
            title: new.title.clone(),
            start_date: new.start_date,
            end_date,
            total_days: CHALLENGE_DAYS,
            active: true,
            mode: new.mode,
            virtual_current_date: match new.mode {
                ChallengeMode::Simulated => Some(new.start_date),
                ChallengeMode::WallClock => None,
            },
            created_at,
        };

        let total = u32::try_from(plan.len()).unwrap_or(u32::MAX);
        let progress = self.insert_progress(&ProgressAggregate::initial(
            challenge_id,
            total,
            LevelPolicy::for_mode(new.mode),
        ))?;
        let routines = self.insert_routines(challenge_id, plan, false)?;

        Ok(CreatedChallenge {
            challenge,
            progress,
            routines,
        })
    }

    pub fn get_challenge(&self, id: i64) -> Result<Option<Challenge>> {
        let sql = format!("SELECT {CHALLENGE_COLUMNS} FROM challenges c WHERE c.id = ?1");
        let challenge = self
            .conn
            .query_row(&sql, params![id], |row| row_to_challenge(row, 0))
            .optional()?;
        Ok(challenge)
    }

    /// The owner's active challenge joined with its aggregate.
    pub fn find_active_challenge(
        &self,
        owner_id: &str,
    ) -> Result<Option<(Challenge, ProgressAggregate)>> {
        let sql = format!(
            "SELECT {CHALLENGE_COLUMNS}, {PROGRESS_COLUMNS}
             FROM challenges c
             JOIN progress p ON p.challenge_id = c.id
             WHERE c.owner_id = ?1 AND c.active = 1"
        );
        let found = self
            .conn
            .query_row(&sql, params![owner_id], |row| {
                Ok((row_to_challenge(row, 0)?, row_to_progress(row, CHALLENGE_WIDTH)?))
            })
            .optional()?;
        Ok(found)
    }

    /// All of an owner's challenges, newest first.
    pub fn list_challenges(&self, owner_id: &str) -> Result<Vec<Challenge>> {
        let sql = format!(
            "SELECT {CHALLENGE_COLUMNS} FROM challenges c WHERE c.owner_id = ?1 ORDER BY c.id DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![owner_id], |row| row_to_challenge(row, 0))?;
        let mut challenges = Vec::new();
        for row in rows {
            challenges.push(row?);
        }
        Ok(challenges)
    }

    pub fn set_challenge_active(&self, id: i64, active: bool) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE challenges SET active = ?1 WHERE id = ?2",
            params![active, id],
        )?;
        if changed == 0 {
            return Err(CoreError::not_found("challenge", id));
        }
        Ok(())
    }

    pub fn set_virtual_date(&self, id: i64, date: NaiveDate) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE challenges SET virtual_current_date = ?1 WHERE id = ?2",
            params![format_date(date), id],
        )?;
        if changed == 0 {
            return Err(CoreError::not_found("challenge", id));
        }
        Ok(())
    }

    // === Progress ===

    fn insert_progress(&self, progress: &ProgressAggregate) -> Result<ProgressAggregate> {
        self.conn.execute(
            "INSERT INTO progress (challenge_id, completed_count, total_count, level, version)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                progress.challenge_id,
                progress.completed_count,
                progress.total_count,
                progress.level,
                progress.version,
            ],
        )?;
        Ok(ProgressAggregate {
            id: self.conn.last_insert_rowid(),
            ..progress.clone()
        })
    }

    pub fn get_progress(&self, challenge_id: i64) -> Result<Option<ProgressAggregate>> {
        let sql = format!("SELECT {PROGRESS_COLUMNS} FROM progress p WHERE p.challenge_id = ?1");
        let progress = self
            .conn
            .query_row(&sql, params![challenge_id], |row| row_to_progress(row, 0))
            .optional()?;
        Ok(progress)
    }

    /// Write `next` only if the stored version still equals `expected_version`.
    ///
    /// Returns the aggregate as stored, with its version incremented.
    ///
    /// # Errors
    /// `CONFLICT` if another writer committed first.
    pub fn update_progress_checked(
        &self,
        next: &ProgressAggregate,
        expected_version: i64,
    ) -> Result<ProgressAggregate> {
        let changed = self
            .conn
            .execute(
                "UPDATE progress
                 SET completed_count = ?1, total_count = ?2, level = ?3, version = version + 1
                 WHERE id = ?4 AND version = ?5",
                params![
                    next.completed_count,
                    next.total_count,
                    next.level,
                    next.id,
                    expected_version,
                ],
            )
            .map_err(|e| CoreError::from(e).busy_as_conflict(next.id, expected_version))?;
        if changed == 0 {
            return Err(CoreError::Conflict {
                progress_id: next.id,
                expected_version,
            });
        }
        Ok(ProgressAggregate {
            version: expected_version + 1,
            ..next.clone()
        })
    }

    /// Write `next` regardless of the stored version (still bumping it).
    pub fn overwrite_progress(&self, next: &ProgressAggregate) -> Result<ProgressAggregate> {
        let changed = self.conn.execute(
            "UPDATE progress
             SET completed_count = ?1, total_count = ?2, level = ?3, version = version + 1
             WHERE id = ?4",
            params![next.completed_count, next.total_count, next.level, next.id],
        )?;
        if changed == 0 {
            return Err(CoreError::not_found("progress", next.id));
        }
        let version: i64 = self.conn.query_row(
            "SELECT version FROM progress WHERE id = ?1",
            params![next.id],
            |row| row.get(0),
        )?;
        Ok(ProgressAggregate {
            version,
            ..next.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn plan(n: usize) -> Vec<PlannedRoutine> {
        crate::challenge::generate_schedule(
            &(0..n).map(|i| format!("r{i}")).collect::<Vec<_>>(),
            start(),
        )
        .unwrap()
    }

    fn create(db: &ChallengeDb, owner: &str) -> CreatedChallenge {
        db.create_challenge(
            &NewChallenge::wall_clock(owner, ChallengeCategory::Health, "Morning", start()),
            &plan(2),
        )
        .unwrap()
    }

    #[test]
    fn create_and_find_active() {
        let db = ChallengeDb::open_memory().unwrap();
        let created = create(&db, "u1");
        assert_eq!(created.routines.len(), 14);
        assert_eq!(created.progress.total_count, 14);
        assert_eq!(created.progress.level, 1);

        let (challenge, progress) = db.find_active_challenge("u1").unwrap().unwrap();
        assert_eq!(challenge.id, created.challenge.id);
        assert_eq!(challenge.end_date, NaiveDate::from_ymd_opt(2024, 1, 7).unwrap());
        assert_eq!(challenge.mode, ChallengeMode::WallClock);
        assert_eq!(progress, created.progress);
        assert!(db.find_active_challenge("u2").unwrap().is_none());
    }

    #[test]
    fn second_active_challenge_is_rejected() {
        let db = ChallengeDb::open_memory().unwrap();
        let first = create(&db, "u1");
        let err = db
            .create_challenge(
                &NewChallenge::wall_clock("u1", ChallengeCategory::Study, "Again", start()),
                &plan(1),
            )
            .unwrap_err();
        assert_eq!(err.code(), "DUPLICATE_ACTIVE");

        db.set_challenge_active(first.challenge.id, false).unwrap();
        assert!(db
            .create_challenge(
                &NewChallenge::wall_clock("u1", ChallengeCategory::Study, "Again", start()),
                &plan(1),
            )
            .is_ok());
        assert_eq!(db.list_challenges("u1").unwrap().len(), 2);
    }

    #[test]
    fn checked_update_rejects_stale_version() {
        let db = ChallengeDb::open_memory().unwrap();
        let created = create(&db, "u1");
        let read = created.progress;

        let next = read.with_delta(1, LevelPolicy::Inclusive);
        let stored = db.update_progress_checked(&next, read.version).unwrap();
        assert_eq!(stored.version, read.version + 1);

        let err = db.update_progress_checked(&next, read.version).unwrap_err();
        assert!(matches!(err, CoreError::Conflict { .. }));
        let current = db.get_progress(read.challenge_id).unwrap().unwrap();
        assert_eq!(current.completed_count, 1);
        assert_eq!(current.version, read.version + 1);
    }

    #[test]
    fn overwrite_bumps_version() {
        let db = ChallengeDb::open_memory().unwrap();
        let created = create(&db, "u1");
        let stored = db
            .overwrite_progress(&created.progress.with_completed(3, LevelPolicy::Strict))
            .unwrap();
        assert_eq!(stored.version, created.progress.version + 1);
        assert_eq!(stored.completed_count, 3);
    }

    #[test]
    fn transaction_rolls_back_on_error() {
        let db = ChallengeDb::open_memory().unwrap();
        let result: Result<()> = db.transaction(|| {
            create(&db, "u1");
            Err(CoreError::not_found("anything", 1))
        });
        assert!(result.is_err());
        assert!(db.find_active_challenge("u1").unwrap().is_none());
    }

    #[test]
    fn simulated_challenge_stores_cursor() {
        let db = ChallengeDb::open_memory().unwrap();
        let created = db
            .create_challenge(
                &NewChallenge::simulated("u1", ChallengeCategory::Mindfulness, "Sim", start()),
                &plan(1),
            )
            .unwrap();
        assert_eq!(created.progress.level, 0);

        db.set_virtual_date(created.challenge.id, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap())
            .unwrap();
        let challenge = db.get_challenge(created.challenge.id).unwrap().unwrap();
        assert_eq!(challenge.mode, ChallengeMode::Simulated);
        assert_eq!(
            challenge.virtual_current_date,
            Some(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap())
        );
    }

    #[test]
    fn concurrent_opens_of_a_fresh_file_migrate_once() {
        use std::sync::{Arc, Barrier};

        for round in 0..5 {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join(format!("fresh-{round}.db"));
            // Switch the empty file to WAL up front so only the schema races.
            let raw = Connection::open(&path).unwrap();
            raw.pragma_update(None, "journal_mode", "WAL").unwrap();
            drop(raw);

            let barrier = Arc::new(Barrier::new(2));
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let barrier = barrier.clone();
                    let path = path.clone();
                    std::thread::spawn(move || {
                        barrier.wait();
                        ChallengeDb::open_at(&path).map(|_| ())
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap().unwrap();
            }

            let db = ChallengeDb::open_at(&path).unwrap();
            assert_eq!(
                migrations::get_schema_version(&db.conn),
                migrations::SCHEMA_VERSION
            );
            create(&db, "u1");
        }
    }
}
