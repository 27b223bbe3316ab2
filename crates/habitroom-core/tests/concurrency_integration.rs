//! Concurrent writers against one challenge.
//!
//! Every worker owns its own connection to a shared database file, the way
//! separate requests would. Two toggles on distinct routines of the same
//! challenge race for the single progress row: at most one may lose with
//! CONFLICT, and the surviving aggregate must agree with the routine rows.

use std::sync::{Arc, Barrier};

use chrono::{Duration, NaiveDate};
use habitroom_core::{
    BatchItem, ChallengeDb, ChallengeService, CoreError, FixedClock, ServiceContext,
    StaticDirectory, ToggleResult,
};

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn context(today: NaiveDate) -> ServiceContext {
    ServiceContext::default()
        .with_clock(Arc::new(FixedClock::new(today)))
        .with_directory(Arc::new(StaticDirectory::new(["alice"])))
}

/// Service whose clock sits on the start date; used to create the challenge.
fn setup_at(path: &std::path::Path) -> ChallengeService {
    ChallengeService::new(ChallengeDb::open_at(path).unwrap(), context(start()))
}

/// Service on the last day of the challenge, so every routine is inside the window.
fn service_at(path: &std::path::Path) -> ChallengeService {
    ChallengeService::new(
        ChallengeDb::open_at(path).unwrap(),
        context(start() + Duration::days(6)),
    )
}

fn completed_rows(db: &ChallengeDb, challenge_id: i64) -> u32 {
    db.list_routines(challenge_id)
        .unwrap()
        .iter()
        .filter(|r| r.complete)
        .count() as u32
}

async fn race(
    first: (ChallengeService, i64),
    second: (ChallengeService, i64),
) -> Vec<(ChallengeService, Result<ToggleResult, CoreError>)> {
    let barrier = Arc::new(Barrier::new(2));
    let mut handles = Vec::new();
    for (service, routine_id) in [first, second] {
        let barrier = barrier.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            barrier.wait();
            let result = service.toggle_routine("alice", routine_id);
            (service, result)
        }));
    }
    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap());
    }
    outcomes
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_toggles_lose_at_most_once_and_stay_consistent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("habitroom.db");

    let setup = setup_at(&path);
    let created = setup
        .create_challenge("alice", 1, "Race", &["A".to_string(), "B".to_string(), "C".to_string()])
        .unwrap();
    assert_eq!(created.start_date, start());
    let ids: Vec<i64> = created.routines.iter().map(|r| r.routine_id).collect();

    let mut left = service_at(&path);
    let mut right = service_at(&path);
    let mut conflicts = 0;

    for pair in ids.chunks(2).filter(|pair| pair.len() == 2) {
        let outcomes = race((left, pair[0]), (right, pair[1])).await;
        let mut round_conflicts = 0;
        let mut services = Vec::new();
        for (service, result) in outcomes {
            match result {
                Ok(toggled) => assert!(toggled.complete),
                Err(err) => {
                    assert_eq!(err.code(), "CONFLICT", "unexpected failure: {err}");
                    assert!(err.is_retryable());
                    round_conflicts += 1;
                }
            }
            services.push(service);
        }
        assert!(round_conflicts <= 1, "both writers lost the same race");
        conflicts += round_conflicts;

        let progress = setup.db().get_progress(created.challenge_id).unwrap().unwrap();
        assert_eq!(
            progress.completed_count,
            completed_rows(setup.db(), created.challenge_id)
        );

        right = services.pop().unwrap();
        left = services.pop().unwrap();
    }

    let progress = setup.db().get_progress(created.challenge_id).unwrap().unwrap();
    assert_eq!(progress.completed_count as usize, 20 - conflicts);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn losing_batch_leaves_no_partial_flips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("habitroom.db");

    let setup = setup_at(&path);
    let created = setup
        .create_challenge("alice", 2, "Batch race", &["A".to_string(), "B".to_string()])
        .unwrap();
    let ids: Vec<i64> = created.routines.iter().map(|r| r.routine_id).collect();

    let barrier = Arc::new(Barrier::new(2));
    let batch_ids = ids[..6].to_vec();
    let toggle_id = ids[10];

    let batch = {
        let barrier = barrier.clone();
        let service = service_at(&path);
        tokio::task::spawn_blocking(move || {
            let items: Vec<BatchItem> = batch_ids.iter().map(|id| BatchItem::new(*id, true)).collect();
            barrier.wait();
            service.update_many("alice", &items).map(|r| r.updated_count)
        })
    };
    let toggle = {
        let service = service_at(&path);
        tokio::task::spawn_blocking(move || {
            barrier.wait();
            service.toggle_routine("alice", toggle_id).map(|r| r.complete)
        })
    };

    let batch = batch.await.unwrap();
    let toggle = toggle.await.unwrap();
    assert!(batch.is_ok() || toggle.is_ok());

    let flipped = ids[..6]
        .iter()
        .filter(|id| setup.db().get_routine(**id).unwrap().unwrap().complete)
        .count();
    match &batch {
        Ok(updated) => {
            assert_eq!(*updated, 6);
            assert_eq!(flipped, 6);
        }
        Err(err) => {
            assert_eq!(err.code(), "CONFLICT");
            assert_eq!(flipped, 0);
        }
    }

    let progress = setup.db().get_progress(created.challenge_id).unwrap().unwrap();
    assert_eq!(
        progress.completed_count,
        completed_rows(setup.db(), created.challenge_id)
    );
}
