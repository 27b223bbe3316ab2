//! End-to-end challenge walkthroughs through the public API.

use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use habitroom_core::{
    BatchItem, ChallengeDb, ChallengeService, DayAdvance, FixedClock, ServiceContext,
    SimulatedChallengeService, StaticDirectory,
};

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn context(clock: Arc<FixedClock>) -> ServiceContext {
    ServiceContext::default()
        .with_clock(clock)
        .with_directory(Arc::new(StaticDirectory::new(["alice", "bob"])))
}

#[test]
fn week_with_batches_and_an_extension() {
    let clock = Arc::new(FixedClock::new(start()));
    let service = ChallengeService::new(ChallengeDb::open_memory().unwrap(), context(clock.clone()));

    let created = service
        .create_challenge("alice", 1, "Morning", &names(&["A", "B", "C"]))
        .unwrap();
    assert_eq!(created.total_routine_count, 21);
    assert_eq!(created.end_date, NaiveDate::from_ymd_opt(2024, 1, 7).unwrap());

    // Day two: catch up on day one and do day two in one batch.
    clock.advance_days(1);
    let items: Vec<BatchItem> = created.routines[..5]
        .iter()
        .map(|r| BatchItem::new(r.routine_id, true))
        .collect();
    let batch = service.update_many("alice", &items).unwrap();
    assert_eq!(batch.updated_count, 5);

    let detail = service.get_active_challenge_detail("alice").unwrap();
    assert_eq!(detail.current_day, 2);
    assert_eq!(detail.completed_count, 5);
    assert_eq!(detail.progress_percentage, 23.8);
    assert_eq!(detail.level, 1);

    service
        .toggle_routine("alice", created.routines[5].routine_id)
        .unwrap();
    let detail = service.get_active_challenge_detail("alice").unwrap();
    assert_eq!(detail.progress_percentage, 28.6);
    assert_eq!(detail.level, 2);

    // Day five: one custom routine for the last three days.
    clock.advance_days(3);
    let extension = service.add_custom_routine("alice", "Stretch").unwrap();
    assert_eq!(extension.added_count, 3);
    assert_eq!(extension.total_routine_count, 24);
    assert_eq!(extension.routines[0].scheduled_date, start() + Duration::days(4));

    let detail = service.get_active_challenge_detail("alice").unwrap();
    assert_eq!(detail.today_routines.len(), 4);
    assert_eq!(detail.total_count, 24);
    assert_eq!(detail.cheering_message, "Past the halfway mark, 2 days to go.");

    let finished = service.finish_challenge("alice").unwrap();
    assert_eq!(finished.completed_count, 6);
    assert_eq!(finished.total_count, 24);
}

#[test]
fn simulated_week_runs_to_completion() {
    let clock = Arc::new(FixedClock::new(start()));
    let service =
        SimulatedChallengeService::new(ChallengeDb::open_memory().unwrap(), context(clock.clone()));
    let created = service
        .start_challenge("bob", 3, "Calm", &names(&["Breathe", "Walk"]))
        .unwrap();

    // The wall clock no longer matters once the cursor exists.
    clock.advance_days(30);
    let mut day = 1;
    loop {
        for routine in service.detail("bob").unwrap().today_routines {
            service.toggle_routine("bob", routine.routine_id).unwrap();
        }
        match service.advance_day("bob").unwrap() {
            DayAdvance::NextDay(detail) => {
                day += 1;
                assert_eq!(detail.current_day, day);
                assert_eq!(detail.virtual_date, Some(start() + Duration::days(day as i64 - 1)));
            }
            DayAdvance::Finished(summary) => {
                assert_eq!(summary.challenge_id, created.challenge_id);
                assert_eq!(summary.completed_count, 14);
                assert_eq!(summary.level, 4);
                break;
            }
        }
    }
    assert_eq!(day, 7);

    let stats = service.recalculate_statistics(created.challenge_id).unwrap();
    assert_eq!(stats.completed_count, 14);
    assert_eq!(stats.total_count, 14);
}
