//! Deterministic routine schedule generation.
//!
//! Days are the outer loop and names the inner loop, so for names
//! `[A, B, C]` the plan reads `A@d0, B@d0, C@d0, A@d1, ...`. Storage assigns
//! ids in plan order, which lets callers address instances by position.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::{CHALLENGE_DAYS, MAX_INITIAL_ROUTINES};
use crate::error::ValidationError;

/// A routine instance that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedRoutine {
    pub name: String,
    pub scheduled_date: NaiveDate,
}

/// Plan the initial routines of a challenge starting on `start`.
///
/// # Errors
/// Returns an error unless between 1 and 3 names are given.
pub fn generate_schedule(
    names: &[String],
    start: NaiveDate,
) -> Result<Vec<PlannedRoutine>, ValidationError> {
    if names.is_empty() || names.len() > MAX_INITIAL_ROUTINES {
        return Err(ValidationError::Cardinality {
            field: "routine_names".to_string(),
            min: 1,
            max: MAX_INITIAL_ROUTINES,
            len: names.len(),
        });
    }

    let mut plan = Vec::with_capacity(names.len() * CHALLENGE_DAYS as usize);
    for day in 0..i64::from(CHALLENGE_DAYS) {
        let scheduled_date = start + Duration::days(day);
        for name in names {
            plan.push(PlannedRoutine {
                name: name.clone(),
                scheduled_date,
            });
        }
    }
    Ok(plan)
}

/// Plan one instance of `name` for each of `days`.
pub fn plan_extension(name: &str, days: &[NaiveDate]) -> Vec<PlannedRoutine> {
    days.iter()
        .map(|day| PlannedRoutine {
            name: name.to_string(),
            scheduled_date: *day,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn yields_n_per_day_for_seven_days() {
        for n in 1..=3 {
            let input: Vec<String> = (0..n).map(|i| format!("routine-{i}")).collect();
            let plan = generate_schedule(&input, start()).unwrap();
            assert_eq!(plan.len(), n * 7);

            for offset in 0..7 {
                let day = start() + Duration::days(offset);
                let on_day = plan.iter().filter(|p| p.scheduled_date == day).count();
                assert_eq!(on_day, n, "day offset {offset}");
            }
        }
    }

    #[test]
    fn order_is_days_outer_names_inner() {
        let plan = generate_schedule(&names(&["A", "B", "C"]), start()).unwrap();
        assert_eq!(plan[0].name, "A");
        assert_eq!(plan[1].name, "B");
        assert_eq!(plan[2].name, "C");
        assert_eq!(plan[3].name, "A");
        assert_eq!(plan[3].scheduled_date, start() + Duration::days(1));
        assert_eq!(plan[20].name, "C");
        assert_eq!(plan[20].scheduled_date, start() + Duration::days(6));
    }

    #[test]
    fn identical_input_gives_identical_plan() {
        let input = names(&["Stretch", "Read"]);
        assert_eq!(
            generate_schedule(&input, start()).unwrap(),
            generate_schedule(&input, start()).unwrap()
        );
    }

    #[test]
    fn rejects_empty_and_oversized_name_lists() {
        assert!(generate_schedule(&[], start()).is_err());
        assert!(generate_schedule(&names(&["a", "b", "c", "d"]), start()).is_err());
    }

    #[test]
    fn extension_plans_one_per_day() {
        let days = vec![start(), start() + Duration::days(1)];
        let plan = plan_extension("Walk", &days);
        assert_eq!(plan.len(), 2);
        assert!(plan.iter().all(|p| p.name == "Walk"));
    }
}
