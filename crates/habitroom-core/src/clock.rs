//! Injectable time source.
//!
//! Nothing in the core reads the ambient system clock directly: services ask
//! a [`Clock`] for "today", which keeps schedule generation and day-index
//! math reproducible in tests.

use std::sync::Mutex;

use chrono::{Duration, Local, NaiveDate};

/// Source of the current calendar date.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Local wall-clock date.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock pinned to a date that tests move by hand.
#[derive(Debug)]
pub struct FixedClock {
    date: Mutex<NaiveDate>,
}

impl FixedClock {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date: Mutex::new(date),
        }
    }

    pub fn set(&self, date: NaiveDate) {
        *self.lock() = date;
    }

    pub fn advance_days(&self, days: i64) {
        let mut guard = self.lock();
        *guard += Duration::days(days);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, NaiveDate> {
        // A poisoned date is still a valid date.
        self.date.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        *self.lock()
    }
}
