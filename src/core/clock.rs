// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Wall-clock sources
//!
//! Carousel windows and summary cadences are defined on the display's local
//! wall clock, so everything time-gated asks a [`Clock`] instead of calling
//! `Local::now()` directly.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, Utc};
use parking_lot::Mutex;

/// Source of local wall-clock time
pub trait Clock: Send + Sync {
    /// Current local time
    fn now(&self) -> NaiveDateTime;

    /// Local calendar date of an instant
    fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate;
}

/// The host's clock and time zone
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&Local).date_naive()
    }
}

/// Manually driven clock. Local time is UTC.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock()
    }

    fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.date_naive()
    }
}
