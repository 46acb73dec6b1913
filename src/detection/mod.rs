// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Detection module - per-appliance usage event state machines

mod detector;
mod registry;

pub use detector::{Detector, DetectorState, Phase};
pub use registry::DetectorRegistry;

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// A completed, accepted usage event. Only a [`Detector`] creates these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub device: String,
    pub event_type: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: f64,
    pub energy_wh: f64,
    pub peak_power: f64,
    pub avg_power: f64,
}

impl Event {
    /// Hour of the start time (UTC), used as a store tag
    pub fn hour_of_day(&self) -> u32 {
        self.start_time.hour()
    }

    /// Weekday of the start time, Monday = 0
    pub fn day_of_week(&self) -> u32 {
        self.start_time.weekday().num_days_from_monday()
    }
}

/// Seconds between two instants, with millisecond resolution
pub(crate) fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}
