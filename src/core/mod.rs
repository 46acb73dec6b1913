// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Core module - clock, summary scheduling and the poll loop

mod clock;
mod engine;
mod scheduler;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{Collaborators, CycleReport, Orchestrator};
pub use scheduler::{SummaryPeriod, SummaryScheduler, SUMMARY_MINUTES, SUMMARY_PERIODS};
