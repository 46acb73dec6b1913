// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! plugwatch - appliance usage events from smart-plug power readings
//!
//! Polls the latest power sample of every monitored plug, runs a per-appliance
//! state machine over it and turns completed runs (an espresso, a TV session,
//! a charge cycle) into events. Events are stored, announced on a shared
//! matrix display and summarised on a fixed schedule.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Orchestrator                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────┐   ┌────────────┐   ┌───────────────────────┐   │
//! │  │ Readings │ → │ Detector   │ → │ Event store           │   │
//! │  │ source   │   │ registry   │   │ (SQLite / InfluxDB)   │   │
//! │  └──────────┘   └────────────┘   └───────────────────────┘   │
//! │                       ↓                     ↓                │
//! │               ┌──────────────┐    ┌──────────────────┐       │
//! │               │ Notification │ ←  │ Summary          │       │
//! │               │ gate + queue │    │ scheduler        │ → push│
//! │               └──────────────┘    └──────────────────┘       │
//! │                       ↓                                      │
//! │               display (HTTP / MQTT)                          │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod analysis;
pub mod config;
pub mod core;
pub mod db;
pub mod detection;
pub mod notify;
pub mod sensors;

// Re-exports for convenience
pub use config::{Config, ConfigError, Profile, ProfileSet};
pub use core::{Clock, Collaborators, CycleReport, Orchestrator, SummaryScheduler, SystemClock};
pub use db::{EventAggregate, EventStore, StoreError};
pub use detection::{Detector, DetectorRegistry, Event, Phase};
pub use notify::{DisplaySink, NotificationGate, NotificationMessage, PushSink, SinkError};
pub use sensors::{Reading, ReadingsSource};

/// plugwatch version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// plugwatch name
pub const NAME: &str = "plugwatch";
