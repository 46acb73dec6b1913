// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Appliance event detector
//!
//! One detector per monitored plug. Samples move it through
//! `Idle -> Active -> CoolingDown -> Idle`; a window that stays below
//! `threshold_off` for `cooling_confirmation_seconds` is finalized into an
//! [`Event`] if its duration is inside the profile's bounds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{seconds_between, Event};
use crate::config::Profile;

/// Detector phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Idle,
    Active,
    CoolingDown,
}

/// Mutable detector state, owned by its [`Detector`]
#[derive(Debug, Clone, Default)]
pub struct DetectorState {
    pub phase: Phase,
    pub event_start: Option<DateTime<Utc>>,
    pub cooling_start: Option<DateTime<Utc>>,
    /// Samples of the active window only
    pub samples: Vec<(f64, DateTime<Utc>)>,
    pub last_event_end: Option<DateTime<Utc>>,
}

/// Per-appliance event detector
#[derive(Debug, Clone)]
pub struct Detector {
    device: String,
    profile: Profile,
    state: DetectorState,
}

impl Detector {
    pub fn new(device: &str, profile: Profile) -> Self {
        info!(
            "Initialized detector for {}: {} (on>={}W, off<{}W)",
            device, profile.event_name, profile.threshold_on, profile.threshold_off
        );

        Self {
            device: device.to_string(),
            profile,
            state: DetectorState::default(),
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn state(&self) -> &DetectorState {
        &self.state
    }

    /// Feed one sample. Returns the event completed by this sample, if any.
    pub fn process(&mut self, power: f64, timestamp: DateTime<Utc>) -> Option<Event> {
        // Cooldown: the sample is ignored entirely
        if let Some(last_end) = self.state.last_event_end {
            if seconds_between(last_end, timestamp) < self.profile.cooldown_seconds as f64 {
                return None;
            }
        }

        match self.state.phase {
            Phase::Idle => {
                if power >= self.profile.threshold_on {
                    self.state.phase = Phase::Active;
                    self.state.event_start = Some(timestamp);
                    self.state.samples = vec![(power, timestamp)];
                    info!("{}: Event started (power={:.1}W)", self.device, power);
                }
            }
            Phase::Active => {
                if power < self.profile.threshold_off {
                    self.state.phase = Phase::CoolingDown;
                    self.state.cooling_start = Some(timestamp);
                    debug!("{}: Cooling down (power={:.1}W)", self.device, power);
                } else {
                    self.state.samples.push((power, timestamp));
                }
            }
            Phase::CoolingDown => {
                if power >= self.profile.threshold_off {
                    // False alarm, the appliance is still running
                    self.state.phase = Phase::Active;
                    self.state.samples.push((power, timestamp));
                    self.state.cooling_start = None;
                    debug!("{}: Back to active (power={:.1}W)", self.device, power);
                } else if let Some(cooling_start) = self.state.cooling_start {
                    let cooled = seconds_between(cooling_start, timestamp);
                    if cooled >= self.profile.cooling_confirmation_seconds as f64 {
                        return self.finalize(timestamp);
                    }
                }
            }
        }

        None
    }

    fn finalize(&mut self, end_time: DateTime<Utc>) -> Option<Event> {
        let Some(start_time) = self.state.event_start else {
            self.reset();
            return None;
        };

        let duration = seconds_between(start_time, end_time);
        let min = self.profile.min_duration_seconds as f64;

        if duration < min {
            info!(
                "{}: Event too short ({:.0}s < {:.0}s), discarding",
                self.device, duration, min
            );
            self.reset();
            return None;
        }

        if let Some(max) = self.profile.max_duration_seconds {
            if duration > max as f64 {
                info!(
                    "{}: Event too long ({:.0}s > {}s), discarding",
                    self.device, duration, max
                );
                self.reset();
                return None;
            }
        }

        let samples = &self.state.samples;
        let peak_power = samples.iter().map(|(p, _)| *p).fold(0.0, f64::max);
        let avg_power = if samples.is_empty() {
            0.0
        } else {
            samples.iter().map(|(p, _)| p).sum::<f64>() / samples.len() as f64
        };
        let energy_wh = avg_power * duration / 3600.0;

        let event = Event {
            device: self.device.clone(),
            event_type: self.profile.event_name.clone(),
            start_time,
            end_time,
            duration_seconds: duration,
            energy_wh,
            peak_power,
            avg_power,
        };

        info!(
            "{}: Event completed - {} (duration={:.0}s, energy={:.1}Wh, peak={:.0}W)",
            self.device, event.event_type, duration, energy_wh, peak_power
        );

        self.state.last_event_end = Some(end_time);
        self.reset();
        Some(event)
    }

    fn reset(&mut self) {
        self.state.phase = Phase::Idle;
        self.state.event_start = None;
        self.state.cooling_start = None;
        self.state.samples.clear();
    }
}
