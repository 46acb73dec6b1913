// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Appliance profiles

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{ConfigError, Settings};

/// Icon used when a profile names none
pub const DEFAULT_ICON: &str = "4474";

/// Profile entry as written in the configuration file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileConfig {
    pub event_name: String,
    #[serde(default)]
    pub event_name_plural: Option<String>,
    pub threshold_on: f64,
    pub threshold_off: f64,
    #[serde(default)]
    pub cooldown_seconds: Option<u64>,
    #[serde(default)]
    pub cooling_confirmation_seconds: Option<u64>,
    #[serde(default)]
    pub min_duration_seconds: u64,
    #[serde(default)]
    pub max_duration_seconds: Option<u64>,
    #[serde(default)]
    pub track_duration: bool,
    #[serde(default)]
    pub track_energy: bool,
    #[serde(default)]
    pub awtrix_icon: Option<String>,
}

/// Validated profile governing one detector. Read-only at runtime.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Profile {
    /// Event type label, e.g. `espresso`
    pub event_name: String,
    pub event_name_plural: String,
    /// Power at or above which an idle appliance starts an event
    pub threshold_on: f64,
    /// Power below which an active appliance starts cooling down
    pub threshold_off: f64,
    pub cooldown_seconds: u64,
    pub cooling_confirmation_seconds: u64,
    pub min_duration_seconds: u64,
    pub max_duration_seconds: Option<u64>,
    pub track_duration: bool,
    pub track_energy: bool,
    pub awtrix_icon: String,
}

impl ProfileConfig {
    /// Fill defaults from the global settings and check the hysteresis band
    pub fn resolve(&self, device: &str, settings: &Settings) -> Result<Profile, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidProfile {
            device: device.to_string(),
            reason,
        };

        if self.event_name.trim().is_empty() {
            return Err(invalid("event_name must not be empty".to_string()));
        }
        if !self.threshold_on.is_finite() || !self.threshold_off.is_finite() {
            return Err(invalid("thresholds must be finite".to_string()));
        }
        if self.threshold_off < 0.0 {
            return Err(invalid(format!("threshold_off {} is negative", self.threshold_off)));
        }
        if self.threshold_on <= self.threshold_off {
            return Err(invalid(format!(
                "threshold_on {}W must be above threshold_off {}W",
                self.threshold_on, self.threshold_off
            )));
        }
        if let Some(max) = self.max_duration_seconds {
            if max < self.min_duration_seconds {
                return Err(invalid(format!(
                    "max_duration_seconds {} is below min_duration_seconds {}",
                    max, self.min_duration_seconds
                )));
            }
        }

        Ok(Profile {
            event_name: self.event_name.clone(),
            event_name_plural: self
                .event_name_plural
                .clone()
                .unwrap_or_else(|| self.event_name.clone()),
            threshold_on: self.threshold_on,
            threshold_off: self.threshold_off,
            cooldown_seconds: self.cooldown_seconds.unwrap_or(settings.cooldown_seconds),
            cooling_confirmation_seconds: self
                .cooling_confirmation_seconds
                .unwrap_or(settings.cooling_confirmation_seconds),
            min_duration_seconds: self.min_duration_seconds,
            max_duration_seconds: self.max_duration_seconds,
            track_duration: self.track_duration,
            track_energy: self.track_energy,
            awtrix_icon: self
                .awtrix_icon
                .clone()
                .unwrap_or_else(|| DEFAULT_ICON.to_string()),
        })
    }
}

/// Complete, validated profile table. Only constructible through validation,
/// so holding one means every profile is usable.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSet {
    profiles: BTreeMap<String, Profile>,
}

impl ProfileSet {
    pub fn from_config(
        raw: &BTreeMap<String, ProfileConfig>,
        settings: &Settings,
    ) -> Result<Self, ConfigError> {
        if raw.is_empty() {
            return Err(ConfigError::NoProfiles);
        }

        let mut profiles = BTreeMap::new();
        for (device, entry) in raw {
            if device.trim().is_empty() {
                return Err(ConfigError::InvalidProfile {
                    device: device.clone(),
                    reason: "device identifier must not be empty".to_string(),
                });
            }
            profiles.insert(device.clone(), entry.resolve(device, settings)?);
        }

        Ok(Self { profiles })
    }

    pub fn get(&self, device: &str) -> Option<&Profile> {
        self.profiles.get(device)
    }

    /// Profiles in device-id order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Profile)> {
        self.profiles.iter()
    }

    pub fn devices(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
