// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Detector registry - one detector per configured appliance

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::{Detector, Event};
use crate::config::{Config, ConfigError, Profile, ProfileSet};

/// Owns every detector and routes samples to them
#[derive(Debug, Default)]
pub struct DetectorRegistry {
    detectors: BTreeMap<String, Detector>,
}

impl DetectorRegistry {
    pub fn new(profiles: &ProfileSet) -> Self {
        let detectors = profiles
            .iter()
            .map(|(device, profile)| (device.clone(), Detector::new(device, profile.clone())))
            .collect::<BTreeMap<_, _>>();

        info!("Initialized {} event detectors", detectors.len());
        Self { detectors }
    }

    /// Validate the profile table of `config` and build the registry
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self::new(&config.profile_set()?))
    }

    /// Feed a sample to the device's detector. Unknown devices are ignored.
    pub fn route(&mut self, device: &str, power: f64, timestamp: DateTime<Utc>) -> Option<Event> {
        match self.detectors.get_mut(device) {
            Some(detector) => detector.process(power, timestamp),
            None => {
                debug!("Ignoring reading for unknown device '{}'", device);
                None
            }
        }
    }

    /// Swap in a new profile table. Detectors whose profile did not change keep
    /// their state; the rest start idle.
    pub fn reload(&mut self, profiles: &ProfileSet) {
        let mut previous = std::mem::take(&mut self.detectors);
        let mut kept = 0;

        let detectors: BTreeMap<String, Detector> = profiles
            .iter()
            .map(|(device, profile)| {
                let detector = match previous.remove(device) {
                    Some(existing) if existing.profile() == profile => {
                        kept += 1;
                        existing
                    }
                    _ => Detector::new(device, profile.clone()),
                };
                (device.clone(), detector)
            })
            .collect();

        self.detectors = detectors;
        info!(
            "Reloaded profiles: {} detectors ({} unchanged, {} removed)",
            self.detectors.len(),
            kept,
            previous.len()
        );
    }

    /// Device identifiers in routing order
    pub fn device_ids(&self) -> Vec<String> {
        self.detectors.keys().cloned().collect()
    }

    pub fn detector(&self, device: &str) -> Option<&Detector> {
        self.detectors.get(device)
    }

    pub fn profile(&self, device: &str) -> Option<&Profile> {
        self.detectors.get(device).map(Detector::profile)
    }

    /// First profile (in device order) producing events of this type
    pub fn profile_for_event_type(&self, event_type: &str) -> Option<&Profile> {
        self.detectors
            .values()
            .map(Detector::profile)
            .find(|profile| profile.event_name == event_type)
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProfileConfig, Settings};
    use crate::detection::Phase;
    use chrono::{Duration, TimeZone};

    fn raw(event_name: &str, on: f64, off: f64) -> ProfileConfig {
        ProfileConfig {
            event_name: event_name.to_string(),
            event_name_plural: None,
            threshold_on: on,
            threshold_off: off,
            cooldown_seconds: None,
            cooling_confirmation_seconds: None,
            min_duration_seconds: 0,
            max_duration_seconds: None,
            track_duration: true,
            track_energy: false,
            awtrix_icon: None,
        }
    }

    fn profiles(entries: &[(&str, ProfileConfig)]) -> ProfileSet {
        let map = entries
            .iter()
            .map(|(d, p)| (d.to_string(), p.clone()))
            .collect::<BTreeMap<_, _>>();
        ProfileSet::from_config(&map, &Settings::default()).unwrap()
    }

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 20, 0, 0).unwrap() + Duration::seconds(secs)
    }

    #[test]
    fn test_route_to_matching_detector() {
        let set = profiles(&[("tv", raw("tv_session", 60.0, 20.0)), ("coffee", raw("espresso", 1000.0, 50.0))]);
        let mut registry = DetectorRegistry::new(&set);
        assert_eq!(registry.device_ids(), vec!["coffee", "tv"]);

        assert!(registry.route("tv", 80.0, t(0)).is_none());
        assert_eq!(registry.detector("tv").unwrap().phase(), Phase::Active);
        assert_eq!(registry.detector("coffee").unwrap().phase(), Phase::Idle);

        assert!(registry.route("tv", 5.0, t(600)).is_none());
        let event = registry.route("tv", 5.0, t(630)).unwrap();
        assert_eq!(event.device, "tv");
        assert_eq!(event.event_type, "tv_session");
    }

    #[test]
    fn test_unknown_device_ignored() {
        let set = profiles(&[("tv", raw("tv_session", 60.0, 20.0))]);
        let mut registry = DetectorRegistry::new(&set);
        assert!(registry.route("fridge", 500.0, t(0)).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_profile_lookup_by_event_type() {
        let set = profiles(&[("tv", raw("tv_session", 60.0, 20.0))]);
        let registry = DetectorRegistry::new(&set);
        assert!(registry.profile_for_event_type("tv_session").is_some());
        assert!(registry.profile_for_event_type("espresso").is_none());
    }

    #[test]
    fn test_from_config_rejects_empty_table() {
        let config = Config::from_toml_str("").unwrap();
        assert!(matches!(
            DetectorRegistry::from_config(&config),
            Err(ConfigError::NoProfiles)
        ));
    }

    #[test]
    fn test_reload_is_whole_table_replacement() {
        let set = profiles(&[("tv", raw("tv_session", 60.0, 20.0)), ("coffee", raw("espresso", 1000.0, 50.0))]);
        let mut registry = DetectorRegistry::new(&set);
        registry.route("tv", 80.0, t(0));
        registry.route("coffee", 1200.0, t(0));

        // tv unchanged, coffee retuned, kettle added
        let next = profiles(&[
            ("tv", raw("tv_session", 60.0, 20.0)),
            ("coffee", raw("espresso", 900.0, 40.0)),
            ("kettle", raw("boil", 1500.0, 100.0)),
        ]);
        registry.reload(&next);

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.detector("tv").unwrap().phase(), Phase::Active);
        assert_eq!(registry.detector("coffee").unwrap().phase(), Phase::Idle);
        assert_eq!(registry.profile("coffee").unwrap().threshold_on, 900.0);
        assert!(registry.detector("kettle").is_some());
    }
}
