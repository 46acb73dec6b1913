// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Smart-plug simulator for demo/testing

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rand::prelude::*;
use rand_distr::Normal;
use std::collections::BTreeMap;

use super::{Reading, ReadingsSource};
use crate::config::ProfileSet;

/// Simulated appliance behind one plug
#[derive(Debug, Clone)]
struct SimulatedPlug {
    threshold_on: f64,
    threshold_off: f64,
    /// Samples left in the current run, zero when idle
    remaining: u32,
    level: f64,
}

/// Produces plausible load curves for every configured appliance: idle noise
/// below the off threshold and occasional runs above the on threshold.
pub struct SimulatedReadings {
    plugs: Mutex<BTreeMap<String, SimulatedPlug>>,
    rng: Mutex<StdRng>,
    start_probability: f64,
}

impl SimulatedReadings {
    pub fn new(profiles: &ProfileSet) -> Self {
        Self::with_rng(profiles, StdRng::from_entropy())
    }

    /// Deterministic simulator
    pub fn with_seed(profiles: &ProfileSet, seed: u64) -> Self {
        Self::with_rng(profiles, StdRng::seed_from_u64(seed))
    }

    fn with_rng(profiles: &ProfileSet, rng: StdRng) -> Self {
        let plugs = profiles
            .iter()
            .map(|(device, profile)| {
                (
                    device.clone(),
                    SimulatedPlug {
                        threshold_on: profile.threshold_on,
                        threshold_off: profile.threshold_off,
                        remaining: 0,
                        level: profile.threshold_on,
                    },
                )
            })
            .collect();

        Self {
            plugs: Mutex::new(plugs),
            rng: Mutex::new(rng),
            start_probability: 0.05,
        }
    }

    pub fn set_start_probability(&mut self, probability: f64) {
        self.start_probability = probability.clamp(0.0, 1.0);
    }

    fn next_power(plug: &mut SimulatedPlug, rng: &mut StdRng, start_probability: f64) -> f64 {
        if plug.remaining == 0 && rng.gen::<f64>() < start_probability {
            plug.remaining = rng.gen_range(3..40);
            plug.level = plug.threshold_on * rng.gen_range(1.05..1.4);
        }

        if plug.remaining > 0 {
            plug.remaining -= 1;
            let noise = Normal::new(0.0, plug.level * 0.03)
                .map(|n| rng.sample(n))
                .unwrap_or(0.0);
            (plug.level + noise).max(plug.threshold_on)
        } else {
            rng.gen_range(0.0..plug.threshold_off.max(0.1) * 0.8)
        }
    }
}

#[async_trait]
impl ReadingsSource for SimulatedReadings {
    async fn latest(&self, devices: &[String]) -> Result<BTreeMap<String, Reading>> {
        let now = Utc::now();
        let mut plugs = self.plugs.lock();
        let mut rng = self.rng.lock();

        let readings = devices
            .iter()
            .filter_map(|device| {
                let plug = plugs.get_mut(device)?;
                let power = Self::next_power(plug, &mut rng, self.start_probability);
                Some((device.clone(), Reading::new(power, now)))
            })
            .collect();

        Ok(readings)
    }

    fn name(&self) -> &str {
        "simulator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn test_simulated_readings_stay_in_band() {
        let profiles = Config::default().profile_set().unwrap();
        let mut source = SimulatedReadings::with_seed(&profiles, 7);
        source.set_start_probability(0.3);
        let devices = profiles.devices();

        let mut saw_run = false;
        for _ in 0..200 {
            let readings = source.latest(&devices).await.unwrap();
            assert_eq!(readings.len(), devices.len());
            for (device, reading) in &readings {
                let profile = profiles.get(device).unwrap();
                assert!(reading.power >= 0.0);
                assert!(reading.power < profile.threshold_off || reading.power >= profile.threshold_on);
                saw_run |= reading.power >= profile.threshold_on;
            }
        }
        assert!(saw_run);
    }

    #[tokio::test]
    async fn test_unknown_devices_are_absent() {
        let profiles = Config::default().profile_set().unwrap();
        let source = SimulatedReadings::with_seed(&profiles, 1);
        let readings = source.latest(&["dishwasher".to_string()]).await.unwrap();
        assert!(readings.is_empty());
    }
}
