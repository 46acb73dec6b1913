// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Sensor module - power readings from smart plugs, real or simulated

mod influx;
mod simulator;
mod traits;

pub use influx::InfluxReadings;
pub use simulator::SimulatedReadings;
pub use traits::{Reading, ReadingsSource};
