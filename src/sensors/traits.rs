// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Readings source trait and common types

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Latest instantaneous power sample of one smart plug
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Watts
    pub power: f64,
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    pub fn new(power: f64, timestamp: DateTime<Utc>) -> Self {
        Self { power, timestamp }
    }
}

/// Where power readings come from
#[async_trait]
pub trait ReadingsSource: Send + Sync {
    /// Most recent reading per requested device. Devices without a recent
    /// sample are simply absent from the map.
    async fn latest(&self, devices: &[String]) -> Result<BTreeMap<String, Reading>>;

    fn name(&self) -> &str;
}
