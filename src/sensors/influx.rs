// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Readings from the smart-plug bucket in InfluxDB

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::{Reading, ReadingsSource};
use crate::config::InfluxConfig;
use crate::db::FluxClient;

/// Fetches the last power sample per device with one Flux query
pub struct InfluxReadings {
    client: FluxClient,
    bucket: String,
    measurement: String,
    field: String,
    lookback: String,
}

impl InfluxReadings {
    pub fn new(config: &InfluxConfig) -> Result<Self> {
        let client = FluxClient::new(config).context("cannot query readings")?;
        Ok(Self {
            client,
            bucket: config.source_bucket.clone(),
            measurement: config.measurement.clone(),
            field: config.power_field.clone(),
            lookback: config.lookback.clone(),
        })
    }

    fn latest_query(&self, devices: &[String]) -> String {
        let device_filter = devices
            .iter()
            .map(|d| format!("r.device == {}", crate::db::flux_string(d)))
            .collect::<Vec<_>>()
            .join(" or ");

        format!(
            r#"from(bucket: {bucket})
  |> range(start: {lookback})
  |> filter(fn: (r) => r._measurement == {measurement})
  |> filter(fn: (r) => r._field == {field})
  |> filter(fn: (r) => {devices})
  |> group(columns: ["device"])
  |> last()"#,
            bucket = crate::db::flux_string(&self.bucket),
            lookback = self.lookback,
            measurement = crate::db::flux_string(&self.measurement),
            field = crate::db::flux_string(&self.field),
            devices = device_filter,
        )
    }
}

/// Turn query rows into readings, skipping rows that do not parse
fn rows_to_readings(rows: Vec<BTreeMap<String, String>>) -> BTreeMap<String, Reading> {
    let mut readings = BTreeMap::new();

    for row in rows {
        let (Some(device), Some(value), Some(time)) = (row.get("device"), row.get("_value"), row.get("_time"))
        else {
            continue;
        };

        let power = match value.parse::<f64>() {
            Ok(power) if power.is_finite() => power,
            _ => {
                warn!("Skipping non-numeric power '{}' for {}", value, device);
                continue;
            }
        };
        let timestamp = match DateTime::parse_from_rfc3339(time) {
            Ok(ts) => ts.with_timezone(&Utc),
            Err(e) => {
                warn!("Skipping reading for {} with bad timestamp '{}': {}", device, time, e);
                continue;
            }
        };

        readings.insert(device.clone(), Reading::new(power, timestamp));
    }

    readings
}

#[async_trait]
impl ReadingsSource for InfluxReadings {
    async fn latest(&self, devices: &[String]) -> Result<BTreeMap<String, Reading>> {
        if devices.is_empty() {
            return Ok(BTreeMap::new());
        }

        let rows = self
            .client
            .query(&self.latest_query(devices))
            .await
            .context("readings query failed")?;

        let readings = rows_to_readings(rows);
        debug!("Fetched {} readings for {} devices", readings.len(), devices.len());
        Ok(readings)
    }

    fn name(&self) -> &str {
        "influx"
    }
}
