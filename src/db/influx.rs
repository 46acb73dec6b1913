// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! InfluxDB event store

use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::debug;

use super::flux::{escape_tag, flux_string, FluxClient, FluxRow};
use super::{EventAggregate, EventStore, StoreError};
use crate::config::InfluxConfig;
use crate::detection::Event;

const EVENT_MEASUREMENT: &str = "event";

/// Writes events to the events bucket and aggregates them with Flux
pub struct InfluxStore {
    client: FluxClient,
    bucket: String,
}

impl InfluxStore {
    pub fn new(config: &InfluxConfig) -> Result<Self, StoreError> {
        Ok(Self {
            client: FluxClient::new(config)?,
            bucket: config.events_bucket.clone(),
        })
    }

    fn aggregate_query(&self, event_type: Option<&str>, lookback_days: u32) -> String {
        aggregate_query(&self.bucket, event_type, lookback_days)
    }
}

/// Line-protocol record for one event, timestamped at its start
pub fn event_line(event: &Event) -> String {
    format!(
        "{},device={},event_type={},hour_of_day={},day_of_week={} duration_seconds={},energy_wh={},peak_power={},avg_power={} {}",
        EVENT_MEASUREMENT,
        escape_tag(&event.device),
        escape_tag(&event.event_type),
        event.hour_of_day(),
        event.day_of_week(),
        float_field(event.duration_seconds),
        float_field(event.energy_wh),
        float_field(event.peak_power),
        float_field(event.avg_power),
        event.start_time.timestamp_nanos_opt().unwrap_or(0)
    )
}

/// Line protocol treats a bare integer as a float only if it has a decimal point
fn float_field(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// Raw `duration_seconds` points of the lookback window. Counting and summing
/// happen client side; a Flux `union` of `count()` and `sum()` would mix integer
/// and float `_value` columns in one table.
fn aggregate_query(bucket: &str, event_type: Option<&str>, lookback_days: u32) -> String {
    let filter = event_type
        .map(|t| format!("\n  |> filter(fn: (r) => r.event_type == {})", flux_string(t)))
        .unwrap_or_default();

    format!(
        r#"from(bucket: {bucket})
  |> range(start: -{days}d)
  |> filter(fn: (r) => r._measurement == "{measurement}")
  |> filter(fn: (r) => r._field == "duration_seconds"){filter}
  |> group(columns: ["event_type"])
  |> keep(columns: ["event_type", "_value"])"#,
        bucket = flux_string(bucket),
        days = lookback_days,
        measurement = EVENT_MEASUREMENT,
        filter = filter,
    )
}

fn collect_aggregates(rows: Vec<FluxRow>) -> Result<BTreeMap<String, EventAggregate>, StoreError> {
    let mut aggregates: BTreeMap<String, EventAggregate> = BTreeMap::new();

    for row in rows {
        let (Some(event_type), Some(value)) = (row.get("event_type"), row.get("_value")) else {
            continue;
        };
        if event_type.is_empty() || value.is_empty() {
            continue;
        }
        let duration: f64 = value
            .parse()
            .map_err(|_| StoreError::Parse(format!("'{}' is not a number", value)))?;

        let entry = aggregates.entry(event_type.clone()).or_default();
        entry.count += 1;
        entry.total_duration_seconds += duration;
    }

    Ok(aggregates)
}

#[async_trait]
impl EventStore for InfluxStore {
    async fn write_event(&self, event: &Event) -> Result<(), StoreError> {
        let line = event_line(event);
        debug!("Writing event: {}", line);
        self.client.write(&self.bucket, line).await
    }

    async fn query(
        &self,
        event_type: Option<&str>,
        lookback_days: u32,
    ) -> Result<BTreeMap<String, EventAggregate>, StoreError> {
        let rows = self.client.query(&self.aggregate_query(event_type, lookback_days)).await?;
        collect_aggregates(rows)
    }

    fn name(&self) -> &str {
        "influx"
    }
}
