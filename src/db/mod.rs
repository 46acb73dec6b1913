// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Database module for persistent storage of detected events

mod flux;
mod influx;
mod sqlite;

pub use flux::{escape_tag, flux_string, FluxClient, FluxRow};
pub use influx::InfluxStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::config::{Config, StoreBackend};
use crate::detection::Event;

/// Persistence failures. Transient from the service's point of view.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected store response: {0}")]
    Parse(String),

    #[error("failed to prepare store location: {0}")]
    Io(#[from] std::io::Error),

    #[error("store not configured: {0}")]
    NotConfigured(String),
}

/// Count and total duration of one event type over a lookback window
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EventAggregate {
    pub count: u64,
    pub total_duration_seconds: f64,
}

/// Append-only event history with windowed aggregation
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Persist one event
    async fn write_event(&self, event: &Event) -> Result<(), StoreError>;

    /// Aggregate events that started within the last `lookback_days`,
    /// keyed by event type
    async fn query(
        &self,
        event_type: Option<&str>,
        lookback_days: u32,
    ) -> Result<BTreeMap<String, EventAggregate>, StoreError>;

    fn name(&self) -> &str;
}

/// Open the configured event store
pub fn open_store(config: &Config, backend: StoreBackend) -> Result<Arc<dyn EventStore>, StoreError> {
    let store: Arc<dyn EventStore> = match backend {
        StoreBackend::Sqlite => {
            let store = SqliteStore::open(&config.store.path)?;
            if config.store.retention_days > 0 {
                store.cleanup(config.store.retention_days)?;
            }
            Arc::new(store)
        }
        StoreBackend::Influx => Arc::new(InfluxStore::new(&config.influx)?),
    };

    info!("Event store: {}", store.name());
    Ok(store)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;

    /// In-memory store that records writes and serves canned aggregates
    #[derive(Default)]
    pub struct RecordingStore {
        pub written: Arc<Mutex<Vec<Event>>>,
        pub aggregates: Arc<Mutex<BTreeMap<u32, BTreeMap<String, EventAggregate>>>>,
        pub queries: Arc<Mutex<Vec<u32>>>,
        pub fail_writes: bool,
        pub fail_queries: bool,
    }

    #[async_trait]
    impl EventStore for RecordingStore {
        async fn write_event(&self, event: &Event) -> Result<(), StoreError> {
            if self.fail_writes {
                return Err(StoreError::Status {
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }
            self.written.lock().push(event.clone());
            Ok(())
        }

        async fn query(
            &self,
            _event_type: Option<&str>,
            lookback_days: u32,
        ) -> Result<BTreeMap<String, EventAggregate>, StoreError> {
            self.queries.lock().push(lookback_days);
            if self.fail_queries {
                return Err(StoreError::Parse("broken".to_string()));
            }
            Ok(self
                .aggregates
                .lock()
                .get(&lookback_days)
                .cloned()
                .unwrap_or_default())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }
}
