// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Local SQLite event store

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use super::{EventAggregate, EventStore, StoreError};
use crate::detection::Event;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database file
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        "#,
        )?;

        let store = Self::with_connection(conn)?;
        info!("Event database opened at {:?}", path);
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                device TEXT NOT NULL,
                event_type TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                duration_seconds REAL NOT NULL,
                energy_wh REAL NOT NULL,
                peak_power REAL NOT NULL,
                avg_power REAL NOT NULL,
                hour_of_day INTEGER NOT NULL,
                day_of_week INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_events_start ON events(start_time);
            CREATE INDEX IF NOT EXISTS idx_events_type ON events(event_type);
        "#,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Aggregate events that started at or after `since`
    pub fn aggregate_since(
        &self,
        event_type: Option<&str>,
        since: DateTime<Utc>,
    ) -> Result<BTreeMap<String, EventAggregate>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT event_type, COUNT(*), COALESCE(SUM(duration_seconds), 0.0) FROM events
             WHERE start_time >= ?1 AND (?2 IS NULL OR event_type = ?2)
             GROUP BY event_type",
        )?;

        let rows = stmt.query_map(params![timestamp(since), event_type], |row| {
            let count: i64 = row.get(1)?;
            Ok((
                row.get::<_, String>(0)?,
                EventAggregate {
                    count: count.max(0) as u64,
                    total_duration_seconds: row.get(2)?,
                },
            ))
        })?;

        let mut results = BTreeMap::new();
        for row in rows {
            let (event_type, aggregate) = row?;
            results.insert(event_type, aggregate);
        }
        Ok(results)
    }

    /// Delete events older than the retention window
    pub fn cleanup(&self, retention_days: u32) -> Result<usize, StoreError> {
        let cutoff = Utc::now() - Duration::days(i64::from(retention_days));
        let deleted = self
            .conn
            .lock()
            .execute("DELETE FROM events WHERE start_time < ?1", params![timestamp(cutoff)])?;

        if deleted > 0 {
            info!("Removed {} events older than {} days", deleted, retention_days);
        }
        Ok(deleted)
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(count.max(0) as usize)
    }
}

/// Fixed-width UTC timestamps so that text comparison orders chronologically
fn timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[async_trait]
impl EventStore for SqliteStore {
    async fn write_event(&self, event: &Event) -> Result<(), StoreError> {
        self.conn.lock().execute(
            r#"INSERT INTO events
               (device, event_type, start_time, end_time, duration_seconds,
                energy_wh, peak_power, avg_power, hour_of_day, day_of_week)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"#,
            params![
                event.device,
                event.event_type,
                timestamp(event.start_time),
                timestamp(event.end_time),
                event.duration_seconds,
                event.energy_wh,
                event.peak_power,
                event.avg_power,
                event.hour_of_day(),
                event.day_of_week(),
            ],
        )?;

        debug!("Stored {} event for {}", event.event_type, event.device);
        Ok(())
    }

    async fn query(
        &self,
        event_type: Option<&str>,
        lookback_days: u32,
    ) -> Result<BTreeMap<String, EventAggregate>, StoreError> {
        let since = Utc::now() - Duration::days(i64::from(lookback_days));
        self.aggregate_since(event_type, since)
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}
