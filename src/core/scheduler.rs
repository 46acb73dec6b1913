// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Summary scheduler for the two clock-driven cadences
//!
//! Periodic summaries go out at xx:05, xx:25 and xx:45 and cover the last day,
//! week, month and year. The daily rollup goes out once per date at the
//! configured time and covers the in-memory ledger of today's events.

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::Clock;
use crate::analysis::{format_period_summary, DailyRollup};
use crate::config::{DisplayConfig, Settings};
use crate::db::EventStore;
use crate::detection::{DetectorRegistry, Event};
use crate::notify::{NotificationGate, NotificationMessage, PushSink};

/// One lookback window of the periodic summary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryPeriod {
    pub days: u32,
    pub label: &'static str,
    pub icon: &'static str,
    pub color: &'static str,
}

pub const SUMMARY_PERIODS: [SummaryPeriod; 4] = [
    SummaryPeriod { days: 1, label: "Day", icon: "1543", color: "#87CEEB" },
    SummaryPeriod { days: 7, label: "Week", icon: "2103", color: "#90EE90" },
    SummaryPeriod { days: 30, label: "Month", icon: "51462", color: "#FFB347" },
    SummaryPeriod { days: 365, label: "Year", icon: "27225", color: "#DDA0DD" },
];

/// Minutes past the hour at which periodic summaries fire. All of them fall
/// outside the carousel window.
pub const SUMMARY_MINUTES: [u32; 3] = [5, 25, 45];

pub struct SummaryScheduler {
    clock: Arc<dyn Clock>,
    settings: Settings,
    spacing: Duration,
    /// Minute-truncated local time of the last periodic run
    last_periodic: Option<NaiveDateTime>,
    /// Local date of the last daily rollup
    last_daily: Option<NaiveDate>,
}

impl SummaryScheduler {
    pub fn new(clock: Arc<dyn Clock>, settings: &Settings, display: &DisplayConfig) -> Self {
        Self {
            clock,
            settings: settings.clone(),
            spacing: Duration::from_millis(display.message_spacing_ms),
            last_periodic: None,
            last_daily: None,
        }
    }

    pub fn is_summary_time(now: NaiveDateTime) -> bool {
        SUMMARY_MINUTES.contains(&now.minute())
    }

    pub fn is_daily_time(&self, now: NaiveDateTime) -> bool {
        now.hour() == self.settings.daily_summary_hour && now.minute() == self.settings.daily_summary_minute
    }

    pub fn last_daily(&self) -> Option<NaiveDate> {
        self.last_daily
    }

    /// Send the Day/Week/Month/Year summaries if this is a summary minute that
    /// has not been handled yet. Returns the number of messages handed to the gate.
    pub async fn run_periodic(
        &mut self,
        store: &dyn EventStore,
        registry: &DetectorRegistry,
        gate: &mut NotificationGate,
    ) -> usize {
        if !self.settings.summary_enabled {
            return 0;
        }

        let now = self.clock.now();
        if !Self::is_summary_time(now) {
            return 0;
        }

        let key = minute_key(now);
        if self.last_periodic == Some(key) {
            return 0;
        }

        info!("Sending period summaries at {}", now.format("%H:%M"));
        let mut sent = 0;

        for period in SUMMARY_PERIODS.iter() {
            let aggregates = match store.query(None, period.days).await {
                Ok(aggregates) => aggregates,
                Err(e) => {
                    warn!("Skipping {} summary, query failed: {}", period.label, e);
                    continue;
                }
            };

            let Some(text) = format_period_summary(&aggregates, period.label, registry, &self.settings) else {
                continue;
            };

            info!("{} summary: {}", period.label, text);
            let message = NotificationMessage::new(text, period.icon, period.color, self.settings.summary_display_seconds);
            gate.send_or_queue(message).await;
            sent += 1;

            if !self.spacing.is_zero() {
                tokio::time::sleep(self.spacing).await;
            }
        }

        if sent == 0 {
            debug!("No events found for any period");
        }

        self.last_periodic = Some(key);
        sent
    }

    /// Queue the daily rollup and push the detailed version, once per date.
    /// Clears the ledger when it fires.
    pub async fn run_daily(
        &mut self,
        ledger: &mut Vec<Event>,
        registry: &DetectorRegistry,
        push: Option<(&dyn PushSink, &str)>,
        gate: &mut NotificationGate,
    ) -> bool {
        let now = self.clock.now();
        if !self.is_daily_time(now) || self.last_daily == Some(now.date()) {
            return false;
        }

        if ledger.is_empty() {
            return false;
        }

        let rollup = DailyRollup::from_events(ledger, registry);
        let message = rollup.display_message();
        info!("Queued daily summary: {}", message.text);
        gate.enqueue(message);

        if self.settings.enable_pushover_daily {
            if let Some((sink, recipient)) = push {
                match sink.send(recipient, &rollup.push_text()).await {
                    Ok(()) => info!("Sent daily summary via {}", sink.name()),
                    Err(e) => error!("Failed to send daily summary via {}: {}", sink.name(), e),
                }
            }
        }

        self.last_daily = Some(now.date());
        ledger.clear();
        true
    }
}

fn minute_key(now: NaiveDateTime) -> NaiveDateTime {
    now.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::core::ManualClock;
    use crate::db::testing::RecordingStore;
    use crate::db::EventAggregate;
    use crate::notify::testing::{RecordingDisplay, RecordingPush};
    use chrono::{DateTime, Utc};
    use parking_lot::Mutex;
    use std::collections::BTreeMap;

    fn at(hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(hour, minute, second)
            .unwrap()
    }

    struct Fixture {
        clock: Arc<ManualClock>,
        scheduler: SummaryScheduler,
        gate: NotificationGate,
        sent: Arc<Mutex<Vec<NotificationMessage>>>,
        registry: DetectorRegistry,
    }

    fn fixture(now: NaiveDateTime, settings: Settings) -> Fixture {
        let clock = Arc::new(ManualClock::new(now));
        let display = RecordingDisplay::default();
        let sent = display.sent.clone();
        let gate = NotificationGate::new(Box::new(display), clock.clone());
        let config = DisplayConfig {
            message_spacing_ms: 0,
            ..DisplayConfig::default()
        };
        let scheduler = SummaryScheduler::new(clock.clone(), &settings, &config);
        let registry = DetectorRegistry::from_config(&Config::default()).unwrap();
        Fixture {
            clock,
            scheduler,
            gate,
            sent,
            registry,
        }
    }

    fn store_with_day_events() -> RecordingStore {
        let store = RecordingStore::default();
        let mut day = BTreeMap::new();
        day.insert(
            "espresso".to_string(),
            EventAggregate {
                count: 3,
                total_duration_seconds: 110.0,
            },
        );
        store.aggregates.lock().insert(1, day.clone());
        store.aggregates.lock().insert(7, day);
        store
    }

    fn event(device: &str, event_type: &str, duration: f64) -> Event {
        let start: DateTime<Utc> = "2026-10-19T18:00:00Z".parse().unwrap();
        Event {
            device: device.to_string(),
            event_type: event_type.to_string(),
            start_time: start,
            end_time: start + chrono::Duration::seconds(duration as i64),
            duration_seconds: duration,
            energy_wh: 20.0,
            peak_power: 1300.0,
            avg_power: 1200.0,
        }
    }

    #[test]
    fn test_summary_minutes() {
        assert!(SummaryScheduler::is_summary_time(at(10, 5, 0)));
        assert!(SummaryScheduler::is_summary_time(at(10, 45, 59)));
        assert!(!SummaryScheduler::is_summary_time(at(10, 15, 0)));
        assert!(!SummaryScheduler::is_summary_time(at(10, 0, 0)));
    }

    #[tokio::test]
    async fn test_periodic_fires_once_per_slot() {
        let mut f = fixture(at(14, 25, 3), Settings::default());
        let store = store_with_day_events();

        let count = f.scheduler.run_periodic(&store, &f.registry, &mut f.gate).await;
        assert_eq!(count, 2);
        let texts: Vec<String> = f.sent.lock().iter().map(|m| m.text.clone()).collect();
        assert_eq!(texts, vec!["Day: 3 espresso", "Week: 3 espresso"]);
        assert_eq!(f.sent.lock()[0].icon, "1543");
        assert_eq!(f.sent.lock()[1].color, "#90EE90");
        assert_eq!(f.sent.lock()[0].duration, 12);
        assert_eq!(*store.queries.lock(), vec![1, 7, 30, 365]);

        f.clock.set(at(14, 25, 48));
        assert_eq!(f.scheduler.run_periodic(&store, &f.registry, &mut f.gate).await, 0);
        assert_eq!(store.queries.lock().len(), 4);

        f.clock.set(at(14, 26, 0));
        assert_eq!(f.scheduler.run_periodic(&store, &f.registry, &mut f.gate).await, 0);

        f.clock.set(at(14, 45, 10));
        assert_eq!(f.scheduler.run_periodic(&store, &f.registry, &mut f.gate).await, 2);
        assert_eq!(f.sent.lock().len(), 4);

        // Same minute value one hour later is a new slot
        f.clock.set(at(15, 45, 0));
        assert_eq!(f.scheduler.run_periodic(&store, &f.registry, &mut f.gate).await, 2);
    }

    #[tokio::test]
    async fn test_periodic_skips_failed_queries_and_disabled() {
        let mut f = fixture(at(9, 5, 0), Settings::default());
        let store = RecordingStore {
            fail_queries: true,
            ..RecordingStore::default()
        };
        assert_eq!(f.scheduler.run_periodic(&store, &f.registry, &mut f.gate).await, 0);
        assert_eq!(store.queries.lock().len(), 4);
        assert!(f.sent.lock().is_empty());

        let disabled = Settings {
            summary_enabled: false,
            ..Settings::default()
        };
        let mut f = fixture(at(9, 5, 0), disabled);
        let store = store_with_day_events();
        assert_eq!(f.scheduler.run_periodic(&store, &f.registry, &mut f.gate).await, 0);
        assert!(store.queries.lock().is_empty());
    }

    #[tokio::test]
    async fn test_daily_summary_queues_and_pushes() {
        let mut f = fixture(at(21, 5, 10), Settings::default());
        let push = RecordingPush::default();
        let pushed = push.sent.clone();
        let sink: &dyn PushSink = &push;
        let mut ledger = vec![event("coffee-machine", "espresso", 40.0), event("tv", "tv_session", 5400.0)];

        let fired = f
            .scheduler
            .run_daily(&mut ledger, &f.registry, Some((sink, "user-key")), &mut f.gate)
            .await;
        assert!(fired);
        assert!(ledger.is_empty());
        assert!(f.sent.lock().is_empty());
        assert_eq!(f.gate.pending(), 1);
        assert_eq!(f.scheduler.last_daily(), Some(at(21, 5, 10).date()));

        let pushed = pushed.lock();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].0, "user-key");
        assert!(pushed[0].1.starts_with("Daily Appliance Summary:\n- 1x espressos"));

        drop(pushed);
        assert_eq!(f.gate.flush_if_safe().await, 1);
        assert_eq!(f.sent.lock()[0].text, "Today: 1 espressos, TV sessions 1.5h");
    }

    #[tokio::test]
    async fn test_daily_summary_once_per_date() {
        let mut f = fixture(at(21, 5, 0), Settings::default());
        let mut ledger = vec![event("coffee-machine", "espresso", 40.0)];
        assert!(f.scheduler.run_daily(&mut ledger, &f.registry, None, &mut f.gate).await);

        ledger.push(event("coffee-machine", "espresso", 30.0));
        f.clock.set(at(21, 5, 45));
        assert!(!f.scheduler.run_daily(&mut ledger, &f.registry, None, &mut f.gate).await);
        assert_eq!(ledger.len(), 1);
        assert_eq!(f.gate.pending(), 1);
    }

    #[tokio::test]
    async fn test_daily_summary_needs_events_and_time() {
        let mut f = fixture(at(21, 4, 59), Settings::default());
        let mut ledger = vec![event("coffee-machine", "espresso", 40.0)];
        assert!(!f.scheduler.run_daily(&mut ledger, &f.registry, None, &mut f.gate).await);
        assert_eq!(ledger.len(), 1);

        f.clock.set(at(21, 5, 0));
        let mut empty = Vec::new();
        assert!(!f.scheduler.run_daily(&mut empty, &f.registry, None, &mut f.gate).await);
        assert_eq!(f.scheduler.last_daily(), None);

        assert!(f.scheduler.run_daily(&mut ledger, &f.registry, None, &mut f.gate).await);
    }

    #[tokio::test]
    async fn test_daily_push_disabled_by_setting() {
        let settings = Settings {
            enable_pushover_daily: false,
            ..Settings::default()
        };
        let mut f = fixture(at(21, 5, 0), settings);
        let push = RecordingPush::default();
        let sink: &dyn PushSink = &push;
        let mut ledger = vec![event("tv", "tv_session", 600.0)];
        assert!(
            f.scheduler
                .run_daily(&mut ledger, &f.registry, Some((sink, "user-key")), &mut f.gate)
                .await
        );
        assert!(push.sent.lock().is_empty());
    }
}
