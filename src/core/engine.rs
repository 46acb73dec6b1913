// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Orchestrator - the poll loop tying readings, detectors, store and display together

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::{Clock, SummaryScheduler};
use crate::analysis::event_message;
use crate::config::{Config, Settings};
use crate::db::EventStore;
use crate::detection::{DetectorRegistry, Event};
use crate::notify::{DisplaySink, NotificationGate, PushSink};
use crate::sensors::ReadingsSource;

/// External collaborators of the orchestrator
pub struct Collaborators {
    pub source: Box<dyn ReadingsSource>,
    pub store: Arc<dyn EventStore>,
    pub display: Box<dyn DisplaySink>,
    pub push: Option<Arc<dyn PushSink>>,
    pub clock: Arc<dyn Clock>,
}

/// What one poll cycle did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub readings: usize,
    /// Readings already seen in an earlier cycle
    pub stale: usize,
    pub events: usize,
    pub store_failures: usize,
    /// Event notifications delivered right away
    pub notified: usize,
    /// Event notifications left in the queue
    pub queued: usize,
    pub summaries: usize,
    pub daily_summary: bool,
    pub flushed: usize,
}

pub struct Orchestrator {
    settings: Settings,
    registry: DetectorRegistry,
    devices: Vec<String>,
    source: Box<dyn ReadingsSource>,
    store: Arc<dyn EventStore>,
    push: Option<Arc<dyn PushSink>>,
    push_recipient: Option<String>,
    clock: Arc<dyn Clock>,
    gate: NotificationGate,
    scheduler: SummaryScheduler,
    /// Timestamp of the newest reading routed per device
    last_seen: BTreeMap<String, DateTime<Utc>>,
    /// Events completed today, consumed by the daily rollup
    ledger: Vec<Event>,
}

impl Orchestrator {
    pub fn new(config: &Config, registry: DetectorRegistry, collaborators: Collaborators) -> Self {
        let Collaborators {
            source,
            store,
            display,
            push,
            clock,
        } = collaborators;

        let gate = NotificationGate::from_config(display, clock.clone(), &config.display);
        let scheduler = SummaryScheduler::new(clock.clone(), &config.settings, &config.display);
        let devices = registry.device_ids();

        Self {
            settings: config.settings.clone(),
            registry,
            devices,
            source,
            store,
            push,
            push_recipient: config.pushover.user.clone(),
            clock,
            gate,
            scheduler,
            last_seen: BTreeMap::new(),
            ledger: Vec::new(),
        }
    }

    pub fn registry(&self) -> &DetectorRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &[Event] {
        &self.ledger
    }

    pub fn pending_notifications(&self) -> usize {
        self.gate.pending()
    }

    /// Run one poll cycle. A failed readings fetch still lets the schedulers
    /// and the queue flush run before the error is returned.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let mut report = CycleReport::default();

        let fetched = self
            .source
            .latest(&self.devices)
            .await
            .with_context(|| format!("failed to fetch readings from {}", self.source.name()));

        let (readings, fetch_error) = match fetched {
            Ok(readings) => (readings, None),
            Err(e) => (BTreeMap::new(), Some(e)),
        };
        report.readings = readings.len();

        for (device, reading) in &readings {
            if !self.is_fresh(device, reading.timestamp) {
                debug!("{}: sample at {} already processed", device, reading.timestamp);
                report.stale += 1;
                continue;
            }
            if let Some(event) = self.registry.route(device, reading.power, reading.timestamp) {
                self.handle_event(event, &mut report).await;
            }
        }

        report.summaries = self
            .scheduler
            .run_periodic(self.store.as_ref(), &self.registry, &mut self.gate)
            .await;

        let push = match (&self.push, &self.push_recipient) {
            (Some(sink), Some(recipient)) => Some((sink.as_ref(), recipient.as_str())),
            _ => None,
        };
        report.daily_summary = self
            .scheduler
            .run_daily(&mut self.ledger, &self.registry, push, &mut self.gate)
            .await;

        self.prune_ledger();
        report.flushed = self.gate.flush_if_safe().await;

        match fetch_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// A lookback query keeps returning the last sample until a newer one lands
    fn is_fresh(&mut self, device: &str, timestamp: DateTime<Utc>) -> bool {
        match self.last_seen.get(device) {
            Some(seen) if timestamp <= *seen => false,
            _ => {
                self.last_seen.insert(device.to_string(), timestamp);
                true
            }
        }
    }

    async fn handle_event(&mut self, event: Event, report: &mut CycleReport) {
        report.events += 1;

        if let Err(e) = self.store.write_event(&event).await {
            warn!("Failed to store {} event from {}: {}", event.event_type, event.device, e);
            report.store_failures += 1;
        } else {
            info!("Stored {} event from {} via {}", event.event_type, event.device, self.store.name());
        }

        if self.settings.enable_awtrix_on_event {
            let message = event_message(&event, &self.registry);
            if self.gate.send_or_queue(message).await {
                report.notified += 1;
            } else if self.gate.pending() > 0 {
                report.queued += 1;
            }
        }

        self.ledger.push(event);
    }

    /// Drop ledger entries that did not start on the current local date
    fn prune_ledger(&mut self) {
        let today = self.clock.now().date();
        let clock = &self.clock;
        let before = self.ledger.len();
        self.ledger.retain(|event| clock.local_date(event.start_time) == today);

        let removed = before - self.ledger.len();
        if removed > 0 {
            debug!("Pruned {} events from previous days", removed);
        }
    }

    /// Poll until shutdown. Errors of a single cycle are logged and never end
    /// the loop; shutdown is only observed between cycles.
    pub async fn run(&mut self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        let period = Duration::from_secs(self.settings.polling_interval_seconds.max(1));
        info!(
            "Starting event detector (polling every {}s, source {}, store {})",
            period.as_secs(),
            self.source.name(),
            self.store.name()
        );
        info!("Monitoring devices: {:?}", self.devices);

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_cycle().await {
                        Ok(report) => debug!("Cycle complete: {:?}", report),
                        Err(e) => error!("Error in detection loop: {:#}", e),
                    }
                }
                _ = shutdown.recv() => {
                    info!("Event detector shutting down...");
                    break;
                }
            }
        }

        if self.gate.pending() > 0 {
            warn!("{} notifications still queued at shutdown", self.gate.pending());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ManualClock;
    use crate::db::testing::RecordingStore;
    use crate::notify::testing::{RecordingDisplay, RecordingPush};
    use crate::notify::NotificationMessage;
    use crate::sensors::Reading;
    use async_trait::async_trait;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Serves one scripted batch of readings per cycle
    #[derive(Default)]
    struct ScriptedReadings {
        batches: Mutex<VecDeque<Result<Vec<(&'static str, f64, i64)>, String>>>,
    }

    impl ScriptedReadings {
        fn push(&self, batch: Vec<(&'static str, f64, i64)>) {
            self.batches.lock().push_back(Ok(batch));
        }

        fn fail(&self) {
            self.batches.lock().push_back(Err("connection refused".to_string()));
        }
    }

    fn base() -> DateTime<Utc> {
        "2026-10-19T10:00:00Z".parse().unwrap()
    }

    #[async_trait]
    impl ReadingsSource for ScriptedReadings {
        async fn latest(&self, _devices: &[String]) -> Result<BTreeMap<String, Reading>> {
            match self.batches.lock().pop_front() {
                Some(Ok(batch)) => Ok(batch
                    .into_iter()
                    .map(|(device, power, offset)| {
                        (
                            device.to_string(),
                            Reading::new(power, base() + chrono::Duration::seconds(offset)),
                        )
                    })
                    .collect()),
                Some(Err(e)) => Err(anyhow::anyhow!(e)),
                None => Ok(BTreeMap::new()),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn local(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    struct Harness {
        orchestrator: Orchestrator,
        source: Arc<ScriptedReadings>,
        store: Arc<RecordingStore>,
        sent: Arc<Mutex<Vec<NotificationMessage>>>,
        pushed: Arc<Mutex<Vec<(String, String)>>>,
        clock: Arc<ManualClock>,
    }

    struct SharedSource(Arc<ScriptedReadings>);

    #[async_trait]
    impl ReadingsSource for SharedSource {
        async fn latest(&self, devices: &[String]) -> Result<BTreeMap<String, Reading>> {
            self.0.latest(devices).await
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn harness(now: NaiveDateTime, store: RecordingStore) -> Harness {
        let mut config = Config::default();
        config.settings.enable_awtrix_on_event = true;
        config.display.message_spacing_ms = 0;
        config.pushover.user = Some("user-key".to_string());

        let clock = Arc::new(ManualClock::new(now));
        let source = Arc::new(ScriptedReadings::default());
        let store = Arc::new(store);
        let display = RecordingDisplay::default();
        let sent = display.sent.clone();
        let push = RecordingPush::default();
        let pushed = push.sent.clone();

        let registry = DetectorRegistry::from_config(&config).unwrap();
        let orchestrator = Orchestrator::new(
            &config,
            registry,
            Collaborators {
                source: Box::new(SharedSource(source.clone())),
                store: store.clone(),
                display: Box::new(display),
                push: Some(Arc::new(push)),
                clock: clock.clone(),
            },
        );

        Harness {
            orchestrator,
            source,
            store,
            sent,
            pushed,
            clock,
        }
    }

    fn script_espresso(source: &ScriptedReadings) {
        source.push(vec![("coffee-machine", 1200.0, 0), ("tv", 3.0, 0)]);
        source.push(vec![("coffee-machine", 1200.0, 15)]);
        source.push(vec![("coffee-machine", 10.0, 30)]);
        source.push(vec![("coffee-machine", 10.0, 60)]);
    }

    async fn cycles(h: &mut Harness, n: usize) -> Vec<CycleReport> {
        let mut reports = Vec::new();
        for _ in 0..n {
            reports.push(h.orchestrator.run_cycle().await.unwrap());
        }
        reports
    }

    #[tokio::test]
    async fn test_event_is_stored_notified_and_kept() {
        let mut h = harness(local(10, 7), RecordingStore::default());
        script_espresso(&h.source);

        let reports = cycles(&mut h, 4).await;
        assert_eq!(reports[0].readings, 2);
        assert_eq!(reports[3].events, 1);
        assert_eq!(reports[3].notified, 1);

        let written = h.store.written.lock();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].event_type, "espresso");
        assert!((written[0].duration_seconds - 60.0).abs() < 1e-9);
        assert!((written[0].energy_wh - 20.0).abs() < 1e-9);

        assert_eq!(h.orchestrator.ledger().len(), 1);
        let sent = h.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, "espresso: 1.0min");
    }

    #[tokio::test]
    async fn test_store_failure_does_not_lose_event() {
        let failing = RecordingStore {
            fail_writes: true,
            ..RecordingStore::default()
        };
        let mut h = harness(local(10, 7), failing);
        script_espresso(&h.source);

        let reports = cycles(&mut h, 4).await;
        assert_eq!(reports[3].store_failures, 1);
        assert_eq!(h.orchestrator.ledger().len(), 1);
        assert_eq!(h.sent.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_short_window_leaves_no_trace() {
        let mut h = harness(local(10, 7), RecordingStore::default());
        h.source.push(vec![("tv", 100.0, 0)]);
        h.source.push(vec![("tv", 5.0, 15)]);
        h.source.push(vec![("tv", 5.0, 140)]);

        let reports = cycles(&mut h, 3).await;
        assert!(reports.iter().all(|r| r.events == 0));
        assert!(h.store.written.lock().is_empty());
        assert!(h.sent.lock().is_empty());
        assert!(h.orchestrator.ledger().is_empty());
        assert_eq!(h.orchestrator.pending_notifications(), 0);
    }

    #[tokio::test]
    async fn test_repeated_sample_is_routed_once() {
        let mut h = harness(local(10, 7), RecordingStore::default());
        h.source.push(vec![("coffee-machine", 2000.0, 0)]);
        h.source.push(vec![("coffee-machine", 1000.0, 15)]);
        h.source.push(vec![("coffee-machine", 1000.0, 15)]);
        h.source.push(vec![("coffee-machine", 10.0, 30)]);
        h.source.push(vec![("coffee-machine", 10.0, 60)]);

        let reports = cycles(&mut h, 5).await;
        assert_eq!(reports[2].readings, 1);
        assert_eq!(reports[2].stale, 1);
        assert_eq!(reports[4].events, 1);

        let written = h.store.written.lock();
        assert_eq!(written.len(), 1);
        assert!((written[0].avg_power - 1500.0).abs() < 1e-9);
        assert!((written[0].energy_wh - 25.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_notification_waits_for_carousel() {
        let mut h = harness(local(10, 0), RecordingStore::default());
        script_espresso(&h.source);

        let reports = cycles(&mut h, 4).await;
        assert_eq!(reports[3].queued, 1);
        assert!(h.sent.lock().is_empty());
        assert_eq!(h.orchestrator.pending_notifications(), 1);

        h.clock.set(local(10, 3));
        let report = h.orchestrator.run_cycle().await.unwrap();
        assert_eq!(report.flushed, 1);
        assert_eq!(h.sent.lock()[0].text, "espresso: 1.0min");
    }

    #[tokio::test]
    async fn test_readings_failure_still_flushes() {
        let mut h = harness(local(10, 1), RecordingStore::default());
        script_espresso(&h.source);
        cycles(&mut h, 4).await;
        assert_eq!(h.orchestrator.pending_notifications(), 1);

        h.clock.set(local(10, 4));
        h.source.fail();
        assert!(h.orchestrator.run_cycle().await.is_err());
        assert_eq!(h.sent.lock().len(), 1);
        assert_eq!(h.orchestrator.pending_notifications(), 0);

        // The loop carries on with the next cycle
        h.source.push(vec![("tv", 2.0, 90)]);
        assert!(h.orchestrator.run_cycle().await.is_ok());
    }

    #[tokio::test]
    async fn test_daily_summary_from_ledger() {
        let mut h = harness(local(21, 4), RecordingStore::default());
        script_espresso(&h.source);
        cycles(&mut h, 4).await;
        assert_eq!(h.orchestrator.ledger().len(), 1);

        h.clock.set(local(21, 5));
        let report = h.orchestrator.run_cycle().await.unwrap();
        assert!(report.daily_summary);
        assert!(h.orchestrator.ledger().is_empty());
        assert_eq!(report.summaries, 0);
        // Queued first, then flushed in the same cycle since 21:05 is safe
        assert_eq!(report.flushed, 1);
        assert_eq!(h.sent.lock().last().unwrap().text, "Today: 1 espressos");

        let pushed = h.pushed.lock();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].0, "user-key");
        assert_eq!(pushed[0].1, "Daily Appliance Summary:\n- 1x espressos [0.02 kWh]");
    }

    #[tokio::test]
    async fn test_previous_day_events_are_pruned() {
        let mut h = harness(local(10, 7), RecordingStore::default());
        script_espresso(&h.source);
        cycles(&mut h, 4).await;
        assert_eq!(h.orchestrator.ledger().len(), 1);

        h.clock.set(NaiveDate::from_ymd_opt(2026, 10, 20).unwrap().and_hms_opt(0, 4, 0).unwrap());
        h.orchestrator.run_cycle().await.unwrap();
        assert!(h.orchestrator.ledger().is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let mut h = harness(local(10, 7), RecordingStore::default());
        let (tx, rx) = broadcast::channel(1);
        tx.send(()).unwrap();

        let finished = tokio::time::timeout(Duration::from_secs(5), h.orchestrator.run(rx)).await;
        assert!(matches!(finished, Ok(Ok(()))));
    }
}
