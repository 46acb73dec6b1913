// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Message text for events, period summaries and the daily rollup

use std::collections::BTreeMap;

use crate::config::{Settings, DEFAULT_ICON};
use crate::db::EventAggregate;
use crate::detection::{DetectorRegistry, Event};
use crate::notify::NotificationMessage;

pub const EVENT_COLOR: &str = "#00FF00";
pub const EVENT_DISPLAY_SECONDS: u32 = 10;
pub const DAILY_ICON: &str = "1543";
pub const DAILY_COLOR: &str = "#FFD700";
pub const DAILY_DISPLAY_SECONDS: u32 = 20;
pub const NOTIFY_SOUND: &str = "chime";

/// `42s`, `12.5min` or `1.3h`
pub fn format_duration_short(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{:.0}s", seconds)
    } else if seconds < 3600.0 {
        format!("{:.1}min", seconds / 60.0)
    } else {
        format!("{:.1}h", seconds / 3600.0)
    }
}

/// Display notification for one completed event
pub fn event_message(event: &Event, registry: &DetectorRegistry) -> NotificationMessage {
    let profile = registry.profile(&event.device);
    let name = profile.map_or(event.event_type.as_str(), |p| p.event_name.as_str());
    let icon = profile.map_or(DEFAULT_ICON, |p| p.awtrix_icon.as_str());

    NotificationMessage::new(
        format!("{}: {}", name, format_duration_short(event.duration_seconds)),
        icon,
        EVENT_COLOR,
        EVENT_DISPLAY_SECONDS,
    )
    .with_sound(NOTIFY_SOUND)
}

/// Headline duration, e.g. `TV 2h15m`, `TV 1.0h` or `TV 40m`
fn headline_part(label: &str, seconds: f64) -> String {
    let hours = seconds / 3600.0;
    let minutes = (seconds % 3600.0) / 60.0;

    if hours >= 1.0 {
        if minutes >= 5.0 {
            format!("{} {}h{}m", label, hours.trunc(), minutes.trunc())
        } else {
            format!("{} {:.1}h", label, hours)
        }
    } else {
        format!("{} {}m", label, minutes.trunc())
    }
}

/// One display line for a lookback period, or `None` when there is nothing
/// to report. Event types come in name order, the headline type last.
pub fn format_period_summary(
    aggregates: &BTreeMap<String, EventAggregate>,
    period: &str,
    registry: &DetectorRegistry,
    settings: &Settings,
) -> Option<String> {
    let mut parts = Vec::new();
    let mut headline_seconds = 0.0;

    for (event_type, aggregate) in aggregates {
        let duration = aggregate.total_duration_seconds;

        if settings.headline_event_type.as_deref() == Some(event_type.as_str()) {
            headline_seconds = duration;
            continue;
        }

        let tracks_duration = registry
            .profile_for_event_type(event_type)
            .map_or(false, |p| p.track_duration);

        if tracks_duration && duration > 60.0 {
            if duration >= 3600.0 {
                parts.push(format!("{} {} ({:.0}h)", aggregate.count, event_type, duration / 3600.0));
            } else {
                parts.push(format!("{} {} ({:.0}m)", aggregate.count, event_type, duration / 60.0));
            }
        } else {
            parts.push(format!("{} {}", aggregate.count, event_type));
        }
    }

    if headline_seconds > 0.0 {
        parts.push(headline_part(&settings.headline_label, headline_seconds));
    }

    if parts.is_empty() {
        return None;
    }
    Some(format!("{}: {}", period, parts.join(", ")))
}

/// Totals for one plural event name in the daily rollup
#[derive(Debug, Clone, PartialEq)]
pub struct RollupEntry {
    pub name: String,
    pub count: u32,
    /// Present when the profile tracks duration
    pub duration_seconds: Option<f64>,
    /// Present when the profile tracks energy
    pub energy_wh: Option<f64>,
}

/// The day's ledger grouped by plural event name, in first-seen order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyRollup {
    entries: Vec<RollupEntry>,
}

impl DailyRollup {
    pub fn from_events(events: &[Event], registry: &DetectorRegistry) -> Self {
        let mut entries: Vec<RollupEntry> = Vec::new();

        for event in events {
            let profile = registry.profile(&event.device);
            let name = profile.map_or(event.event_type.as_str(), |p| p.event_name_plural.as_str());

            let index = match entries.iter().position(|e| e.name == name) {
                Some(index) => index,
                None => {
                    entries.push(RollupEntry {
                        name: name.to_string(),
                        count: 0,
                        duration_seconds: None,
                        energy_wh: None,
                    });
                    entries.len() - 1
                }
            };

            let entry = &mut entries[index];
            entry.count += 1;
            if profile.map_or(false, |p| p.track_duration) {
                *entry.duration_seconds.get_or_insert(0.0) += event.duration_seconds;
            }
            if profile.map_or(false, |p| p.track_energy) {
                *entry.energy_wh.get_or_insert(0.0) += event.energy_wh;
            }
        }

        Self { entries }
    }

    pub fn entries(&self) -> &[RollupEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compact line for the display
    pub fn display_text(&self) -> String {
        let parts: Vec<String> = self
            .entries
            .iter()
            .map(|entry| match entry.duration_seconds {
                Some(seconds) if seconds > 60.0 => format!("{} {:.1}h", entry.name, seconds / 3600.0),
                _ => format!("{} {}", entry.count, entry.name),
            })
            .collect();
        format!("Today: {}", parts.join(", "))
    }

    pub fn display_message(&self) -> NotificationMessage {
        NotificationMessage::new(self.display_text(), DAILY_ICON, DAILY_COLOR, DAILY_DISPLAY_SECONDS)
            .with_sound(NOTIFY_SOUND)
    }

    /// Verbose multi-line text for the push notification
    pub fn push_text(&self) -> String {
        let mut lines = vec!["Daily Appliance Summary:".to_string()];
        for entry in &self.entries {
            let mut line = format!("- {}x {}", entry.count, entry.name);
            if let Some(seconds) = entry.duration_seconds {
                line.push_str(&format!(" ({:.1}h total)", seconds / 3600.0));
            }
            if let Some(wh) = entry.energy_wh {
                line.push_str(&format!(" [{:.2} kWh]", wh / 1000.0));
            }
            lines.push(line);
        }
        lines.join("\n")
    }
}
