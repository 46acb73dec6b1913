// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Notification module - display/push sinks and the carousel-aware gate

mod awtrix;
mod gate;
mod mqtt;
mod pushover;

pub use awtrix::AwtrixClient;
pub use gate::NotificationGate;
pub use mqtt::MqttDisplay;
pub use pushover::PushoverClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{DisplayConfig, DisplayTransport, PushoverConfig};

/// Errors from notification transports. Always transient: callers log and move on.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{sink} returned HTTP {status}: {body}")]
    Status {
        sink: &'static str,
        status: u16,
        body: String,
    },

    #[error("MQTT publish failed: {0}")]
    Mqtt(String),

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("sink not configured: {0}")]
    NotConfigured(String),
}

/// One display notification. Serializes to the display's custom
/// notification payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub text: String,
    pub icon: String,
    pub color: String,
    /// Seconds on screen
    pub duration: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
}

impl NotificationMessage {
    pub fn new(text: impl Into<String>, icon: &str, color: &str, duration: u32) -> Self {
        Self {
            text: text.into(),
            icon: icon.to_string(),
            color: color.to_string(),
            duration,
            sound: None,
        }
    }

    pub fn with_sound(mut self, sound: &str) -> Self {
        self.sound = Some(sound.to_string());
        self
    }
}

/// The shared display
#[async_trait]
pub trait DisplaySink: Send + Sync {
    async fn send(&self, message: &NotificationMessage) -> Result<(), SinkError>;

    fn name(&self) -> &str;
}

/// Push-message delivery to a phone
#[async_trait]
pub trait PushSink: Send + Sync {
    async fn send(&self, recipient: &str, text: &str) -> Result<(), SinkError>;

    fn name(&self) -> &str;
}

/// Stand-in display used when the real one is disabled
#[derive(Debug, Default)]
pub struct LogDisplay;

#[async_trait]
impl DisplaySink for LogDisplay {
    async fn send(&self, message: &NotificationMessage) -> Result<(), SinkError> {
        info!("[display] {} (icon {}, {}s)", message.text, message.icon, message.duration);
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// Build the configured display sink
pub fn build_display(config: &DisplayConfig) -> Result<Box<dyn DisplaySink>, SinkError> {
    if !config.enabled {
        info!("Display disabled, notifications are only logged");
        return Ok(Box::new(LogDisplay));
    }

    let sink: Box<dyn DisplaySink> = match config.transport {
        DisplayTransport::Http => Box::new(AwtrixClient::new(config)?),
        DisplayTransport::Mqtt => Box::new(MqttDisplay::new(config)?),
    };
    info!("Display sink: {}", sink.name());
    Ok(sink)
}

/// Build the push sink, if enabled and a token is available
pub fn build_push(config: &PushoverConfig) -> Result<Option<Arc<dyn PushSink>>, SinkError> {
    if !config.enabled {
        return Ok(None);
    }

    match config.token {
        Some(ref token) => {
            let client = PushoverClient::new(&config.api_url, token.clone(), config.timeout_secs)?;
            Ok(Some(Arc::new(client)))
        }
        None => {
            warn!(
                "Push notifications enabled but {} is not set, daily push disabled",
                crate::config::ENV_PUSHOVER_TOKEN
            );
            Ok(None)
        }
    }
}
