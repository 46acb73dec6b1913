// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! MQTT transport for the display

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{DisplaySink, NotificationMessage, SinkError};
use crate::config::DisplayConfig;

/// Publishes notifications to `<prefix>/notify`
pub struct MqttDisplay {
    client: AsyncClient,
    topic: String,
}

impl MqttDisplay {
    /// Must be called inside a tokio runtime; the event loop is spawned here.
    pub fn new(config: &DisplayConfig) -> Result<Self, SinkError> {
        if config.mqtt_prefix.trim().is_empty() {
            return Err(SinkError::NotConfigured("mqtt_prefix is empty".to_string()));
        }

        let mut options = MqttOptions::new(&config.mqtt_client_id, &config.mqtt_broker, config.mqtt_port);
        options.set_keep_alive(Duration::from_secs(30));

        if let (Some(username), Some(password)) = (&config.mqtt_username, &config.mqtt_password) {
            options.set_credentials(username, password);
        }

        let (client, mut eventloop) = AsyncClient::new(options, 32);

        tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("MQTT display connected");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("MQTT error: {:?}", e);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        });

        info!(
            "MQTT display configured for {}:{} (topic {}/notify)",
            config.mqtt_broker, config.mqtt_port, config.mqtt_prefix
        );

        Ok(Self {
            client,
            topic: notify_topic(&config.mqtt_prefix),
        })
    }
}

fn notify_topic(prefix: &str) -> String {
    format!("{}/notify", prefix.trim_end_matches('/'))
}

#[async_trait]
impl DisplaySink for MqttDisplay {
    async fn send(&self, message: &NotificationMessage) -> Result<(), SinkError> {
        let payload = serde_json::to_vec(message)?;
        debug!("MQTT publish {} ({} bytes)", self.topic, payload.len());

        self.client
            .publish(&self.topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| SinkError::Mqtt(e.to_string()))
    }

    fn name(&self) -> &str {
        "mqtt"
    }
}
