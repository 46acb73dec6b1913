// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! HTTP client for the AWTRIX matrix display

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::{DisplaySink, NotificationMessage, SinkError};
use crate::config::DisplayConfig;

/// Posts one-shot notifications to `/api/notify`
pub struct AwtrixClient {
    client: reqwest::Client,
    base_url: String,
}

impl AwtrixClient {
    pub fn new(config: &DisplayConfig) -> Result<Self, SinkError> {
        if config.host.trim().is_empty() {
            return Err(SinkError::NotConfigured("display host is empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: format!("http://{}:{}", config.host, config.port),
        })
    }

    pub fn notify_url(&self) -> String {
        format!("{}/api/notify", self.base_url)
    }

    /// Reachability check against the stats endpoint
    pub async fn check(&self) -> Result<(), SinkError> {
        let response = self
            .client
            .get(format!("{}/api/stats", self.base_url))
            .send()
            .await?;
        ensure_success("awtrix", response).await
    }
}

#[async_trait]
impl DisplaySink for AwtrixClient {
    async fn send(&self, message: &NotificationMessage) -> Result<(), SinkError> {
        debug!("POST {} {:?}", self.notify_url(), message.text);
        let response = self
            .client
            .post(self.notify_url())
            .json(message)
            .send()
            .await?;
        ensure_success("awtrix", response).await
    }

    fn name(&self) -> &str {
        "awtrix"
    }
}

pub(super) async fn ensure_success(sink: &'static str, response: reqwest::Response) -> Result<(), SinkError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = response.text().await.unwrap_or_default();
    Err(SinkError::Status {
        sink,
        status: status.as_u16(),
        body,
    })
}
