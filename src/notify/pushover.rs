// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Pushover push notifications

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

use super::awtrix::ensure_success;
use super::{PushSink, SinkError};

pub struct PushoverClient {
    client: reqwest::Client,
    api_url: String,
    token: SecretString,
}

impl PushoverClient {
    pub fn new(api_url: &str, token: SecretString, timeout_secs: u64) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.to_string(),
            token,
        })
    }
}

#[async_trait]
impl PushSink for PushoverClient {
    async fn send(&self, recipient: &str, text: &str) -> Result<(), SinkError> {
        if recipient.is_empty() || text.is_empty() {
            return Err(SinkError::NotConfigured(
                "push recipient and message must not be empty".to_string(),
            ));
        }

        let form = [
            ("token", self.token.expose_secret().as_str()),
            ("user", recipient),
            ("message", text),
        ];

        let response = self.client.post(&self.api_url).form(&form).send().await?;
        ensure_success("pushover", response).await
    }

    fn name(&self) -> &str {
        "pushover"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_recipient_rejected_before_request() {
        let client = PushoverClient::new(
            "http://127.0.0.1:1/1/messages.json",
            SecretString::new("token".to_string()),
            1,
        )
        .unwrap();
        assert!(matches!(
            client.send("", "hello").await,
            Err(SinkError::NotConfigured(_))
        ));
    }
}
