// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Minimal InfluxDB v2 HTTP client: Flux queries and line-protocol writes

use secrecy::{ExposeSecret, SecretString};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use super::StoreError;
use crate::config::{InfluxConfig, ENV_INFLUX_TOKEN};

/// One row of a query result, keyed by column name
pub type FluxRow = BTreeMap<String, String>;

pub struct FluxClient {
    client: reqwest::Client,
    url: String,
    org: String,
    token: SecretString,
}

impl FluxClient {
    pub fn new(config: &InfluxConfig) -> Result<Self, StoreError> {
        let token = config
            .token
            .clone()
            .ok_or_else(|| StoreError::NotConfigured(format!("{} is not set", ENV_INFLUX_TOKEN)))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            org: config.org.clone(),
            token,
        })
    }

    fn auth(&self) -> String {
        format!("Token {}", self.token.expose_secret())
    }

    /// Run a Flux query and return every data row of every result table
    pub async fn query(&self, flux: &str) -> Result<Vec<FluxRow>, StoreError> {
        debug!("Flux query: {}", flux);
        let response = self
            .client
            .post(format!("{}/api/v2/query", self.url))
            .query(&[("org", self.org.as_str())])
            .header("Authorization", self.auth())
            .header("Accept", "application/csv")
            .header("Content-Type", "application/vnd.flux")
            .body(flux.to_string())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }

        parse_annotated_csv(&body)
    }

    /// Write line-protocol records with nanosecond timestamps
    pub async fn write(&self, bucket: &str, lines: String) -> Result<(), StoreError> {
        let response = self
            .client
            .post(format!("{}/api/v2/write", self.url))
            .query(&[("org", self.org.as_str()), ("bucket", bucket), ("precision", "ns")])
            .header("Authorization", self.auth())
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(lines)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(StoreError::Status {
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        })
    }
}

/// Parse an annotated CSV response. Annotation lines start with `#`; each
/// table begins with a header row and tables are separated by blank lines.
pub fn parse_annotated_csv(body: &str) -> Result<Vec<FluxRow>, StoreError> {
    let mut rows = Vec::new();
    let mut header: Option<Vec<String>> = None;

    for line in body.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            header = None;
            continue;
        }
        if line.starts_with('#') {
            continue;
        }

        let fields = split_csv_line(line)?;
        match header {
            None => header = Some(fields),
            Some(ref columns) => {
                if fields.len() != columns.len() {
                    return Err(StoreError::Parse(format!(
                        "row has {} fields, header has {}",
                        fields.len(),
                        columns.len()
                    )));
                }
                let row = columns
                    .iter()
                    .cloned()
                    .zip(fields)
                    .filter(|(column, _)| !column.is_empty())
                    .collect();
                rows.push(row);
            }
        }
    }

    Ok(rows)
}

fn split_csv_line(line: &str) -> Result<Vec<String>, StoreError> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }

    if quoted {
        return Err(StoreError::Parse(format!("unterminated quote in '{}'", line)));
    }
    fields.push(current);
    Ok(fields)
}

/// Escape a measurement, tag key or tag value for line protocol
pub fn escape_tag(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, ',' | '=' | ' ') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Quote a value as a Flux string literal
pub fn flux_string(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}
