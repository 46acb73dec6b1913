// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Notification gate
//!
//! The display runs its own status carousel at the start of every ten-minute
//! period. Messages produced while the carousel owns the screen wait in a FIFO
//! queue and go out, in order, once it is done. Delivery is at most once: a
//! message that fails outside the carousel window is dropped, not retried.

use chrono::{NaiveDateTime, Timelike};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, error, info};

use super::{DisplaySink, NotificationMessage};
use crate::config::DisplayConfig;
use crate::core::Clock;

pub struct NotificationGate {
    sink: Box<dyn DisplaySink>,
    clock: Arc<dyn Clock>,
    queue: VecDeque<NotificationMessage>,
    period_minutes: u32,
    busy_minutes: u32,
}

impl NotificationGate {
    /// Gate with the standard carousel: ten-minute period, first three minutes busy
    pub fn new(sink: Box<dyn DisplaySink>, clock: Arc<dyn Clock>) -> Self {
        Self::with_window(sink, clock, 10, 3)
    }

    pub fn from_config(sink: Box<dyn DisplaySink>, clock: Arc<dyn Clock>, config: &DisplayConfig) -> Self {
        Self::with_window(
            sink,
            clock,
            config.carousel_period_minutes,
            config.carousel_busy_minutes,
        )
    }

    pub fn with_window(
        sink: Box<dyn DisplaySink>,
        clock: Arc<dyn Clock>,
        period_minutes: u32,
        busy_minutes: u32,
    ) -> Self {
        Self {
            sink,
            clock,
            queue: VecDeque::new(),
            period_minutes: period_minutes.max(1),
            busy_minutes,
        }
    }

    /// True while the carousel owns the display
    pub fn is_unsafe_window(&self, now: NaiveDateTime) -> bool {
        now.minute() % self.period_minutes < self.busy_minutes
    }

    fn unsafe_now(&self) -> bool {
        self.is_unsafe_window(self.clock.now())
    }

    /// Deliver now if the display is free, otherwise queue. Returns whether the
    /// message was delivered. Anything still pending goes out first.
    pub async fn send_or_queue(&mut self, message: NotificationMessage) -> bool {
        if self.unsafe_now() {
            debug!("In carousel window, queueing message: {}", message.text);
            self.queue.push_back(message);
            return false;
        }

        if !self.queue.is_empty() {
            self.drain().await;
        }

        self.deliver(&message, false).await
    }

    /// Queue unconditionally; delivered by the next safe flush
    pub fn enqueue(&mut self, message: NotificationMessage) {
        debug!("Queued message: {}", message.text);
        self.queue.push_back(message);
    }

    /// Drain the queue if the display is free. Returns the number of messages
    /// taken off the queue, delivered or dropped.
    pub async fn flush_if_safe(&mut self) -> usize {
        if self.unsafe_now() {
            if !self.queue.is_empty() {
                debug!("In carousel window, {} messages waiting", self.queue.len());
            }
            return 0;
        }

        self.drain().await
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    async fn drain(&mut self) -> usize {
        let mut drained = 0;
        while let Some(message) = self.queue.pop_front() {
            self.deliver(&message, true).await;
            drained += 1;
        }
        drained
    }

    async fn deliver(&self, message: &NotificationMessage, queued: bool) -> bool {
        let kind = if queued { "queued message" } else { "message" };
        match self.sink.send(message).await {
            Ok(()) => {
                info!("Sent {} via {}: {}", kind, self.sink.name(), message.text);
                true
            }
            Err(e) => {
                error!("Failed to send {} '{}': {}", kind, message.text, e);
                false
            }
        }
    }
}
