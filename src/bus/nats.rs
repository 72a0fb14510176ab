//! Subject-routed NATS backend.
//!
//! Grounded in `nats.go`: topics are free-form subjects, auto-created by the
//! broker on first publish/subscribe, so [`NatsDriver::topic_exists`] is
//! trivially `true` (spec.md §4.A). The original bound a queue-group name
//! for every consumer; we carry that forward as the optional
//! `bus_config.queue` setting.

use async_trait::async_trait;
use futures_util::StreamExt;

use super::{BusDriver, ByteSink, ByteSource};
use crate::config::BusConfig;
use crate::error::AppError;

pub struct NatsDriver {
    client: async_nats::Client,
    queue_group: Option<String>,
}

impl NatsDriver {
    /// Connect to the broker. Fatal at startup on failure (spec.md §4.A /
    /// §7 error kind 2) — the caller propagates this with `?` out of `main`.
    pub async fn connect(config: &BusConfig) -> Result<Self, AppError> {
        let client = async_nats::connect(&config.url)
            .await
            .map_err(|e| AppError::Bus(format!("NATS connect failed ({}): {e}", config.url)))?;
        Ok(Self { client, queue_group: config.queue.clone() })
    }
}

struct NatsSink {
    client: async_nats::Client,
    subject: String,
}

#[async_trait]
impl ByteSink for NatsSink {
    async fn send(&self, payload: Vec<u8>) -> Result<(), AppError> {
        self.client
            .publish(self.subject.clone(), payload.into())
            .await
            .map_err(|e| AppError::Bus(format!("NATS publish to {} failed: {e}", self.subject)))
    }
}

struct NatsSource {
    subscriber: async_nats::Subscriber,
}

#[async_trait]
impl ByteSource for NatsSource {
    async fn recv(&mut self) -> Option<Vec<u8>> {
        self.subscriber.next().await.map(|msg| msg.payload.to_vec())
    }
}

#[async_trait]
impl BusDriver for NatsDriver {
    async fn producer(&self, topic: &str) -> Result<Box<dyn ByteSink>, AppError> {
        Ok(Box::new(NatsSink { client: self.client.clone(), subject: topic.to_string() }))
    }

    async fn consumer(&self, topic: &str) -> Result<Box<dyn ByteSource>, AppError> {
        let subscriber = match &self.queue_group {
            Some(queue) => self.client.queue_subscribe(topic.to_string(), queue.clone()).await,
            None => self.client.subscribe(topic.to_string()).await,
        }
        .map_err(|e| AppError::Bus(format!("NATS subscribe to {topic} failed: {e}")))?;
        Ok(Box::new(NatsSource { subscriber }))
    }

    async fn topic_exists(&self, _topic: &str) -> bool {
        // Subjects are auto-created by the broker; existence is trivially
        // true the moment either side opens it (spec.md §4.A).
        true
    }
}
