//! Queue-routed RabbitMQ backend.
//!
//! Grounded in `rabbitmq.go`: every topic is a durable, non-exclusive queue
//! with auto-delete disabled, declared on open; the consumer acks each
//! delivery after forwarding it onto the caller-facing byte stream.
//! `topic_exists` reports `true` once this driver has declared the queue at
//! least once (spec.md §4.A: "also reported true after declaration").

use std::{collections::HashSet, sync::Mutex};

use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::{
    options::{BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, QueueDeclareOptions},
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties,
};

use super::{BusDriver, ByteSink, ByteSource};
use crate::config::BusConfig;
use crate::error::AppError;

pub struct RabbitDriver {
    connection: Connection,
    declared: Mutex<HashSet<String>>,
}

impl RabbitDriver {
    /// Connect to the broker. Fatal at startup on failure (spec.md §4.A /
    /// §7 error kind 2).
    pub async fn connect(config: &BusConfig) -> Result<Self, AppError> {
        let connection = Connection::connect(&config.url, ConnectionProperties::default())
            .await
            .map_err(|e| AppError::Bus(format!("RabbitMQ connect failed ({}): {e}", config.url)))?;
        Ok(Self { connection, declared: Mutex::new(HashSet::new()) })
    }

    async fn channel(&self) -> Result<Channel, AppError> {
        self.connection
            .create_channel()
            .await
            .map_err(|e| AppError::Bus(format!("RabbitMQ channel open failed: {e}")))
    }

    async fn declare(&self, channel: &Channel, topic: &str) -> Result<(), AppError> {
        channel
            .queue_declare(
                topic,
                QueueDeclareOptions {
                    durable: true,
                    exclusive: false,
                    auto_delete: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| AppError::Bus(format!("RabbitMQ queue_declare({topic}) failed: {e}")))?;
        self.declared.lock().expect("rabbit driver mutex poisoned").insert(topic.to_string());
        Ok(())
    }
}

struct RabbitSink {
    channel: Channel,
    queue: String,
}

#[async_trait]
impl ByteSink for RabbitSink {
    async fn send(&self, payload: Vec<u8>) -> Result<(), AppError> {
        self.channel
            .basic_publish(
                "",
                &self.queue,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default(),
            )
            .await
            .map_err(|e| AppError::Bus(format!("RabbitMQ publish to {} failed: {e}", self.queue)))?
            .await
            .map_err(|e| AppError::Bus(format!("RabbitMQ publish confirm for {} failed: {e}", self.queue)))?;
        Ok(())
    }
}

struct RabbitSource {
    consumer: lapin::Consumer,
}

#[async_trait]
impl ByteSource for RabbitSource {
    async fn recv(&mut self) -> Option<Vec<u8>> {
        let delivery = self.consumer.next().await?.ok()?;
        let body = delivery.data.clone();
        // Ack after the payload is handed off to the caller, per rabbitmq.go.
        let _ = delivery.ack(BasicAckOptions::default()).await;
        Some(body)
    }
}

#[async_trait]
impl BusDriver for RabbitDriver {
    async fn producer(&self, topic: &str) -> Result<Box<dyn ByteSink>, AppError> {
        let channel = self.channel().await?;
        self.declare(&channel, topic).await?;
        Ok(Box::new(RabbitSink { channel, queue: topic.to_string() }))
    }

    async fn consumer(&self, topic: &str) -> Result<Box<dyn ByteSource>, AppError> {
        let channel = self.channel().await?;
        self.declare(&channel, topic).await?;
        let consumer = channel
            .basic_consume(
                topic,
                &format!("ari-proxy-{topic}"),
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| AppError::Bus(format!("RabbitMQ basic_consume({topic}) failed: {e}")))?;
        Ok(Box::new(RabbitSource { consumer }))
    }

    async fn topic_exists(&self, topic: &str) -> bool {
        self.declared.lock().expect("rabbit driver mutex poisoned").contains(topic)
    }
}
