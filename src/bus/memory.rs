//! In-memory bus driver — test-only scaffolding.
//!
//! Grounded in the teacher's habit of shipping an offline-safe dummy
//! implementation of an external dependency for tests
//! (`llm::providers::dummy`). Topics are `tokio::sync::broadcast` channels
//! keyed by name; `producer`/`consumer` both lazily create the topic on
//! first access, and `topic_exists` reports `true` the instant either side
//! has opened it — mirroring both real drivers' trivial `topic_exists`.

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{BusDriver, ByteSink, ByteSource};
use crate::error::AppError;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Default)]
pub struct MemoryDriver {
    topics: Mutex<HashMap<String, broadcast::Sender<Vec<u8>>>>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn topic_sender(&self, topic: &str) -> broadcast::Sender<Vec<u8>> {
        let mut topics = self.topics.lock().expect("memory driver mutex poisoned");
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

struct MemorySink {
    tx: broadcast::Sender<Vec<u8>>,
}

#[async_trait]
impl ByteSink for MemorySink {
    async fn send(&self, payload: Vec<u8>) -> Result<(), AppError> {
        // No receivers yet is not an error — mirrors a real broker accepting
        // a publish with zero current subscribers.
        let _ = self.tx.send(payload);
        Ok(())
    }
}

struct MemorySource {
    rx: broadcast::Receiver<Vec<u8>>,
}

#[async_trait]
impl ByteSource for MemorySource {
    async fn recv(&mut self) -> Option<Vec<u8>> {
        loop {
            match self.rx.recv().await {
                Ok(payload) => return Some(payload),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[async_trait]
impl BusDriver for MemoryDriver {
    async fn producer(&self, topic: &str) -> Result<Box<dyn ByteSink>, AppError> {
        Ok(Box::new(MemorySink { tx: self.topic_sender(topic) }))
    }

    async fn consumer(&self, topic: &str) -> Result<Box<dyn ByteSource>, AppError> {
        Ok(Box::new(MemorySource { rx: self.topic_sender(topic).subscribe() }))
    }

    async fn topic_exists(&self, topic: &str) -> bool {
        self.topics.lock().expect("memory driver mutex poisoned").contains_key(topic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn producer_then_consumer_delivers_payload() {
        let driver = MemoryDriver::new();
        let sink = driver.producer("t1").await.unwrap();
        let mut source = driver.consumer("t1").await.unwrap();

        sink.send(b"hello".to_vec()).await.unwrap();
        let got = source.recv().await.unwrap();
        assert_eq!(got, b"hello");
    }

    #[tokio::test]
    async fn topic_exists_false_until_opened() {
        let driver = MemoryDriver::new();
        assert!(!driver.topic_exists("never_opened").await);
        let _ = driver.producer("now_opened").await.unwrap();
        assert!(driver.topic_exists("now_opened").await);
    }
}
