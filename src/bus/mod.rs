//! Bus Driver — a uniform producer/consumer interface over a message broker.
//!
//! Grounded in `go-ari-library.go`'s `MessageBus` interface
//! (`InitBus`/`StartProducer`/`StartConsumer`/`TopicExists`) and its two
//! concrete backends (`nats.go`, `rabbitmq.go`). Two variants are provided:
//! a subject-routed backend ([`nats::NatsDriver`]) and a queue-routed backend
//! ([`rabbitmq::RabbitDriver`]); an in-memory stub ([`memory::MemoryDriver`])
//! backs the crate's own tests.
//!
//! Byte-sink and byte-source are the caller-facing unidirectional streams of
//! opaque payloads spec.md §4.A calls for; they are trait objects so the
//! Dialog Instance and Command Bridge never know which broker is underneath.

pub mod memory;
pub mod nats;
pub mod rabbitmq;

use async_trait::async_trait;

use crate::error::AppError;

/// An outbound, unidirectional stream of opaque byte payloads.
#[async_trait]
pub trait ByteSink: Send + Sync {
    async fn send(&self, payload: Vec<u8>) -> Result<(), AppError>;
}

/// An inbound, unidirectional stream of opaque byte payloads.
///
/// `recv` returns `None` once the underlying broker connection/topic is
/// closed — per spec.md §4.A, this is how mid-operation broker failures
/// propagate: the channel closes rather than erroring out.
#[async_trait]
pub trait ByteSource: Send {
    async fn recv(&mut self) -> Option<Vec<u8>>;
}

/// Capability set every broker backend implements (spec.md §4.A).
#[async_trait]
pub trait BusDriver: Send + Sync {
    async fn producer(&self, topic: &str) -> Result<Box<dyn ByteSink>, AppError>;
    async fn consumer(&self, topic: &str) -> Result<Box<dyn ByteSource>, AppError>;
    async fn topic_exists(&self, topic: &str) -> bool;
}

/// Topic-name helpers — every topic name the proxy ever constructs is one of
/// these four shapes (spec.md §6).
pub mod topics {
    pub fn events(dialog_id: &str) -> String {
        format!("events_{dialog_id}")
    }

    pub fn responses(dialog_id: &str) -> String {
        format!("responses_{dialog_id}")
    }

    pub fn commands(dialog_id: &str) -> String {
        format!("commands_{dialog_id}")
    }

}

/// Poll `driver.topic_exists(topic)` every `interval` until it reports
/// `true` or `deadline` elapses.
///
/// Grounded in `go-ari-library.go`'s `TopicExists`, which spawns a goroutine
/// polling every 100ms for up to 2s and returns a channel; here the poll is
/// inline behind an `async fn` with a caller-supplied deadline (the Command
/// Bridge uses 10s per spec.md §4.E; other callers may use a tighter bound).
pub async fn wait_for_topic(
    driver: &dyn BusDriver,
    topic: &str,
    interval: std::time::Duration,
    deadline: std::time::Duration,
) -> bool {
    let start = tokio::time::Instant::now();
    loop {
        if driver.topic_exists(topic).await {
            return true;
        }
        if start.elapsed() >= deadline {
            return false;
        }
        tokio::time::sleep(interval).await;
    }
}
