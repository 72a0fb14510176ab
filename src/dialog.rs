//! Dialog Instance — the per-call state machine that owns a set of object
//! ids, fans events out to the bus, and fans commands in from it.
//!
//! Grounded in `go-ari-library.go`'s `proxyInstance` (`Objects []string`,
//! `Commands`/`Events`/`Responses` channels, `quit chan bool`). The Go
//! original selects on bus channels from a single goroutine; this version
//! splits the same responsibilities into two cooperating tasks — an event
//! forwarder (here) and a Command Bridge (`command_bridge.rs`) — both tied
//! to one `CancellationToken` so either side's exit tears down the other.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::{topics, BusDriver, ByteSink};
use crate::command_bridge;
use crate::error::AppError;
use crate::model::Envelope;
use crate::registry::InstanceRegistry;
use crate::rest::RestClient;

/// Capacity of the per-dialog event buffer (spec.md §5): bounded so a
/// broker outage on the event side cannot grow memory without bound.
const EVENT_QUEUE_CAPACITY: usize = 256;

/// A single in-flight call: the object ids it owns, its event outbox, and
/// the shutdown signal shared by its forwarder and command bridge tasks.
pub struct DialogInstance {
    pub dialog_id: String,
    registry: Arc<InstanceRegistry>,
    event_queue: EventQueue,
    objects: Mutex<Vec<String>>,
    shutdown_token: CancellationToken,
}

impl DialogInstance {
    /// Opens the event and response producers, starts the forwarder and
    /// Command Bridge tasks, and returns the live instance. Does not
    /// register any object id — the caller (Classifier) does that once it
    /// knows which channel started the dialog (spec.md §4.B).
    pub async fn new_instance(
        dialog_id: String,
        bus: Arc<dyn BusDriver>,
        registry: Arc<InstanceRegistry>,
        rest: Arc<RestClient>,
    ) -> Result<Arc<Self>, AppError> {
        let event_sink = bus.producer(&topics::events(&dialog_id)).await?;
        let response_sink = bus.producer(&topics::responses(&dialog_id)).await?;

        let shutdown_token = CancellationToken::new();
        let event_queue = EventQueue::new(EVENT_QUEUE_CAPACITY);

        let instance = Arc::new(Self {
            dialog_id: dialog_id.clone(),
            registry,
            event_queue: event_queue.clone(),
            objects: Mutex::new(Vec::new()),
            shutdown_token: shutdown_token.clone(),
        });

        tokio::spawn(event_queue.run_forwarder(event_sink, shutdown_token.clone()));
        tokio::spawn(command_bridge::run(
            instance.clone(),
            bus,
            response_sink,
            rest,
            shutdown_token,
        ));

        debug!(dialog_id = %dialog_id, "dialog instance created");
        Ok(instance)
    }

    /// Enqueues an envelope for delivery on `events_<dialog_id>`. Never
    /// blocks the caller: a full queue drops its oldest entry and logs a
    /// warning rather than applying backpressure to the Classifier
    /// (spec.md §5).
    pub fn push_envelope(&self, envelope: &Envelope) {
        match serde_json::to_vec(envelope) {
            Ok(bytes) => self.event_queue.push(bytes),
            Err(e) => warn!(dialog_id = %self.dialog_id, error = %e, "failed to serialize envelope"),
        }
    }

    /// Adds `id` to the owned set (idempotent) and registers it in the
    /// shared registry. No-op if already owned (spec.md §4.B, duplicates
    /// suppressed).
    pub async fn add_object(self: &Arc<Self>, id: &str) {
        if id.is_empty() {
            return;
        }
        let added = {
            let mut objects = self.objects.lock().expect("dialog objects mutex poisoned");
            if objects.iter().any(|existing| existing == id) {
                false
            } else {
                objects.push(id.to_string());
                true
            }
        };
        if added {
            self.registry.add(id.to_string(), self.clone()).await;
            debug!(dialog_id = %self.dialog_id, object_id = %id, "object added");
        }
    }

    /// Removes `id` from the owned set and the registry. Shuts the dialog
    /// down once the owned set becomes empty (spec.md §4.B, invariant I2).
    pub async fn remove_object(self: &Arc<Self>, id: &str) {
        let (was_present, now_empty) = {
            let mut objects = self.objects.lock().expect("dialog objects mutex poisoned");
            let before = objects.len();
            objects.retain(|existing| existing != id);
            (objects.len() != before, objects.is_empty())
        };
        if !was_present {
            return;
        }
        self.registry.remove(id).await;
        debug!(dialog_id = %self.dialog_id, object_id = %id, "object removed");
        if now_empty {
            self.shutdown().await;
        }
    }

    /// Unregisters every owned object id and shuts the dialog down
    /// unconditionally. Used on StasisEnd and on command-topic readiness
    /// timeout (spec.md §4.B, §4.D, §4.E).
    pub async fn remove_all_objects(self: &Arc<Self>) {
        let ids = {
            let mut objects = self.objects.lock().expect("dialog objects mutex poisoned");
            std::mem::take(&mut *objects)
        };
        for id in &ids {
            self.registry.remove(id).await;
        }
        debug!(dialog_id = %self.dialog_id, removed = ids.len(), "all objects removed");
        self.shutdown().await;
    }

    /// Signals the forwarder and Command Bridge tasks to exit. Safe to call
    /// more than once — `CancellationToken::cancel` is itself idempotent,
    /// so the dialog is torn down exactly once regardless of which caller
    /// wins the race (spec.md §4.B, invariant I4).
    pub async fn shutdown(self: &Arc<Self>) {
        if !self.shutdown_token.is_cancelled() {
            info!(dialog_id = %self.dialog_id, "dialog shutting down");
        }
        self.shutdown_token.cancel();
    }

    #[cfg(test)]
    fn owned_objects(&self) -> Vec<String> {
        self.objects.lock().expect("dialog objects mutex poisoned").clone()
    }

    #[cfg(test)]
    fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }
}

/// A bounded, drop-oldest queue of serialized envelopes plus the task that
/// drains it onto a [`ByteSink`]. Kept separate from `DialogInstance` so the
/// forwarder task can own a clone without holding a lock across an await.
#[derive(Clone)]
struct EventQueue {
    inner: Arc<EventQueueInner>,
}

struct EventQueueInner {
    capacity: usize,
    queue: Mutex<VecDeque<Vec<u8>>>,
    notify: Notify,
}

impl EventQueue {
    fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(EventQueueInner {
                capacity,
                queue: Mutex::new(VecDeque::new()),
                notify: Notify::new(),
            }),
        }
    }

    fn push(&self, payload: Vec<u8>) {
        {
            let mut queue = self.inner.queue.lock().expect("event queue mutex poisoned");
            if queue.len() >= self.inner.capacity {
                queue.pop_front();
                warn!(capacity = self.inner.capacity, "event queue full, dropped oldest envelope");
            }
            queue.push_back(payload);
        }
        self.inner.notify.notify_one();
    }

    /// Drains the queue onto `sink` until `shutdown` fires or the sink
    /// errors. Draining before waiting on `notify` closes the race where a
    /// push lands between an empty check and the wait call: `Notify` keeps
    /// one permit outstanding for exactly this case. Cancellation still runs
    /// one more drain pass before returning, so an envelope pushed (e.g. a
    /// StasisEnd) in the instant before the token is cancelled is delivered
    /// rather than abandoned in the queue.
    async fn run_forwarder(self, sink: Box<dyn ByteSink>, shutdown: CancellationToken) {
        loop {
            loop {
                let next = {
                    let mut queue = self.inner.queue.lock().expect("event queue mutex poisoned");
                    queue.pop_front()
                };
                match next {
                    Some(payload) => {
                        if let Err(e) = sink.send(payload).await {
                            warn!(error = %e, "event sink send failed, forwarder exiting");
                            return;
                        }
                    }
                    None => break,
                }
            }
            if shutdown.is_cancelled() {
                return;
            }
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {}
                _ = self.inner.notify.notified() => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::memory::MemoryDriver;
    use crate::bus::BusDriver as _;
    use crate::rest::RestClient;

    async fn test_dialog(id: &str) -> (Arc<DialogInstance>, Arc<dyn BusDriver>) {
        let bus: Arc<dyn BusDriver> = Arc::new(MemoryDriver::new());
        let registry = Arc::new(InstanceRegistry::new());
        let rest = Arc::new(RestClient::new("http://localhost:8088/ari".into(), "u:p".into()));
        let dialog = DialogInstance::new_instance(id.to_string(), bus.clone(), registry, rest)
            .await
            .unwrap();
        (dialog, bus)
    }

    #[tokio::test]
    async fn add_object_is_idempotent() {
        let (dialog, _bus) = test_dialog("d1").await;
        dialog.add_object("C1").await;
        dialog.add_object("C1").await;
        assert_eq!(dialog.owned_objects(), vec!["C1".to_string()]);
    }

    #[tokio::test]
    async fn remove_last_object_triggers_shutdown() {
        let (dialog, _bus) = test_dialog("d1").await;
        dialog.add_object("C1").await;
        assert!(!dialog.is_shutdown());
        dialog.remove_object("C1").await;
        assert!(dialog.owned_objects().is_empty());
        assert!(dialog.is_shutdown());
    }

    #[tokio::test]
    async fn remove_object_not_owned_is_noop() {
        let (dialog, _bus) = test_dialog("d1").await;
        dialog.add_object("C1").await;
        dialog.remove_object("does-not-exist").await;
        assert_eq!(dialog.owned_objects(), vec!["C1".to_string()]);
        assert!(!dialog.is_shutdown());
    }

    #[tokio::test]
    async fn remove_all_objects_clears_set_and_shuts_down() {
        let (dialog, _bus) = test_dialog("d1").await;
        dialog.add_object("C1").await;
        dialog.add_object("B1").await;
        dialog.remove_all_objects().await;
        assert!(dialog.owned_objects().is_empty());
        assert!(dialog.is_shutdown());
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let (dialog, _bus) = test_dialog("d1").await;
        dialog.shutdown().await;
        dialog.shutdown().await;
        assert!(dialog.is_shutdown());
    }

    #[tokio::test]
    async fn push_envelope_delivers_through_forwarder() {
        let (dialog, bus) = test_dialog("d1").await;
        let mut events = bus.consumer(&topics::events("d1")).await.unwrap();

        let envelope = Envelope {
            server_id: "proxy-1".into(),
            timestamp: chrono::Utc::now(),
            event_type: "ChannelStateChange".into(),
            ari_body: r#"{"type":"ChannelStateChange"}"#.into(),
        };
        dialog.push_envelope(&envelope);

        let payload = tokio::time::timeout(std::time::Duration::from_secs(1), events.recv())
            .await
            .expect("forwarder did not deliver in time")
            .expect("event channel closed");
        let decoded: Envelope = serde_json::from_slice(&payload).unwrap();
        assert_eq!(decoded, envelope);
    }
}
