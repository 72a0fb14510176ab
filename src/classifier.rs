//! Event Classifier & Router — decides what an upstream ARI event means for
//! dialog lifecycle and routes it to the right [`DialogInstance`], or drops
//! it.
//!
//! Grounded in the Go original's per-application event loop (`main.go`'s
//! `case` switch over `event.Type` inside the websocket read loop) plus
//! `proxy_structs.go`'s minimal per-type field structs. The routing table
//! is spec.md §4.D's; the StasisEnd ordering follows §4.D's redesign flag
//! (publish the envelope before tearing the dialog down, not after).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::bus::{BusDriver, ByteSink};
use crate::dialog::DialogInstance;
use crate::model::{AppStart, Envelope, EventInfo};
use crate::registry::InstanceRegistry;
use crate::rest::RestClient;

/// Delay between publishing `AppStart` and opening the dialog's own topics,
/// giving a downstream worker time to subscribe before anything is
/// published on them (spec.md §4.D).
const START_SIGNAL_DELAY: Duration = Duration::from_millis(50);

/// Shared, read-only state every classified event needs: who we are, how
/// to reach the bus and the registry, and how to issue REST calls. One
/// instance is built at startup and cloned (via `Arc`) into every
/// Application Supervisor.
pub struct AppContext {
    pub server_id: String,
    pub bus: Arc<dyn BusDriver>,
    pub registry: Arc<InstanceRegistry>,
    pub rest: Arc<RestClient>,
}

/// Classifies one raw upstream event and routes it. Spawned as a detached
/// task per event by the Application Supervisor so a slow dialog creation
/// never stalls the websocket read loop (spec.md §4.F).
pub async fn handle_event(
    ctx: Arc<AppContext>,
    application: String,
    app_start_sink: Arc<dyn ByteSink>,
    raw_event: String,
) {
    let info: EventInfo = match serde_json::from_str(&raw_event) {
        Ok(info) => info,
        Err(e) => {
            warn!(error = %e, "unparsable upstream event, dropping");
            return;
        }
    };

    let envelope = Envelope {
        server_id: ctx.server_id.clone(),
        timestamp: Utc::now(),
        event_type: info.event_type.clone(),
        ari_body: raw_event,
    };

    match info.event_type.as_str() {
        "StasisStart" => handle_stasis_start(ctx, application, app_start_sink, info, envelope).await,
        "StasisEnd" => handle_stasis_end(&ctx, &info.channel.id, envelope).await,
        "BridgeDestroyed" => handle_destroy(&ctx, &info.bridge.id, envelope).await,
        "ChannelDestroyed" => handle_destroy(&ctx, &info.channel.id, envelope).await,
        other if other.starts_with("Channel") => route_by_id(&ctx, &info.channel.id, envelope).await,
        other if other.starts_with("Bridge") => route_by_id(&ctx, &info.bridge.id, envelope).await,
        other if other.starts_with("Playback") => route_by_id(&ctx, &info.playback.id, envelope).await,
        other if other.starts_with("Recording") => route_by_id(&ctx, &info.recording.name, envelope).await,
        other => debug!(event_type = %other, "no routing rule for event type, dropping"),
    }
}

async fn handle_stasis_start(
    ctx: Arc<AppContext>,
    application: String,
    app_start_sink: Arc<dyn ByteSink>,
    info: EventInfo,
    envelope: Envelope,
) {
    let dialog_id = Uuid::new_v4().to_string();

    let app_start = AppStart {
        application: application.clone(),
        dialog_id: dialog_id.clone(),
        server_id: ctx.server_id.clone(),
    };
    match serde_json::to_vec(&app_start) {
        Ok(bytes) => {
            if let Err(e) = app_start_sink.send(bytes).await {
                warn!(dialog_id = %dialog_id, error = %e, "failed to publish AppStart");
            }
        }
        Err(e) => warn!(dialog_id = %dialog_id, error = %e, "failed to serialize AppStart"),
    }

    tokio::time::sleep(START_SIGNAL_DELAY).await;

    let dialog = match DialogInstance::new_instance(
        dialog_id.clone(),
        ctx.bus.clone(),
        ctx.registry.clone(),
        ctx.rest.clone(),
    )
    .await
    {
        Ok(dialog) => dialog,
        Err(e) => {
            error!(dialog_id = %dialog_id, error = %e, "failed to open dialog topics");
            return;
        }
    };

    // A StasisStart for a channel already bound to a live dialog replaces
    // the binding; the old dialog's other objects stay registered under it
    // until its own teardown (spec.md §9, Open Question 1).
    dialog.add_object(&info.channel.id).await;
    dialog.push_envelope(&envelope);
}

async fn handle_stasis_end(ctx: &Arc<AppContext>, channel_id: &str, envelope: Envelope) {
    if channel_id.is_empty() {
        return;
    }
    match ctx.registry.get(channel_id).await {
        Some(dialog) => {
            // Publish before tearing the dialog down, not after: a consumer
            // reading the StasisEnd envelope must still find a live topic.
            dialog.push_envelope(&envelope);
            dialog.remove_all_objects().await;
        }
        None => debug!(channel_id = %channel_id, "StasisEnd for unknown channel, dropping"),
    }
}

async fn handle_destroy(ctx: &Arc<AppContext>, object_id: &str, envelope: Envelope) {
    if object_id.is_empty() {
        return;
    }
    match ctx.registry.get(object_id).await {
        Some(dialog) => {
            dialog.push_envelope(&envelope);
            dialog.remove_object(object_id).await;
        }
        None => debug!(object_id = %object_id, "destroy event for unknown id, dropping"),
    }
}

async fn route_by_id(ctx: &Arc<AppContext>, object_id: &str, envelope: Envelope) {
    if object_id.is_empty() {
        return;
    }
    match ctx.registry.get(object_id).await {
        Some(dialog) => dialog.push_envelope(&envelope),
        None => debug!(object_id = %object_id, "event for unknown id, dropping"),
    }
}
