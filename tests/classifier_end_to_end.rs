//! End-to-end exercise of the dialog lifecycle against the in-memory bus
//! driver: a full StasisStart -> routed event -> StasisEnd cycle, with no
//! real broker or websocket involved.

use std::sync::Arc;
use std::time::Duration;

use ari_dialog_proxy::bus::memory::MemoryDriver;
use ari_dialog_proxy::bus::{topics, BusDriver, ByteSink};
use ari_dialog_proxy::classifier::{self, AppContext};
use ari_dialog_proxy::model::{AppStart, Envelope};
use ari_dialog_proxy::registry::InstanceRegistry;
use ari_dialog_proxy::rest::RestClient;

fn test_context(driver: Arc<dyn BusDriver>) -> Arc<AppContext> {
    Arc::new(AppContext {
        server_id: "proxy-test".into(),
        bus: driver,
        registry: Arc::new(InstanceRegistry::new()),
        rest: Arc::new(RestClient::new("http://localhost:8088/ari".into(), "asterisk:secret".into())),
    })
}

#[tokio::test]
async fn full_dialog_lifecycle_via_in_memory_bus() {
    let driver: Arc<dyn BusDriver> = Arc::new(MemoryDriver::new());
    let ctx = test_context(driver.clone());

    let mut app_start_rx = driver.consumer("demo-app").await.unwrap();
    let app_start_sink: Arc<dyn ByteSink> = driver.producer("demo-app").await.unwrap().into();

    let start = r#"{"type":"StasisStart","application":"demo-app","channel":{"id":"C1"}}"#.to_string();
    classifier::handle_event(ctx.clone(), "demo-app".into(), app_start_sink.clone(), start).await;

    let app_start: AppStart = {
        let payload = tokio::time::timeout(Duration::from_secs(1), app_start_rx.recv())
            .await
            .expect("AppStart not published in time")
            .expect("AppStart channel closed");
        serde_json::from_slice(&payload).unwrap()
    };
    assert_eq!(app_start.application, "demo-app");

    let dialog = ctx.registry.get("C1").await.expect("channel should be registered");
    assert_eq!(dialog.dialog_id, app_start.dialog_id);

    let mut events = driver.consumer(&topics::events(&dialog.dialog_id)).await.unwrap();

    let channel_event = r#"{"type":"ChannelStateChange","channel":{"id":"C1"}}"#.to_string();
    classifier::handle_event(ctx.clone(), "demo-app".into(), app_start_sink.clone(), channel_event).await;

    let routed: Envelope = {
        let payload = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .expect("routed event not delivered in time")
            .unwrap();
        serde_json::from_slice(&payload).unwrap()
    };
    assert_eq!(routed.event_type, "ChannelStateChange");

    let end = r#"{"type":"StasisEnd","channel":{"id":"C1"}}"#.to_string();
    classifier::handle_event(ctx.clone(), "demo-app".into(), app_start_sink, end).await;

    let end_envelope: Envelope = {
        let payload = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .expect("StasisEnd not delivered in time")
            .unwrap();
        serde_json::from_slice(&payload).unwrap()
    };
    assert_eq!(end_envelope.event_type, "StasisEnd");

    // The redesign flag applies: StasisEnd is published before the dialog's
    // objects are torn down, so this lookup happening after the envelope
    // already arrived is exactly the ordering being verified.
    assert!(ctx.registry.get("C1").await.is_none(), "channel should be unbound after StasisEnd");
}

#[tokio::test]
async fn unknown_channel_events_are_dropped_without_panicking() {
    let driver: Arc<dyn BusDriver> = Arc::new(MemoryDriver::new());
    let ctx = test_context(driver.clone());
    let app_start_sink: Arc<dyn ByteSink> = driver.producer("demo-app").await.unwrap().into();

    for raw in [
        r#"{"type":"ChannelStateChange","channel":{"id":"never-seen"}}"#,
        r#"{"type":"StasisEnd","channel":{"id":"never-seen"}}"#,
        r#"{"type":"ChannelDestroyed","channel":{"id":"never-seen"}}"#,
    ] {
        classifier::handle_event(ctx.clone(), "demo-app".into(), app_start_sink.clone(), raw.to_string()).await;
    }

    assert!(ctx.registry.get("never-seen").await.is_none());
}
