//! Command Bridge — the per-dialog task that turns bus commands into REST
//! calls and REST responses into bus publications.
//!
//! Grounded in `go-ari-library.go`'s proxy-instance command loop: it waits
//! for the command topic to exist, then selects between incoming commands
//! and the shared quit signal, executing each command against the ARI REST
//! surface and discovering new object ids from `{id, name}` response
//! fragments (spec.md §4.E).

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::bus::{self, topics, BusDriver, ByteSink};
use crate::dialog::DialogInstance;
use crate::model::{Command, CommandResponse, DiscoveredId};
use crate::rest::RestClient;

const TOPIC_POLL_INTERVAL: Duration = Duration::from_millis(100);
const TOPIC_READY_DEADLINE: Duration = Duration::from_secs(10);

/// Runs until `shutdown` fires or the command consumer closes. Spawned once
/// per dialog by [`DialogInstance::new_instance`].
pub async fn run(
    dialog: Arc<DialogInstance>,
    bus: Arc<dyn BusDriver>,
    response_sink: Box<dyn ByteSink>,
    rest: Arc<RestClient>,
    shutdown: CancellationToken,
) {
    let command_topic = topics::commands(&dialog.dialog_id);

    let ready = bus::wait_for_topic(bus.as_ref(), &command_topic, TOPIC_POLL_INTERVAL, TOPIC_READY_DEADLINE).await;
    if !ready {
        warn!(dialog_id = %dialog.dialog_id, topic = %command_topic, "command topic never appeared, tearing down dialog");
        dialog.remove_all_objects().await;
        return;
    }

    let mut commands = match bus.consumer(&command_topic).await {
        Ok(consumer) => consumer,
        Err(e) => {
            error!(dialog_id = %dialog.dialog_id, error = %e, "failed to open command consumer");
            dialog.remove_all_objects().await;
            return;
        }
    };

    let response_sink: Arc<dyn ByteSink> = response_sink.into();

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => return,
            maybe_payload = commands.recv() => {
                match maybe_payload {
                    None => return,
                    Some(payload) => {
                        let dialog = dialog.clone();
                        let rest = rest.clone();
                        let response_sink = response_sink.clone();
                        tokio::spawn(async move {
                            process_command(dialog, rest, response_sink, payload).await;
                        });
                    }
                }
            }
        }
    }
}

async fn process_command(
    dialog: Arc<DialogInstance>,
    rest: Arc<RestClient>,
    response_sink: Arc<dyn ByteSink>,
    payload: Vec<u8>,
) {
    let command: Command = match serde_json::from_slice(&payload) {
        Ok(command) => command,
        Err(e) => {
            warn!(dialog_id = %dialog.dialog_id, error = %e, "unparsable command, dropping");
            return;
        }
    };

    let (status_code, response_body) = rest.execute(&command).await;

    if let Ok(discovered) = serde_json::from_str::<DiscoveredId>(&response_body) {
        if let Some(id) = discovered.object_id() {
            dialog.add_object(id).await;
        }
    }

    let response = if status_code == 0 {
        CommandResponse::transport_failure(&command.unique_id)
    } else {
        CommandResponse { unique_id: command.unique_id.clone(), status_code, response_body }
    };

    match serde_json::to_vec(&response) {
        Ok(bytes) => {
            if let Err(e) = response_sink.send(bytes).await {
                warn!(dialog_id = %dialog.dialog_id, error = %e, "failed to publish command response");
            }
        }
        Err(e) => warn!(dialog_id = %dialog.dialog_id, error = %e, "failed to serialize command response"),
    }
}
