//! Application Supervisor — one per configured Stasis application.
//!
//! Grounded in `main.go`'s per-application goroutine, which opens a
//! websocket to the event stream and dispatches each event to the
//! classifier inline; here each event is classified on its own spawned
//! task per spec.md §4.F, so a slow-to-create dialog never stalls the
//! websocket read loop for every other event on the same application.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::bus::{BusDriver, ByteSink};
use crate::classifier::{self, AppContext};
use crate::error::AppError;
use crate::runtime::{Component, ComponentFuture};
use crate::ws;

pub struct ApplicationSupervisor {
    application: String,
    ctx: Arc<AppContext>,
    websocket_url: String,
    origin: String,
    api_key: String,
}

impl ApplicationSupervisor {
    pub fn new(
        application: String,
        ctx: Arc<AppContext>,
        websocket_url: String,
        origin: String,
        api_key: String,
    ) -> Self {
        Self { application, ctx, websocket_url, origin, api_key }
    }

    async fn run_inner(self, shutdown: CancellationToken) -> Result<(), AppError> {
        // The start-signal topic is named by the application itself
        // (spec.md §4.D).
        let app_start_sink: Arc<dyn ByteSink> = self.ctx.bus.producer(&self.application).await?.into();

        let mut events =
            ws::connect_events(&self.websocket_url, &self.application, &self.origin, &self.api_key).await?;

        info!(application = %self.application, "application supervisor connected");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!(application = %self.application, "application supervisor shutting down");
                    return Ok(());
                }
                maybe_event = events.next() => {
                    match maybe_event {
                        None => {
                            return Err(AppError::Websocket(format!(
                                "event stream for application {} closed", self.application
                            )));
                        }
                        Some(Err(e)) => {
                            error!(application = %self.application, error = %e, "event stream error");
                            return Err(e);
                        }
                        Some(Ok(raw_event)) => {
                            let ctx = self.ctx.clone();
                            let application = self.application.clone();
                            let app_start_sink = app_start_sink.clone();
                            tokio::spawn(async move {
                                classifier::handle_event(ctx, application, app_start_sink, raw_event).await;
                            });
                        }
                    }
                }
            }
        }
    }
}

impl Component for ApplicationSupervisor {
    fn id(&self) -> &str {
        &self.application
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        Box::pin((*self).run_inner(shutdown))
    }
}
