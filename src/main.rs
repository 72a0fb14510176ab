//! ARI dialog-lifecycle demultiplexer — entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Parse CLI args (`--config`, `--log-level`) and init the logger
//!   3. Load config
//!   4. Connect the configured message bus
//!   5. Spawn one Application Supervisor per configured application
//!   6. Wait for Ctrl-C or any supervisor's failure, then shut down
//!      cooperatively

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use ari_dialog_proxy::bus::nats::NatsDriver;
use ari_dialog_proxy::bus::rabbitmq::RabbitDriver;
use ari_dialog_proxy::bus::BusDriver;
use ari_dialog_proxy::classifier::AppContext;
use ari_dialog_proxy::config::{self, Config, MessageBusKind};
use ari_dialog_proxy::error::AppError;
use ari_dialog_proxy::logger;
use ari_dialog_proxy::registry::InstanceRegistry;
use ari_dialog_proxy::rest::RestClient;
use ari_dialog_proxy::runtime::{spawn_components, Component};
use ari_dialog_proxy::supervisor::ApplicationSupervisor;

#[derive(Parser, Debug)]
#[command(name = "ari-dialog-proxy", about = "ARI dialog-lifecycle demultiplexer")]
struct Cli {
    /// Path to the JSON config file.
    #[arg(long, value_name = "PATH")]
    config: Option<std::path::PathBuf>,

    /// Log level, overridden by RUST_LOG if set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    logger::init(&cli.log_level)?;

    let config = config::load(cli.config.as_deref())?;

    info!(
        origin = %config.origin,
        server_id = %config.server_id,
        applications = ?config.applications,
        message_bus = ?config.message_bus,
        "config loaded"
    );

    let bus = connect_bus(&config).await?;
    let registry = Arc::new(InstanceRegistry::new());
    let rest = Arc::new(RestClient::new(config.stasis_url.clone(), config.api_key()));

    let ctx = Arc::new(AppContext {
        server_id: config.server_id.clone(),
        bus,
        registry,
        rest,
    });

    let shutdown = CancellationToken::new();

    let components: Vec<Box<dyn Component>> = config
        .applications
        .iter()
        .map(|application| -> Box<dyn Component> {
            Box::new(ApplicationSupervisor::new(
                application.clone(),
                ctx.clone(),
                config.websocket_url.clone(),
                config.origin.clone(),
                config.api_key(),
            ))
        })
        .collect();

    let handle = spawn_components(components, shutdown.clone());

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("received ctrl-c, shutting down");
                shutdown.cancel();
            }
        }
    });

    let result = handle.join().await;
    if let Err(ref e) = result {
        error!(error = %e, "shutting down due to component failure");
    }
    result
}

async fn connect_bus(config: &Config) -> Result<Arc<dyn BusDriver>, AppError> {
    match config.message_bus {
        MessageBusKind::Nats => Ok(Arc::new(NatsDriver::connect(&config.bus_config).await?)),
        MessageBusKind::RabbitMq => Ok(Arc::new(RabbitDriver::connect(&config.bus_config).await?)),
    }
}
