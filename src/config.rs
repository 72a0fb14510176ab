//! Configuration loading.
//!
//! Reads a JSON document from the path given by `--config` (default
//! `./config.json`) and resolves it into a typed [`Config`]. Mirrors the
//! teacher's raw-then-typed split (`RawConfig` deserializes the file shape
//! verbatim; `Config` is what the rest of the crate consumes) but the wire
//! format here is JSON, per the spec, rather than TOML.

use std::{fs, path::Path};

use serde::Deserialize;

use crate::error::AppError;

/// Which message-bus backend to dial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageBusKind {
    Nats,
    RabbitMq,
}

/// Bus-specific connection settings. Both backends take a `url`; NATS also
/// accepts an optional consumer queue group name.
#[derive(Debug, Clone)]
pub struct BusConfig {
    pub url: String,
    pub queue: Option<String>,
}

/// Fully-resolved proxy configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// `Origin` header sent on the upstream websocket handshake.
    pub origin: String,
    /// Stamped onto every outbound envelope as `server_id`.
    pub server_id: String,
    /// Control-application names; one Application Supervisor per entry.
    pub applications: Vec<String>,
    /// Base URL of the upstream websocket event stream (query string is
    /// appended per-application by the supervisor).
    pub websocket_url: String,
    /// Base URL of the upstream REST API.
    pub stasis_url: String,
    pub ws_user: String,
    pub ws_password: String,
    pub message_bus: MessageBusKind,
    pub bus_config: BusConfig,
}

#[derive(Deserialize)]
struct RawConfig {
    origin: String,
    server_id: String,
    applications: Vec<String>,
    websocket_url: String,
    stasis_url: String,
    ws_user: String,
    ws_password: String,
    message_bus: String,
    bus_config: RawBusConfig,
}

#[derive(Deserialize)]
struct RawBusConfig {
    url: String,
    #[serde(default)]
    queue: Option<String>,
}

/// Load configuration from `path`, defaulting to `./config.json` when `path`
/// is `None`.
pub fn load(path: Option<&Path>) -> Result<Config, AppError> {
    let default_path = Path::new("./config.json");
    let path = path.unwrap_or(default_path);

    let raw_text = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    load_from_str(&raw_text)
}

/// Parse configuration from an in-memory JSON string. Split out from
/// [`load`] so tests can exercise parsing without touching the filesystem.
pub fn load_from_str(raw_text: &str) -> Result<Config, AppError> {
    let raw: RawConfig = serde_json::from_str(raw_text)
        .map_err(|e| AppError::Config(format!("invalid config JSON: {e}")))?;

    let message_bus = match raw.message_bus.as_str() {
        "NATS" => MessageBusKind::Nats,
        "RABBITMQ" => MessageBusKind::RabbitMq,
        other => {
            return Err(AppError::Config(format!(
                "unrecognised message_bus '{other}' — expected \"NATS\" or \"RABBITMQ\""
            )));
        }
    };

    if raw.applications.is_empty() {
        return Err(AppError::Config("applications must list at least one control application".into()));
    }

    Ok(Config {
        origin: raw.origin,
        server_id: raw.server_id,
        applications: raw.applications,
        websocket_url: raw.websocket_url,
        stasis_url: raw.stasis_url,
        ws_user: raw.ws_user,
        ws_password: raw.ws_password,
        message_bus,
        bus_config: BusConfig {
            url: raw.bus_config.url,
            queue: raw.bus_config.queue,
        },
    })
}

impl Config {
    /// Build `<user>:<password>` as used verbatim in `?api_key=` query strings.
    pub fn api_key(&self) -> String {
        format!("{}:{}", self.ws_user, self.ws_password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "origin": "http://localhost",
        "server_id": "proxy-1",
        "applications": ["hello"],
        "websocket_url": "ws://asterisk:8088/ari/events",
        "stasis_url": "http://asterisk:8088/ari",
        "ws_user": "asterisk",
        "ws_password": "secret",
        "message_bus": "NATS",
        "bus_config": { "url": "nats://localhost:4222", "queue": "workers" }
    }"#;

    #[test]
    fn parses_valid_config() {
        let cfg = load_from_str(SAMPLE).expect("should parse");
        assert_eq!(cfg.server_id, "proxy-1");
        assert_eq!(cfg.applications, vec!["hello".to_string()]);
        assert_eq!(cfg.message_bus, MessageBusKind::Nats);
        assert_eq!(cfg.bus_config.queue.as_deref(), Some("workers"));
        assert_eq!(cfg.api_key(), "asterisk:secret");
    }

    #[test]
    fn rejects_unknown_bus_kind() {
        let bad = SAMPLE.replace("\"NATS\"", "\"KAFKA\"");
        let err = load_from_str(&bad).unwrap_err();
        assert!(err.to_string().contains("unrecognised message_bus"));
    }

    #[test]
    fn rejects_empty_applications() {
        let bad = SAMPLE.replace(r#""applications": ["hello"],"#, r#""applications": [],"#);
        let err = load_from_str(&bad).unwrap_err();
        assert!(err.to_string().contains("applications"));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = load_from_str("not json").unwrap_err();
        assert!(err.to_string().contains("invalid config JSON"));
    }

    #[test]
    fn load_reads_config_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, SAMPLE).expect("write config");

        let cfg = load(Some(&path)).expect("should load");
        assert_eq!(cfg.server_id, "proxy-1");
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load(Some(&dir.path().join("missing.json"))).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
