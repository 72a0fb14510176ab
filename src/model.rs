//! Wire types shared by the bus and REST surfaces.
//!
//! Grounded in `go-ari-library.go`'s `Event`/`AppStart`/`Command`/
//! `CommandResponse` structs and `proxy_structs.go`'s minimal event-field
//! structs (`minChan`, `minBridge`, `minPlay`, `minRec`, `ID`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The wire form of a bus event published on `events_<dialog_id>`.
///
/// `ari_body` carries the verbatim original event payload — byte-exact, not
/// re-serialized — so round-tripping an `Envelope` never mutates the
/// upstream JSON a worker ultimately inspects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Envelope {
    pub server_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub ari_body: String,
}

/// Published on the per-application start-signal topic when a dialog is born.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppStart {
    pub application: String,
    pub dialog_id: String,
    pub server_id: String,
}

/// A remote command read off `commands_<dialog_id>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Command {
    pub unique_id: String,
    pub url: String,
    pub method: String,
    /// Pre-serialized JSON object, carried as a string end-to-end exactly
    /// like the Go original — the proxy never inspects its shape.
    pub body: String,
}

/// Published on `responses_<dialog_id>` after the REST call completes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandResponse {
    pub unique_id: String,
    pub status_code: u16,
    pub response_body: String,
}

impl CommandResponse {
    /// The "transport failed" response: zero status, empty body (spec §7,
    /// error kind 5).
    pub fn transport_failure(unique_id: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.into(),
            status_code: 0,
            response_body: String::new(),
        }
    }
}

/// Minimal subfields the Classifier decodes out of every upstream event —
/// enough to route, never enough to interpret call semantics.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventInfo {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub application: String,
    #[serde(default)]
    pub bridge: MinBridge,
    #[serde(default)]
    pub channel: MinChannel,
    #[serde(default)]
    pub playback: MinPlayback,
    #[serde(default)]
    pub recording: MinRecording,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MinChannel {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MinBridge {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MinPlayback {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MinRecording {
    #[serde(default)]
    pub name: String,
}

/// Shape of the `{id, name}` object-discovery fragment a REST response may
/// carry (`ID` struct in `proxy_structs.go`). `id` wins over `name` when
/// both are present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscoveredId {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl DiscoveredId {
    /// The object id to register, if this response discovered one.
    pub fn object_id(&self) -> Option<&str> {
        if !self.id.is_empty() {
            Some(self.id.as_str())
        } else if !self.name.is_empty() {
            Some(self.name.as_str())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trips_ari_body_byte_exact() {
        let original = r#"{"type":"StasisStart","channel":{"id":"C1"}}"#.to_string();
        let env = Envelope {
            server_id: "proxy-1".into(),
            timestamp: Utc::now(),
            event_type: "StasisStart".into(),
            ari_body: original.clone(),
        };
        let json = serde_json::to_string(&env).unwrap();
        let back: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back, env);
        assert_eq!(back.ari_body, original);
    }

    #[test]
    fn discovered_id_prefers_id_over_name() {
        let d = DiscoveredId { id: "B1".into(), name: "rec1".into() };
        assert_eq!(d.object_id(), Some("B1"));
    }

    #[test]
    fn discovered_id_falls_back_to_name() {
        let d = DiscoveredId { id: String::new(), name: "rec1".into() };
        assert_eq!(d.object_id(), Some("rec1"));
    }

    #[test]
    fn discovered_id_none_when_both_empty() {
        let d = DiscoveredId::default();
        assert_eq!(d.object_id(), None);
    }

    #[test]
    fn event_info_decodes_minimal_subfields() {
        let raw = r#"{"type":"ChannelDestroyed","channel":{"id":"C1"},"bridge":{"id":"B1"}}"#;
        let info: EventInfo = serde_json::from_str(raw).unwrap();
        assert_eq!(info.event_type, "ChannelDestroyed");
        assert_eq!(info.channel.id, "C1");
        assert_eq!(info.bridge.id, "B1");
        assert_eq!(info.playback.id, "");
    }
}
