//! A representative sample of ARI operations as `(method, path)` builders.
//!
//! Commands normally arrive off the bus pre-built (`Command.url` /
//! `Command.method`), so nothing in the Command Bridge calls into this
//! module — it exists so a caller constructing a [`Command`] by hand (a
//! test, a future CLI) doesn't have to hand-assemble ARI paths. Grounded in
//! `ari_commands.go`; this is a representative slice of that file's ~80
//! operations, not a full catalogue (spec.md explicitly scopes a complete
//! mapping out as mechanical and trivially regenerable).

use crate::model::Command;

fn command(unique_id: impl Into<String>, method: &str, url: String, body: impl Into<String>) -> Command {
    Command { unique_id: unique_id.into(), url, method: method.to_string(), body: body.into() }
}

pub fn channels_list(unique_id: impl Into<String>) -> Command {
    command(unique_id, "GET", "/channels".to_string(), "{}")
}

pub fn channels_answer(unique_id: impl Into<String>, channel_id: &str) -> Command {
    command(unique_id, "POST", format!("/channels/{channel_id}/answer"), "{}")
}

pub fn channels_hangup(unique_id: impl Into<String>, channel_id: &str) -> Command {
    command(unique_id, "DELETE", format!("/channels/{channel_id}"), "{}")
}

pub fn bridges_create(unique_id: impl Into<String>, bridge_type: &str) -> Command {
    command(
        unique_id,
        "POST",
        "/bridges".to_string(),
        format!(r#"{{"type":"{bridge_type}"}}"#),
    )
}

pub fn bridges_add_channel(unique_id: impl Into<String>, bridge_id: &str, channel_id: &str) -> Command {
    command(
        unique_id,
        "POST",
        format!("/bridges/{bridge_id}/addChannel"),
        format!(r#"{{"channel":"{channel_id}"}}"#),
    )
}

pub fn channels_play(unique_id: impl Into<String>, channel_id: &str, media: &str) -> Command {
    command(
        unique_id,
        "POST",
        format!("/channels/{channel_id}/play"),
        format!(r#"{{"media":"{media}"}}"#),
    )
}

pub fn playbacks_get(unique_id: impl Into<String>, playback_id: &str) -> Command {
    command(unique_id, "GET", format!("/playbacks/{playback_id}"), "{}")
}

pub fn recordings_get(unique_id: impl Into<String>, name: &str) -> Command {
    command(unique_id, "GET", format!("/recordings/stored/{name}"), "{}")
}
