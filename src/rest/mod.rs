//! REST client — executes a [`Command`] read off the bus against the
//! upstream ARI control plane.
//!
//! Grounded in `go-ari-library.go`'s `processCommand`, which builds the
//! request URL as `restURL + url + "?api_key=" + apiKey`, issues it with
//! the method string carried on the wire, and returns the raw status code
//! and body — the proxy never interprets the response beyond that (spec.md
//! §4.E).

pub mod catalogue;

use tracing::warn;

use crate::model::Command;

/// Thin wrapper over the upstream Asterisk REST Interface. Stateless beyond
/// the connection pool `reqwest::Client` keeps internally, so one instance
/// is shared across every dialog's Command Bridge.
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self { http: reqwest::Client::new(), base_url, api_key }
    }

    /// Issues `command` and returns `(status_code, response_body)`. A
    /// transport failure (connection refused, TLS error, timeout) yields
    /// `(0, "")` rather than propagating an error — the Command Bridge
    /// always has a `CommandResponse` to publish (spec.md §7, error kind 5).
    pub async fn execute(&self, command: &Command) -> (u16, String) {
        let url = format!("{}{}?api_key={}", self.base_url, command.url, self.api_key);

        let method = match reqwest::Method::from_bytes(command.method.as_bytes()) {
            Ok(method) => method,
            Err(_) => {
                warn!(method = %command.method, "command carried an unrecognized HTTP method");
                return (0, String::new());
            }
        };

        let request = self
            .http
            .request(method, &url)
            .header("Content-Type", "application/json")
            .body(command.body.clone());

        match request.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                (status, body)
            }
            Err(e) => {
                warn!(url = %url, error = %e, "REST transport failure");
                (0, String::new())
            }
        }
    }
}
