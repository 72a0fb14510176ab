//! Upstream ARI event stream — one websocket connection per configured
//! application.
//!
//! Grounded in `go-ari-library.go`'s `ConnectEvents`, which dials
//! `ws(s)://host/ari/events?app=<name>&api_key=<user>:<pass>` with an
//! `Origin` header and the `ari` subprotocol
//! (`websocket.Dial(url, "ari", config.Origin)`), then reads text frames
//! off it in a loop. `tokio-tungstenite` plays the same role here that
//! `gorilla/websocket` plays there; since the handshake needs headers
//! beyond the URL, the connection is built from a `Request` rather than
//! from the plain string form of `connect_async`.

use futures_util::StreamExt;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;

use crate::error::AppError;

/// Opens the event-stream websocket for `application` and returns a stream
/// of raw text frames (each one a JSON-encoded ARI event). Binary frames
/// and pings are silently absorbed by `tokio-tungstenite`'s stream
/// implementation; close frames end the stream.
pub async fn connect_events(
    websocket_url: &str,
    application: &str,
    origin: &str,
    api_key: &str,
) -> Result<impl futures_util::Stream<Item = Result<String, AppError>>, AppError> {
    let url = format!("{websocket_url}?app={application}&api_key={api_key}");

    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|e| AppError::Websocket(format!("invalid websocket url {websocket_url}: {e}")))?;
    let headers = request.headers_mut();
    headers.insert(
        "Origin",
        origin
            .parse()
            .map_err(|e| AppError::Websocket(format!("invalid origin header {origin}: {e}")))?,
    );
    headers.insert("Sec-WebSocket-Protocol", "ari".parse().expect("static header value"));

    let (stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| AppError::Websocket(format!("connect to {websocket_url} failed: {e}")))?;

    Ok(stream.filter_map(|item| async move {
        match item {
            Ok(Message::Text(text)) => Some(Ok(text.to_string())),
            Ok(Message::Close(_)) => None,
            Ok(_) => None,
            Err(e) => Some(Err(AppError::Websocket(format!("event stream error: {e}")))),
        }
    }))
}
