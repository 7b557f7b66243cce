use futures_util::{SinkExt, StreamExt};
use plaza_protocol::{Envelope, ServerMessage};
use serde_json::{Value, json};
use std::time::Duration;
use tokio_tungstenite::MaybeTlsStream;
use tokio_tungstenite::tungstenite::http::Request;
use tokio_tungstenite::tungstenite::protocol::Message;

type WsStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// A hub client for scenario tests: sends envelope frames, receives typed
/// server messages, skips transport keepalives.
pub struct MockWsClient {
    write: futures_util::stream::SplitSink<WsStream, Message>,
    read: futures_util::stream::SplitStream<WsStream>,
}

impl MockWsClient {
    /// Connect with the session id in the query string (the primary carrier).
    pub async fn connect(
        base_url: &str,
        session_id: &str,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let url = format!("{base_url}?sessionId={session_id}");
        let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;
        let (write, read) = ws_stream.split();
        Ok(Self { write, read })
    }

    /// Connect with the session id in an `Authorization: Bearer` header (the
    /// fallback carrier).
    pub async fn connect_with_bearer(
        url: &str,
        session_id: &str,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        use tokio_tungstenite::tungstenite::handshake::client::generate_key;
        let uri: tokio_tungstenite::tungstenite::http::Uri = url.parse()?;
        let host = uri.host().unwrap_or("localhost").to_owned();
        let host_header = match uri.port_u16() {
            Some(p) => format!("{host}:{p}"),
            None => host,
        };
        let request = Request::builder()
            .uri(url)
            .header("Host", host_header)
            .header("Authorization", format!("Bearer {session_id}"))
            .header("Upgrade", "websocket")
            .header("Connection", "Upgrade")
            .header("Sec-WebSocket-Version", "13")
            .header("Sec-WebSocket-Key", generate_key())
            .body(())?;
        let (ws_stream, _response) = tokio_tungstenite::connect_async(request).await?;
        let (write, read) = ws_stream.split();
        Ok(Self { write, read })
    }

    /// Send a raw JSON value as a text frame.
    pub async fn send_json(&mut self, value: &Value) -> Result<(), Box<dyn std::error::Error>> {
        self.write.send(Message::Text(value.to_string().into())).await?;
        Ok(())
    }

    /// Send an envelope frame for `kind` with the given payload.
    pub async fn send_frame(
        &mut self,
        kind: &str,
        data: Value,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.send_json(&json!({"type": kind, "data": data})).await
    }

    /// Receive the next server envelope, skipping transport keepalives.
    pub async fn recv_envelope(
        &mut self,
    ) -> Result<Envelope<ServerMessage>, Box<dyn std::error::Error>> {
        loop {
            match self.read.next().await {
                Some(Ok(Message::Text(text))) => {
                    let envelope: Envelope<ServerMessage> = serde_json::from_str(&text)?;
                    return Ok(envelope);
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) => return Err("connection closed by server".into()),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => return Err("connection stream ended".into()),
            }
        }
    }

    /// Receive the next server message, failing after `RECV_DEADLINE`.
    pub async fn recv_message(&mut self) -> Result<ServerMessage, Box<dyn std::error::Error>> {
        let envelope = tokio::time::timeout(RECV_DEADLINE, self.recv_envelope())
            .await
            .map_err(|_| "timed out waiting for a server message")??;
        Ok(envelope.message)
    }

    /// Receive messages until one with the given wire tag arrives.  Frames of
    /// other kinds are discarded, which keeps scenario tests independent of
    /// incidental broadcast interleavings.
    pub async fn recv_kind(
        &mut self,
        kind: &str,
    ) -> Result<ServerMessage, Box<dyn std::error::Error>> {
        let deadline = tokio::time::Instant::now() + RECV_DEADLINE;
        loop {
            let remaining = deadline
                .checked_duration_since(tokio::time::Instant::now())
                .ok_or_else(|| format!("timed out waiting for `{kind}`"))?;
            let envelope = tokio::time::timeout(remaining, self.recv_envelope())
                .await
                .map_err(|_| format!("timed out waiting for `{kind}`"))??;
            if envelope.message.kind() == kind {
                return Ok(envelope.message);
            }
        }
    }

    /// Assert that no text frame arrives within `window`.
    pub async fn expect_silence(
        &mut self,
        window: Duration,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match tokio::time::timeout(window, self.recv_envelope()).await {
            Err(_) => Ok(()),
            Ok(Ok(envelope)) => {
                Err(format!("expected silence, got `{}`", envelope.message.kind()).into())
            }
            // Closure during the window also counts as silence.
            Ok(Err(_)) => Ok(()),
        }
    }

    pub async fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.write.send(Message::Close(None)).await?;
        Ok(())
    }
}

const RECV_DEADLINE: Duration = Duration::from_secs(5);

/// Attempt an upgrade and return the HTTP status the server refused it with.
///
/// Panics in the caller's face (via `Err`) if the upgrade unexpectedly
/// succeeds.
pub async fn connect_rejection_status(url: &str) -> Result<u16, Box<dyn std::error::Error>> {
    match tokio_tungstenite::connect_async(url).await {
        Ok(_) => Err("upgrade unexpectedly succeeded".into()),
        Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
            Ok(response.status().as_u16())
        }
        Err(other) => Err(other.into()),
    }
}
