//! The WebSocket half of the BiDi client, split from [`connection`] so the
//! demux loop can be tested against an in-memory duplex instead of a real
//! socket.

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::error::{Error, Result};

/// Sends outgoing frames. Exclusively owned by the connection's writer
/// task; callers reach it only through [`crate::connection::Connection`].
pub struct TransportSender {
    inner: futures_util::stream::SplitSink<
        tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
        WsMessage,
    >,
}

impl TransportSender {
    pub async fn send_text(&mut self, text: String) -> Result<()> {
        self.inner.send(WsMessage::Text(text.into())).await?;
        Ok(())
    }

    pub async fn close(&mut self) -> Result<()> {
        self.inner.close().await?;
        Ok(())
    }
}

/// Receives incoming frames, one at a time, text frames only (BiDi never
/// sends binary).
pub struct TransportReceiver {
    inner: futures_util::stream::SplitStream<
        tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    >,
}

impl TransportReceiver {
    /// Returns `None` on a clean close; `Some(Err(_))` on a transport
    /// failure, which is always fatal to the connection.
    pub async fn recv_text(&mut self) -> Option<Result<String>> {
        loop {
            match self.inner.next().await? {
                Ok(WsMessage::Text(text)) => return Some(Ok(text.to_string())),
                Ok(WsMessage::Close(_)) => return None,
                Ok(_) => continue, // ping/pong/binary: not part of the BiDi envelope
                Err(err) => return Some(Err(err.into())),
            }
        }
    }
}

/// Connects to `url` (a `ws://`/`wss://` endpoint) with optional extra
/// headers (used for `VIBIUM_CONNECT_API_KEY` bearer auth against remote
/// endpoints) and splits the stream into its send/receive halves.
pub async fn connect(
    url: &str,
    headers: &[(String, String)],
) -> Result<(TransportSender, TransportReceiver)> {
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;

    let mut request = url.into_client_request()?;
    for (name, value) in headers {
        request.headers_mut().insert(
            http_name(name)?,
            value
                .parse()
                .map_err(|_| Error::Protocol(format!("invalid header value for {name}")))?,
        );
    }

    let (stream, _response) = tokio_tungstenite::connect_async(request).await?;
    let (sink, source) = stream.split();
    Ok((TransportSender { inner: sink }, TransportReceiver { inner: source }))
}

fn http_name(name: &str) -> Result<tokio_tungstenite::tungstenite::http::HeaderName> {
    name.parse()
        .map_err(|_| Error::Protocol(format!("invalid header name: {name}")))
}

#[cfg(test)]
mod tests {
    // The live-socket path is exercised by vibium-bidi's connection tests
    // against an in-process duplex; `connect()` itself requires a real
    // listener and is covered by vibium-cli's end-to-end daemon tests.
}
