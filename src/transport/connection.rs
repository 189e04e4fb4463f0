//! WebSocket client connector and bridge loop.
//!
//! [`WsConnector`] dials the server with tokio-tungstenite and spawns a
//! bridge task that handles:
//!
//! - Incoming text frames (forwarded as [`TransportEvent::Text`])
//! - Outgoing commands from the registry
//! - Remote close and socket errors (reported once as [`TransportEvent::Closed`])
//!
//! `wss://` endpoints go through rustls with the ring provider and the
//! webpki root store.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Once;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, trace, warn};
use url::Url;

use crate::error::{Error, Result};

use super::{Connector, Link, TransportCommand, TransportEvent};

// ============================================================================
// WsConnector
// ============================================================================

/// Opens WebSocket links with tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, url: &Url) -> Result<Link> {
        if url.scheme() == "wss" {
            install_crypto_provider();
        }

        let (ws_stream, response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| Error::connect_failed(format!("WebSocket connect failed: {e}")))?;

        debug!(url = %url, status = %response.status(), "WebSocket handshake completed");

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_bridge(ws_stream, command_rx, event_tx));

        Ok(Link::new(command_tx, event_rx))
    }
}

/// Installs ring as the process-wide rustls provider unless one is already set.
fn install_crypto_provider() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        if rustls::crypto::ring::default_provider().install_default().is_err() {
            debug!("rustls crypto provider already installed");
        }
    });
}

// ============================================================================
// Bridge Loop
// ============================================================================

/// Moves frames between the socket and the link channels until either side closes.
async fn run_bridge<S>(
    ws_stream: WebSocketStream<S>,
    mut command_rx: mpsc::UnboundedReceiver<TransportCommand>,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut ws_write, mut ws_read) = ws_stream.split();

    let closed_reason = loop {
        tokio::select! {
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        trace!(len = text.len(), "Frame received");
                        if event_tx.send(TransportEvent::Text(text.to_string())).is_err() {
                            debug!("Link receiver dropped");
                            let _ = ws_write.close().await;
                            break None;
                        }
                    }

                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "WebSocket closed by remote");
                        break Some(frame.map_or_else(
                            || "closed by remote".to_string(),
                            |f| f.reason.to_string(),
                        ));
                    }

                    Some(Err(e)) => {
                        error!(error = %e, "WebSocket error");
                        break Some(e.to_string());
                    }

                    None => {
                        debug!("WebSocket stream ended");
                        break Some("stream ended".to_string());
                    }

                    // Ignore Binary, Ping, Pong, Frame
                    _ => {}
                }
            }

            command = command_rx.recv() => {
                match command {
                    Some(TransportCommand::Send(text)) => {
                        if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                            warn!(error = %e, "Failed to send frame");
                            break Some(e.to_string());
                        }
                        trace!("Frame sent");
                    }

                    Some(TransportCommand::Close) | None => {
                        debug!("Close requested");
                        let _ = ws_write.close().await;
                        break None;
                    }
                }
            }
        }
    };

    // Locally requested closes are not reported back.
    if let Some(reason) = closed_reason {
        let _ = event_tx.send(TransportEvent::Closed {
            reason: Some(reason),
        });
    }

    debug!("Bridge loop terminated");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_open_unreachable_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let url = Url::parse(&format!("ws://127.0.0.1:{port}/ws")).unwrap();
        let err = WsConnector.open(&url).await.unwrap_err();
        assert!(matches!(err, Error::ConnectFailed { .. }));
    }

    #[tokio::test]
    async fn test_open_wss_attempts_tls_handshake() {
        // Accepts TCP and hangs up without speaking TLS.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let url = Url::parse(&format!("wss://127.0.0.1:{port}/ws")).unwrap();
        let err = WsConnector.open(&url).await.unwrap_err();

        assert!(matches!(err, Error::ConnectFailed { .. }));
        assert!(!err.to_string().contains("TLS support not compiled in"), "{err}");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_bridge_exchanges_frames_with_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            while let Some(Ok(message)) = ws.next().await {
                if let Message::Text(text) = message {
                    ws.send(Message::Text(format!("echo:{text}").into()))
                        .await
                        .unwrap();
                    break;
                }
            }
            ws.close(None).await.ok();
        });

        let url = Url::parse(&format!("ws://127.0.0.1:{port}")).unwrap();
        let mut link = WsConnector.open(&url).await.unwrap();
        assert!(link.send_text("hi".into()));

        assert_eq!(link.recv().await, Some(TransportEvent::Text("echo:hi".into())));
        assert!(matches!(link.recv().await, Some(TransportEvent::Closed { .. })));

        server.await.unwrap();
    }
}
