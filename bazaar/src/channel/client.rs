use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, Mutex as TokioMutex};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{header, HeaderValue};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use super::events::{ClientEvent, ServerEvent};
use super::ChannelError;
use crate::config::Config;

/// Delay between reconnection attempts
const RECONNECT_DELAY_SECS: u64 = 3;

/// What the channel reports to its owner. `Up` is delivered after every
/// successful handshake, including reconnects, so the session can re-sync.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    Up,
    Down,
    Event(ServerEvent),
}

/// Internal message type for the write channel
enum WriteMessage {
    Data(String),
    Close,
}

/// WebSocket client for the storefront messaging channel. Authenticates by
/// presenting the ambient session cookie on the upgrade request.
pub struct ChannelClient {
    server_url: String,
    session_cookie: String,
    /// Use std::sync::Mutex for write_tx so emits work from sync callers
    write_tx: Arc<StdMutex<Option<mpsc::UnboundedSender<WriteMessage>>>>,
    connected: Arc<TokioMutex<bool>>,
    /// Shutdown signal broadcaster
    shutdown_tx: broadcast::Sender<()>,
}

impl ChannelClient {
    pub fn new(config: &Config) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            server_url: config.server_url.to_string(),
            session_cookie: config.session_cookie.clone(),
            write_tx: Arc::new(StdMutex::new(None)),
            connected: Arc::new(TokioMutex::new(false)),
            shutdown_tx,
        }
    }

    /// Check if connected to the channel
    pub async fn is_connected(&self) -> bool {
        *self.connected.lock().await
    }

    /// Open the connection. Spawns the connect/read loop and returns the
    /// receiver the owning session drains. The loop reconnects with a fixed
    /// delay until `close` is called or the receiver is dropped.
    pub fn open(&self) -> mpsc::UnboundedReceiver<ChannelEvent> {
        let server_url = self.server_url.clone();
        let session_cookie = self.session_cookie.clone();
        let write_tx = self.write_tx.clone();
        let connected = self.connected.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<ChannelEvent>();

        tokio::spawn(async move {
            loop {
                // Check for shutdown before attempting connection
                if shutdown_rx.try_recv().is_ok() {
                    info!("Shutdown signal received, stopping reconnection");
                    break;
                }

                let request = match build_request(&server_url, &session_cookie) {
                    Ok(request) => request,
                    Err(e) => {
                        error!(error = %e, url = %server_url, "Cannot build channel request");
                        break;
                    }
                };

                info!(url = %server_url, "Connecting to messaging channel");

                match connect_async(request).await {
                    Ok((ws_stream, _)) => {
                        info!("Connected to messaging channel");
                        *connected.lock().await = true;

                        let (mut ws_write, mut ws_read) = ws_stream.split();

                        // Create channel for outgoing events
                        let (tx, mut rx) = mpsc::unbounded_channel::<WriteMessage>();
                        {
                            let mut guard = write_tx.lock().unwrap();
                            *guard = Some(tx);
                        }

                        if event_tx.send(ChannelEvent::Up).is_err() {
                            // Session dropped the receiver; nothing left to do
                            break;
                        }

                        // Message loop
                        let mut should_reconnect = true;
                        loop {
                            tokio::select! {
                                // Check for shutdown signal
                                _ = shutdown_rx.recv() => {
                                    info!("Shutdown signal received, closing connection gracefully");
                                    if let Err(e) = ws_write.send(Message::Close(None)).await {
                                        warn!(error = %e, "Failed to send close frame");
                                    }
                                    should_reconnect = false;
                                    break;
                                }
                                // Send outgoing events
                                Some(msg) = rx.recv() => {
                                    match msg {
                                        WriteMessage::Data(data) => {
                                            if ws_write.send(Message::Text(data.into())).await.is_err() {
                                                error!("Failed to send event to server");
                                                break;
                                            }
                                        }
                                        WriteMessage::Close => {
                                            info!("Close requested, sending close frame");
                                            if let Err(e) = ws_write.send(Message::Close(None)).await {
                                                warn!(error = %e, "Failed to send close frame");
                                            }
                                            should_reconnect = false;
                                            break;
                                        }
                                    }
                                }
                                // Receive incoming events
                                msg = ws_read.next() => {
                                    match msg {
                                        Some(Ok(Message::Text(text))) => {
                                            match serde_json::from_str::<ServerEvent>(&text) {
                                                Ok(event) => {
                                                    if event_tx.send(ChannelEvent::Event(event)).is_err() {
                                                        should_reconnect = false;
                                                        break;
                                                    }
                                                }
                                                Err(e) => {
                                                    warn!(error = %e, preview = %preview(&text), "Unrecognized event from server");
                                                }
                                            }
                                        }
                                        Some(Ok(Message::Close(_))) | None => {
                                            info!("Server closed connection");
                                            break;
                                        }
                                        Some(Err(e)) => {
                                            error!(error = %e, "WebSocket error");
                                            break;
                                        }
                                        _ => {}
                                    }
                                }
                            }
                        }

                        // Cleanup
                        {
                            let mut guard = write_tx.lock().unwrap();
                            *guard = None;
                        }
                        *connected.lock().await = false;
                        info!("Disconnected from messaging channel");

                        if event_tx.send(ChannelEvent::Down).is_err() || !should_reconnect {
                            break;
                        }
                    }
                    Err(e) => {
                        error!(error = %e, url = %server_url, "Failed to connect to messaging channel");
                    }
                }

                // Reconnect after delay
                debug!("Reconnecting in {} seconds", RECONNECT_DELAY_SECS);
                tokio::time::sleep(tokio::time::Duration::from_secs(RECONNECT_DELAY_SECS)).await;
            }
        });

        event_rx
    }

    /// Gracefully close the connection and stop reconnecting
    pub fn close(&self) {
        info!("Initiating graceful disconnect");
        // Signal shutdown to stop the reconnection loop
        let _ = self.shutdown_tx.send(());
        // Also send close through the write channel if connected
        if let Ok(guard) = self.write_tx.lock() {
            if let Some(tx) = guard.as_ref() {
                let _ = tx.send(WriteMessage::Close);
            }
        }
    }

    /// Emit an event to the server. Non-blocking; the event is queued on the
    /// write channel and sent by the connection task.
    pub fn emit(&self, event: &ClientEvent) -> Result<(), ChannelError> {
        let json = serde_json::to_string(event)?;
        debug!(preview = %preview(&json), "Emitting event");

        let guard = self
            .write_tx
            .lock()
            .map_err(|_| ChannelError::NotConnected)?;

        if let Some(tx) = guard.as_ref() {
            tx.send(WriteMessage::Data(json))
                .map_err(|_| ChannelError::NotConnected)?;
            Ok(())
        } else {
            warn!("Cannot emit event: not connected to channel");
            Err(ChannelError::NotConnected)
        }
    }
}

/// The first 100 bytes of a frame for debug logs. Message content is
/// arbitrary user text, so the cut must land on a char boundary.
fn preview(text: &str) -> &str {
    let mut end = 100.min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Build the upgrade request, attaching the session cookie when present.
fn build_request(url: &str, cookie: &str) -> Result<Request, ChannelError> {
    let mut request = url
        .into_client_request()
        .map_err(|e| ChannelError::Handshake(e.to_string()))?;

    if !cookie.is_empty() {
        let value = HeaderValue::from_str(cookie).map_err(|_| ChannelError::InvalidCookie)?;
        request.headers_mut().insert(header::COOKIE, value);
    }

    Ok(request)
}
