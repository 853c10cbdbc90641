//! WebSocket relay transport for `FadeChat`.
//!
//! Implements the [`Transport`] trait over a WebSocket connection to a room
//! relay. The relay authenticates the join with the `chatId` and `password`
//! query parameters, then fans every text frame out to the other members
//! of the room. The relay never sees plaintext, only sealed packets.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use fadechat_proto::room::{CHAT_ID_PARAM, PASSWORD_PARAM};

use super::{Transport, TransportError, TransportType};

/// Type alias for the write half of a WebSocket connection.
type WsSender = futures_util::stream::SplitSink<
    WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;

/// Type alias for the read half of a WebSocket connection.
type WsReader =
    futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>>;

/// Default timeout for connecting to the relay server.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Capacity of the inbound frame queue between the reader task and `recv`.
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Build the join URL for a room from the relay base URL.
///
/// Existing query parameters on `base` are kept; `chatId` and `password`
/// are appended and percent-encoded.
///
/// # Errors
///
/// Returns [`TransportError::Rejected`] if `base` is not a valid `ws://` or
/// `wss://` URL.
pub fn join_url(base: &str, chat_id: &str, password: &str) -> Result<Url, TransportError> {
    let mut url =
        Url::parse(base).map_err(|e| TransportError::Rejected(format!("invalid relay URL: {e}")))?;
    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(TransportError::Rejected(format!(
            "relay URL must use ws:// or wss://, got {}://",
            url.scheme()
        )));
    }
    url.query_pairs_mut()
        .append_pair(CHAT_ID_PARAM, chat_id)
        .append_pair(PASSWORD_PARAM, password);
    Ok(url)
}

/// Options for [`RelayTransport::connect`].
#[derive(Debug, Clone, Copy)]
pub struct ConnectOptions {
    /// How long to wait for the WebSocket handshake.
    pub timeout: Duration,
    /// Inbound frame queue capacity.
    pub channel_capacity: usize,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_CONNECT_TIMEOUT,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// WebSocket relay transport implementing the [`Transport`] trait.
///
/// Created via [`RelayTransport::connect`], which performs the WebSocket
/// handshake against the room's join URL and spawns a background reader task.
pub struct RelayTransport {
    /// Room this transport joined.
    chat_id: String,
    /// Relay endpoint without credentials, for logs and the status bar.
    endpoint: String,
    /// Write half of the WebSocket connection.
    ws_sender: Mutex<WsSender>,
    /// Frames received by the background reader task.
    incoming: Mutex<mpsc::Receiver<String>>,
    /// Whether the WebSocket connection to the relay is active.
    connected: Arc<AtomicBool>,
    /// Handle to the background reader task (kept alive for the transport's lifetime).
    _reader_handle: tokio::task::JoinHandle<()>,
}

impl RelayTransport {
    /// Join `chat_id` on the relay at `base_url`.
    ///
    /// # Errors
    ///
    /// - [`TransportError::Rejected`] for a bad URL or when the relay
    ///   answers the handshake with an HTTP error (missing or wrong
    ///   credentials).
    /// - [`TransportError::Timeout`] if the handshake does not finish in time.
    /// - [`TransportError::Io`] for network failures.
    pub async fn connect(
        base_url: &str,
        chat_id: &str,
        password: &str,
        options: ConnectOptions,
    ) -> Result<Self, TransportError> {
        let url = join_url(base_url, chat_id, password)?;
        let endpoint = redacted(&url);

        let (ws_stream, _response) =
            tokio::time::timeout(options.timeout, connect_async(url.as_str()))
                .await
                .map_err(|_| {
                    tracing::warn!(url = %endpoint, "relay WebSocket connect timed out");
                    TransportError::Timeout
                })?
                .map_err(|e| {
                    tracing::warn!(url = %endpoint, err = %e, "relay WebSocket connect failed");
                    map_ws_connect_error(e)
                })?;

        let (ws_sender, ws_reader) = ws_stream.split();

        let (tx, rx) = mpsc::channel(options.channel_capacity.max(1));
        let connected = Arc::new(AtomicBool::new(true));
        let reader_handle = tokio::spawn(reader_loop(ws_reader, tx, Arc::clone(&connected)));

        tracing::info!(url = %endpoint, chat_id, "joined relay room");

        Ok(Self {
            chat_id: chat_id.to_owned(),
            endpoint,
            ws_sender: Mutex::new(ws_sender),
            incoming: Mutex::new(rx),
            connected,
            _reader_handle: reader_handle,
        })
    }

    /// Room this transport joined.
    #[must_use]
    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    /// Relay endpoint with the password removed.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send a close frame and mark the transport disconnected.
    pub async fn close(&self) {
        self.connected.store(false, Ordering::Relaxed);
        let mut sender = self.ws_sender.lock().await;
        if let Err(e) = sender.close().await {
            tracing::debug!(err = %e, "relay close frame failed");
        }
    }
}

impl Transport for RelayTransport {
    /// Send a sealed packet as one WebSocket text frame.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionClosed`] if the relay connection is down.
    async fn send(&self, packet: &str) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::Relaxed) {
            return Err(TransportError::ConnectionClosed);
        }

        let mut sender = self.ws_sender.lock().await;
        sender
            .send(Message::text(packet.to_owned()))
            .await
            .map_err(|e| {
                tracing::warn!(err = %e, "relay send failed");
                self.connected.store(false, Ordering::Relaxed);
                TransportError::ConnectionClosed
            })
    }

    /// Receive the next frame forwarded by the relay.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionClosed`] once the background
    /// reader task has exited.
    async fn recv(&self) -> Result<String, TransportError> {
        let mut rx = self.incoming.lock().await;
        rx.recv().await.ok_or(TransportError::ConnectionClosed)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Relay
    }
}

/// Background task that forwards WebSocket frames into `tx`.
///
/// Text frames are forwarded as-is. Binary frames are forwarded when they
/// are valid UTF-8 and skipped otherwise. The task does not disconnect on
/// bad data. Sets `connected` to `false` when the WebSocket closes or
/// errors out.
async fn reader_loop(mut ws_reader: WsReader, tx: mpsc::Sender<String>, connected: Arc<AtomicBool>) {
    while let Some(msg_result) = ws_reader.next().await {
        let frame = match msg_result {
            Ok(Message::Text(text)) => text.as_str().to_owned(),
            Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                Ok(text) => text,
                Err(_) => {
                    tracing::debug!(len = data.len(), "non-UTF-8 binary frame, skipping");
                    continue;
                }
            },
            Ok(Message::Close(_)) => {
                tracing::info!("relay WebSocket closed by server");
                break;
            }
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => continue,
            Err(e) => {
                tracing::warn!(err = %e, "relay WebSocket read error");
                break;
            }
        };
        if tx.send(frame).await.is_err() {
            // Receiver dropped, the transport is gone.
            break;
        }
    }
    connected.store(false, Ordering::Relaxed);
    tracing::info!("relay reader task exiting");
}

/// `url` with its `password` parameter replaced by `***`.
fn redacted(url: &Url) -> String {
    let mut clean = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == PASSWORD_PARAM { "***".into() } else { v };
            (k.into_owned(), v.into_owned())
        })
        .collect();
    clean.query_pairs_mut().clear().extend_pairs(pairs);
    clean.to_string()
}

/// Map a `tokio_tungstenite` connection error to a [`TransportError`].
fn map_ws_connect_error(err: tokio_tungstenite::tungstenite::Error) -> TransportError {
    use tokio_tungstenite::tungstenite::Error as WsError;
    match err {
        WsError::Io(io_err) => TransportError::Io(io_err),
        WsError::Http(response) => TransportError::Rejected(format!(
            "relay answered with HTTP status {}",
            response.status()
        )),
        WsError::Url(e) => TransportError::Rejected(format!("invalid relay URL: {e}")),
        other => TransportError::Io(std::io::Error::other(format!(
            "relay connection error: {other}"
        ))),
    }
}
