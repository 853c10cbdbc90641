//! Relay server core: shared state, join authorization, WebSocket handler,
//! and per-room fan-out.
//!
//! A client joins a room by upgrading `GET /ws?chatId=..&password=..`.
//! Missing parameters are answered with `400 Bad Request`, an unknown room
//! or wrong password with `401 Unauthorized`. Once joined, every text frame
//! a member sends is forwarded to the other members of the same room. The
//! relay never inspects frames and keeps nothing once a member leaves.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fadechat_proto::room::JoinParams;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{RwLock, mpsc};

use crate::config::{RelayConfig, default_rooms};

/// Default maximum allowed frame size in bytes (64 KB).
const DEFAULT_MAX_PAYLOAD_SIZE: usize = 64 * 1024;

/// Identifies one connection inside a room.
pub type MemberId = u64;

type MemberSender = mpsc::UnboundedSender<Message>;

/// Shared relay server state: room passwords and live room membership.
pub struct RelayState {
    /// Room id to the writer channels of its current members.
    rooms: RwLock<HashMap<String, HashMap<MemberId, MemberSender>>>,
    /// Room id to password.
    passwords: BTreeMap<String, String>,
    /// Maximum allowed frame size in bytes.
    max_payload_size: usize,
    /// Deliver frames back to their sender too.
    echo_to_sender: bool,
    next_member_id: AtomicU64,
}

impl Default for RelayState {
    fn default() -> Self {
        Self::new(default_rooms())
    }
}

impl RelayState {
    /// Creates relay state serving the given rooms with default limits.
    #[must_use]
    pub fn new(passwords: BTreeMap<String, String>) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            passwords,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            echo_to_sender: false,
            next_member_id: AtomicU64::new(0),
        }
    }

    /// Creates relay state from a resolved [`RelayConfig`].
    #[must_use]
    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(config.rooms.clone())
            .with_max_payload_size(config.max_payload_size)
            .with_echo_to_sender(config.echo_to_sender)
    }

    /// Sets the maximum frame size.
    #[must_use]
    pub fn with_max_payload_size(mut self, max_payload_size: usize) -> Self {
        self.max_payload_size = max_payload_size;
        self
    }

    /// Sets whether frames are delivered back to their sender.
    #[must_use]
    pub fn with_echo_to_sender(mut self, echo: bool) -> Self {
        self.echo_to_sender = echo;
        self
    }

    /// Whether `password` opens `chat_id`.
    #[must_use]
    pub fn authorize(&self, chat_id: &str, password: &str) -> bool {
        self.passwords
            .get(chat_id)
            .is_some_and(|expected| expected == password)
    }

    /// Adds a member to a room, returning its id.
    pub async fn join(&self, chat_id: &str, sender: MemberSender) -> MemberId {
        let id = self.next_member_id.fetch_add(1, Ordering::Relaxed);
        let mut rooms = self.rooms.write().await;
        rooms.entry(chat_id.to_owned()).or_default().insert(id, sender);
        id
    }

    /// Removes a member from a room. Empty rooms are dropped.
    pub async fn leave(&self, chat_id: &str, member: MemberId) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(members) = rooms.get_mut(chat_id) else {
            return false;
        };
        let removed = members.remove(&member).is_some();
        if members.is_empty() {
            rooms.remove(chat_id);
        }
        removed
    }

    /// Number of members currently in a room.
    pub async fn member_count(&self, chat_id: &str) -> usize {
        self.rooms
            .read()
            .await
            .get(chat_id)
            .map_or(0, HashMap::len)
    }

    /// Forward `frame` from `from` to the room. Returns how many members it
    /// was handed to.
    ///
    /// Members whose writer channel has closed are removed.
    pub async fn broadcast(&self, chat_id: &str, from: MemberId, frame: &Message) -> usize {
        let mut dead = Vec::new();
        let mut delivered = 0;
        {
            let rooms = self.rooms.read().await;
            let Some(members) = rooms.get(chat_id) else {
                return 0;
            };
            for (&id, sender) in members {
                if id == from && !self.echo_to_sender {
                    continue;
                }
                if sender.send(frame.clone()).is_ok() {
                    delivered += 1;
                } else {
                    dead.push(id);
                }
            }
        }
        for id in dead {
            tracing::warn!(chat_id, member = id, "forward failed, removing member");
            self.leave(chat_id, id).await;
        }
        delivered
    }

    /// Send a WebSocket Close frame to every connected member.
    pub async fn close_all_connections(&self) {
        let rooms = self.rooms.read().await;
        for (chat_id, members) in rooms.iter() {
            for (id, sender) in members {
                tracing::info!(chat_id = %chat_id, member = id, "sending close frame");
                let _ = sender.send(Message::Close(None));
            }
        }
    }
}

/// Handles an upgraded WebSocket connection for one room member.
///
/// The connection lifecycle:
/// 1. Join the room's member set.
/// 2. Forward frames from the member's channel to its socket (writer task).
/// 3. Broadcast frames read from the socket to the room (reader task).
/// 4. On disconnect or failed write, leave the room.
pub async fn handle_socket(socket: WebSocket, chat_id: String, state: Arc<RelayState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let member = state.join(&chat_id, tx).await;
    tracing::info!(chat_id = %chat_id, member, "member joined");

    let writer_chat_id = chat_id.clone();
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                tracing::warn!(chat_id = %writer_chat_id, member, "WebSocket write failed");
                break;
            }
        }
    });

    let reader_chat_id = chat_id.clone();
    let reader_state = Arc::clone(&state);
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Text(_) | Message::Binary(_) => {
                    handle_frame(&reader_chat_id, member, msg, &reader_state).await;
                }
                Message::Close(_) => {
                    tracing::info!(chat_id = %reader_chat_id, member, "received close frame");
                    break;
                }
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }
    });

    // Wait for either task to finish, then abort the other.
    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    state.leave(&chat_id, member).await;
    tracing::info!(chat_id = %chat_id, member, "member left");
}

/// Enforces the frame size limit, then fans the frame out.
async fn handle_frame(chat_id: &str, member: MemberId, frame: Message, state: &Arc<RelayState>) {
    let size = match &frame {
        Message::Text(text) => text.len(),
        Message::Binary(data) => data.len(),
        _ => return,
    };
    if size > state.max_payload_size {
        tracing::warn!(
            chat_id,
            member,
            size,
            max = state.max_payload_size,
            "frame exceeds size limit, dropping"
        );
        return;
    }

    let delivered = state.broadcast(chat_id, member, &frame).await;
    tracing::debug!(chat_id, member, size, delivered, "frame forwarded");
}

/// axum handler that authorizes the join and upgrades to a WebSocket.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<JoinParams>,
    State(state): State<Arc<RelayState>>,
) -> Response {
    let Some((chat_id, password)) = params.complete() else {
        tracing::warn!("join without chatId or password");
        return (StatusCode::BAD_REQUEST, "chatId and password are required").into_response();
    };
    if !state.authorize(chat_id, password) {
        tracing::warn!(chat_id, "join refused: unknown room or wrong password");
        return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
    }

    let chat_id = chat_id.to_owned();
    ws.on_upgrade(move |socket| handle_socket(socket, chat_id, state))
}

/// Starts the relay server with the stock rooms on the given address and
/// returns the bound address and a join handle.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(RelayState::default())).await
}

/// Starts the relay server with a pre-configured [`RelayState`].
///
/// This is the primary entry point used by both `main.rs` and test code.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<RelayState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "relay server error");
        }
    });

    Ok((bound_addr, handle))
}
