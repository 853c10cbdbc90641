//! Networking coordinator for wiring the TUI to the chat session.
//!
//! This module bridges the synchronous TUI event loop (crossterm poll-based)
//! with the async [`ChatSession`] / [`RelayTransport`] stack. One background
//! tokio task owns the session and communicates with the main thread via
//! [`NetCommand`] / [`NetEvent`] channels.
//!
//! # Architecture
//!
//! ```text
//! TUI (main thread)  ←── NetEvent ───  session task
//!                     ─── NetCommand →
//! ```
//!
//! The session task waits on three sources at once: the next self-destruct
//! deadline, the transport, and UI commands. Due timers always win the race,
//! so a message whose lifetime has run out expires before a late ACK for it
//! is looked at.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::chat::{
    ChatSession, DisplayHandle, DisplayLine, Presenter, SessionConfig, SessionStats,
};
use crate::crypto::CryptoSession;
use crate::crypto::aead::AesGcmSession;
use crate::crypto::keys::SessionKey;
use crate::transport::relay::{ConnectOptions, RelayTransport};
use crate::transport::{Transport, TransportError};

/// Commands sent from the TUI main loop to the session task.
#[derive(Debug)]
pub enum NetCommand {
    /// Send a text message to the room.
    SendMessage {
        /// The message text to send.
        text: String,
    },
    /// These display handles are currently on screen.
    Visible(Vec<DisplayHandle>),
    /// Close the session and stop the task.
    Shutdown,
}

/// Events sent from the session task to the TUI main loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetEvent {
    /// Display a new line.
    Show {
        /// Handle to report back in [`NetCommand::Visible`].
        handle: DisplayHandle,
        /// The line.
        line: DisplayLine,
    },
    /// An outbound line was acknowledged by a peer.
    Delivered(DisplayHandle),
    /// The ACK for an inbound line went out; stop reporting it.
    Read(DisplayHandle),
    /// Take a line down.
    Remove(DisplayHandle),
    /// Connection status update.
    ConnectionStatus {
        /// Whether currently connected to the relay.
        connected: bool,
        /// Human-readable transport description.
        transport_type: String,
    },
    /// Session counters changed.
    Stats(SessionStats),
    /// A send or ACK failed.
    Error(String),
}

/// [`Presenter`] that forwards every display change to the TUI as a
/// [`NetEvent`].
#[derive(Debug)]
pub struct ChannelPresenter {
    next: u64,
    events: mpsc::UnboundedSender<NetEvent>,
}

impl ChannelPresenter {
    /// Forward display changes into `events`.
    #[must_use]
    pub const fn new(events: mpsc::UnboundedSender<NetEvent>) -> Self {
        Self { next: 0, events }
    }

    fn emit(&self, event: NetEvent) {
        // The UI may already be gone during shutdown.
        let _ = self.events.send(event);
    }
}

impl Presenter for ChannelPresenter {
    fn show(&mut self, line: DisplayLine) -> DisplayHandle {
        self.next += 1;
        let handle = DisplayHandle(self.next);
        self.emit(NetEvent::Show { handle, line });
        handle
    }

    fn mark_delivered(&mut self, handle: DisplayHandle) {
        self.emit(NetEvent::Delivered(handle));
    }

    fn mark_read(&mut self, handle: DisplayHandle) {
        self.emit(NetEvent::Read(handle));
    }

    fn remove(&mut self, handle: DisplayHandle) {
        self.emit(NetEvent::Remove(handle));
    }
}

/// Configuration for the networking layer.
#[derive(Debug, Clone)]
pub struct NetConfig {
    /// WebSocket URL of the relay server (e.g., `ws://127.0.0.1:8080/ws`).
    pub relay_url: String,
    /// Room to join.
    pub chat_id: String,
    /// Channel password presented to the relay.
    pub password: String,
    /// Session key for sealing and opening packets.
    pub key: SessionKey,
    /// Relay handshake options.
    pub connect: ConnectOptions,
    /// Session tunables.
    pub session: SessionConfig,
    /// Capacity of the command channel.
    pub channel_capacity: usize,
}

/// Channel handles for a running session task.
#[derive(Debug)]
pub struct NetHandle {
    /// Commands into the session.
    pub commands: mpsc::Sender<NetCommand>,
    /// Display and status events out of the session.
    pub events: mpsc::UnboundedReceiver<NetEvent>,
    /// Resolves to the final counters once the session has closed.
    pub task: JoinHandle<SessionStats>,
}

/// Connect to the relay and spawn the session task.
///
/// # Errors
///
/// Returns [`TransportError`] if the relay connection fails. Nothing is
/// spawned in that case.
pub async fn spawn_net(config: NetConfig) -> Result<NetHandle, TransportError> {
    let transport = RelayTransport::connect(
        &config.relay_url,
        &config.chat_id,
        &config.password,
        config.connect,
    )
    .await?;

    Ok(spawn_session(
        transport,
        AesGcmSession::new(&config.key),
        config.session,
        config.channel_capacity,
    ))
}

/// Spawn the session task over an already connected transport.
pub fn spawn_session<C, T>(
    transport: T,
    crypto: C,
    session_config: SessionConfig,
    channel_capacity: usize,
) -> NetHandle
where
    C: CryptoSession + 'static,
    T: Transport + 'static,
{
    let (cmd_tx, cmd_rx) = mpsc::channel(channel_capacity.max(1));
    let (evt_tx, evt_rx) = mpsc::unbounded_channel();

    let _ = evt_tx.send(NetEvent::ConnectionStatus {
        connected: transport.is_connected(),
        transport_type: transport.transport_type().to_string(),
    });

    let session = ChatSession::new(
        crypto,
        Arc::new(transport),
        ChannelPresenter::new(evt_tx.clone()),
        session_config,
    );
    let task = tokio::spawn(run_session(session, cmd_rx, evt_tx));

    NetHandle {
        commands: cmd_tx,
        events: evt_rx,
        task,
    }
}

/// Drive `session` until shutdown or disconnect, then close it.
async fn run_session<C, T>(
    mut session: ChatSession<C, T, ChannelPresenter>,
    mut commands: mpsc::Receiver<NetCommand>,
    events: mpsc::UnboundedSender<NetEvent>,
) -> SessionStats
where
    C: CryptoSession,
    T: Transport,
{
    let transport = session.transport();
    let mut last_stats = session.stats();

    loop {
        let deadline = session.next_deadline();

        tokio::select! {
            biased;

            () = sleep_until(deadline) => {
                session.fire_timers(Instant::now());
            }

            packet = transport.recv() => match packet {
                Ok(packet) => {
                    if let Err(e) = session.handle_inbound(&packet, Instant::now()) {
                        tracing::warn!(error = %e, "session stopped accepting packets");
                        break;
                    }
                }
                Err(e) => {
                    tracing::info!(error = %e, "transport closed");
                    let _ = events.send(NetEvent::ConnectionStatus {
                        connected: false,
                        transport_type: transport.transport_type().to_string(),
                    });
                    break;
                }
            },

            command = commands.recv() => match command {
                Some(NetCommand::SendMessage { text }) => {
                    if let Err(e) = session.send_text(&text, Instant::now()).await {
                        tracing::warn!(error = %e, "send failed");
                        let _ = events.send(NetEvent::Error(format!("Send failed: {e}")));
                    }
                }
                Some(NetCommand::Visible(handles)) => {
                    if let Err(e) = session.mark_all_visible(&handles).await {
                        tracing::warn!(error = %e, "ACK failed");
                        let _ = events.send(NetEvent::Error(format!("Read receipt failed: {e}")));
                    }
                }
                Some(NetCommand::Shutdown) | None => {
                    tracing::info!("net session shutting down");
                    break;
                }
            },
        }

        let stats = session.stats();
        if stats != last_stats {
            last_stats = stats;
            let _ = events.send(NetEvent::Stats(stats));
        }
    }

    session.close();
    session.stats()
}

/// Sleep until `deadline`, or forever when there is none.
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
