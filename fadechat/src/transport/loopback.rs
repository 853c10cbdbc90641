//! Loopback transport for testing.
//!
//! A [`LoopbackHub`] stands in for a room relay: every frame sent by one
//! member is delivered to every other member through in-process
//! [`tokio::sync::mpsc`] channels. The hub can be told to misbehave the way
//! real relays do, echoing frames back to their sender or delivering them
//! twice.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{Mutex, mpsc};

use super::{Transport, TransportError, TransportType};

/// How the hub delivers frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct HubOptions {
    /// Also deliver each frame back to its sender.
    pub echo_to_sender: bool,
    /// Deliver each frame twice.
    pub duplicate: bool,
}

struct Member {
    id: u64,
    tx: mpsc::UnboundedSender<String>,
}

struct HubInner {
    members: Mutex<Vec<Member>>,
    next_id: AtomicU64,
    open: AtomicBool,
    options: HubOptions,
}

impl HubInner {
    /// Deliver `packet` to every member except `from` (unless echoing).
    async fn broadcast(&self, from: Option<u64>, packet: &str) -> Result<(), TransportError> {
        if !self.open.load(Ordering::Relaxed) {
            return Err(TransportError::ConnectionClosed);
        }

        let copies = if self.options.duplicate { 2 } else { 1 };
        let mut members = self.members.lock().await;
        members.retain(|m| !m.tx.is_closed());
        for member in members.iter() {
            if Some(member.id) == from && !self.options.echo_to_sender {
                continue;
            }
            for _ in 0..copies {
                // A member that went away between retain and here is harmless.
                let _ = member.tx.send(packet.to_owned());
            }
        }
        Ok(())
    }
}

/// In-process room that fans frames out to its members.
///
/// Cloning the hub gives another handle to the same room.
#[derive(Clone)]
pub struct LoopbackHub {
    inner: Arc<HubInner>,
}

impl Default for LoopbackHub {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackHub {
    /// A hub that delivers each frame once to every other member.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(HubOptions::default())
    }

    /// A hub with explicit delivery options.
    #[must_use]
    pub fn with_options(options: HubOptions) -> Self {
        Self {
            inner: Arc::new(HubInner {
                members: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
                open: AtomicBool::new(true),
                options,
            }),
        }
    }

    /// Add a member to the room and return its transport.
    pub async fn join(&self) -> LoopbackTransport {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.members.lock().await.push(Member { id, tx });
        LoopbackTransport {
            id,
            hub: Arc::clone(&self.inner),
            rx: Mutex::new(rx),
        }
    }

    /// Deliver a raw frame to every member, as if from an outside party.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionClosed`] after [`shutdown`](Self::shutdown).
    pub async fn inject(&self, packet: &str) -> Result<(), TransportError> {
        self.inner.broadcast(None, packet).await
    }

    /// Close the room. Pending frames are dropped and every member's
    /// `recv` returns [`TransportError::ConnectionClosed`].
    pub async fn shutdown(&self) {
        self.inner.open.store(false, Ordering::Relaxed);
        self.inner.members.lock().await.clear();
    }

    /// Number of members currently joined.
    pub async fn member_count(&self) -> usize {
        let mut members = self.inner.members.lock().await;
        members.retain(|m| !m.tx.is_closed());
        members.len()
    }
}

/// One member's endpoint on a [`LoopbackHub`].
pub struct LoopbackTransport {
    id: u64,
    hub: Arc<HubInner>,
    rx: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl Transport for LoopbackTransport {
    async fn send(&self, packet: &str) -> Result<(), TransportError> {
        self.hub.broadcast(Some(self.id), packet).await
    }

    async fn recv(&self) -> Result<String, TransportError> {
        let mut rx = self.rx.lock().await;
        rx.recv().await.ok_or(TransportError::ConnectionClosed)
    }

    fn is_connected(&self) -> bool {
        self.hub.open.load(Ordering::Relaxed)
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Loopback
    }
}
