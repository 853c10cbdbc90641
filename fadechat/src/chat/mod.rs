//! Chat application layer for `FadeChat`.
//!
//! Contains the [`ChatSession`], which owns the local identity, the crypto
//! session, the transport and the presenter, and drives:
//!
//! - the send pipeline (validate -> encode -> seal -> transmit -> display
//!   -> track), see `send.rs`
//! - the receive pipeline (size check -> open -> decode -> route), see
//!   `receive.rs`
//! - ACK emission on first visibility and ACK routing, see `ack.rs`
//! - self-destruct timers for both directions, below
//!
//! The session is a plain value mutated through `&mut self`: one task owns
//! it and processes one event to completion before the next. Timers are
//! deadlines, not tasks; the owner sleeps until
//! [`next_deadline`](ChatSession::next_deadline) and calls
//! [`fire_timers`](ChatSession::fire_timers).

mod ack;
pub mod presenter;
mod receive;
mod send;
pub mod tracker;
pub mod visibility;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use fadechat_proto::codec::CodecError;
use fadechat_proto::message::{ClientId, MessageId, ValidationError};

use crate::crypto::{CryptoError, CryptoSession};
use crate::transport::{Transport, TransportError};

pub use presenter::{DisplayHandle, DisplayLine, MemoryPresenter, Origin, Presenter};
pub use receive::{DropReason, InboundOutcome};
pub use tracker::{DeliveryState, DeliveryTracker};
pub use visibility::VisibilityGate;

use visibility::SeenIds;

/// Errors surfaced by [`ChatSession`] operations.
///
/// Bad inbound packets are not errors: they are logged and reported as
/// [`InboundOutcome::Dropped`].
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Outbound text failed validation (too large).
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Serialization failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Sealing failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// The transport refused the packet.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The session has been closed.
    #[error("session is closed")]
    Closed,
}

/// Tunables for a [`ChatSession`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a message stays on screen without an ACK, and how long an
    /// acknowledged message stays after its ACK.
    pub message_lifetime: Duration,
    /// Inbound packets longer than this are dropped before opening.
    pub max_payload_size: usize,
    /// How many inbound message ids to remember for duplicate suppression.
    pub max_duplicate_tracking: usize,
}

/// Default message lifetime (10 seconds).
pub const DEFAULT_MESSAGE_LIFETIME: Duration = Duration::from_secs(10);

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            message_lifetime: DEFAULT_MESSAGE_LIFETIME,
            max_payload_size: 64 * 1024,
            max_duplicate_tracking: 10_000,
        }
    }
}

/// Lifecycle of a [`ChatSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Created, nothing processed yet.
    Open,
    /// At least one event processed.
    Active,
    /// Closed; every operation fails with [`SessionError::Closed`].
    Closed,
}

/// Counters for the status bar and logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// MESSAGEs transmitted.
    pub sent: u64,
    /// MESSAGEs displayed from peers.
    pub received: u64,
    /// ACKs transmitted.
    pub acks_sent: u64,
    /// Outbound messages acknowledged by a peer.
    pub acknowledged: u64,
    /// Outbound messages that expired unacknowledged.
    pub expired: u64,
    /// Inbound packets dropped for any reason.
    pub dropped: u64,
}

/// One end of an encrypted, self-destructing conversation.
pub struct ChatSession<C: CryptoSession, T: Transport, P: Presenter> {
    /// Seals outbound and opens inbound packets.
    crypto: C,
    /// Shared so the owner can wait on `recv` while the session is idle.
    transport: Arc<T>,
    /// Where lines are displayed.
    presenter: P,
    /// Identity stamped on everything we send.
    client_id: ClientId,
    config: SessionConfig,
    phase: SessionPhase,
    /// Outbound messages awaiting ACK or removal.
    tracker: DeliveryTracker,
    /// Inbound messages awaiting visibility or removal.
    gate: VisibilityGate,
    seen: SeenIds,
    stats: SessionStats,
}

impl<C: CryptoSession, T: Transport, P: Presenter> ChatSession<C, T, P> {
    /// Creates a session with a fresh random [`ClientId`].
    pub fn new(crypto: C, transport: Arc<T>, presenter: P, config: SessionConfig) -> Self {
        Self::with_client_id(crypto, transport, presenter, config, ClientId::new())
    }

    /// Creates a session with an explicit [`ClientId`].
    pub fn with_client_id(
        crypto: C,
        transport: Arc<T>,
        presenter: P,
        config: SessionConfig,
        client_id: ClientId,
    ) -> Self {
        tracing::info!(
            client_id = %client_id,
            transport = %transport.transport_type(),
            lifetime_ms = u64::try_from(config.message_lifetime.as_millis()).unwrap_or(u64::MAX),
            "chat session opened"
        );
        Self {
            crypto,
            tracker: DeliveryTracker::new(config.message_lifetime),
            gate: VisibilityGate::new(config.message_lifetime),
            seen: SeenIds::new(config.max_duplicate_tracking),
            transport,
            presenter,
            client_id,
            config,
            phase: SessionPhase::Open,
            stats: SessionStats::default(),
        }
    }

    /// The local identity.
    #[must_use]
    pub const fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// A handle to the transport, for waiting on inbound packets.
    #[must_use]
    pub fn transport(&self) -> Arc<T> {
        Arc::clone(&self.transport)
    }

    /// The presenter.
    #[must_use]
    pub const fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Current lifecycle phase.
    #[must_use]
    pub const fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Running counters.
    #[must_use]
    pub const fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Delivery state of an outbound message still on screen.
    #[must_use]
    pub fn delivery_state(&self, id: &MessageId) -> Option<DeliveryState> {
        self.tracker.state(id)
    }

    /// Whether the ACK for an inbound line has been transmitted.
    #[must_use]
    pub fn ack_sent(&self, handle: DisplayHandle) -> bool {
        self.gate.ack_sent(handle)
    }

    /// Earliest moment a timer needs to fire.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.tracker.next_deadline(), self.gate.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Resolve every timer due at `now` and take the lines down.
    ///
    /// Returns how many lines were removed.
    pub fn fire_timers(&mut self, now: Instant) -> usize {
        if self.phase == SessionPhase::Closed {
            return 0;
        }
        let mut removed = 0;

        for removal in self.tracker.expire_due(now) {
            if removal.state == DeliveryState::Expired {
                self.stats.expired += 1;
            }
            tracing::debug!(
                message_id = %removal.id,
                state = ?removal.state,
                "removing outbound message"
            );
            self.presenter.remove(removal.handle);
            removed += 1;
        }

        for (id, handle) in self.gate.expire_due(now) {
            tracing::debug!(message_id = %id, "removing inbound message");
            self.presenter.remove(handle);
            removed += 1;
        }

        removed
    }

    /// Close the session and take every line down.
    pub fn close(&mut self) {
        if self.phase == SessionPhase::Closed {
            return;
        }
        for handle in self.tracker.clear().into_iter().chain(self.gate.clear()) {
            self.presenter.remove(handle);
        }
        self.phase = SessionPhase::Closed;
        tracing::info!(client_id = %self.client_id, stats = ?self.stats, "chat session closed");
    }

    /// Fail on a closed session, and move a fresh session to `Active`.
    fn begin_event(&mut self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Closed => Err(SessionError::Closed),
            SessionPhase::Open | SessionPhase::Active => {
                self.phase = SessionPhase::Active;
                Ok(())
            }
        }
    }
}

impl<C: CryptoSession, T: Transport, P: Presenter> Drop for ChatSession<C, T, P> {
    fn drop(&mut self) {
        self.close();
    }
}
