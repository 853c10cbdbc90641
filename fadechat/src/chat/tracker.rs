//! Delivery tracking for outbound messages.
//!
//! Every MESSAGE we transmit gets an entry in the [`DeliveryTracker`]:
//!
//! ```text
//!          ACK from a peer            removal deadline
//!   Sent ───────────────────▶ Acknowledged ──────────▶ (removed)
//!     │
//!     │ lifetime elapses
//!     ▼
//!   Expired ──▶ (removed)
//! ```
//!
//! Both `Acknowledged` and `Expired` are terminal and exactly one of them is
//! reached per message: whichever event the session processes first wins
//! and the other becomes a no-op. An acknowledged message stays on screen
//! for one more lifetime (so the sender sees the confirmation) before its
//! display handle is removed.
//!
//! The tracker owns no timers. It records deadlines, and the session loop
//! asks for [`next_deadline`](DeliveryTracker::next_deadline) and calls
//! [`expire_due`](DeliveryTracker::expire_due) when it passes.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use fadechat_proto::message::MessageId;

use super::DisplayHandle;

/// Lifecycle state of an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    /// Transmitted, waiting for an ACK.
    Sent,
    /// A peer acknowledged it.
    Acknowledged,
    /// The lifetime elapsed before any ACK.
    Expired,
}

impl DeliveryState {
    /// Whether no further transition can happen.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Acknowledged | Self::Expired)
    }
}

/// One-shot interest in the ACK for a single message.
///
/// Detaching is idempotent: only the first call reports that it did
/// anything.
#[derive(Debug, Default)]
pub struct AckListener {
    detached: bool,
}

impl AckListener {
    /// Whether the listener still accepts an ACK.
    #[must_use]
    pub const fn is_attached(&self) -> bool {
        !self.detached
    }

    /// Detach the listener. Returns `true` only on the first call.
    pub const fn detach(&mut self) -> bool {
        let was_attached = !self.detached;
        self.detached = true;
        was_attached
    }
}

#[derive(Debug)]
struct Outbound {
    handle: DisplayHandle,
    state: DeliveryState,
    listener: AckListener,
    deadline: Instant,
}

/// Result of routing an ACK to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// The message moved from `Sent` to `Acknowledged`.
    Acknowledged(DisplayHandle),
    /// The message already reached a terminal state.
    AlreadyResolved,
    /// No message with this id is tracked.
    Unmatched,
}

/// A display handle whose message left the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    /// The message that was removed.
    pub id: MessageId,
    /// Its display handle.
    pub handle: DisplayHandle,
    /// Terminal state it was removed in.
    pub state: DeliveryState,
}

/// Per-session table of outbound messages keyed by [`MessageId`].
#[derive(Debug)]
pub struct DeliveryTracker {
    lifetime: Duration,
    entries: HashMap<MessageId, Outbound>,
}

impl DeliveryTracker {
    /// Create a tracker whose messages live for `lifetime`.
    #[must_use]
    pub fn new(lifetime: Duration) -> Self {
        Self {
            lifetime,
            entries: HashMap::new(),
        }
    }

    /// Start tracking a message that was just transmitted.
    ///
    /// Attaches its ACK listener and sets its expiry to `now + lifetime`.
    /// Re-tracking an id replaces the previous entry.
    pub fn track(&mut self, id: MessageId, handle: DisplayHandle, now: Instant) {
        let entry = Outbound {
            handle,
            state: DeliveryState::Sent,
            listener: AckListener::default(),
            deadline: now + self.lifetime,
        };
        if self.entries.insert(id.clone(), entry).is_some() {
            tracing::warn!(message_id = %id, "message id tracked twice, replacing");
        }
    }

    /// Route an ACK for `id` from a peer.
    ///
    /// The caller is responsible for dropping ACKs that carry our own
    /// client id before they get here. An ACK processed at or after the
    /// expiry deadline loses to the expiry even if `expire_due` has not run
    /// yet: the message becomes `Expired` and keeps its removal deadline.
    pub fn acknowledge(&mut self, id: &MessageId, now: Instant) -> AckOutcome {
        let Some(entry) = self.entries.get_mut(id) else {
            return AckOutcome::Unmatched;
        };
        if !entry.listener.detach() {
            return AckOutcome::AlreadyResolved;
        }
        if entry.deadline <= now {
            entry.state = DeliveryState::Expired;
            tracing::debug!(message_id = %id, "ACK arrived after expiry");
            return AckOutcome::AlreadyResolved;
        }
        entry.state = DeliveryState::Acknowledged;
        entry.deadline = now + self.lifetime;
        AckOutcome::Acknowledged(entry.handle)
    }

    /// Resolve every entry whose deadline is at or before `now`.
    ///
    /// `Sent` entries become `Expired`. Every due entry is removed and
    /// returned so its display handle can be taken down.
    pub fn expire_due(&mut self, now: Instant) -> Vec<Removal> {
        let due: Vec<MessageId> = self
            .entries
            .iter()
            .filter(|(_, e)| e.deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();

        let mut removals = Vec::with_capacity(due.len());
        for id in due {
            let Some(mut entry) = self.entries.remove(&id) else {
                continue;
            };
            if entry.listener.detach() {
                entry.state = DeliveryState::Expired;
                tracing::debug!(message_id = %id, "message expired without ACK");
            }
            removals.push(Removal {
                id,
                handle: entry.handle,
                state: entry.state,
            });
        }
        removals
    }

    /// Current state of a tracked message.
    #[must_use]
    pub fn state(&self, id: &MessageId) -> Option<DeliveryState> {
        self.entries.get(id).map(|e| e.state)
    }

    /// Whether the message's ACK listener is still attached.
    #[must_use]
    pub fn is_listening(&self, id: &MessageId) -> bool {
        self.entries
            .get(id)
            .is_some_and(|e| e.listener.is_attached())
    }

    /// Earliest pending deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.values().map(|e| e.deadline).min()
    }

    /// Drop every entry, returning the display handles that were live.
    pub fn clear(&mut self) -> Vec<DisplayHandle> {
        self.entries.drain().map(|(_, e)| e.handle).collect()
    }

    /// Number of tracked messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
