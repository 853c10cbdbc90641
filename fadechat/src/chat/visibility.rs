//! Read-receipt gating for inbound messages.
//!
//! An inbound MESSAGE is acknowledged only once the local user has actually
//! had it on screen. The UI reports which display handles are visible; the
//! [`VisibilityGate`] turns the first report for each handle into one ACK
//! and ignores the rest.
//!
//! Independently, every inbound message self-destructs after the message
//! lifetime whether or not it was ever seen.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use tokio::time::Instant;

use fadechat_proto::message::MessageId;

use super::DisplayHandle;

#[derive(Debug)]
struct Inbound {
    id: MessageId,
    observed: bool,
    ack_sent: bool,
    deadline: Instant,
}

/// Tracks displayed inbound messages until they are seen and until they expire.
#[derive(Debug)]
pub struct VisibilityGate {
    lifetime: Duration,
    entries: HashMap<DisplayHandle, Inbound>,
}

impl VisibilityGate {
    /// Create a gate whose messages live for `lifetime`.
    #[must_use]
    pub fn new(lifetime: Duration) -> Self {
        Self {
            lifetime,
            entries: HashMap::new(),
        }
    }

    /// Start watching a freshly displayed inbound message.
    ///
    /// Its self-destruct deadline is `now + lifetime`.
    pub fn watch(&mut self, id: MessageId, handle: DisplayHandle, now: Instant) {
        self.entries.insert(
            handle,
            Inbound {
                id,
                observed: false,
                ack_sent: false,
                deadline: now + self.lifetime,
            },
        );
    }

    /// Record that `handle` is on screen.
    ///
    /// Returns the message id to acknowledge when an ACK is still owed, and
    /// `None` for unknown handles or messages already acknowledged. The
    /// caller transmits the ACK and then calls
    /// [`record_ack_sent`](Self::record_ack_sent); until it does, later
    /// reports keep returning the id so a failed transmit can be retried.
    pub fn became_visible(&mut self, handle: DisplayHandle) -> Option<MessageId> {
        let entry = self.entries.get_mut(&handle)?;
        entry.observed = true;
        if entry.ack_sent {
            None
        } else {
            Some(entry.id.clone())
        }
    }

    /// Mark the ACK for `handle` as transmitted; no further ACK is owed.
    pub fn record_ack_sent(&mut self, handle: DisplayHandle) {
        if let Some(entry) = self.entries.get_mut(&handle) {
            entry.ack_sent = true;
        }
    }

    /// Whether the ACK for `handle` has gone out.
    #[must_use]
    pub fn ack_sent(&self, handle: DisplayHandle) -> bool {
        self.entries.get(&handle).is_some_and(|e| e.ack_sent)
    }

    /// Whether `handle` has been reported visible at least once.
    #[must_use]
    pub fn observed(&self, handle: DisplayHandle) -> bool {
        self.entries.get(&handle).is_some_and(|e| e.observed)
    }

    /// Remove every message whose deadline is at or before `now`.
    pub fn expire_due(&mut self, now: Instant) -> Vec<(MessageId, DisplayHandle)> {
        let due: Vec<DisplayHandle> = self
            .entries
            .iter()
            .filter(|(_, e)| e.deadline <= now)
            .map(|(h, _)| *h)
            .collect();

        due.into_iter()
            .filter_map(|handle| {
                let entry = self.entries.remove(&handle)?;
                if !entry.ack_sent {
                    tracing::debug!(message_id = %entry.id, "inbound message expired unseen");
                }
                Some((entry.id, handle))
            })
            .collect()
    }

    /// Earliest pending deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.values().map(|e| e.deadline).min()
    }

    /// Drop every entry, returning the display handles that were live.
    pub fn clear(&mut self) -> Vec<DisplayHandle> {
        self.entries.drain().map(|(h, _)| h).collect()
    }

    /// Number of inbound messages on display.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is on display.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Bounded memory of inbound message ids, oldest forgotten first.
///
/// Relays may deliver a frame more than once; a repeated id must not be
/// displayed or acknowledged again.
#[derive(Debug)]
pub struct SeenIds {
    capacity: usize,
    ids: HashSet<MessageId>,
    order: VecDeque<MessageId>,
}

impl SeenIds {
    /// Remember at most `capacity` ids.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            ids: HashSet::new(),
            order: VecDeque::new(),
        }
    }

    /// Record `id`. Returns `false` if it was already remembered.
    pub fn insert(&mut self, id: &MessageId) -> bool {
        if self.ids.contains(id) {
            return false;
        }
        if self.order.len() >= self.capacity
            && let Some(oldest) = self.order.pop_front()
        {
            self.ids.remove(&oldest);
        }
        self.ids.insert(id.clone());
        self.order.push_back(id.clone());
        true
    }

    /// Number of remembered ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether nothing is remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
