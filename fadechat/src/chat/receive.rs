//! Receive pipeline for [`ChatSession`].
//!
//! Every inbound frame is untrusted. Anything that fails a step is logged
//! and dropped; nothing here can break the session or the transport.

use tokio::time::Instant;

use fadechat_proto::codec;
use fadechat_proto::message::{Ack, ChatMessage, Envelope, MessageId};

use crate::crypto::{CryptoError, CryptoSession};
use crate::transport::Transport;

use super::presenter::{DisplayHandle, DisplayLine, Origin, Presenter};
use super::tracker::AckOutcome;
use super::{ChatSession, SessionError};

/// Why an inbound packet was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Longer than the configured maximum, not opened.
    Oversized,
    /// Not base64, or too short to hold a nonce.
    MalformedPacket,
    /// Tampered with or sealed under another key.
    AuthenticationFailure,
    /// Opened, but not a valid envelope.
    MalformedEnvelope,
    /// Our own MESSAGE or ACK echoed back by the relay.
    SelfEcho,
    /// A MESSAGE id we have already displayed.
    Duplicate,
    /// An ACK for a message we are not waiting on.
    UnmatchedAck,
}

/// What the session did with an inbound packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    /// A peer's MESSAGE is now on screen.
    Displayed {
        /// The message.
        id: MessageId,
        /// Its display handle, for visibility reports.
        handle: DisplayHandle,
    },
    /// An ACK moved one of our messages to `Acknowledged`.
    Acknowledged(MessageId),
    /// The packet was discarded.
    Dropped(DropReason),
}

impl<C: CryptoSession, T: Transport, P: Presenter> ChatSession<C, T, P> {
    /// Process one raw packet received from the transport.
    ///
    /// Steps:
    /// 1. Drop oversized packets before any crypto work
    /// 2. Open via [`CryptoSession::open`]
    /// 3. Decode via [`codec::decode`]
    /// 4. Drop anything carrying our own client id
    /// 5. MESSAGE: display, watch for visibility, start its self-destruct timer
    /// 6. ACK: route to the delivery tracker
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] on a closed session. Bad packets are
    /// never errors; they come back as [`InboundOutcome::Dropped`].
    pub fn handle_inbound(
        &mut self,
        packet: &str,
        now: Instant,
    ) -> Result<InboundOutcome, SessionError> {
        self.begin_event()?;
        let outcome = self.route_packet(packet, now);
        if matches!(outcome, InboundOutcome::Dropped(_)) {
            self.stats.dropped += 1;
        }
        Ok(outcome)
    }

    fn route_packet(&mut self, packet: &str, now: Instant) -> InboundOutcome {
        if packet.len() > self.config.max_payload_size {
            tracing::warn!(
                size = packet.len(),
                max = self.config.max_payload_size,
                "dropping oversized packet"
            );
            return InboundOutcome::Dropped(DropReason::Oversized);
        }

        let plaintext = match self.crypto.open(packet) {
            Ok(p) => p,
            Err(CryptoError::AuthenticationFailure) => {
                tracing::warn!("dropping packet that failed authentication");
                return InboundOutcome::Dropped(DropReason::AuthenticationFailure);
            }
            Err(e) => {
                tracing::debug!(error = %e, "dropping malformed packet");
                return InboundOutcome::Dropped(DropReason::MalformedPacket);
            }
        };

        let envelope = match codec::decode(&plaintext) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(error = %e, "dropping undecodable envelope");
                return InboundOutcome::Dropped(DropReason::MalformedEnvelope);
            }
        };

        if envelope.sender_id() == &self.client_id {
            tracing::trace!(
                message_id = %envelope.id(),
                kind = envelope.kind(),
                "dropping own echo"
            );
            return InboundOutcome::Dropped(DropReason::SelfEcho);
        }

        match envelope {
            Envelope::Message(message) => self.display_inbound(message, now),
            Envelope::Ack(ack) => self.route_ack(&ack, now),
        }
    }

    fn display_inbound(&mut self, message: ChatMessage, now: Instant) -> InboundOutcome {
        if !self.seen.insert(&message.id) {
            tracing::debug!(message_id = %message.id, "duplicate message dropped");
            return InboundOutcome::Dropped(DropReason::Duplicate);
        }

        let handle = self.presenter.show(DisplayLine {
            message_id: message.id.clone(),
            origin: Origin::Remote,
            text: message.text,
        });
        self.gate.watch(message.id.clone(), handle, now);
        self.stats.received += 1;

        tracing::debug!(
            message_id = %message.id,
            sender = %message.sender_id,
            handle = %handle,
            "message displayed"
        );
        InboundOutcome::Displayed {
            id: message.id,
            handle,
        }
    }

    fn route_ack(&mut self, ack: &Ack, now: Instant) -> InboundOutcome {
        match self.tracker.acknowledge(&ack.id, now) {
            AckOutcome::Acknowledged(handle) => {
                self.presenter.mark_delivered(handle);
                self.stats.acknowledged += 1;
                tracing::debug!(message_id = %ack.id, sender = %ack.sender_id, "message acknowledged");
                InboundOutcome::Acknowledged(ack.id.clone())
            }
            AckOutcome::AlreadyResolved | AckOutcome::Unmatched => {
                tracing::trace!(message_id = %ack.id, "ignoring unmatched ACK");
                InboundOutcome::Dropped(DropReason::UnmatchedAck)
            }
        }
    }
}
