//! Read receipts: turn the first visibility report for an inbound line
//! into exactly one ACK on the wire.

use fadechat_proto::message::{Envelope, MessageId};

use crate::crypto::CryptoSession;
use crate::transport::Transport;

use super::presenter::{DisplayHandle, Presenter};
use super::{ChatSession, SessionError};

impl<C: CryptoSession, T: Transport, P: Presenter> ChatSession<C, T, P> {
    /// Report that an inbound line is on screen.
    ///
    /// The first report for a handle transmits an ACK carrying the message
    /// id and our client id, and returns that id. Later reports, and reports
    /// for handles that are not inbound messages on display, return
    /// `Ok(None)` and send nothing.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the session is closed or the ACK could not
    /// be transmitted. A failed ACK stays owed and goes out on the next
    /// report for the same handle; the presenter only hears `mark_read`
    /// once it has actually gone out.
    pub async fn mark_visible(
        &mut self,
        handle: DisplayHandle,
    ) -> Result<Option<MessageId>, SessionError> {
        self.begin_event()?;
        let Some(id) = self.gate.became_visible(handle) else {
            return Ok(None);
        };

        self.transmit(&Envelope::ack(id.clone(), self.client_id.clone()))
            .await?;
        self.gate.record_ack_sent(handle);
        self.presenter.mark_read(handle);
        self.stats.acks_sent += 1;

        tracing::debug!(message_id = %id, handle = %handle, "ACK sent");
        Ok(Some(id))
    }

    /// Report a batch of visible handles; returns how many ACKs went out.
    ///
    /// # Errors
    ///
    /// Stops at the first failed transmit. ACKs sent before it stay sent.
    pub async fn mark_all_visible(
        &mut self,
        handles: &[DisplayHandle],
    ) -> Result<usize, SessionError> {
        let mut sent = 0;
        for &handle in handles {
            if self.mark_visible(handle).await?.is_some() {
                sent += 1;
            }
        }
        Ok(sent)
    }
}
