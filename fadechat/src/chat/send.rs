//! Send pipeline for [`ChatSession`].

use tokio::time::Instant;

use fadechat_proto::codec;
use fadechat_proto::message::{ChatMessage, Envelope, MessageId};

use crate::crypto::CryptoSession;
use crate::transport::Transport;

use super::presenter::{DisplayLine, Origin, Presenter};
use super::{ChatSession, SessionError};

impl<C: CryptoSession, T: Transport, P: Presenter> ChatSession<C, T, P> {
    /// Send a text message through the full pipeline.
    ///
    /// Pipeline steps:
    /// 1. Build the MESSAGE with a fresh [`MessageId`] and validate it
    /// 2. Encode via [`codec::encode`]
    /// 3. Seal via [`CryptoSession::seal`]
    /// 4. Transmit via [`Transport::send`]
    /// 5. Display it locally as `You: ...`
    /// 6. Hand it to the delivery tracker
    ///
    /// Blank input is a no-op and returns `Ok(None)`. Nothing is displayed
    /// or tracked unless the transmit succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if validation or any pipeline step fails,
    /// or the session is closed.
    pub async fn send_text(
        &mut self,
        text: &str,
        now: Instant,
    ) -> Result<Option<MessageId>, SessionError> {
        self.begin_event()?;
        if text.trim().is_empty() {
            return Ok(None);
        }

        let message = ChatMessage {
            id: MessageId::new(),
            sender_id: self.client_id.clone(),
            text: text.to_owned(),
        };
        message.validate()?;
        let id = message.id.clone();

        self.transmit(&Envelope::Message(message)).await?;

        let handle = self.presenter.show(DisplayLine {
            message_id: id.clone(),
            origin: Origin::Local,
            text: text.to_owned(),
        });
        self.tracker.track(id.clone(), handle, now);
        self.stats.sent += 1;

        tracing::debug!(message_id = %id, handle = %handle, "message sent");
        Ok(Some(id))
    }

    /// Encode, seal and transmit one envelope.
    pub(super) async fn transmit(&self, envelope: &Envelope) -> Result<(), SessionError> {
        let plaintext = codec::encode(envelope)?;
        let packet = self.crypto.seal(&plaintext)?;
        self.transport.send(&packet).await?;
        Ok(())
    }
}
