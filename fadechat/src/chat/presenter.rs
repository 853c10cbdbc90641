//! Presentation boundary for the chat session.
//!
//! The session never touches a UI directly. It asks a [`Presenter`] to show
//! a line and gets back an opaque [`DisplayHandle`], which it later uses to
//! mark the line delivered or take it down. Visibility flows the other way:
//! the UI tells the session which handles are on screen.
//!
//! [`MemoryPresenter`] keeps lines in a `Vec` for tests and headless use.

use fadechat_proto::message::MessageId;

/// Opaque reference to one displayed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DisplayHandle(pub u64);

impl std::fmt::Display for DisplayHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Who wrote a displayed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Sent from this client.
    Local,
    /// Received from another party.
    Remote,
}

impl Origin {
    /// Prefix shown before the message text.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Local => "You",
            Self::Remote => "Other user",
        }
    }
}

/// A message line handed to the presenter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayLine {
    /// Message the line belongs to.
    pub message_id: MessageId,
    /// Who wrote it.
    pub origin: Origin,
    /// Plaintext body.
    pub text: String,
}

impl std::fmt::Display for DisplayLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.origin.label(), self.text)
    }
}

/// Surface that displays chat lines.
pub trait Presenter: Send {
    /// Display a line and return its handle. Handles are never reused.
    fn show(&mut self, line: DisplayLine) -> DisplayHandle;

    /// Mark an outbound line as acknowledged by a peer.
    fn mark_delivered(&mut self, handle: DisplayHandle);

    /// Mark an inbound line whose ACK has been transmitted. Until this is
    /// called the UI keeps reporting the line while it is on screen.
    fn mark_read(&mut self, handle: DisplayHandle);

    /// Take a line down. Removing an unknown handle is a no-op.
    fn remove(&mut self, handle: DisplayHandle);
}

/// A line held by [`MemoryPresenter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShownLine {
    /// Handle returned by `show`.
    pub handle: DisplayHandle,
    /// The line itself.
    pub line: DisplayLine,
    /// Whether `mark_delivered` was called.
    pub delivered: bool,
    /// Whether `mark_read` was called.
    pub read: bool,
}

/// In-memory [`Presenter`] that records what is on screen.
#[derive(Debug, Default)]
pub struct MemoryPresenter {
    next: u64,
    lines: Vec<ShownLine>,
    removed: usize,
}

impl MemoryPresenter {
    /// Create an empty presenter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines currently shown, oldest first.
    #[must_use]
    pub fn lines(&self) -> &[ShownLine] {
        &self.lines
    }

    /// Rendered text of every shown line, oldest first.
    #[must_use]
    pub fn rendered(&self) -> Vec<String> {
        self.lines.iter().map(|l| l.line.to_string()).collect()
    }

    /// The shown line for `id`, if any.
    #[must_use]
    pub fn find(&self, id: &MessageId) -> Option<&ShownLine> {
        self.lines.iter().find(|l| &l.line.message_id == id)
    }

    /// How many lines have been taken down.
    #[must_use]
    pub const fn removed_count(&self) -> usize {
        self.removed
    }
}

impl Presenter for MemoryPresenter {
    fn show(&mut self, line: DisplayLine) -> DisplayHandle {
        self.next += 1;
        let handle = DisplayHandle(self.next);
        self.lines.push(ShownLine {
            handle,
            line,
            delivered: false,
            read: false,
        });
        handle
    }

    fn mark_delivered(&mut self, handle: DisplayHandle) {
        if let Some(shown) = self.lines.iter_mut().find(|l| l.handle == handle) {
            shown.delivered = true;
        }
    }

    fn mark_read(&mut self, handle: DisplayHandle) {
        if let Some(shown) = self.lines.iter_mut().find(|l| l.handle == handle) {
            shown.read = true;
        }
    }

    fn remove(&mut self, handle: DisplayHandle) {
        let before = self.lines.len();
        self.lines.retain(|l| l.handle != handle);
        self.removed += before - self.lines.len();
    }
}
