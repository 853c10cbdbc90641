//! Application state and event handling.

use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::chat::{DisplayHandle, Origin, SessionStats};
use crate::net::{NetCommand, NetEvent};

/// How long an unchanged set of unread lines waits before it is reported
/// again.
pub const REPORT_RETRY: Duration = Duration::from_secs(1);

/// Delivery indicator for a displayed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    /// Our message, not yet acknowledged.
    Sent,
    /// Our message, acknowledged by a peer.
    Delivered,
    /// A peer's message, read receipt not yet sent.
    Received,
    /// A peer's message whose read receipt went out.
    Read,
}

impl MessageStatus {
    /// Get the display symbol for this status.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::Sent => "\u{2713}",
            Self::Delivered => "\u{2713}\u{2713}",
            Self::Received | Self::Read => "",
        }
    }
}

/// A chat line on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayMessage {
    /// Session handle for this line.
    pub handle: DisplayHandle,
    /// Who wrote it.
    pub origin: Origin,
    /// Message text.
    pub content: String,
    /// Formatted arrival time (e.g., "14:23").
    pub timestamp: String,
    /// Delivery indicator.
    pub status: MessageStatus,
}

/// Main application state.
pub struct App {
    /// Current text input.
    pub input: String,
    /// Cursor position in input (character index).
    pub cursor_position: usize,
    /// Lines currently on screen, oldest first.
    pub messages: Vec<DisplayMessage>,
    /// How many lines the view is scrolled up from the newest.
    pub scroll_from_bottom: usize,
    /// Latest notice (errors, connection changes).
    pub notice: Option<String>,
    /// Room name for the status bar.
    pub chat_id: String,
    /// Whether the transport is connected.
    pub is_connected: bool,
    /// Transport description.
    pub connection_info: String,
    /// Session counters.
    pub stats: SessionStats,
    /// chrono format for line timestamps.
    pub timestamp_format: String,
    /// Whether the app should quit.
    pub should_quit: bool,
    /// Handles in the last visibility report and when it was built.
    last_report: Option<(Vec<DisplayHandle>, Instant)>,
}

impl App {
    /// Create an empty application for `chat_id`.
    #[must_use]
    pub fn new(chat_id: &str) -> Self {
        Self {
            input: String::new(),
            cursor_position: 0,
            messages: Vec::new(),
            scroll_from_bottom: 0,
            notice: None,
            chat_id: chat_id.to_string(),
            is_connected: false,
            connection_info: String::new(),
            stats: SessionStats::default(),
            timestamp_format: "%H:%M".to_string(),
            should_quit: false,
            last_report: None,
        }
    }

    /// Set the timestamp format.
    #[must_use]
    pub fn with_timestamp_format(mut self, format: &str) -> Self {
        self.timestamp_format = format.to_string();
        self
    }

    /// Handle a key event.
    ///
    /// Returns a [`NetCommand`] when the key requires network dispatch.
    pub fn handle_key_event(&mut self, key: KeyEvent) -> Option<NetCommand> {
        match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) | (KeyCode::Esc, _) => {
                self.should_quit = true;
                None
            }
            (KeyCode::Enter, _) => self.submit_message(),
            (KeyCode::Char(c), _) => {
                self.enter_char(c);
                None
            }
            (KeyCode::Backspace, _) => {
                self.delete_char();
                None
            }
            (KeyCode::Left, _) => {
                self.move_cursor_left();
                None
            }
            (KeyCode::Right, _) => {
                self.move_cursor_right();
                None
            }
            (KeyCode::Home, _) => {
                self.cursor_position = 0;
                None
            }
            (KeyCode::End, _) => {
                self.cursor_position = self.input.chars().count();
                None
            }
            (KeyCode::Up, _) => {
                self.scroll_up();
                None
            }
            (KeyCode::Down, _) => {
                self.scroll_down();
                None
            }
            _ => None,
        }
    }

    /// Apply one event from the session task.
    pub fn apply_event(&mut self, event: NetEvent) {
        match event {
            NetEvent::Show { handle, line } => {
                let status = match line.origin {
                    Origin::Local => MessageStatus::Sent,
                    Origin::Remote => MessageStatus::Received,
                };
                self.messages.push(DisplayMessage {
                    handle,
                    origin: line.origin,
                    content: line.text,
                    timestamp: chrono::Local::now()
                        .format(&self.timestamp_format)
                        .to_string(),
                    status,
                });
            }
            NetEvent::Delivered(handle) => {
                if let Some(msg) = self.messages.iter_mut().find(|m| m.handle == handle) {
                    msg.status = MessageStatus::Delivered;
                }
            }
            NetEvent::Read(handle) => {
                if let Some(msg) = self.messages.iter_mut().find(|m| m.handle == handle) {
                    msg.status = MessageStatus::Read;
                }
            }
            NetEvent::Remove(handle) => {
                self.messages.retain(|m| m.handle != handle);
                self.scroll_from_bottom = self
                    .scroll_from_bottom
                    .min(self.messages.len().saturating_sub(1));
            }
            NetEvent::ConnectionStatus {
                connected,
                transport_type,
            } => {
                self.is_connected = connected;
                self.notice = Some(if connected {
                    format!("Connected via {transport_type}")
                } else {
                    format!("Disconnected from {transport_type}")
                });
                self.connection_info = transport_type;
            }
            NetEvent::Stats(stats) => self.stats = stats,
            NetEvent::Error(msg) => self.notice = Some(msg),
        }
    }

    /// Index range of `messages` that fits in a viewport of `rows` lines.
    #[must_use]
    pub fn visible_range(&self, rows: usize) -> std::ops::Range<usize> {
        let end = self.messages.len().saturating_sub(self.scroll_from_bottom);
        end.saturating_sub(rows)..end
    }

    /// Turn the handles drawn in the last frame into a visibility report.
    ///
    /// Only peers' lines still waiting for their read receipt are reported.
    /// A line drops out once [`NetEvent::Read`] arrives for it. An unchanged
    /// set is reported again after [`REPORT_RETRY`], so a report that was
    /// lost or whose ACK failed to transmit is eventually retried.
    pub fn visibility_report(
        &mut self,
        drawn: &[DisplayHandle],
        now: Instant,
    ) -> Option<NetCommand> {
        let unread: Vec<DisplayHandle> = drawn
            .iter()
            .copied()
            .filter(|h| {
                self.messages
                    .iter()
                    .any(|m| m.handle == *h && m.status == MessageStatus::Received)
            })
            .collect();
        if unread.is_empty() {
            self.last_report = None;
            return None;
        }
        if let Some((prev, at)) = &self.last_report
            && *prev == unread
            && now.duration_since(*at) < REPORT_RETRY
        {
            return None;
        }
        self.last_report = Some((unread.clone(), now));
        Some(NetCommand::Visible(unread))
    }

    /// Submit the current input as a message.
    fn submit_message(&mut self) -> Option<NetCommand> {
        if self.input.trim().is_empty() {
            return None;
        }
        let text = std::mem::take(&mut self.input);
        self.cursor_position = 0;
        self.scroll_from_bottom = 0;
        Some(NetCommand::SendMessage { text })
    }

    /// Byte offset of the cursor in `input`.
    fn cursor_byte_index(&self) -> usize {
        self.input
            .char_indices()
            .nth(self.cursor_position)
            .map_or(self.input.len(), |(i, _)| i)
    }

    /// Insert a character at the cursor position.
    fn enter_char(&mut self, c: char) {
        let index = self.cursor_byte_index();
        self.input.insert(index, c);
        self.cursor_position += 1;
    }

    /// Delete the character before the cursor.
    fn delete_char(&mut self) {
        if self.cursor_position > 0 {
            self.cursor_position -= 1;
            let index = self.cursor_byte_index();
            self.input.remove(index);
        }
    }

    /// Move cursor left.
    const fn move_cursor_left(&mut self) {
        if self.cursor_position > 0 {
            self.cursor_position -= 1;
        }
    }

    /// Move cursor right.
    fn move_cursor_right(&mut self) {
        if self.cursor_position < self.input.chars().count() {
            self.cursor_position += 1;
        }
    }

    /// Scroll message list up (towards older lines).
    const fn scroll_up(&mut self) {
        if self.scroll_from_bottom < self.messages.len().saturating_sub(1) {
            self.scroll_from_bottom += 1;
        }
    }

    /// Scroll message list down (towards newer lines).
    const fn scroll_down(&mut self) {
        if self.scroll_from_bottom > 0 {
            self.scroll_from_bottom -= 1;
        }
    }
}
