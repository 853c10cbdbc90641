//! Terminal UI rendering.

pub mod chat_panel;
pub mod status_bar;
pub mod theme;

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout},
};

use crate::app::App;
use crate::chat::DisplayHandle;

/// Main draw function for the entire UI.
///
/// Returns the handles of the message lines that made it into the
/// viewport, for the visibility report.
pub fn draw(frame: &mut Frame, app: &App) -> Vec<DisplayHandle> {
    // Create main layout with status bar at bottom
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(frame.area());

    let visible = chat_panel::render(frame, main_chunks[0], app);
    status_bar::render(frame, main_chunks[1], app);
    visible
}
