//! Chat panel rendering (message list + input box).

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
};

use super::theme;
use crate::app::App;
use crate::chat::DisplayHandle;

/// Render the chat panel (messages + input box).
///
/// Returns the handles of the lines drawn in the message list.
pub fn render(frame: &mut Frame, area: Rect, app: &App) -> Vec<DisplayHandle> {
    // Split into message area and input area
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(area);

    let visible = render_messages(frame, chunks[0], app);
    render_input(frame, chunks[1], app);
    visible
}

/// Render the message list.
fn render_messages(frame: &mut Frame, area: Rect, app: &App) -> Vec<DisplayHandle> {
    // Borders take one row top and bottom.
    let rows = usize::from(area.height.saturating_sub(2));
    let range = app.visible_range(rows);
    let shown = &app.messages[range];

    let items: Vec<ListItem> = shown
        .iter()
        .map(|msg| {
            let line = Line::from(vec![
                Span::styled(&msg.timestamp, theme::timestamp()),
                Span::raw(" "),
                Span::styled(msg.origin.label(), theme::sender(msg.origin)),
                Span::raw(": "),
                Span::styled(&msg.content, theme::normal()),
                Span::raw(" "),
                Span::styled(msg.status.symbol(), theme::dimmed()),
            ]);
            ListItem::new(line)
        })
        .collect();

    let title = if app.scroll_from_bottom > 0 {
        format!("{} (scrolled)", app.chat_id)
    } else {
        app.chat_id.clone()
    };
    let block = Block::default()
        .title(Span::styled(title, theme::panel_title(theme::CHAT_TITLE)))
        .borders(Borders::ALL)
        .border_style(theme::normal());

    frame.render_widget(List::new(items).block(block), area);

    shown.iter().map(|m| m.handle).collect()
}

/// Render the input box.
fn render_input(frame: &mut Frame, area: Rect, app: &App) {
    let mut display_text = app.input.clone();
    let cursor = display_text
        .char_indices()
        .nth(app.cursor_position)
        .map_or(display_text.len(), |(i, _)| i);
    display_text.insert(cursor, '█');

    let input_line = if app.input.is_empty() {
        Line::from(vec![
            Span::styled("█", theme::input_cursor()),
            Span::styled(" Type a message...", theme::dimmed()),
        ])
    } else {
        Line::from(Span::styled(display_text, theme::normal()))
    };

    let block = Block::default()
        .title("Input")
        .borders(Borders::ALL)
        .border_style(theme::highlighted());

    frame.render_widget(Paragraph::new(input_line).block(block), area);
}
