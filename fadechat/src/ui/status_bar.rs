//! Status bar rendering.

use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::Paragraph,
};

use super::theme;
use crate::app::App;

const HELP_TEXT: &str = "Enter: send | ↑↓: scroll | Esc: quit";

/// Render the status bar at the bottom of the screen.
pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let (dot_color, status_text) = if app.is_connected {
        (theme::SUCCESS, format!("{} via {}", app.chat_id, app.connection_info))
    } else {
        (theme::OFFLINE, "Disconnected".to_string())
    };

    let counters = format!(
        "sent {} | read {} | expired {}",
        app.stats.sent, app.stats.acknowledged, app.stats.expired
    );

    let mut spans = vec![
        Span::styled(concat!("FadeChat v", env!("CARGO_PKG_VERSION")), theme::bold()),
        Span::raw(" | "),
        Span::styled("●", theme::normal().fg(dot_color)),
        Span::raw(format!(" {status_text}")),
        Span::raw(" | "),
        Span::styled(counters, theme::dimmed()),
        Span::raw(" | "),
    ];
    match &app.notice {
        Some(notice) => spans.push(Span::styled(notice.as_str(), theme::system_message())),
        None => spans.push(Span::styled(HELP_TEXT, theme::dimmed())),
    }

    let paragraph = Paragraph::new(Line::from(spans)).style(theme::status_bar_bg());
    frame.render_widget(paragraph, area);
}
