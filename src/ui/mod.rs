pub mod dashboard;
pub mod home;
pub mod theme;

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::Style;
use ratatui::widgets::Paragraph;

/// Split a frame into the scene body and the one-row status bar at the
/// bottom.
pub fn split_body_status(area: Rect) -> (Rect, Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(area);
    (rows[0], rows[1])
}

/// Inverse-video status bar, rendered identically on every scene.
pub fn render_status_bar(frame: &mut Frame, area: Rect, status: &str) {
    let bar = Paragraph::new(format!(" {status}"))
        .style(Style::default().fg(theme::INVERSE_FG).bg(theme::INVERSE_BG));
    frame.render_widget(bar, area);
}
