use ratatui::Frame;
use ratatui::layout::Alignment;
use ratatui::style::Style;
use ratatui::text::Line;
use ratatui::widgets::Paragraph;

use crate::app::MenuItem;
use crate::ui::theme;

const TITLE_ART: &str = r"
             _     _               _       _
  ___   ___ | | __| |_      ____ _| |_ ___| |__
 / __| / _ \| |/ _` \ \ /\ / / _` | __/ __| '_ \
| (__ | (_) | | (_| |\ V  V / (_| | || (__| | | |
 \___| \___/|_|\__,_| \_/\_/ \__,_|\__\___|_| |_|
";

const SUBTITLE: &str = "watch-only wallet for Bitcoin Core";

pub fn render(
    frame: &mut Frame,
    items: &[MenuItem],
    cursor: usize,
    wallet_names: &[String],
    status_line: &str,
) {
    let (body, status) = super::split_body_status(frame.area());
    super::render_status_bar(frame, status, status_line);

    let mut lines: Vec<Line> = Vec::new();

    // Push the banner down a quarter of the screen so the menu sits near
    // the middle on tall terminals.
    for _ in 0..body.height / 4 {
        lines.push(Line::raw(""));
    }
    for art in TITLE_ART.lines().skip(1) {
        lines.push(Line::styled(art, Style::default().fg(theme::TITLE).bold()));
    }
    lines.push(Line::raw(""));
    lines.push(Line::styled(SUBTITLE, Style::default().fg(theme::TEXT_MUTED)));
    lines.push(Line::raw(""));

    if !wallet_names.is_empty() {
        let joined = wallet_names.join(", ");
        lines.push(Line::styled(format!("Wallets: {joined}"), Style::default().fg(theme::TEXT)));
        lines.push(Line::raw(""));
    }

    for (i, item) in items.iter().enumerate() {
        let marker = if i == cursor { "-> " } else { "   " };
        // Fixed width keeps the entries aligned under center alignment.
        let row = format!("{marker}{:<24}", item.label);
        let style = if i == cursor {
            Style::default().fg(theme::ACCENT).bold()
        } else {
            Style::default().fg(theme::TEXT)
        };
        lines.push(Line::styled(row, style));
    }

    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), body);
}
