use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::app::dashboard::{CONF_SAFETY_THRESHOLD, DashboardView, visible_utxos};
use crate::state::{Amount, BlockSnapshot};
use crate::ui::theme;

// Column layout of a UTXO row: address, confirmations, amount.
const UTXO_PANEL_MIN: u16 = 61;
const ADDR_PANEL_MIN: u16 = 24;

pub fn render(frame: &mut Frame, view: &DashboardView, status_line: &str) {
    let (body, status) = super::split_body_status(frame.area());
    super::render_status_bar(frame, status, status_line);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Percentage(25)])
        .split(body);

    let utxo_width = (rows[0].width / 2).max(UTXO_PANEL_MIN).min(rows[0].width);
    let addr_width = (rows[0].width * 2 / 5).max(ADDR_PANEL_MIN);
    let panels = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(utxo_width), Constraint::Length(addr_width), Constraint::Min(0)])
        .split(rows[0]);

    render_utxos(frame, view, panels[0]);
    render_addresses(frame, view, panels[1]);
    render_chain(frame, view, rows[1]);
}

fn panel(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme::BORDER))
        .title(format!(" {title} "))
}

fn utxo_row(address: &str, confs: &str, amount: &str) -> String {
    format!("{address:<44}{confs:>5}{amount:>12}")
}

fn render_utxos(frame: &mut Frame, view: &DashboardView, area: Rect) {
    let block = panel("UTXOs");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    // Header, overflow notice and total all take a row each.
    let max_rows = inner.height.saturating_sub(3) as usize;
    let rows = visible_utxos(view.utxos, max_rows);

    let mut lines = vec![Line::styled(
        utxo_row("address", "confs", "BTC"),
        Style::default().fg(theme::TEXT_MUTED),
    )];
    if view.utxos.len() > max_rows {
        lines.push(Line::styled("-- too many UTXOs to fit --", Style::default().fg(theme::WARNING).bold()));
    }
    for utxo in &rows {
        let row = utxo_row(&utxo.address, &utxo.confirmations.to_string(), &utxo.amount.to_string());
        // Funds below the safety threshold could still be reorged away.
        let style = if utxo.confirmations < CONF_SAFETY_THRESHOLD {
            Style::default().fg(theme::INVERSE_FG).bg(theme::INVERSE_BG).bold()
        } else {
            Style::default().fg(theme::TEXT)
        };
        lines.push(Line::styled(row, style));
    }

    let total: Amount = view.utxos.values().map(|u| u.amount).sum();
    lines.push(Line::styled(utxo_row("", "", &total.to_string()), Style::default().fg(theme::TEXT).bold()));

    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_addresses(frame: &mut Frame, view: &DashboardView, area: Rect) {
    let block = panel("unused addresses");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines = vec![
        Line::styled("press 'n' to get new address", Style::default().fg(theme::TEXT_MUTED).italic()),
        Line::raw(""),
    ];
    for addr in view.new_addrs {
        lines.push(Line::styled(addr.as_str(), Style::default().fg(theme::TEXT)));
    }

    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_chain(frame: &mut Frame, view: &DashboardView, area: Rect) {
    let block = panel("chain status");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let conn_style = if view.conn_status.starts_with('!') {
        Style::default().fg(theme::WARNING).bold()
    } else {
        Style::default().fg(theme::SUCCESS)
    };
    let mut lines = vec![Line::styled(view.conn_status, conn_style), Line::raw("")];

    let room = (inner.height as usize).saturating_sub(lines.len());
    let skip = view.blocks.len().saturating_sub(room);
    for block in &view.blocks[skip..] {
        lines.push(Line::styled(block_row(block), Style::default().fg(theme::TEXT)));
    }

    frame.render_widget(Paragraph::new(lines), inner);
}

fn block_row(block: &BlockSnapshot) -> String {
    let tail = &block.hash[block.hash.len().saturating_sub(8)..];
    format!(
        "{} | block {} (...{}) - {} sat/vB - {} txs - subsidy: {}",
        block.seen_at.format("%H:%M:%S"),
        block.height,
        tail,
        block.median_fee_rate,
        block.tx_count,
        block.subsidy,
    )
}

#[cfg(test)]
mod tests {
    use chrono::Local;

    use super::*;

    #[test]
    fn block_row_shows_height_and_hash_tail() {
        let block = BlockSnapshot {
            hash: "00000000000000000002f0f4a8e57c1d2c8d9e1b4a6c7d8e9f0a1b2c3d4e5f6a".into(),
            height: 850_000,
            seen_at: Local::now(),
            median_fee_rate: 12.0,
            subsidy: Amount(312_500_000),
            tx_count: 3021,
        };
        let row = block_row(&block);
        assert!(row.contains("block 850000"));
        assert!(row.contains("(...3d4e5f6a)"));
        assert!(row.contains("12 sat/vB"));
        assert!(row.contains("subsidy: 3.12500000"));
    }
}
