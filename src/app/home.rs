use std::io;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use crate::app::{MenuItem, SceneAction};
use crate::ui;

/// Home menu. The cursor is the only mutable per-scene state; everything
/// drawn is a pure function of (terminal size, cursor, wallet list).
pub struct HomeScene {
    cursor: usize,
}

impl HomeScene {
    pub fn new() -> HomeScene {
        HomeScene { cursor: 0 }
    }

    /// Menu entries available given the configured wallets. Without a wallet
    /// only setup is offered.
    pub fn items(has_wallets: bool) -> Vec<MenuItem> {
        let mut items = vec![MenuItem { label: "start setup", action: SceneAction::Setup }];
        if has_wallets {
            items.push(MenuItem { label: "dashboard", action: SceneAction::Dashboard });
        }
        items
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Apply one key. `Some(action)` means leave the scene; `None` means the
    /// cursor may have moved and the menu re-renders.
    pub fn handle_key(&mut self, key: KeyCode, items: &[MenuItem]) -> Option<SceneAction> {
        // The item list can shrink between ticks (wallet list changes).
        self.cursor = self.cursor.min(items.len().saturating_sub(1));

        match key {
            KeyCode::Char('q') => Some(SceneAction::Quit),
            KeyCode::Enter => Some(items[self.cursor].action),
            KeyCode::Down | KeyCode::Char('j') => {
                if self.cursor + 1 < items.len() {
                    self.cursor += 1;
                }
                None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.cursor = self.cursor.saturating_sub(1);
                None
            }
            _ => None,
        }
    }

    /// One draw step: apply the pending key, redraw, then block for the next
    /// key (home has no refresh cadence of its own).
    pub fn draw(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
        wallet_names: &[String],
        key: Option<KeyCode>,
        status_line: &str,
    ) -> io::Result<(Option<KeyCode>, SceneAction)> {
        let items = HomeScene::items(!wallet_names.is_empty());

        if let Some(key) = key
            && let Some(action) = self.handle_key(key, &items)
        {
            return Ok((None, action));
        }

        terminal.draw(|frame| {
            ui::home::render(frame, &items, self.cursor, wallet_names, status_line);
        })?;

        loop {
            if let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
            {
                return Ok((Some(key.code), SceneAction::Home));
            }
        }
    }
}
