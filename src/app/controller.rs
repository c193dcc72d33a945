use std::io::{self, Write};
use std::path::PathBuf;

use crossterm::ExecutableCommand;
use crossterm::event::KeyCode;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use log::error;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use crate::app::dashboard::DashboardScene;
use crate::app::home::HomeScene;
use crate::app::setup::{SetupWizard, TerminalIo};
use crate::app::{AppError, SceneAction};
use crate::infra::config::ConfigStore;

/// Top-level scene loop. Owns the terminal and keyboard; scenes never read
/// keys behind its back except within their own draw step.
pub struct Controller {
    home: HomeScene,
    dashboard: DashboardScene,
    config: Option<ConfigStore>,
    rpc_override: Option<String>,
    config_path: PathBuf,
}

/// Persistent status line: quit hint plus the last key pressed.
pub fn status_line(key: Option<KeyCode>) -> String {
    let kstr = match key {
        Some(KeyCode::Char(c)) => format!("'{c}'"),
        Some(code) => format!("{code:?}"),
        None => "none".to_string(),
    };
    let mut line = format!("Press 'q' to exit | never sell | last keypress: {kstr}");
    if key.is_none() {
        line.push_str(" | waiting");
    }
    line
}

impl Controller {
    pub fn new(
        config: Option<ConfigStore>,
        rpc_override: Option<String>,
        config_path: PathBuf,
    ) -> Controller {
        Controller {
            home: HomeScene::new(),
            dashboard: DashboardScene::new(),
            config,
            rpc_override,
            config_path,
        }
    }

    pub fn run(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> Result<(), AppError> {
        let mut action = SceneAction::Home;
        let mut key: Option<KeyCode> = None;

        loop {
            let status = status_line(key);
            match action {
                SceneAction::Quit => break,
                SceneAction::Home => {
                    let names = self.wallet_names();
                    let (next, next_action) = self.home.draw(terminal, &names, key, &status)?;
                    key = next;
                    action = next_action;
                }
                SceneAction::Setup => {
                    // Runs to its own completion; the menu is always the
                    // landing scene afterwards.
                    self.run_setup(terminal)?;
                    key = None;
                    action = SceneAction::Home;
                }
                SceneAction::Dashboard => {
                    let Some(config) = self.config.as_ref() else {
                        return Err(AppError::NoWallet);
                    };
                    let (next, next_action) = self.dashboard.draw(terminal, config, key, &status)?;
                    key = next;
                    action = next_action;
                }
            }

            if key == Some(KeyCode::Char('q')) {
                break;
            }
        }
        Ok(())
    }

    fn wallet_names(&self) -> Vec<String> {
        self.config
            .as_ref()
            .map(|c| c.wallets().iter().map(|w| w.name.clone()).collect())
            .unwrap_or_default()
    }

    /// The wizard is line-oriented: drop out of the alternate screen for its
    /// duration. A fatal setup error terminates the process; a
    /// half-initialized wallet must not be presented as ready.
    fn run_setup(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> Result<(), AppError> {
        suspend_tui()?;

        let mut io = TerminalIo;
        let mut wizard = SetupWizard {
            io: &mut io,
            rpc_override: self.rpc_override.clone(),
            config_path: self.config_path.clone(),
        };
        match wizard.run(&mut self.config) {
            Ok(()) => {
                resume_tui(terminal)?;
                Ok(())
            }
            Err(err) => {
                error!("setup failed: {err}");
                eprintln!();
                eprintln!("setup failed: {err}");
                std::process::exit(1);
            }
        }
    }
}

fn suspend_tui() -> io::Result<()> {
    disable_raw_mode()?;
    io::stdout().execute(LeaveAlternateScreen)?;
    io::stdout().flush()
}

fn resume_tui(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> io::Result<()> {
    enable_raw_mode()?;
    io::stdout().execute(EnterAlternateScreen)?;
    terminal.clear()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_line_shows_last_key() {
        let line = status_line(Some(KeyCode::Char('j')));
        assert!(line.contains("last keypress: 'j'"));
        assert!(line.contains("Press 'q' to exit"));
        assert!(!line.contains("waiting"));
    }

    #[test]
    fn status_line_marks_waiting_without_a_key() {
        let line = status_line(None);
        assert!(line.contains("last keypress: none"));
        assert!(line.ends_with("| waiting"));
    }

    #[test]
    fn status_line_names_special_keys() {
        let line = status_line(Some(KeyCode::Enter));
        assert!(line.contains("Enter"));
    }
}
