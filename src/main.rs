mod app;
mod infra;
mod state;
mod ui;

use std::io;
use std::path::PathBuf;

use crossterm::{
    ExecutableCommand,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use simplelog::WriteLogger;

use app::controller::Controller;
use infra::config::{ConfigStore, default_path};

const LOG_FILE: &str = "coldwatch.log";

fn main() -> io::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let rpc_override = flag_value(&args, "--rpc");
    let config_path = flag_value(&args, "--config").map(PathBuf::from).unwrap_or_else(default_path);

    // File logging has to be up before the terminal is taken over; once the
    // alternate screen is active, stderr is invisible.
    if let Ok(file) = std::fs::OpenOptions::new().create(true).append(true).open(LOG_FILE) {
        let _ = WriteLogger::init(log::LevelFilter::Info, simplelog::Config::default(), file);
    }

    let config = match ConfigStore::load(&config_path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to read config at {}: {err}", config_path.display());
            std::process::exit(1);
        }
    };

    // Panic hook: restore terminal state and log the panic to disk.
    // Without this, a panic leaves the terminal in raw mode + alternate screen
    // and the error is lost.
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = io::stdout().execute(LeaveAlternateScreen);
        log::error!("panic: {info}");
        default_hook(info);
    }));

    enable_raw_mode()?;
    io::stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;

    let mut controller = Controller::new(config, rpc_override, config_path);
    let outcome = controller.run(&mut terminal);

    disable_raw_mode()?;
    io::stdout().execute(LeaveAlternateScreen)?;

    if let Err(err) = outcome {
        log::error!("fatal: {err}");
        eprintln!("coldwatch: {err}");
        std::process::exit(1);
    }
    Ok(())
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag).and_then(|i| args.get(i + 1)).cloned()
}
