use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use log::error;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use crate::app::{AppError, SceneAction};
use crate::infra::config::ConfigStore;
use crate::infra::rpc::RpcHandle;
use crate::state::{BlockSnapshot, StopSignal, Utxo, UtxoSet, run_block_poller, run_utxo_poller};
use crate::ui;

/// Poller cadence.
const POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Bounded key read so the display refreshes without input.
const KEY_TIMEOUT: Duration = Duration::from_millis(400);
/// Connection status is a node round-trip; refresh it every N render ticks
/// and paint the cached line in between.
const CONN_REFRESH_TICKS: u64 = 20;
/// Cap on pending unused receive addresses.
const MAX_PENDING_ADDRS: usize = 10;
/// Confirmation count below which a UTXO row is highlighted.
pub const CONF_SAFETY_THRESHOLD: u64 = 6;

struct PollerSet {
    stop: StopSignal,
    handles: Vec<JoinHandle<()>>,
    utxo_rx: Receiver<UtxoSet>,
    block_rx: Receiver<Vec<BlockSnapshot>>,
    node_rpc: RpcHandle,
    wallet_rpc: RpcHandle,
}

/// Live dashboard: renders the latest poller snapshots and owns the poller
/// lifecycle for the session.
pub struct DashboardScene {
    pollers: Option<PollerSet>,
    utxos: UtxoSet,
    blocks: Vec<BlockSnapshot>,
    new_addrs: Vec<String>,
    conn_status: Option<String>,
    tick: u64,
}

/// Everything the renderer needs for one frame.
pub struct DashboardView<'a> {
    pub utxos: &'a UtxoSet,
    pub blocks: &'a [BlockSnapshot],
    pub new_addrs: &'a [String],
    pub conn_status: &'a str,
}

/// Snapshot rows sorted by descending confirmation count, truncated to the
/// last `max_rows` so the least-confirmed entries stay visible when space
/// runs out.
pub fn visible_utxos(utxos: &UtxoSet, max_rows: usize) -> Vec<&Utxo> {
    let mut sorted: Vec<&Utxo> = utxos.values().collect();
    sorted.sort_by(|a, b| b.confirmations.cmp(&a.confirmations));
    let skip = sorted.len().saturating_sub(max_rows);
    sorted.drain(..skip);
    sorted
}

/// Drop generated addresses that now have a matching UTXO; the appearance of
/// funds consumes the "unused" address.
pub fn filter_unused(new_addrs: &mut Vec<String>, utxos: &UtxoSet) {
    new_addrs.retain(|addr| !utxos.contains_key(addr));
}

impl DashboardScene {
    pub fn new() -> DashboardScene {
        DashboardScene {
            pollers: None,
            utxos: UtxoSet::new(),
            blocks: Vec::new(),
            new_addrs: Vec::new(),
            conn_status: None,
            tick: 0,
        }
    }

    /// One draw step. Any error here is not safely recoverable in place:
    /// log, stop the pollers, and re-raise to the controller.
    pub fn draw(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
        config: &ConfigStore,
        key: Option<KeyCode>,
        status_line: &str,
    ) -> Result<(Option<KeyCode>, SceneAction), AppError> {
        match self.draw_inner(terminal, config, key, status_line) {
            Ok(step) => Ok(step),
            Err(err) => {
                error!("dashboard render failed: {err}");
                self.stop_pollers();
                Err(err)
            }
        }
    }

    fn draw_inner(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
        config: &ConfigStore,
        key: Option<KeyCode>,
        status_line: &str,
    ) -> Result<(Option<KeyCode>, SceneAction), AppError> {
        self.ensure_pollers(config)?;
        self.drain_snapshots();

        if key == Some(KeyCode::Char('n')) {
            self.request_address()?;
        }
        filter_unused(&mut self.new_addrs, &self.utxos);
        self.refresh_conn_status();

        let view = DashboardView {
            utxos: &self.utxos,
            blocks: &self.blocks,
            new_addrs: &self.new_addrs,
            conn_status: self.conn_status.as_deref().unwrap_or(""),
        };
        terminal.draw(|frame| ui::dashboard::render(frame, &view, status_line))?;
        self.tick += 1;

        let next = if event::poll(KEY_TIMEOUT)? {
            match event::read()? {
                Event::Key(k) if k.kind == KeyEventKind::Press => Some(k.code),
                _ => None,
            }
        } else {
            None
        };

        if next == Some(KeyCode::Char('q')) {
            self.stop_pollers();
            return Ok((None, SceneAction::Home));
        }
        Ok((next, SceneAction::Dashboard))
    }

    /// Start one instance of each poller, once per session. Re-entering the
    /// dashboard without leaving must not spawn duplicates.
    fn ensure_pollers(&mut self, config: &ConfigStore) -> Result<(), AppError> {
        if self.pollers.is_some() {
            return Ok(());
        }
        let wallet = config.wallets().first().ok_or(AppError::NoWallet)?;
        let node_rpc = config.rpc_for(None)?;
        let wallet_rpc = config.rpc_for(Some(wallet))?;
        self.start_pollers_with(node_rpc, wallet_rpc);
        Ok(())
    }

    fn start_pollers_with(&mut self, node_rpc: RpcHandle, wallet_rpc: RpcHandle) {
        let stop = StopSignal::new();
        let (utxo_tx, utxo_rx) = mpsc::channel();
        let (block_tx, block_rx) = mpsc::channel();

        let handles = vec![
            {
                let (rpc, stop) = (wallet_rpc.clone(), stop.clone());
                thread::spawn(move || run_utxo_poller(rpc, utxo_tx, stop, POLL_INTERVAL))
            },
            {
                let (rpc, stop) = (node_rpc.clone(), stop.clone());
                thread::spawn(move || run_block_poller(rpc, block_tx, stop, POLL_INTERVAL))
            },
        ];

        self.pollers = Some(PollerSet { stop, handles, utxo_rx, block_rx, node_rpc, wallet_rpc });
    }

    /// Take the most recent published snapshots without blocking.
    fn drain_snapshots(&mut self) {
        let Some(pollers) = &self.pollers else { return };
        if let Some(latest) = pollers.utxo_rx.try_iter().last() {
            self.utxos = latest;
        }
        if let Some(latest) = pollers.block_rx.try_iter().last() {
            self.blocks = latest;
        }
    }

    /// Signal and join both pollers; no poller outlives its session.
    fn stop_pollers(&mut self) {
        if let Some(pollers) = self.pollers.take() {
            pollers.stop.stop();
            for handle in pollers.handles {
                let _ = handle.join();
            }
        }
    }

    fn request_address(&mut self) -> Result<(), AppError> {
        let Some(pollers) = &self.pollers else { return Ok(()) };
        if self.new_addrs.len() < MAX_PENDING_ADDRS {
            self.new_addrs.push(pollers.wallet_rpc.new_address()?);
        }
        Ok(())
    }

    fn refresh_conn_status(&mut self) {
        let Some(pollers) = &self.pollers else { return };
        if self.conn_status.is_some() && self.tick % CONN_REFRESH_TICKS != 0 {
            return;
        }
        self.conn_status = Some(match pollers.node_rpc.network_info() {
            Ok(info) => {
                format!("✔ connected to version {} at {}", info.subversion, pollers.node_rpc.endpoint())
            }
            Err(_) => "! couldn't connect to Bitcoin Core".to_string(),
        });
    }
}
