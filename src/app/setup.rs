use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

use crossterm::style::Stylize;
use log::{error, info};
use thiserror::Error;

use crate::app::wait::wait_until;
use crate::infra::config::{ConfigError, ConfigStore, WalletConfig, default_path};
use crate::infra::core_rpc::CoreRpc;
use crate::infra::import::{ImportError, parse_export};
use crate::infra::rpc::{ChainInfo, NodeRpc, RpcError, RpcHandle, ScanResult};
use crate::state::Amount;

/// Verification progress at which the chain counts as synced.
const SYNC_COMPLETE: f64 = 0.999;
/// Hardware-wallet export file the wizard waits for, in the working directory.
const IMPORT_FILE: &str = "public.txt";

const FILE_POLL: Duration = Duration::from_millis(100);
const SCAN_POLL: Duration = Duration::from_millis(200);
const SCAN_RETRY: Duration = Duration::from_secs(1);
const RESCAN_POLL: Duration = Duration::from_millis(500);
const UTXO_POLL: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("couldn't detect Bitcoin Core")]
    NodeNotFound,
    #[error("error parsing {IMPORT_FILE}: {0}")]
    Import(#[from] ImportError),
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Wizard output and prompts behind a seam so stages run without a real
/// terminal in tests.
pub trait WizardIo {
    /// Print a full line.
    fn line(&mut self, text: &str);
    /// Overwrite the current line (progress feedback).
    fn status(&mut self, text: &str);
    /// Print a question and read one trimmed reply line.
    fn prompt(&mut self, text: &str) -> io::Result<String>;
}

/// Line-oriented stdin/stdout implementation used outside the alternate
/// screen.
pub struct TerminalIo;

impl WizardIo for TerminalIo {
    fn line(&mut self, text: &str) {
        println!("{text}");
    }

    fn status(&mut self, text: &str) {
        print!("\r{text}   ");
        let _ = io::stdout().flush();
    }

    fn prompt(&mut self, text: &str) -> io::Result<String> {
        print!(" {}  {text}", "?".yellow());
        io::stdout().flush()?;
        let mut reply = String::new();
        io::stdin().read_line(&mut reply)?;
        println!();
        Ok(reply.trim().to_string())
    }
}

fn check_line(msg: &str) -> String {
    format!(" {}  {msg}", "✔".green().bold())
}

fn warn_line(msg: &str) -> String {
    format!(" {}  {msg}", "!".red().bold())
}

fn task_line(msg: &str) -> String {
    format!(" {}  {msg}", "□".bold())
}

fn bullet_line(msg: &str) -> String {
    format!(" -- {msg}")
}

fn conn_line(msg: &str) -> String {
    format!(" {}  {msg}", "○".green().bold())
}

fn blank_line(msg: &str) -> String {
    format!("    {msg}")
}

const TITLE: &str = r#"
              __
.-----.-----.|  |_.--.--.-----.
|__ --|  -__||   _|  |  |  _  |
|_____|_____||____|_____|   __|
                        |__|
"#;

const NEVER_SELL: &str = r#"
     _  _ ___ _  _ ___ ___     ___ ___ _    _
    | \| | __| \| | __| _ \   / __| __| |  | |
    | .` | _|| .` | _||   /   \__ \ _|| |__| |__
    |_|\_|___|_|\_|___|_|_\   |___/___|____|____|
"#;

/// The one-time onboarding sequence: node discovery, config bootstrap,
/// hardware checkpoint, sync wait, xpub import, wallet registration, scan,
/// rescan, optional test transaction. Strictly ordered and non-resumable;
/// runs to completion in a single dispatch from the controller.
pub struct SetupWizard<'io> {
    pub io: &'io mut dyn WizardIo,
    pub rpc_override: Option<String>,
    pub config_path: PathBuf,
}

impl SetupWizard<'_> {
    pub fn run(&mut self, config: &mut Option<ConfigStore>) -> Result<(), SetupError> {
        self.io.line(&format!("{}", TITLE.cyan()));
        self.io.line(&blank_line("searching for Bitcoin Core..."));

        let configured_url =
            self.rpc_override.clone().or_else(|| config.as_ref().and_then(|c| c.rpc_url().map(str::to_string)));
        let Some(node) = CoreRpc::discover(configured_url.as_deref()) else {
            self.io.line(&warn_line("couldn't detect Bitcoin Core - make sure it's running locally, or"));
            self.io.line(&warn_line("pass `coldwatch --rpc <url>`"));
            return Err(SetupError::NodeNotFound);
        };
        let node_url = node.url().to_string();
        self.io.line(&conn_line(&format!("connected to Bitcoin Core at {}", node.endpoint().yellow())));
        self.io.line("");

        let store = self.bootstrap_config(config, node_url)?;

        self.section("hardware wallet setup");
        self.io.prompt("have you initialized your signing device? [press enter] ")?;

        self.io.line(&blank_line("checking Bitcoin Core sync progress..."));
        let chain = wait_chain_sync(self.io, &node, Duration::from_millis(200));
        self.io.line("");
        self.io.line(&check_line(&format!(
            "chain sync completed (height: {})",
            chain.blocks.to_string().yellow()
        )));
        self.io.line("");

        let wallet_cfg = self.import_public_data(store)?;
        let node_rpc: RpcHandle = std::sync::Arc::new(node);
        let wallet_rpc = store.rpc_for(Some(&wallet_cfg))?;

        self.register_wallet(&wallet_cfg, node_rpc.as_ref(), wallet_rpc.as_ref())?;
        let scan = self.scan_utxos(&wallet_cfg, wallet_rpc.clone())?;
        self.rescan(&wallet_cfg, wallet_rpc.clone(), &scan);

        let reply = self.io.prompt("do you want to perform some test transactions? [Y/n] ")?;
        if matches!(reply.to_lowercase().as_str(), "y" | "") {
            self.test_transactions(&wallet_cfg, wallet_rpc)?;
        }

        self.finish()
    }

    fn section(&mut self, name: &str) {
        self.io.line("");
        self.io.line(&format!(" {}  {}", "#".bold(), name.bold()));
        self.io.line(&format!("    {}", "-".repeat(name.len())));
        self.io.line("");
    }

    /// Conditionally skipped: an existing config is loaded as-is. Always
    /// leaves `config` populated and hands the caller the store inside it.
    fn bootstrap_config<'a>(
        &mut self,
        config: &'a mut Option<ConfigStore>,
        node_url: String,
    ) -> Result<&'a mut ConfigStore, SetupError> {
        let store = match config.take() {
            Some(store) => {
                let marker = if store.encrypted() { " (gpg)" } else { "" };
                self.io.line(&check_line(&format!(
                    "loaded config from {}{marker}",
                    store.loaded_from().display().to_string().yellow()
                )));
                store
            }
            None => {
                self.section("config file setup");
                let use_gpg = self
                    .io
                    .prompt("do you want to use GPG to encrypt your config? [y/N] ")?
                    .to_lowercase()
                    == "y";
                let mut default = if self.config_path.as_os_str().is_empty() {
                    default_path()
                } else {
                    self.config_path.clone()
                };
                if use_gpg {
                    default.set_extension("json.gpg");
                }
                let reply = self
                    .io
                    .prompt(&format!("where should I store your config? [{}] ", default.display()))?;
                let path = if reply.is_empty() { default } else { PathBuf::from(reply) };
                let store = ConfigStore::create(&path, Some(node_url), use_gpg)?;
                self.io.line(&check_line(&format!("created config at {}", path.display())));
                store
            }
        };
        Ok(config.insert(store))
    }

    fn import_public_data(&mut self, store: &mut ConfigStore) -> Result<WalletConfig, SetupError> {
        self.section("xpub import from your signing device");
        self.io.line(&blank_line("now we're going to import your wallet's public information"));
        self.io.line(&blank_line("on the device, export the wallet summary to the SD card"));
        self.io.line("");
        self.io.line(&warn_line("this is not key material, but it can be used to track your addresses"));
        self.io.line("");
        let cwd = std::env::current_dir()?;
        self.io.line(&task_line(&format!("place {IMPORT_FILE} in this directory ({})", cwd.display())));
        self.io.line("");

        let path = wait_import_file(self.io, Path::new(IMPORT_FILE), FILE_POLL);
        let text = std::fs::read_to_string(&path)?;
        let export = match parse_export(&text) {
            Ok(export) => export,
            Err(err) => {
                self.io.line("");
                self.io.line(&warn_line(&format!("error parsing {IMPORT_FILE} contents")));
                self.io.line(&warn_line("check the file and run setup again"));
                return Err(err.into());
            }
        };

        self.io.line("");
        self.io.line(&check_line("parsed xpub as"));
        self.io.line(&blank_line(&format!("  {}", export.descriptor_base.as_str().yellow())));
        self.io.line("");

        let wallet_cfg = WalletConfig::from(&export);
        store.add_wallet(wallet_cfg.clone());
        store.write()?;
        self.io.line(&check_line(&format!("wrote config to {}", store.loaded_from().display())));
        Ok(wallet_cfg)
    }

    /// Failures here propagate as fatal: there is no safe continuation with
    /// a half-registered wallet.
    fn register_wallet(
        &mut self,
        wallet: &WalletConfig,
        node_rpc: &dyn NodeRpc,
        wallet_rpc: &dyn NodeRpc,
    ) -> Result<(), SetupError> {
        self.section("wallet setup in Core");
        node_rpc.create_wallet(&wallet.name)?;
        self.io.line(&check_line(&format!(
            "created wallet {} in Core as watch-only",
            wallet.name.as_str().yellow()
        )));

        wallet_rpc.import_descriptors(&wallet.import_args())?;
        self.io.line(&check_line("imported descriptors 0/* and 1/* (change)"));
        Ok(())
    }

    fn scan_utxos(
        &mut self,
        wallet: &WalletConfig,
        wallet_rpc: RpcHandle,
    ) -> Result<ScanResult, SetupError> {
        self.io.line("");
        self.section("scanning the chain for balance and history");

        let (tx, rx) = mpsc::channel();
        let descriptors = wallet.descriptors.clone();
        thread::spawn(move || run_scan_worker(wallet_rpc, descriptors, tx, SCAN_RETRY));

        let scan = wait_for_scan(self.io, &rx, SCAN_POLL)?;
        self.io.line("");
        self.io.line(&check_line("scan of UTXO set complete!"));
        self.io.line(&blank_line(&format!(
            "found an existing balance of {} across {}",
            format!("{} BTC", scan.total()).yellow().bold(),
            format!("{} UTXOs", scan.unspents.len()).yellow().bold()
        )));
        Ok(scan)
    }

    /// The rescan worker is supervised but deliberately not joined; its
    /// outcome channel is kept alive for the duration of the wait and then
    /// dropped. Completion is tracked through the node's own scan progress.
    fn rescan(&mut self, wallet: &WalletConfig, wallet_rpc: RpcHandle, scan: &ScanResult) {
        let Some(from_height) = scan.min_height() else {
            return;
        };
        self.io.line("");
        self.io.line(&blank_line(&format!(
            "beginning chain rescan from height {} (minutes to hours)",
            from_height.to_string().bold()
        )));
        self.io.line(&blank_line("this finds the transactions associated with your coins"));

        let _outcome = spawn_rescan(wallet_rpc.clone(), from_height);
        thread::sleep(Duration::from_secs(2));
        wait_rescan(self.io, wallet_rpc.as_ref(), RESCAN_POLL);

        self.io.line("");
        self.io.line(&check_line(&format!(
            "scan complete. wallet {} ready to use.",
            wallet.name.as_str().yellow()
        )));
        self.io.line("");
    }

    fn test_transactions(
        &mut self,
        wallet: &WalletConfig,
        wallet_rpc: RpcHandle,
    ) -> Result<(), SetupError> {
        self.section("test transactions");

        let receive_addr = wallet_rpc.new_address()?;
        self.io.line(&task_line("send a tiny amount (~0.000001 BTC) to"));
        self.io.line("");
        self.io.line(&blank_line(&format!("  {}", receive_addr.as_str().yellow())));
        self.io.line("");

        let got = wait_for_utxo(self.io, wallet_rpc.as_ref(), &receive_addr, "waiting for transaction");
        self.io.line("");
        self.io.line(&check_line(&format!(
            "received amount of {} (txid {})",
            got.amount.to_string().green(),
            &got.txid[..got.txid.len().min(8)]
        )));
        self.io.line("");

        self.io.line(&bullet_line("great - now let's test your ability to send"));
        self.io.line(&bullet_line("we'll send 90% of that UTXO to a fresh address:"));
        let dest_addr = wallet_rpc.new_address()?;
        self.io.line("");
        self.io.line(&blank_line(&format!("  {}", dest_addr.as_str().yellow())));
        self.io.line("");

        let send_amount = Amount(got.amount.sats() / 10 * 9);
        let psbt = wallet_rpc.create_funded_psbt(&dest_addr, send_amount)?;
        let psbt_file = format!("{}-test.psbt", wallet.name);
        std::fs::write(&psbt_file, &psbt)?;

        self.io.line(&bullet_line(&format!("I've prepared a transaction to sign in '{psbt_file}'")));
        self.io.line("");
        self.io.line(&task_line("transfer this file to your signing device and sign it"));
        self.io.line(&warn_line("as always, verify all transaction details on the device display"));
        self.io.line("");

        let signed_file = psbt_file.replace(".psbt", "-signed.psbt");
        wait_import_file(self.io, Path::new(&signed_file), RESCAN_POLL);
        let signed = std::fs::read_to_string(&signed_file)?;
        let tx_hex = wallet_rpc.finalize_psbt(signed.trim())?;
        self.io.line("");
        self.io.line(&check_line("cool! got the signed PSBT"));

        let reply = self
            .io
            .prompt(&format!("broadcast this transaction ({} bytes of hex)? [y/N] ", tx_hex.len()))?;
        if reply.to_lowercase() != "y" {
            // User abort: not an error, but the prepared inputs are burned.
            self.io.line(&warn_line("aborting - doublespend the inputs immediately"));
            return Ok(());
        }

        wallet_rpc.send_raw_transaction(&tx_hex)?;
        self.io.line(&check_line("transaction broadcast!"));
        self.io.line("");

        let seen =
            wait_for_utxo(self.io, wallet_rpc.as_ref(), &dest_addr, "waiting to see the transaction in the mempool");
        self.io.line("");
        self.io.line(&check_line(&format!("saw tx {}", seen.txid)));
        self.io.line("");

        self.section("done");
        self.io.line(&check_line(&format!(
            "your wallet {} is good to go",
            wallet.name.as_str().yellow()
        )));
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SetupError> {
        self.io.line("");
        self.io.line(&blank_line("enjoy your wallet, and remember..."));
        self.io.line(&format!("{}", NEVER_SELL.cyan()));
        self.io.prompt("press [enter] to return home ")?;
        Ok(())
    }
}

/// Poll sync progress until the chain is effectively verified. Transient RPC
/// failures are retried on the next tick, never fatal.
pub fn wait_chain_sync(io: &mut dyn WizardIo, rpc: &dyn NodeRpc, interval: Duration) -> ChainInfo {
    wait_until(
        interval,
        || match rpc.chain_info() {
            Ok(info) if info.verification_progress >= SYNC_COMPLETE => Some(info),
            Ok(info) => {
                io.status(&format!(
                    "initial block download progress: {:.2}%",
                    info.verification_progress * 100.0
                ));
                None
            }
            Err(_) => None,
        },
        |_| {},
    )
}

/// Spin until `path` exists.
pub fn wait_import_file(io: &mut dyn WizardIo, path: &Path, interval: Duration) -> PathBuf {
    wait_until(
        interval,
        || path.exists().then(|| path.to_path_buf()),
        |glyph| io.status(&format!(" {glyph}  waiting for {}", path.display())),
    )
}

/// Run the node-side UTXO scan. Two failure shapes are expected and retried
/// rather than surfaced: a socket timeout (the node keeps scanning after our
/// read times out) and Core's rejection of a reissued scan while the earlier
/// one is still running.
pub fn run_scan_worker(
    rpc: RpcHandle,
    descriptors: Vec<String>,
    tx: Sender<Result<ScanResult, RpcError>>,
    retry_delay: Duration,
) {
    loop {
        match rpc.scan_utxo_set(&descriptors) {
            Ok(result) => {
                let _ = tx.send(Ok(result));
                return;
            }
            Err(RpcError::Timeout) => {
                info!("socket timed out during utxo scan (this is expected)");
            }
            Err(RpcError::Node { message, .. }) if message.contains("already in progress") => {
                info!("node is still scanning, retrying");
            }
            Err(err) => {
                let _ = tx.send(Err(err));
                return;
            }
        }
        thread::sleep(retry_delay);
    }
}

/// Spin in the foreground until the scan worker reports its outcome.
pub fn wait_for_scan(
    io: &mut dyn WizardIo,
    rx: &Receiver<Result<ScanResult, RpcError>>,
    interval: Duration,
) -> Result<ScanResult, RpcError> {
    wait_until(
        interval,
        || match rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                Some(Err(RpcError::Transport("scan worker exited without a result".into())))
            }
        },
        |glyph| io.status(&format!(" {glyph}  scanning the UTXO set for your balance (few minutes)")),
    )
}

/// Launch the history rescan as a supervised fire-and-forget task. The
/// returned channel carries the worker's outcome; the caller may drop it.
pub fn spawn_rescan(rpc: RpcHandle, from_height: u64) -> Receiver<Result<(), RpcError>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let outcome = match rpc.rescan(from_height) {
            Err(RpcError::Timeout) => {
                info!("socket timed out during rescan (this is expected)");
                Ok(())
            }
            other => other,
        };
        if let Err(err) = &outcome {
            error!("rescan worker failed: {err}");
        }
        let _ = tx.send(outcome);
    });
    rx
}

/// Poll the node's own scan progress until it reports no active scan.
pub fn wait_rescan(io: &mut dyn WizardIo, rpc: &dyn NodeRpc, interval: Duration) {
    wait_until(
        interval,
        || match rpc.wallet_info() {
            Ok(info) => match info.scanning {
                None => Some(()),
                Some(progress) => {
                    io.status(&format!("scan progress: {:.2}%", progress * 100.0));
                    None
                }
            },
            Err(_) => None,
        },
        |_| {},
    )
}

/// Wait for a UTXO to surface at `address`. RPC errors are transient here;
/// the next tick retries.
fn wait_for_utxo(
    io: &mut dyn WizardIo,
    rpc: &dyn NodeRpc,
    address: &str,
    status: &str,
) -> crate::state::Utxo {
    wait_until(
        UTXO_POLL,
        || rpc.list_utxos().ok().and_then(|utxos| utxos.get(address).cloned()),
        |glyph| io.status(&format!(" {glyph}  {status}")),
    )
}
