use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

use log::warn;

use crate::infra::rpc::{NodeRpc, RpcError, RpcHandle};
use crate::state::snapshot::{BlockSnapshot, UtxoSet};

/// Cooperative shutdown flag shared by a dashboard session's pollers.
/// Set once, never reset; a new session gets a fresh signal.
#[derive(Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        StopSignal::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Poll the wallet for unspent outputs and publish the full latest set each
/// tick. No incremental merging: an entry the node stops returning vanishes
/// from the next snapshot.
pub fn run_utxo_poller(rpc: RpcHandle, tx: Sender<UtxoSet>, stop: StopSignal, interval: Duration) {
    while !stop.is_stopped() {
        match rpc.list_utxos() {
            Ok(set) => {
                if tx.send(set).is_err() {
                    return;
                }
            }
            Err(err) => warn!("utxo poll failed: {err}"),
        }
        thread::sleep(interval);
    }
}

/// Watch the chain tip and publish the accumulated block history whenever a
/// new tip appears. History only grows; the renderer takes the last N.
pub fn run_block_poller(
    rpc: RpcHandle,
    tx: Sender<Vec<BlockSnapshot>>,
    stop: StopSignal,
    interval: Duration,
) {
    let mut history: Vec<BlockSnapshot> = Vec::new();
    let mut last_tip: Option<String> = None;

    while !stop.is_stopped() {
        match observe_tip(rpc.as_ref(), last_tip.as_deref()) {
            Ok(Some(snapshot)) => {
                last_tip = Some(snapshot.hash.clone());
                history.push(snapshot);
                if tx.send(history.clone()).is_err() {
                    return;
                }
            }
            Ok(None) => {}
            Err(err) => warn!("block poll failed: {err}"),
        }
        thread::sleep(interval);
    }
}

/// Fetch the current tip; `None` when it matches the last observed hash.
fn observe_tip(rpc: &dyn NodeRpc, last: Option<&str>) -> Result<Option<BlockSnapshot>, RpcError> {
    let hash = rpc.best_block_hash()?;
    if last == Some(hash.as_str()) {
        return Ok(None);
    }
    let stats = rpc.block_stats(&hash)?;
    Ok(Some(BlockSnapshot {
        hash,
        height: stats.height,
        seen_at: chrono::Local::now(),
        median_fee_rate: stats.median_fee_rate,
        subsidy: stats.subsidy,
        tx_count: stats.tx_count,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Instant;

    use super::*;
    use crate::infra::rpc::test_rpc::FakeRpc;
    use crate::state::{Amount, Utxo};

    fn utxo(addr: &str, sats: u64) -> (String, Utxo) {
        (
            addr.to_string(),
            Utxo { address: addr.to_string(), amount: Amount(sats), confirmations: 3, txid: format!("tx-{addr}") },
        )
    }

    #[test]
    fn utxo_snapshots_are_full_replacements() {
        let fake = Arc::new(FakeRpc::default());
        fake.push_utxos([utxo("a", 10), utxo("b", 20)].into());
        fake.push_utxos([utxo("b", 20)].into());

        let (tx, rx) = mpsc::channel();
        let stop = StopSignal::new();
        let handle = {
            let (rpc, stop) = (fake.clone() as RpcHandle, stop.clone());
            thread::spawn(move || run_utxo_poller(rpc, tx, stop, Duration::from_millis(1)))
        };

        let first = rx.recv().unwrap();
        let second = rx.recv().unwrap();
        stop.stop();
        handle.join().unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 1);
        // "a" was dropped by the node, so it is gone from the next snapshot.
        assert!(!second.contains_key("a"));
        assert!(second.contains_key("b"));
    }

    #[test]
    fn block_history_skips_repeated_tips() {
        let fake = Arc::new(FakeRpc::default());
        *fake.tips.lock().unwrap() = ["h1", "h1", "h2", "h2"].map(String::from).into();

        let (tx, rx) = mpsc::channel();
        let stop = StopSignal::new();
        let handle = {
            let (rpc, stop) = (fake.clone() as RpcHandle, stop.clone());
            thread::spawn(move || run_block_poller(rpc, tx, stop, Duration::from_millis(1)))
        };

        // First publish has one entry, second has two; lengths never shrink.
        let first = rx.recv().unwrap();
        let second = rx.recv().unwrap();
        stop.stop();
        handle.join().unwrap();

        assert_eq!(first.iter().map(|b| b.hash.as_str()).collect::<Vec<_>>(), ["h1"]);
        assert_eq!(second.iter().map(|b| b.hash.as_str()).collect::<Vec<_>>(), ["h1", "h2"]);
        for pair in second.windows(2) {
            assert_ne!(pair[0].hash, pair[1].hash);
        }
    }

    #[test]
    fn pollers_stop_within_one_interval() {
        let fake = Arc::new(FakeRpc::default());
        fake.push_utxos(UtxoSet::new());

        let (tx, _rx) = mpsc::channel();
        let stop = StopSignal::new();
        let interval = Duration::from_millis(20);
        let handle = {
            let (rpc, stop) = (fake.clone() as RpcHandle, stop.clone());
            thread::spawn(move || run_utxo_poller(rpc, tx, stop, interval))
        };

        stop.stop();
        let start = Instant::now();
        handle.join().unwrap();
        // One sleep interval plus slack for the in-flight (fake) call.
        assert!(start.elapsed() < interval * 5);
    }

    #[test]
    fn stop_signal_is_sticky() {
        let stop = StopSignal::new();
        assert!(!stop.is_stopped());
        stop.stop();
        assert!(stop.is_stopped());
        stop.stop();
        assert!(stop.is_stopped());
    }
}
