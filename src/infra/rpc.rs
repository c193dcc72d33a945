use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::state::{Amount, UtxoSet};

/// Errors surfaced by the node RPC collaborator.
///
/// `Timeout` is a distinguished condition: a timed-out call does not mean
/// the node gave up on the operation, so the long-running stages (UTXO
/// scan, rescan) decide per stage whether to keep waiting.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("rpc call timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("node error {code}: {message}")]
    Node { code: i64, message: String },
    #[error("unexpected response shape: {0}")]
    BadResponse(String),
}

#[derive(Debug, Clone, Copy)]
pub struct ChainInfo {
    pub blocks: u64,
    pub verification_progress: f64,
}

#[derive(Debug, Clone)]
pub struct NetworkInfo {
    pub subversion: String,
}

#[derive(Debug, Clone, Copy)]
pub struct BlockStats {
    pub height: u64,
    pub median_fee_rate: f64,
    pub subsidy: Amount,
    pub tx_count: u64,
}

/// Node-side scan progress as reported by `wallet_info`; `None` means no
/// scan is active.
#[derive(Debug, Clone, Copy)]
pub struct WalletInfo {
    pub scanning: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
pub struct ScanUnspent {
    pub amount: Amount,
    pub height: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub unspents: Vec<ScanUnspent>,
}

impl ScanResult {
    pub fn total(&self) -> Amount {
        self.unspents.iter().map(|u| u.amount).sum()
    }

    pub fn min_height(&self) -> Option<u64> {
        self.unspents.iter().map(|u| u.height).min()
    }
}

/// One descriptor registration request for the watch-only wallet.
#[derive(Debug, Clone, Serialize)]
pub struct DescriptorImport {
    pub desc: String,
    pub range: u32,
    pub internal: bool,
    pub timestamp: u64,
}

/// Narrow interface to the node. Wallet-scoped operations assume the handle
/// was created for a specific wallet (see `ConfigStore::rpc_for`).
pub trait NodeRpc: Send + Sync {
    /// `host:port` the handle talks to, for display only.
    fn endpoint(&self) -> String;

    fn chain_info(&self) -> Result<ChainInfo, RpcError>;
    fn network_info(&self) -> Result<NetworkInfo, RpcError>;
    fn best_block_hash(&self) -> Result<String, RpcError>;
    fn block_stats(&self, hash: &str) -> Result<BlockStats, RpcError>;
    fn create_wallet(&self, name: &str) -> Result<(), RpcError>;

    fn import_descriptors(&self, requests: &[DescriptorImport]) -> Result<(), RpcError>;
    fn scan_utxo_set(&self, descriptors: &[String]) -> Result<ScanResult, RpcError>;
    fn rescan(&self, from_height: u64) -> Result<(), RpcError>;
    fn new_address(&self) -> Result<String, RpcError>;
    fn wallet_info(&self) -> Result<WalletInfo, RpcError>;
    fn list_utxos(&self) -> Result<UtxoSet, RpcError>;

    /// Build an unsigned PSBT paying `amount` to `to`, spending from the
    /// wallet. Returns the base64 PSBT.
    fn create_funded_psbt(&self, to: &str, amount: Amount) -> Result<String, RpcError>;
    /// Extract the network-serialized hex from a fully signed PSBT.
    fn finalize_psbt(&self, psbt_base64: &str) -> Result<String, RpcError>;
    fn send_raw_transaction(&self, hex: &str) -> Result<String, RpcError>;
}

pub type RpcHandle = Arc<dyn NodeRpc>;

#[cfg(test)]
pub mod test_rpc {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Scriptable fake node: each queue feeds one RPC method; when a queue
    /// runs down to its last entry that entry is repeated forever.
    #[derive(Default)]
    pub struct FakeRpc {
        pub sync_progress: Mutex<VecDeque<f64>>,
        pub tips: Mutex<VecDeque<String>>,
        pub utxo_batches: Mutex<VecDeque<UtxoSet>>,
        pub scan_responses: Mutex<VecDeque<Result<ScanResult, RpcError>>>,
        pub scanning: Mutex<VecDeque<Option<f64>>>,
        pub addresses: Mutex<VecDeque<String>>,
        pub chain_info_calls: AtomicUsize,
        pub list_utxo_calls: AtomicUsize,
        pub scan_calls: AtomicUsize,
        pub rescan_heights: Mutex<Vec<u64>>,
        pub broadcasts: Mutex<Vec<String>>,
        pub created_wallets: Mutex<Vec<String>>,
        pub imported: Mutex<Vec<DescriptorImport>>,
    }

    fn next_or_last<T: Clone>(q: &Mutex<VecDeque<T>>) -> Option<T> {
        let mut q = q.lock().unwrap();
        if q.len() > 1 { q.pop_front() } else { q.front().cloned() }
    }

    impl FakeRpc {
        pub fn with_sync_progress(progress: &[f64]) -> Self {
            let fake = FakeRpc::default();
            *fake.sync_progress.lock().unwrap() = progress.iter().copied().collect();
            fake
        }

        pub fn push_utxos(&self, set: UtxoSet) {
            self.utxo_batches.lock().unwrap().push_back(set);
        }
    }

    impl NodeRpc for FakeRpc {
        fn endpoint(&self) -> String {
            "fake:0".into()
        }

        fn chain_info(&self) -> Result<ChainInfo, RpcError> {
            self.chain_info_calls.fetch_add(1, Ordering::SeqCst);
            let progress = next_or_last(&self.sync_progress).unwrap_or(1.0);
            Ok(ChainInfo { blocks: 100, verification_progress: progress })
        }

        fn network_info(&self) -> Result<NetworkInfo, RpcError> {
            Ok(NetworkInfo { subversion: "/FakeNode:0.1/".into() })
        }

        fn best_block_hash(&self) -> Result<String, RpcError> {
            next_or_last(&self.tips).ok_or(RpcError::Transport("no tip scripted".into()))
        }

        fn block_stats(&self, hash: &str) -> Result<BlockStats, RpcError> {
            // Height derived from the hash so tests can tell entries apart.
            let height = hash.bytes().map(u64::from).sum();
            Ok(BlockStats { height, median_fee_rate: 12.0, subsidy: Amount(312_500_000), tx_count: 1_000 })
        }

        fn create_wallet(&self, name: &str) -> Result<(), RpcError> {
            self.created_wallets.lock().unwrap().push(name.to_string());
            Ok(())
        }

        fn import_descriptors(&self, requests: &[DescriptorImport]) -> Result<(), RpcError> {
            self.imported.lock().unwrap().extend(requests.iter().cloned());
            Ok(())
        }

        fn scan_utxo_set(&self, _descriptors: &[String]) -> Result<ScanResult, RpcError> {
            self.scan_calls.fetch_add(1, Ordering::SeqCst);
            self.scan_responses.lock().unwrap().pop_front().unwrap_or(Ok(ScanResult::default()))
        }

        fn rescan(&self, from_height: u64) -> Result<(), RpcError> {
            self.rescan_heights.lock().unwrap().push(from_height);
            Ok(())
        }

        fn new_address(&self) -> Result<String, RpcError> {
            next_or_last(&self.addresses).ok_or(RpcError::Transport("no address scripted".into()))
        }

        fn wallet_info(&self) -> Result<WalletInfo, RpcError> {
            Ok(WalletInfo { scanning: next_or_last(&self.scanning).flatten() })
        }

        fn list_utxos(&self) -> Result<UtxoSet, RpcError> {
            self.list_utxo_calls.fetch_add(1, Ordering::SeqCst);
            Ok(next_or_last(&self.utxo_batches).unwrap_or_default())
        }

        fn create_funded_psbt(&self, _to: &str, _amount: Amount) -> Result<String, RpcError> {
            Ok("cHNidP8=".into())
        }

        fn finalize_psbt(&self, _psbt_base64: &str) -> Result<String, RpcError> {
            Ok("0200deadbeef".into())
        }

        fn send_raw_transaction(&self, hex: &str) -> Result<String, RpcError> {
            self.broadcasts.lock().unwrap().push(hex.to_string());
            Ok("txid0".into())
        }
    }
}
