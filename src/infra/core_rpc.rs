use std::time::Duration;

use log::{debug, info};
use reqwest::Url;
use reqwest::blocking::Client;
use serde_json::{Value, json};

use crate::infra::rpc::{
    BlockStats, ChainInfo, DescriptorImport, NetworkInfo, NodeRpc, RpcError, ScanResult,
    ScanUnspent, WalletInfo,
};
use crate::state::{Amount, Utxo, UtxoSet};

/// Socket read timeout for ordinary calls. Scan and rescan go through a
/// second client with no read timeout: Core rejects a reissued scan while
/// one is still running, so those calls must be allowed to block for their
/// full duration.
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Well-known local endpoints probed during discovery: mainnet, testnet,
/// regtest.
const DEFAULT_URLS: [&str; 3] =
    ["http://127.0.0.1:8332", "http://127.0.0.1:18332", "http://127.0.0.1:18443"];

/// Blocking JSON-RPC 1.0 client against a local Bitcoin Core node.
///
/// Wallet-scoped handles share the base URL with a `/wallet/<name>` path.
pub struct CoreRpc {
    client: Client,
    slow_client: Client,
    url: Url,
    auth: Option<(String, String)>,
    wallet: Option<String>,
}

impl CoreRpc {
    pub fn connect(url: &str, wallet: Option<&str>) -> Result<CoreRpc, RpcError> {
        let mut url = Url::parse(url).map_err(|e| RpcError::Transport(e.to_string()))?;

        // Credentials may ride in the URL; otherwise fall back to the
        // node's cookie file.
        let auth = if url.username().is_empty() {
            cookie_auth()
        } else {
            let user = url.username().to_string();
            let pass = url.password().unwrap_or_default().to_string();
            let _ = url.set_username("");
            let _ = url.set_password(None);
            Some((user, pass))
        };

        let client = Client::builder()
            .timeout(READ_TIMEOUT)
            .build()
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        // Untimed client for the multi-minute scan and rescan calls.
        let slow_client = Client::builder()
            .connect_timeout(READ_TIMEOUT)
            .build()
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        Ok(CoreRpc { client, slow_client, url, auth, wallet: wallet.map(str::to_string) })
    }

    /// Probe the configured URL first, then the default local ports, and
    /// return the first endpoint that answers a chain-info call.
    pub fn discover(configured: Option<&str>) -> Option<CoreRpc> {
        let candidates =
            configured.into_iter().chain(DEFAULT_URLS).map(str::to_string).collect::<Vec<_>>();
        for url in candidates {
            if let Ok(rpc) = CoreRpc::connect(&url, None)
                && rpc.chain_info().is_ok()
            {
                info!("discovered node at {}", rpc.endpoint());
                return Some(rpc);
            }
        }
        None
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        self.call_with(&self.client, method, params)
    }

    fn call_slow(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        self.call_with(&self.slow_client, method, params)
    }

    fn call_with(&self, client: &Client, method: &str, params: Value) -> Result<Value, RpcError> {
        let mut url = self.url.clone();
        if let Some(wallet) = &self.wallet {
            url.set_path(&format!("/wallet/{wallet}"));
        }

        debug!("rpc {} {}", method, self.endpoint());
        let mut request = client
            .post(url)
            .json(&json!({ "jsonrpc": "1.0", "id": "coldwatch", "method": method, "params": params }));
        if let Some((user, pass)) = &self.auth {
            request = request.basic_auth(user, Some(pass));
        }

        let response = request.send().map_err(|e| {
            if e.is_timeout() { RpcError::Timeout } else { RpcError::Transport(e.to_string()) }
        })?;
        let body: Value = response.json().map_err(|e| {
            if e.is_timeout() { RpcError::Timeout } else { RpcError::BadResponse(e.to_string()) }
        })?;

        if let Some(err) = body.get("error").filter(|e| !e.is_null()) {
            return Err(RpcError::Node {
                code: err.get("code").and_then(Value::as_i64).unwrap_or(0),
                message: err.get("message").and_then(Value::as_str).unwrap_or("unknown").to_string(),
            });
        }
        body.get("result").cloned().ok_or_else(|| RpcError::BadResponse("missing result".into()))
    }
}

/// Read `user:pass` from the node's cookie file, if present.
fn cookie_auth() -> Option<(String, String)> {
    let home = std::env::var_os("HOME")?;
    let cookie = std::path::Path::new(&home).join(".bitcoin").join(".cookie");
    let contents = std::fs::read_to_string(cookie).ok()?;
    let (user, pass) = contents.trim().split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

fn field<'a>(value: &'a Value, name: &str) -> Result<&'a Value, RpcError> {
    value.get(name).ok_or_else(|| RpcError::BadResponse(format!("missing field {name}")))
}

fn u64_field(value: &Value, name: &str) -> Result<u64, RpcError> {
    field(value, name)?
        .as_u64()
        .ok_or_else(|| RpcError::BadResponse(format!("field {name} is not an integer")))
}

fn f64_field(value: &Value, name: &str) -> Result<f64, RpcError> {
    field(value, name)?
        .as_f64()
        .ok_or_else(|| RpcError::BadResponse(format!("field {name} is not a number")))
}

fn str_field<'a>(value: &'a Value, name: &str) -> Result<&'a str, RpcError> {
    field(value, name)?
        .as_str()
        .ok_or_else(|| RpcError::BadResponse(format!("field {name} is not a string")))
}

impl NodeRpc for CoreRpc {
    fn endpoint(&self) -> String {
        let host = self.url.host_str().unwrap_or("?");
        match self.url.port_or_known_default() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    fn chain_info(&self) -> Result<ChainInfo, RpcError> {
        let v = self.call("getblockchaininfo", json!([]))?;
        Ok(ChainInfo {
            blocks: u64_field(&v, "blocks")?,
            verification_progress: f64_field(&v, "verificationprogress")?,
        })
    }

    fn network_info(&self) -> Result<NetworkInfo, RpcError> {
        let v = self.call("getnetworkinfo", json!([]))?;
        Ok(NetworkInfo { subversion: str_field(&v, "subversion")?.trim_matches('/').to_string() })
    }

    fn best_block_hash(&self) -> Result<String, RpcError> {
        let v = self.call("getbestblockhash", json!([]))?;
        v.as_str().map(str::to_string).ok_or_else(|| RpcError::BadResponse("hash not a string".into()))
    }

    fn block_stats(&self, hash: &str) -> Result<BlockStats, RpcError> {
        let v = self.call("getblockstats", json!([hash]))?;
        // feerate_percentiles is [10th, 25th, 50th, 75th, 90th]; take the median.
        let median_fee_rate = field(&v, "feerate_percentiles")?
            .get(2)
            .and_then(Value::as_f64)
            .ok_or_else(|| RpcError::BadResponse("missing median feerate".into()))?;
        Ok(BlockStats {
            height: u64_field(&v, "height")?,
            median_fee_rate,
            subsidy: Amount(u64_field(&v, "subsidy")?),
            tx_count: u64_field(&v, "txs")?,
        })
    }

    fn create_wallet(&self, name: &str) -> Result<(), RpcError> {
        // disable_private_keys=true, blank=true: watch-only shell the
        // descriptors get imported into.
        self.call("createwallet", json!([name, true, true]))?;
        Ok(())
    }

    fn import_descriptors(&self, requests: &[DescriptorImport]) -> Result<(), RpcError> {
        let reqs: Vec<Value> = requests
            .iter()
            .map(|r| {
                json!({
                    "desc": r.desc,
                    "range": r.range,
                    "internal": r.internal,
                    "timestamp": r.timestamp,
                    "watchonly": true,
                    "keypool": false,
                })
            })
            .collect();
        let v = self.call("importdescriptors", json!([reqs]))?;
        for entry in v.as_array().into_iter().flatten() {
            if entry.get("success").and_then(Value::as_bool) != Some(true) {
                return Err(RpcError::BadResponse(format!("descriptor import rejected: {entry}")));
            }
        }
        Ok(())
    }

    fn scan_utxo_set(&self, descriptors: &[String]) -> Result<ScanResult, RpcError> {
        let objects: Vec<Value> =
            descriptors.iter().map(|d| json!({ "desc": d, "range": 1000 })).collect();
        let v = self.call_slow("scantxoutset", json!(["start", objects]))?;
        let unspents = field(&v, "unspents")?
            .as_array()
            .ok_or_else(|| RpcError::BadResponse("unspents is not an array".into()))?
            .iter()
            .map(|u| {
                Ok(ScanUnspent {
                    amount: Amount::from_btc(f64_field(u, "amount")?),
                    height: u64_field(u, "height")?,
                })
            })
            .collect::<Result<Vec<_>, RpcError>>()?;
        Ok(ScanResult { unspents })
    }

    fn rescan(&self, from_height: u64) -> Result<(), RpcError> {
        self.call_slow("rescanblockchain", json!([from_height]))?;
        Ok(())
    }

    fn new_address(&self) -> Result<String, RpcError> {
        let v = self.call("getnewaddress", json!([]))?;
        v.as_str().map(str::to_string).ok_or_else(|| RpcError::BadResponse("address not a string".into()))
    }

    fn wallet_info(&self) -> Result<WalletInfo, RpcError> {
        let v = self.call("getwalletinfo", json!([]))?;
        // "scanning" is `false` when idle, or an object with progress.
        let scanning = match field(&v, "scanning")? {
            Value::Bool(_) => None,
            obj => obj.get("progress").and_then(Value::as_f64),
        };
        Ok(WalletInfo { scanning })
    }

    fn list_utxos(&self) -> Result<UtxoSet, RpcError> {
        let v = self.call("listunspent", json!([0]))?;
        let mut set = UtxoSet::new();
        for entry in v.as_array().into_iter().flatten() {
            let Ok(address) = str_field(entry, "address") else { continue };
            set.insert(
                address.to_string(),
                Utxo {
                    address: address.to_string(),
                    amount: Amount::from_btc(f64_field(entry, "amount")?),
                    confirmations: u64_field(entry, "confirmations")?,
                    txid: str_field(entry, "txid")?.to_string(),
                },
            );
        }
        Ok(set)
    }

    fn create_funded_psbt(&self, to: &str, amount: Amount) -> Result<String, RpcError> {
        let btc = amount.sats() as f64 / crate::state::snapshot::SATS_PER_BTC as f64;
        let mut output = serde_json::Map::new();
        output.insert(to.to_string(), json!(btc));
        let v = self.call("walletcreatefundedpsbt", json!([[], [output]]))?;
        Ok(str_field(&v, "psbt")?.to_string())
    }

    fn finalize_psbt(&self, psbt_base64: &str) -> Result<String, RpcError> {
        let v = self.call("finalizepsbt", json!([psbt_base64]))?;
        if field(&v, "complete")?.as_bool() != Some(true) {
            return Err(RpcError::BadResponse("psbt is not fully signed".into()));
        }
        Ok(str_field(&v, "hex")?.to_string())
    }

    fn send_raw_transaction(&self, hex: &str) -> Result<String, RpcError> {
        let v = self.call("sendrawtransaction", json!([hex]))?;
        v.as_str().map(str::to_string).ok_or_else(|| RpcError::BadResponse("txid not a string".into()))
    }
}
