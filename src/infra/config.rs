use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infra::core_rpc::CoreRpc;
use crate::infra::import::WalletExport;
use crate::infra::rpc::{DescriptorImport, RpcError, RpcHandle};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One watched wallet as persisted on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletConfig {
    pub name: String,
    pub descriptor_base: String,
    pub descriptors: Vec<String>,
}

impl WalletConfig {
    /// Descriptor registration requests for the node; the second descriptor
    /// is the change chain.
    pub fn import_args(&self) -> Vec<DescriptorImport> {
        self.descriptors
            .iter()
            .enumerate()
            .map(|(i, desc)| DescriptorImport {
                desc: desc.clone(),
                range: 1000,
                internal: i == 1,
                timestamp: 0,
            })
            .collect()
    }
}

impl From<&WalletExport> for WalletConfig {
    fn from(export: &WalletExport) -> Self {
        WalletConfig {
            name: export.name.clone(),
            descriptor_base: export.descriptor_base.clone(),
            descriptors: export.descriptors(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct ConfigFile {
    rpc_url: Option<String>,
    wallets: Vec<WalletConfig>,
    /// User's GPG preference collected at bootstrap. The wrapping itself is
    /// the keyring's concern; the store only records the choice.
    #[serde(default)]
    encrypted: bool,
}

/// On-disk configuration plus the path it came from (kept for display).
pub struct ConfigStore {
    file: ConfigFile,
    loaded_from: PathBuf,
}

impl ConfigStore {
    /// Load an existing config; `Ok(None)` when the file does not exist.
    pub fn load(path: &Path) -> Result<Option<ConfigStore>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)?;
        let file: ConfigFile = serde_json::from_str(&contents)?;
        Ok(Some(ConfigStore { file, loaded_from: path.to_path_buf() }))
    }

    /// Create a fresh config at `path` and write it immediately.
    pub fn create(
        path: &Path,
        rpc_url: Option<String>,
        encrypted: bool,
    ) -> Result<ConfigStore, ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let store = ConfigStore {
            file: ConfigFile { rpc_url, wallets: Vec::new(), encrypted },
            loaded_from: path.to_path_buf(),
        };
        store.write()?;
        Ok(store)
    }

    pub fn write(&self) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(&self.file)?;
        fs::write(&self.loaded_from, contents)?;
        Ok(())
    }

    pub fn add_wallet(&mut self, wallet: WalletConfig) {
        self.file.wallets.retain(|w| w.name != wallet.name);
        self.file.wallets.push(wallet);
    }

    pub fn wallets(&self) -> &[WalletConfig] {
        &self.file.wallets
    }

    pub fn rpc_url(&self) -> Option<&str> {
        self.file.rpc_url.as_deref()
    }

    pub fn encrypted(&self) -> bool {
        self.file.encrypted
    }

    pub fn loaded_from(&self) -> &Path {
        &self.loaded_from
    }

    /// An RPC handle against the configured node, optionally scoped to one
    /// wallet. Each caller gets its own handle; handles are never shared
    /// mutably across threads.
    pub fn rpc_for(&self, wallet: Option<&WalletConfig>) -> Result<RpcHandle, RpcError> {
        let url = self.file.rpc_url.as_deref().unwrap_or("http://127.0.0.1:8332");
        let rpc = CoreRpc::connect(url, wallet.map(|w| w.name.as_str()))?;
        Ok(Arc::new(rpc))
    }
}

/// Default config location: `$COLDWATCH_CONFIG`, else
/// `~/.config/coldwatch/config.json`, else a file in the working directory.
pub fn default_path() -> PathBuf {
    if let Some(path) = std::env::var_os("COLDWATCH_CONFIG") {
        return PathBuf::from(path);
    }
    match std::env::var_os("HOME") {
        Some(home) => Path::new(&home).join(".config").join("coldwatch").join("config.json"),
        None => PathBuf::from("coldwatch-config.json"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn export() -> WalletExport {
        WalletExport {
            name: "coldwatch-0f05".into(),
            fingerprint: "0f056943".into(),
            descriptor_base: "wpkh([0f056943/84h/0h/0h]xpub6CVKsQ".into(),
        }
    }

    #[test]
    fn load_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::load(&dir.path().join("config.json")).unwrap();
        assert!(store.is_none());
    }

    #[test]
    fn create_write_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut store =
            ConfigStore::create(&path, Some("http://127.0.0.1:18443".into()), false).unwrap();
        store.add_wallet(WalletConfig::from(&export()));
        store.write().unwrap();

        let loaded = ConfigStore::load(&path).unwrap().unwrap();
        assert_eq!(loaded.rpc_url(), Some("http://127.0.0.1:18443"));
        assert_eq!(loaded.wallets().len(), 1);
        assert_eq!(loaded.wallets()[0].name, "coldwatch-0f05");
        assert_eq!(loaded.loaded_from(), path);
    }

    #[test]
    fn encryption_preference_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json.gpg");
        ConfigStore::create(&path, None, true).unwrap();
        let loaded = ConfigStore::load(&path).unwrap().unwrap();
        assert!(loaded.encrypted());
    }

    #[test]
    fn import_args_mark_change_as_internal() {
        let wallet = WalletConfig::from(&export());
        let args = wallet.import_args();
        assert_eq!(args.len(), 2);
        assert!(!args[0].internal);
        assert!(args[1].internal);
        assert!(args.iter().all(|a| a.timestamp == 0));
    }

    #[test]
    fn add_wallet_replaces_same_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ConfigStore::create(&dir.path().join("c.json"), None, false).unwrap();

        let mut wallet = WalletConfig::from(&export());
        store.add_wallet(wallet.clone());
        wallet.descriptor_base = "wpkh([0f056943/84h/0h/1h]xpub6D".into();
        store.add_wallet(wallet.clone());

        assert_eq!(store.wallets().len(), 1);
        assert_eq!(store.wallets()[0].descriptor_base, wallet.descriptor_base);
    }
}
