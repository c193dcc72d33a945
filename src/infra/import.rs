use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("no master fingerprint found in export")]
    MissingFingerprint,
    #[error("no account xpub found in export")]
    MissingXpub,
    #[error("malformed line: {0}")]
    Malformed(String),
}

/// Public wallet data lifted from the hardware wallet's summary export
/// (`public.txt`). Key material never appears here; this is enough to watch
/// addresses, not to spend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletExport {
    pub name: String,
    pub fingerprint: String,
    pub descriptor_base: String,
}

impl WalletExport {
    /// Receive (`0/*`) and change (`1/*`) descriptors, in that order.
    pub fn descriptors(&self) -> Vec<String> {
        vec![format!("{}/0/*)", self.descriptor_base), format!("{}/1/*)", self.descriptor_base)]
    }
}

/// Parse the summary dump the signing device writes to its SD card.
///
/// The file is line-oriented; we need the master fingerprint and the
/// BIP84 account xpub. Everything else is ignored.
pub fn parse_export(text: &str) -> Result<WalletExport, ImportError> {
    let mut fingerprint: Option<String> = None;
    let mut xpub: Option<String> = None;
    let mut in_bip84 = false;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.to_lowercase().strip_prefix("xfp:") {
            let fp = rest.trim().to_string();
            if fp.len() != 8 || !fp.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(ImportError::Malformed(line.to_string()));
            }
            fingerprint = Some(fp);
        }

        // Section headers look like "# Segwit (BIP-84)" or contain the path.
        if line.starts_with('#') {
            in_bip84 = line.contains("84");
            continue;
        }

        if in_bip84 && xpub.is_none() {
            let candidate = line.split_whitespace().last().unwrap_or_default();
            if candidate.starts_with("xpub") || candidate.starts_with("tpub") {
                xpub = Some(candidate.to_string());
            }
        }
    }

    let fingerprint = fingerprint.ok_or(ImportError::MissingFingerprint)?.to_lowercase();
    let xpub = xpub.ok_or(ImportError::MissingXpub)?;

    Ok(WalletExport {
        name: format!("coldwatch-{}", &fingerprint[..4]),
        descriptor_base: format!("wpkh([{fingerprint}/84h/0h/0h]{xpub}"),
        fingerprint,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = "\
# Coldcard Wallet Summary File
xfp: 0F056943

# Classic (BIP-44)
m/44h/0h/0h => xpub6BosfCnifzxcFwrSzQiqu2DBVTshkCXacvNsWGYJVVhhawA7d4R5WSWGFNbi8Aw6ZRc1brxMyWMzG3DSSSSoekkudhUd9yLb6qx39T9nMdj

# Segwit (BIP-84)
m/84h/0h/0h => xpub6CVKsQYXc9awxgV1tWbG4foDvdcnieK2JkbpPEBKB5WwAPKBZ1mstLbKVB4ov7QzxzjaxNK6EfmNY5Jsk2cG26EVcEkycGW4tchT2dyUhrx
";

    #[test]
    fn parses_fingerprint_and_bip84_xpub() {
        let export = parse_export(EXPORT).unwrap();
        assert_eq!(export.fingerprint, "0f056943");
        assert_eq!(export.name, "coldwatch-0f05");
        assert!(export.descriptor_base.starts_with("wpkh([0f056943/84h/0h/0h]xpub6CVKsQYXc9a"));
    }

    #[test]
    fn descriptors_cover_receive_and_change() {
        let export = parse_export(EXPORT).unwrap();
        let descs = export.descriptors();
        assert_eq!(descs.len(), 2);
        assert!(descs[0].contains("/0/*"));
        assert!(descs[1].contains("/1/*"));
    }

    #[test]
    fn missing_xpub_is_an_error() {
        let err = parse_export("xfp: 0F056943\n").unwrap_err();
        assert!(matches!(err, ImportError::MissingXpub));
    }

    #[test]
    fn missing_fingerprint_is_an_error() {
        let err = parse_export("# Segwit (BIP-84)\nm/84h/0h/0h => xpub6CVKsQ\n").unwrap_err();
        assert!(matches!(err, ImportError::MissingFingerprint));
    }

    #[test]
    fn garbage_fingerprint_is_malformed() {
        let err = parse_export("xfp: not-hex!\n").unwrap_err();
        assert!(matches!(err, ImportError::Malformed(_)));
    }
}
