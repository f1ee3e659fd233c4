use std::path::{Path, PathBuf};

use rsa::pkcs1::{DecodeRsaPublicKey, EncodeRsaPublicKey};
use rsa::RsaPublicKey;
use serde::{Deserialize, Serialize};

use crate::error::{LegacyError, Result};

/// One designated successor: a name for display and the path to their
/// PKCS#1-encoded RSA public key (PEM or raw DER, either is accepted).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Successor {
    pub name: String,
    pub public_key_path: PathBuf,
}

/// Protocol parameters, read once at startup and shared by generation and
/// integration so the two phases can never silently disagree on `n`, `k`,
/// the seed length or the KDF step count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub successors: Vec<Successor>,
    pub required_to_decrypt: usize,
    #[serde(default = "default_seed_size")]
    pub seed_size: usize,
    #[serde(default = "default_kdf_steps")]
    pub kdf_steps: usize,
}

fn default_seed_size() -> usize {
    256
}

fn default_kdf_steps() -> usize {
    100
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let cfg: Config = toml::from_str(&raw)
            .map_err(|e| LegacyError::Serialization(format!("invalid config: {e}")))?;
        Ok(cfg)
    }

    pub fn successor_count(&self) -> usize {
        self.successors.len()
    }

    /// Loads and DER-decodes every successor's public key, in configured order.
    pub fn load_public_keys(&self) -> Result<Vec<RsaPublicKey>> {
        self.successors
            .iter()
            .map(|s| load_public_key(&s.public_key_path))
            .collect()
    }
}

/// Reads a PKCS#1 RSA public key from a file, accepting either PEM or raw DER.
pub fn load_public_key(path: impl AsRef<Path>) -> Result<RsaPublicKey> {
    let bytes = std::fs::read(path.as_ref())?;
    if let Ok(s) = std::str::from_utf8(&bytes) {
        if let Ok(key) = RsaPublicKey::from_pkcs1_pem(s) {
            return Ok(key);
        }
    }
    RsaPublicKey::from_pkcs1_der(&bytes)
        .map_err(|e| LegacyError::Crypto(format!("invalid PKCS#1 public key: {e}")))
}

/// PKCS#1 DER encoding of a public key, used both as the on-wire `Share::public_key`
/// field and as the byte-equality key smartcards are matched against.
pub fn encode_public_key(key: &RsaPublicKey) -> Result<Vec<u8>> {
    key.to_pkcs1_der()
        .map(|doc| doc.as_bytes().to_vec())
        .map_err(|e| LegacyError::Crypto(format!("failed to encode public key: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let toml_src = r#"
            required_to_decrypt = 2

            [[successors]]
            name = "alice"
            public_key_path = "alice.pem"

            [[successors]]
            name = "bob"
            public_key_path = "bob.pem"
        "#;
        let cfg: Config = toml::from_str(toml_src).unwrap();
        assert_eq!(cfg.required_to_decrypt, 2);
        assert_eq!(cfg.successor_count(), 2);
        assert_eq!(cfg.seed_size, 256);
        assert_eq!(cfg.kdf_steps, 100);
    }
}
