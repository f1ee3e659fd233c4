pub mod analytics;
pub mod card;
pub mod config;
pub mod envelope;
pub mod error;
pub mod integrate;
pub mod kdf;
pub mod node;
pub mod tree;

pub use analytics::{analyze, AnalyticsReport};
pub use card::{Card, CardPool, SoftwareCard, SoftwareCardPool};
pub use config::{Config, Successor};
pub use envelope::{Data, Share};
pub use error::{LegacyError, Result};
pub use node::Node;

use std::collections::HashSet;

use rand_core::{CryptoRng, RngCore};
use secrecy::ExposeSecret;
use zeroize::Zeroize;

/// Output of a generation run: the payload envelope and one share per
/// successor, index-aligned with `Config::successors`.
pub struct GenerationOutput {
    pub data: Data,
    pub shares: Vec<Share>,
}

/// Runs generation end to end: validates parameters, draws a fresh seed,
/// builds the master tree, derives the payload key, and produces the
/// payload envelope plus one RSA-wrapped share per successor.
pub fn generate<R: RngCore + CryptoRng>(
    config: &Config,
    payload: &[u8],
    rng: &mut R,
) -> Result<GenerationOutput> {
    analytics::analyze(config.successor_count(), config.required_to_decrypt, config.seed_size)?;

    let mut seed = vec![0u8; config.seed_size];
    rng.fill_bytes(&mut seed);

    let master = tree::build_master(&seed, config.successor_count(), config.required_to_decrypt);
    let key = kdf::build_private_key(&seed, config.kdf_steps)?;
    let data = envelope::seal_payload(rng, key.expose_secret(), payload);

    let public_keys = config.load_public_keys()?;
    let mut shares = Vec::with_capacity(public_keys.len());
    for (i, public_key) in public_keys.iter().enumerate() {
        let successor_tree = tree::project(&master, i);
        let der = config::encode_public_key(public_key)?;
        shares.push(envelope::seal_share(rng, public_key, der, &successor_tree)?);
    }

    seed.zeroize();
    Ok(GenerationOutput { data, shares })
}

/// Accumulates successor shares presented one card at a time, per the integration and
/// smartcard sections. Tracks applied cards by the blake3 fingerprint of their public key
/// so the same card cannot be counted twice.
pub struct IntegrationEngine {
    acc: Node,
    n: usize,
    required_to_decrypt: usize,
    seed_size: usize,
    applied: HashSet<blake3::Hash>,
}

impl IntegrationEngine {
    pub fn new(config: &Config) -> Self {
        IntegrationEngine {
            acc: Node::Empty,
            n: config.successor_count(),
            required_to_decrypt: config.required_to_decrypt,
            seed_size: config.seed_size,
            applied: HashSet::new(),
        }
    }

    /// Seed bytes known so far.
    pub fn progress(&self) -> usize {
        integrate::progress(&self.acc)
    }

    pub fn is_complete(&self) -> bool {
        self.progress() >= self.seed_size
    }

    /// Presents one card against the known shares: matches its public key
    /// byte-for-byte against `shares`, unwraps the AES key, decrypts and
    /// merges the successor tree. Returns the new progress.
    ///
    /// Returns [`LegacyError::UnrecognizedCard`] if no share matches this
    /// card, or [`LegacyError::DuplicateCard`] if this card's share was
    /// already applied — both recoverable: the caller should skip and try
    /// the next card.
    pub fn present_card(&mut self, card: &dyn Card, pin: &str, shares: &[Share]) -> Result<usize> {
        let card_public_key_der = config::encode_public_key(card.public_key())?;
        let fingerprint = blake3::hash(&card_public_key_der);
        if self.applied.contains(&fingerprint) {
            return Err(LegacyError::DuplicateCard);
        }
        let share = shares
            .iter()
            .find(|s| s.public_key == card_public_key_der)
            .ok_or(LegacyError::UnrecognizedCard)?;

        let wrapped_key = card.decrypt(&share.wrapped_aes_key, pin)?;
        let key: [u8; envelope::AES_KEY_LEN] = wrapped_key
            .try_into()
            .map_err(|_| LegacyError::Crypto("unwrapped AES key has unexpected length".into()))?;
        let successor_tree = envelope::open_share(share, &key)?;

        integrate::integrate(&mut self.acc, &successor_tree);
        integrate::fill(&mut self.acc, self.n, &mut Vec::new());
        self.applied.insert(fingerprint);
        Ok(self.progress())
    }

    /// Returns the fully reconstructed seed, or a [`LegacyError::Quorum`]
    /// error reporting how many successors and bytes are still missing.
    pub fn seed(&self) -> Result<&[u8]> {
        self.acc.data().ok_or_else(|| LegacyError::Quorum {
            present: self.applied.len(),
            required: self.required_to_decrypt,
            missing_bytes: self.seed_size - self.progress(),
        })
    }
}

/// Reconstructs the user payload from a completed [`IntegrationEngine`] and
/// the payload envelope, re-deriving the AES key from the recovered seed.
pub fn recover_payload(engine: &IntegrationEngine, kdf_steps: usize, data: &Data) -> Result<Vec<u8>> {
    let seed = engine.seed()?;
    let key = kdf::build_private_key(seed, kdf_steps)?;
    envelope::open_payload(key.expose_secret(), data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;
    use rsa::RsaPrivateKey;
    use std::io::Write;

    fn write_pem(path: &std::path::Path, key: &rsa::RsaPublicKey) {
        use rsa::pkcs1::EncodeRsaPublicKey;
        let pem = key.to_pkcs1_pem(rsa::pkcs1::LineEnding::LF).unwrap();
        let mut f = std::fs::File::create(path).unwrap();
        f.write_all(pem.as_bytes()).unwrap();
    }

    #[test]
    fn end_to_end_round_trip_with_a_quorum_of_two_of_three() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = OsRng;

        let keys: Vec<RsaPrivateKey> = (0..3)
            .map(|_| RsaPrivateKey::new(&mut rng, 2048).unwrap())
            .collect();
        let mut successors = Vec::new();
        for (i, k) in keys.iter().enumerate() {
            let path = dir.path().join(format!("{i}.pem"));
            write_pem(&path, &rsa::RsaPublicKey::from(k));
            successors.push(Successor {
                name: format!("successor-{i}"),
                public_key_path: path,
            });
        }

        let config = Config {
            successors,
            required_to_decrypt: 2,
            seed_size: 90,
            kdf_steps: 1,
        };

        let payload = b"the house goes to whoever reads this";
        let output = generate(&config, payload, &mut rng).unwrap();

        let cards: Vec<SoftwareCard> = keys
            .into_iter()
            .enumerate()
            .map(|(i, k)| SoftwareCard::new(format!("successor-{i}"), k, "0000"))
            .collect();

        let mut engine = IntegrationEngine::new(&config);
        for card in cards.iter().take(2) {
            engine.present_card(card, "0000", &output.shares).unwrap();
        }
        assert!(engine.is_complete());

        let recovered = recover_payload(&engine, config.kdf_steps, &output.data).unwrap();
        assert_eq!(recovered, payload);
    }

    #[test]
    fn insufficient_quorum_fails_to_recover() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = OsRng;

        let keys: Vec<RsaPrivateKey> = (0..3)
            .map(|_| RsaPrivateKey::new(&mut rng, 2048).unwrap())
            .collect();
        let mut successors = Vec::new();
        for (i, k) in keys.iter().enumerate() {
            let path = dir.path().join(format!("{i}.pem"));
            write_pem(&path, &rsa::RsaPublicKey::from(k));
            successors.push(Successor {
                name: format!("successor-{i}"),
                public_key_path: path,
            });
        }
        let config = Config {
            successors,
            required_to_decrypt: 2,
            seed_size: 90,
            kdf_steps: 1,
        };

        let payload = b"not enough signatures yet";
        let output = generate(&config, payload, &mut rng).unwrap();
        let card = SoftwareCard::new("successor-0", keys.into_iter().next().unwrap(), "0000");

        let mut engine = IntegrationEngine::new(&config);
        engine.present_card(&card, "0000", &output.shares).unwrap();
        assert!(!engine.is_complete());
        assert!(matches!(engine.seed(), Err(LegacyError::Quorum { .. })));
    }

    #[test]
    fn duplicate_card_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = OsRng;
        let keys: Vec<RsaPrivateKey> = (0..3)
            .map(|_| RsaPrivateKey::new(&mut rng, 2048).unwrap())
            .collect();
        let mut successors = Vec::new();
        for (i, k) in keys.iter().enumerate() {
            let path = dir.path().join(format!("{i}.pem"));
            write_pem(&path, &rsa::RsaPublicKey::from(k));
            successors.push(Successor {
                name: format!("successor-{i}"),
                public_key_path: path,
            });
        }
        let config = Config {
            successors,
            required_to_decrypt: 2,
            seed_size: 90,
            kdf_steps: 1,
        };
        let output = generate(&config, b"payload", &mut rng).unwrap();
        let card = SoftwareCard::new("successor-0", keys.into_iter().next().unwrap(), "0000");

        let mut engine = IntegrationEngine::new(&config);
        engine.present_card(&card, "0000", &output.shares).unwrap();
        let result = engine.present_card(&card, "0000", &output.shares);
        assert!(matches!(result, Err(LegacyError::DuplicateCard)));
    }
}
