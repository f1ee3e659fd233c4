//! Smartcard abstraction.
//!
//! Grounded on `original_source/yubi/yubikey.go`'s `findSuccessor` (matching
//! a card to a share by public-key byte equality) and on the smartcard adapter section of SPEC_FULL.md.
//! The PKCS#11/PIV driver that talks to real hardware is explicitly out of
//! scope; this module ships the trait boundary plus a deterministic
//! in-memory adapter backed by RSA private keys already held off-card.

use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};

use crate::config::encode_public_key;
use crate::error::{LegacyError, Result};

/// A single presented card: an RSA keypair capable of unwrapping a share's
/// AES key once the correct PIN is supplied.
pub trait Card {
    /// PKCS#1 DER-encoded public key, used to match this card against a
    /// `Share::public_key`.
    fn public_key(&self) -> &RsaPublicKey;

    /// RSA-PKCS1v1.5-decrypts `wrapped`, the AES key embedded in a share,
    /// after verifying `pin`.
    fn decrypt(&self, wrapped: &[u8], pin: &str) -> Result<Vec<u8>>;

    /// Name shown to the operator when reporting skips and applications.
    fn subject_name(&self) -> &str;
}

/// A source of presentable cards, enumerated once per integration attempt.
pub trait CardPool {
    fn enumerate(&self) -> Result<Vec<Box<dyn Card>>>;
}

/// An in-memory card backed directly by an RSA private key and a fixed PIN.
/// Used by tests, and by any caller that already holds key material off a
/// physical token (a software fallback), per that section.
pub struct SoftwareCard {
    name: String,
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
    pin: String,
}

impl SoftwareCard {
    pub fn new(name: impl Into<String>, private_key: RsaPrivateKey, pin: impl Into<String>) -> Self {
        let public_key = RsaPublicKey::from(&private_key);
        SoftwareCard {
            name: name.into(),
            private_key,
            public_key,
            pin: pin.into(),
        }
    }
}

impl Card for SoftwareCard {
    fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    fn decrypt(&self, wrapped: &[u8], pin: &str) -> Result<Vec<u8>> {
        if pin != self.pin {
            return Err(LegacyError::Crypto("incorrect PIN".into()));
        }
        self.private_key
            .decrypt(Pkcs1v15Encrypt, wrapped)
            .map_err(|e| LegacyError::Crypto(format!("card decrypt failed: {e}")))
    }

    fn subject_name(&self) -> &str {
        &self.name
    }
}

/// A fixed collection of [`SoftwareCard`]s, standing in for a real
/// PKCS#11/PIV pool during tests and software-only deployments.
pub struct SoftwareCardPool {
    cards: Vec<SoftwareCard>,
}

impl SoftwareCardPool {
    pub fn new(cards: Vec<SoftwareCard>) -> Self {
        SoftwareCardPool { cards }
    }
}

impl CardPool for SoftwareCardPool {
    fn enumerate(&self) -> Result<Vec<Box<dyn Card>>> {
        let mut out: Vec<Box<dyn Card>> = Vec::with_capacity(self.cards.len());
        for card in &self.cards {
            let private_key = card.private_key.clone();
            let boxed = SoftwareCard {
                name: card.name.clone(),
                private_key,
                public_key: card.public_key.clone(),
                pin: card.pin.clone(),
            };
            out.push(Box::new(boxed));
        }
        Ok(out)
    }
}

/// Byte-equality match between a card's public key and a share's embedded
/// public key, per `findSuccessor`.
pub fn matches(card: &dyn Card, share_public_key: &[u8]) -> Result<bool> {
    let encoded = encode_public_key(card.public_key())?;
    Ok(encoded == share_public_key)
}
