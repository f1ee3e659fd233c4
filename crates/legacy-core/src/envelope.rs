//! AES-256-CFB payload/share encryption and RSA-PKCS#1v1.5 key wrapping.
//!
//! Grounded on `original_source/build/legacy.go`'s `generateLegacy` (the only
//! place the original wires AES-CFB and `rsa.EncryptPKCS1v15` together) and,
//! for the Rust side, the `rsa`/`aes`/`cfb-mode` usage confirmed against
//! `other_examples/` (TrustEdge-Labs-trustedge, TheCowboyAI-cim-keys). There
//! is deliberately no authentication tag here: see SPEC_FULL.md's envelope
//! section and the Non-goals in the glossary.

use aes::Aes256;
use base64::{engine::general_purpose, Engine as _};
use cfb_mode::{Decryptor, Encryptor};
use cipher::{AsyncStreamCipher, KeyIvInit};
use rand_core::{CryptoRng, RngCore};
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{LegacyError, Result};
use crate::node::Node;

pub const AES_KEY_LEN: usize = 32;
pub const IV_LEN: usize = 16;

type Aes256CfbEnc = Encryptor<Aes256>;
type Aes256CfbDec = Decryptor<Aes256>;

fn to_base64<S: Serializer>(bytes: &[u8], s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&general_purpose::STANDARD.encode(bytes))
}

fn from_base64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Vec<u8>, D::Error> {
    let s = String::deserialize(d)?;
    general_purpose::STANDARD
        .decode(s.as_bytes())
        .map_err(serde::de::Error::custom)
}

/// The on-disk/embedded record handed to one successor: their RSA-wrapped
/// AES key plus the AES-CFB-encrypted canonical JSON of their successor
/// tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Share {
    #[serde(serialize_with = "to_base64", deserialize_with = "from_base64")]
    pub public_key: Vec<u8>,
    #[serde(serialize_with = "to_base64", deserialize_with = "from_base64")]
    pub wrapped_aes_key: Vec<u8>,
    #[serde(serialize_with = "to_base64", deserialize_with = "from_base64")]
    pub iv: Vec<u8>,
    #[serde(serialize_with = "to_base64", deserialize_with = "from_base64")]
    pub ciphertext: Vec<u8>,
}

/// The payload envelope: the user's bequest, encrypted under the
/// seed-derived key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Data {
    #[serde(serialize_with = "to_base64", deserialize_with = "from_base64")]
    pub iv: Vec<u8>,
    #[serde(serialize_with = "to_base64", deserialize_with = "from_base64")]
    pub ciphertext: Vec<u8>,
}

fn cfb_encrypt(key: &[u8; AES_KEY_LEN], iv: &[u8; IV_LEN], plaintext: &[u8]) -> Vec<u8> {
    let mut buf = plaintext.to_vec();
    Aes256CfbEnc::new(key.into(), iv.into()).encrypt(&mut buf);
    buf
}

fn cfb_decrypt(key: &[u8; AES_KEY_LEN], iv: &[u8; IV_LEN], ciphertext: &[u8]) -> Vec<u8> {
    let mut buf = ciphertext.to_vec();
    Aes256CfbDec::new(key.into(), iv.into()).decrypt(&mut buf);
    buf
}

fn random_iv<R: RngCore + CryptoRng>(rng: &mut R) -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    rng.fill_bytes(&mut iv);
    iv
}

/// Encrypts the user payload under `key` (the seed-derived AES key).
pub fn seal_payload<R: RngCore + CryptoRng>(rng: &mut R, key: &[u8; AES_KEY_LEN], plaintext: &[u8]) -> Data {
    let iv = random_iv(rng);
    let ciphertext = cfb_encrypt(key, &iv, plaintext);
    Data {
        iv: iv.to_vec(),
        ciphertext,
    }
}

/// Decrypts a payload envelope with the seed-derived key.
pub fn open_payload(key: &[u8; AES_KEY_LEN], data: &Data) -> Result<Vec<u8>> {
    let iv: [u8; IV_LEN] = data
        .iv
        .as_slice()
        .try_into()
        .map_err(|_| LegacyError::Serialization("payload iv is not 16 bytes".into()))?;
    Ok(cfb_decrypt(key, &iv, &data.ciphertext))
}

/// Encrypts one successor's tree under a fresh AES key, then wraps that key
/// under the successor's RSA public key.
pub fn seal_share<R: RngCore + CryptoRng>(
    rng: &mut R,
    public_key: &RsaPublicKey,
    public_key_der: Vec<u8>,
    tree: &Node,
) -> Result<Share> {
    let plaintext = serde_json::to_vec(tree)
        .map_err(|e| LegacyError::Serialization(format!("encoding successor tree: {e}")))?;
    let mut part_key = [0u8; AES_KEY_LEN];
    rng.fill_bytes(&mut part_key);
    let iv = random_iv(rng);
    let ciphertext = cfb_encrypt(&part_key, &iv, &plaintext);
    let wrapped_aes_key = public_key
        .encrypt(rng, Pkcs1v15Encrypt, &part_key)
        .map_err(|e| LegacyError::Crypto(format!("RSA wrap of share key failed: {e}")))?;
    Ok(Share {
        public_key: public_key_der,
        wrapped_aes_key,
        iv: iv.to_vec(),
        ciphertext,
    })
}

/// Decrypts a share's successor tree, given the unwrapped AES key (obtained
/// by handing `share.wrapped_aes_key` to the matching smartcard).
pub fn open_share(share: &Share, part_key: &[u8; AES_KEY_LEN]) -> Result<Node> {
    let iv: [u8; IV_LEN] = share
        .iv
        .as_slice()
        .try_into()
        .map_err(|_| LegacyError::Serialization("share iv is not 16 bytes".into()))?;
    let plaintext = cfb_decrypt(part_key, &iv, &share.ciphertext);
    serde_json::from_slice(&plaintext)
        .map_err(|e| LegacyError::Serialization(format!("share ciphertext did not decode to a tree: {e}")))
}
