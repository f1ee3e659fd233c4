//! Seed-to-key derivation.
//!
//! Grounded on `original_source/secrets/secrets.go`'s `buildPrivateKey` and
//! the duplicate `util/key.go::BuildPrivateKey`: a deliberately slow,
//! multi-round Argon2 chain meant to make brute-forcing a partially-known
//! seed expensive even after a quorum has been physically compromised.
//!
//! `original_source/util/key.go`'s `golang.org/x/crypto/argon2.Key` call is
//! Argon2i, but SPEC_FULL.md's KDF section states `argon2id` three times
//! with no hedge, so every round below uses [`Algorithm::Argon2id`] rather
//! than matching the original byte-for-byte. See SPEC_FULL.md §4.4's Open
//! Question and DESIGN.md for why this one conflict is resolved in the
//! spec's favor instead of the original's.

use argon2::{Algorithm, Argon2, Params, Version};
use secrecy::Secret;
use tracing::info;

use crate::error::{LegacyError, Result};

/// Salt used for the final key-stretching round. Fixed by the protocol, not
/// a per-run secret — every generator and integrator must agree on it for
/// the derived key to match.
const FINAL_SALT: &[u8] = b"some very very random bytes for salt";

const AES_KEY_LEN: usize = 32;

fn run(password: &[u8], salt: &[u8], t_cost: u32, m_cost_kib: u32, p_cost: u32, out: &mut [u8]) -> Result<()> {
    let params = Params::new(m_cost_kib, t_cost, p_cost, Some(out.len()))
        .map_err(|e| LegacyError::Crypto(format!("invalid argon2 params: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    argon2
        .hash_password_into(password, salt, out)
        .map_err(|e| LegacyError::Crypto(format!("argon2 derivation failed: {e}")))
}

/// Picks eight bytes out of `seed` at fixed fractional offsets to seed the
/// first round's salt. Pure layout, not a security boundary in itself — the
/// strengthening comes from the round count that follows.
fn initial_salt(seed: &[u8]) -> [u8; 8] {
    let n = seed.len();
    [
        seed[0],
        seed[n - 1],
        seed[n / 2],
        seed[n / 3],
        seed[2 * n / 3],
        seed[n / 4],
        seed[3 * n / 4],
        seed[3 * n / 5],
    ]
}

/// Derives a 32-byte AES-256 key from a fully reconstructed seed.
///
/// Runs `steps` rounds, each re-deriving both the working salt and the
/// working seed with Argon2id, before a final round keyed on [`FINAL_SALT`]
/// produces the AES key. `steps` is `Config::kdf_steps`; the same value used
/// at generation time must be used at integration time or the derived key
/// will silently differ. Returned wrapped in [`Secret`] so the key zeroizes
/// itself on drop and can't be printed or compared by accident.
pub fn build_private_key(seed: &[u8], steps: usize) -> Result<Secret<[u8; AES_KEY_LEN]>> {
    if seed.is_empty() {
        return Err(LegacyError::ParameterInvalid("seed must not be empty".into()));
    }
    let mut salt = initial_salt(seed).to_vec();
    let mut working = seed.to_vec();
    let mut last_reported = 0usize;
    for i in 0..steps {
        let pre_salt = (i as u64).to_le_bytes();
        let mut next_salt = vec![0u8; salt.len()];
        run(&salt, &pre_salt, 2, 16 * 1024, 1, &mut next_salt)?;
        salt = next_salt;

        let mut next_working = vec![0u8; working.len()];
        run(&working, &salt, 3, 64 * 1024, 3, &mut next_working)?;
        working = next_working;

        if steps > 0 {
            let percent = 100 * (i + 1) / steps;
            if percent != last_reported {
                last_reported = percent;
                info!(percent, "key derivation progress");
            }
        }
    }
    let mut key = [0u8; AES_KEY_LEN];
    run(&working, FINAL_SALT, 5, 128 * 1024, 4, &mut key)?;
    Ok(Secret::new(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn derivation_is_deterministic() {
        let seed: Vec<u8> = (0u8..64).collect();
        let a = build_private_key(&seed, 2).unwrap();
        let b = build_private_key(&seed, 2).unwrap();
        assert_eq!(a.expose_secret(), b.expose_secret());
    }

    #[test]
    fn different_seeds_derive_different_keys() {
        let seed_a: Vec<u8> = (0u8..64).collect();
        let mut seed_b = seed_a.clone();
        seed_b[0] ^= 1;
        let a = build_private_key(&seed_a, 1).unwrap();
        let b = build_private_key(&seed_b, 1).unwrap();
        assert_ne!(a.expose_secret(), b.expose_secret());
    }

    #[test]
    fn empty_seed_is_rejected() {
        assert!(build_private_key(&[], 1).is_err());
    }
}
