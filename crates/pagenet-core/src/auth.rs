//! Salted password hashing for users and node secrets.
//!
//! Secrets are stored as PBKDF2-HMAC-SHA256 strings of a fixed length so
//! that a hashed value can never be mistaken for a plaintext one. The
//! encoded form is `iterations$salt-hex$digest-hex`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// PBKDF2 iteration count for newly created hashes.
///
/// Four digits by construction: changing the order of magnitude would
/// change [`HASH_LEN`] and break the fixed-length invariant on stored
/// user records.
pub const PBKDF2_ITERATIONS: u32 = 8192;

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;

/// Digest length in bytes (SHA-256 output).
pub const DIGEST_LEN: usize = 32;

/// Total length of an encoded hash string:
/// 4 (iterations) + 1 + 32 (salt hex) + 1 + 64 (digest hex).
pub const HASH_LEN: usize = 4 + 1 + SALT_LEN * 2 + 1 + DIGEST_LEN * 2;

/// Hashes a password with a freshly generated random salt.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::fill(&mut salt);
    encode(password, &salt, PBKDF2_ITERATIONS)
}

/// Verifies a password against an encoded hash in constant time.
///
/// Malformed hashes verify as `false` rather than erroring — a stored
/// value that cannot be parsed must never authenticate anyone.
pub fn verify_password(password: &str, encoded: &str) -> bool {
    let Some((iterations, salt)) = parse(encoded) else {
        return false;
    };
    let candidate = encode(password, &salt, iterations);
    bool::from(candidate.as_bytes().ct_eq(encoded.as_bytes()))
}

/// Returns true if `value` has the shape of an encoded hash.
///
/// Used by the validator to reject plaintext secrets in fields that must
/// only ever hold hashed values.
pub fn is_encoded_hash(value: &str) -> bool {
    value.len() == HASH_LEN && parse(value).is_some()
}

fn encode(password: &str, salt: &[u8], iterations: u32) -> String {
    let digest = pbkdf2_sha256(password.as_bytes(), salt, iterations);
    format!("{iterations}${}${}", to_hex(salt), to_hex(&digest))
}

fn parse(encoded: &str) -> Option<(u32, Vec<u8>)> {
    let mut parts = encoded.splitn(3, '$');
    let iterations: u32 = parts.next()?.parse().ok()?;
    let salt = from_hex(parts.next()?)?;
    let digest = from_hex(parts.next()?)?;
    if iterations == 0 || salt.is_empty() || digest.len() != DIGEST_LEN {
        return None;
    }
    Some((iterations, salt))
}

/// PBKDF2 with a single HMAC-SHA256 block.
///
/// One block covers the full 32-byte output, so the block index is
/// always 1.
fn pbkdf2_sha256(password: &[u8], salt: &[u8], iterations: u32) -> [u8; DIGEST_LEN] {
    let mut mac = HmacSha256::new_from_slice(password).expect("HMAC takes keys of any length");
    mac.update(salt);
    mac.update(&1u32.to_be_bytes());
    let mut block: [u8; DIGEST_LEN] = mac.finalize().into_bytes().into();

    let mut output = block;
    for _ in 1..iterations {
        let mut mac = HmacSha256::new_from_slice(password).expect("HMAC takes keys of any length");
        mac.update(&block);
        block = mac.finalize().into_bytes().into();
        for (out, b) in output.iter_mut().zip(block.iter()) {
            *out ^= b;
        }
    }

    output
}

/// Lowercase hex encoding.
pub fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

fn from_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let hash = hash_password("admin");
        assert!(verify_password("admin", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn hash_has_fixed_length() {
        assert_eq!(hash_password("a").len(), HASH_LEN);
        assert_eq!(hash_password("a much longer password 1234").len(), HASH_LEN);
        assert_eq!(HASH_LEN, 102);
    }

    #[test]
    fn distinct_salts_give_distinct_hashes() {
        assert_ne!(hash_password("same"), hash_password("same"));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "plaintext"));
        assert!(!verify_password("x", "8192$nothex$nothex"));
    }

    #[test]
    fn plaintext_is_not_an_encoded_hash() {
        assert!(!is_encoded_hash("admin"));
        assert!(is_encoded_hash(&hash_password("admin")));
    }

    #[test]
    fn hex_roundtrip() {
        let bytes = [0x00, 0x7f, 0xff, 0x10];
        assert_eq!(from_hex(&to_hex(&bytes)).unwrap(), bytes);
        assert!(from_hex("abc").is_none());
        assert!(from_hex("zz").is_none());
    }
}
