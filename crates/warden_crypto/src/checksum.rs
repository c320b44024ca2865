//! # Digests and Checksums
//!
//! SHA-1 is the only digest the client module speaks. The 32-bit checksum
//! carried in framed messages is the 160-bit digest folded by XOR over its
//! five little-endian words.

use hmac::{Hmac, Mac};
use sha1::{Digest, Sha1};

/// Length of a SHA-1 digest in bytes.
pub const DIGEST_LEN: usize = 20;

/// A SHA-1 digest.
pub type Sha1Digest = [u8; DIGEST_LEN];

type HmacSha1 = Hmac<Sha1>;

/// Computes the SHA-1 digest of `data`.
#[must_use]
pub fn sha1_digest(data: &[u8]) -> Sha1Digest {
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&Sha1::digest(data));
    out
}

/// Computes the folded 32-bit checksum of `data`.
///
/// ```text
/// sha1(data) = w0 w1 w2 w3 w4   (u32, little-endian)
/// checksum   = w0 ^ w1 ^ w2 ^ w3 ^ w4
/// ```
#[must_use]
pub fn fold_checksum(data: &[u8]) -> u32 {
    sha1_digest(data)
        .chunks_exact(4)
        .map(|word| u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
        .fold(0, |acc, word| acc ^ word)
}

/// Computes HMAC-SHA1 of `data` keyed with `key`.
#[must_use]
pub fn hmac_sha1(key: &[u8], data: &[u8]) -> Sha1Digest {
    let mut mac = HmacSha1::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// Compares two byte slices without an early exit on the first difference.
///
/// Used wherever the peer supplies a digest that is compared against a
/// server-side secret-derived value.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
