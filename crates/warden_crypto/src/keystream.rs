//! # Deterministic Key Stream
//!
//! Unbounded byte stream derived from a fixed seed buffer.
//!
//! ## Construction
//!
//! ```text
//! seed = [ low half | high half ]
//! H1   = sha1(low half)
//! H2   = sha1(high half)
//! O0   = 00 * 20
//!
//! refill:  O0 = sha1(H1 || O0 || H2)
//! ```
//!
//! Bytes are served from `O0` in order; the block is recomputed every time
//! its 20 bytes have been consumed. The same seed always yields the same
//! stream, which is what lets client and server derive identical keys.

use sha1::{Digest, Sha1};

use crate::checksum::{sha1_digest, Sha1Digest, DIGEST_LEN};

/// SHA-1 driven deterministic byte generator.
///
/// Only for key and identifier derivation. Not a general purpose RNG.
#[derive(Clone)]
pub struct KeyStream {
    /// Digest of the low half of the seed.
    anchor_low: Sha1Digest,
    /// Digest of the high half of the seed.
    anchor_high: Sha1Digest,
    /// Current output block.
    block: Sha1Digest,
    /// Bytes of `block` already served.
    taken: usize,
}

impl KeyStream {
    /// Creates a stream from a seed buffer.
    ///
    /// The seed is split at `len / 2`; an odd extra byte goes to the high half.
    #[must_use]
    pub fn new(seed: &[u8]) -> Self {
        let half = seed.len() / 2;
        let mut stream = Self {
            anchor_low: sha1_digest(&seed[..half]),
            anchor_high: sha1_digest(&seed[half..]),
            block: [0u8; DIGEST_LEN],
            taken: 0,
        };
        stream.refill();
        stream
    }

    /// Recomputes the output block from the anchors and the previous block.
    fn refill(&mut self) {
        let mut hasher = Sha1::new();
        hasher.update(self.anchor_low);
        hasher.update(self.block);
        hasher.update(self.anchor_high);
        self.block.copy_from_slice(&hasher.finalize());
        self.taken = 0;
    }

    /// Fills `out` with the next `out.len()` bytes of the stream.
    pub fn fill(&mut self, out: &mut [u8]) {
        for byte in out {
            if self.taken == DIGEST_LEN {
                self.refill();
            }
            *byte = self.block[self.taken];
            self.taken += 1;
        }
    }

    /// Returns the next `count` bytes of the stream.
    #[must_use]
    pub fn next_bytes(&mut self, count: usize) -> Vec<u8> {
        let mut out = vec![0u8; count];
        self.fill(&mut out);
        out
    }

    /// Returns the next `N` bytes of the stream as an array.
    #[must_use]
    pub fn next_array<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        self.fill(&mut out);
        out
    }
}

impl std::fmt::Debug for KeyStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Anchors are secret-derived
        f.debug_struct("KeyStream")
            .field("state", &"[REDACTED]")
            .field("taken", &self.taken)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: [u8; 40] = [
        0x4D, 0x80, 0x8D, 0x2C, 0x77, 0xD9, 0x05, 0xC4, 0x1A, 0x63, 0x80, 0xEC, 0x08, 0x58, 0x6A,
        0xFE, 0x9A, 0x0E, 0x1B, 0x3C, 0x22, 0x5F, 0x64, 0x11, 0xA7, 0x09, 0xB0, 0x4E, 0x33, 0x71,
        0xC2, 0x8D, 0x5A, 0x10, 0xEE, 0x02, 0x6B, 0x99, 0x47, 0x3D,
    ];

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = KeyStream::new(&SECRET);
        let mut b = KeyStream::new(&SECRET);
        for count in [1, 7, 16, 20, 33, 100] {
            assert_eq!(a.next_bytes(count), b.next_bytes(count));
        }
    }

    #[test]
    fn test_chunking_does_not_change_output() {
        let mut whole = KeyStream::new(&SECRET);
        let mut pieces = KeyStream::new(&SECRET);

        let expected = whole.next_bytes(95);
        let mut actual = Vec::new();
        for count in [3, 17, 20, 1, 40, 14] {
            actual.extend(pieces.next_bytes(count));
        }
        assert_eq!(expected, actual);
    }

    #[test]
    fn test_first_block_matches_construction() {
        let mut stream = KeyStream::new(&SECRET);
        let h1 = sha1_digest(&SECRET[..20]);
        let h2 = sha1_digest(&SECRET[20..]);

        let mut input = Vec::new();
        input.extend_from_slice(&h1);
        input.extend_from_slice(&[0u8; 20]);
        input.extend_from_slice(&h2);
        let first = sha1_digest(&input);

        let mut input = Vec::new();
        input.extend_from_slice(&h1);
        input.extend_from_slice(&first);
        input.extend_from_slice(&h2);
        let second = sha1_digest(&input);

        assert_eq!(stream.next_bytes(20), first.to_vec());
        assert_eq!(stream.next_bytes(20), second.to_vec());
    }

    #[test]
    fn test_different_seeds_diverge() {
        let mut other = SECRET;
        other[39] ^= 0xFF;
        let mut a = KeyStream::new(&SECRET);
        let mut b = KeyStream::new(&other);
        assert_ne!(a.next_array::<16>(), b.next_array::<16>());
    }

    #[test]
    fn test_debug_redacts_state() {
        let stream = KeyStream::new(&SECRET);
        let rendered = format!("{stream:?}");
        assert!(rendered.contains("REDACTED"));
    }
}
