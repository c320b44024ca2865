//! # Stream Cipher
//!
//! RC4 keystream applied in place. Encryption and decryption are the same
//! operation, but the state advances with every byte processed: feeding the
//! output of `process` back into the same instance does NOT recover the
//! input. Each direction of a connection owns its own instance and every
//! message is processed exactly once.
//!
//! Garbage in, garbage out: the cipher has no integrity. Validation belongs
//! to the protocol layer.

/// Keyed RC4 state.
#[derive(Clone)]
pub struct StreamCipher {
    /// Permutation of all byte values.
    state: [u8; 256],
    /// Index `i` of the PRGA.
    i: u8,
    /// Index `j` of the PRGA.
    j: u8,
}

impl StreamCipher {
    /// Creates a cipher keyed with `key`.
    #[must_use]
    pub fn new(key: &[u8]) -> Self {
        let mut cipher = Self {
            state: [0u8; 256],
            i: 0,
            j: 0,
        };
        cipher.prepare(key);
        cipher
    }

    /// Runs the key schedule, discarding any previous state.
    ///
    /// An empty key is treated as a single zero byte.
    pub fn prepare(&mut self, key: &[u8]) {
        let key: &[u8] = if key.is_empty() { &[0] } else { key };

        for (slot, value) in self.state.iter_mut().zip(0u8..=255) {
            *slot = value;
        }

        let mut j = 0u8;
        for i in 0..256 {
            j = j
                .wrapping_add(self.state[i])
                .wrapping_add(key[i % key.len()]);
            self.state.swap(i, usize::from(j));
        }

        self.i = 0;
        self.j = 0;
    }

    /// XORs the keystream into `buffer` in place, advancing the state.
    pub fn process(&mut self, buffer: &mut [u8]) {
        for byte in buffer {
            self.i = self.i.wrapping_add(1);
            let si = self.state[usize::from(self.i)];
            self.j = self.j.wrapping_add(si);
            self.state.swap(usize::from(self.i), usize::from(self.j));
            let index = self.state[usize::from(self.i)].wrapping_add(self.state[usize::from(self.j)]);
            *byte ^= self.state[usize::from(index)];
        }
    }

    /// Processes `input` into a new buffer.
    #[must_use]
    pub fn process_to_vec(&mut self, input: &[u8]) -> Vec<u8> {
        let mut out = input.to_vec();
        self.process(&mut out);
        out
    }
}

impl std::fmt::Debug for StreamCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamCipher")
            .field("state", &"[REDACTED]")
            .finish()
    }
}
