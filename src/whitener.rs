//! Password-based XOR whitener — explicitly **not** cryptography.
//!
//! Its only purpose is to hide the `"SBx"` magic from casual magic-number
//! scans; see §4.2. The keystream is a plain SHA-256 chain:
//!
//! ```text
//! k0 = password bytes
//! k(i) = SHA256(k0 || k1 || ... || k(i-1))
//! keystream = (k1 || k2 || ...)[..L]
//! ```
//!
//! Deterministic for a given `(password, L)`; the same `L = block size`
//! keystream is reused for every block of a container.

use sha2::{Digest, Sha256};

pub struct Whitener {
    keystream: Vec<u8>,
}

impl Whitener {
    /// Derive a keystream of exactly `len` bytes for `password`.
    pub fn new(password: &str, len: usize) -> Self {
        let mut stream: Vec<u8> = Vec::with_capacity(len + 32);
        let mut accumulated = password.as_bytes().to_vec();
        while stream.len() < len {
            let digest = Sha256::digest(&accumulated);
            accumulated.extend_from_slice(&digest);
            stream.extend_from_slice(&digest);
        }
        stream.truncate(len);
        Self { keystream: stream }
    }

    /// XOR `buffer` in place against the keystream (truncated to `buffer`'s
    /// length). Involutive: applying it twice returns the original bytes.
    pub fn xor(&self, buffer: &mut [u8]) {
        for (b, k) in buffer.iter_mut().zip(self.keystream.iter()) {
            *b ^= k;
        }
    }

    pub fn keystream(&self) -> &[u8] {
        &self.keystream
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_same_inputs() {
        let a = Whitener::new("hunter2", 512);
        let b = Whitener::new("hunter2", 512);
        assert_eq!(a.keystream(), b.keystream());
    }

    #[test]
    fn differs_by_password() {
        let a = Whitener::new("hunter2", 64);
        let b = Whitener::new("hunter3", 64);
        assert_ne!(a.keystream(), b.keystream());
    }

    #[test]
    fn involution() {
        let w = Whitener::new("x", 16);
        let original = b"0123456789abcdef".to_vec();
        let mut buf = original.clone();
        w.xor(&mut buf);
        assert_ne!(buf, original);
        w.xor(&mut buf);
        assert_eq!(buf, original);
    }

    #[test]
    fn keystream_length_matches_request() {
        for len in [0usize, 1, 31, 32, 33, 512, 4096] {
            let w = Whitener::new("p", len);
            assert_eq!(w.keystream().len(), len);
        }
    }
}
