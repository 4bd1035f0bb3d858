//! Multihash framing for the `HSH` metadata tag: one algorithm-code byte,
//! one length byte, then the digest. SeqBox only ever writes SHA-256
//! (`0x12`, 32 bytes), but a reader tolerates any recognised code.

use sha2::{Digest, Sha256};

/// Multihash algorithm code for SHA-256, per the multihash table.
pub const SHA256_CODE: u8 = 0x12;
pub const SHA256_LEN: u8 = 32;

/// Streaming SHA-256 accumulator, mirroring `hashlib.sha256()` usage in the
/// original encoder/decoder: fed incrementally as blocks are read/written.
#[derive(Default)]
pub struct RunningHash(Sha256);

impl RunningHash {
    pub fn new() -> Self {
        Self(Sha256::new())
    }

    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    pub fn finalize(self) -> [u8; 32] {
        self.0.finalize().into()
    }
}

/// Hash an entire byte slice in one call (used by the encoder's
/// hash-before-write pass).
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Frame a SHA-256 digest as a multihash value: `code(1) || len(1) || digest`.
pub fn multihash_sha256(digest: &[u8; 32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + 32);
    out.push(SHA256_CODE);
    out.push(SHA256_LEN);
    out.extend_from_slice(digest);
    out
}

/// Parse a multihash value. Returns `(algorithm_code, digest_bytes)`.
/// Unrecognised algorithm codes are still returned — the caller decides
/// whether to verify or merely record the hash (per §3: "unknown tags are
/// skipped", this function just exposes the framing, not the interpretation).
pub fn parse_multihash(value: &[u8]) -> Option<(u8, &[u8])> {
    if value.len() < 2 {
        return None;
    }
    let code = value[0];
    let len = value[1] as usize;
    let digest = value.get(2..2 + len)?;
    Some((code, digest))
}
