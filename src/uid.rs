//! 48-bit container identifier (§3 "UID").
//!
//! Randomly generated at encode time unless the caller supplies one. Not
//! cryptographically significant — just large enough that two unrelated
//! containers carved from the same medium are very unlikely to collide.
//! Two containers that *do* share a UID cannot be disambiguated by the
//! scanner; that is an accepted format limitation, not a bug here.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Uid(pub [u8; 6]);

impl Uid {
    /// Draw a random UID from the system RNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; 6];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Parse up to 12 hex digits into a UID, left-padding with zero bytes —
    /// mirrors the original encoder's `-uid` flag, which right-aligns a
    /// caller-supplied value into the 6-byte field.
    pub fn from_hex(s: &str) -> Option<Self> {
        if s.len() > 12 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let padded = format!("{s:0>12}");
        let raw = hex::decode(padded).ok()?;
        let mut bytes = [0u8; 6];
        bytes.copy_from_slice(&raw);
        Some(Self(bytes))
    }

    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_uids_differ() {
        assert_ne!(Uid::random(), Uid::random());
    }

    #[test]
    fn hex_roundtrip() {
        let uid = Uid::from_hex("a1b2c3d4e5f6").unwrap();
        assert_eq!(uid.to_hex(), "a1b2c3d4e5f6");
    }

    #[test]
    fn short_hex_left_pads_with_zero() {
        let uid = Uid::from_hex("ff").unwrap();
        assert_eq!(uid.0, [0, 0, 0, 0, 0, 0xff]);
    }

    #[test]
    fn rejects_too_long_or_non_hex() {
        assert!(Uid::from_hex("1234567890123").is_none());
        assert!(Uid::from_hex("zzzz").is_none());
    }
}
