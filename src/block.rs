//! SBX block codec — byte-exact framing, fully self-contained per block.
//!
//! # On-disk layout (all fields big-endian)
//!
//! ```text
//! Offset  Size  Field
//!    0      3   magic        = "SBx"
//!    3      1   version      (1, 2, or 3)
//!    4      2   crc16        CRC-16/XMODEM over bytes [6..blocksize), init = version
//!    6      6   uid
//!   12      4   block_number
//!   16     rest payload      fills the remainder of the block
//! ```
//!
//! Block 0 (if present) is the metadata block; its payload is a TLV stream
//! (see `metadata.rs`). Data blocks carry raw file bytes. Every block is
//! self-describing and carveable on its own — no block depends on any
//! other block's position on disk, only on its own `block_number` field.

use crate::crc16::crc16;
use crate::error::{SbxError, SbxResult};
use crate::metadata::{BlockMetadata, SENTINEL};
use crate::uid::Uid;
use crate::whitener::Whitener;

pub const MAGIC: &[u8; 3] = b"SBx";

/// Supported block versions and their fixed sizes (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockVersion {
    V1,
    V2,
    V3,
}

impl BlockVersion {
    pub const HEADER_SIZE: usize = 16;

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(BlockVersion::V1),
            2 => Some(BlockVersion::V2),
            3 => Some(BlockVersion::V3),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            BlockVersion::V1 => 1,
            BlockVersion::V2 => 2,
            BlockVersion::V3 => 3,
        }
    }

    pub fn block_size(self) -> usize {
        match self {
            BlockVersion::V1 => 512,
            BlockVersion::V2 => 128,
            BlockVersion::V3 => 4096,
        }
    }

    pub fn header_size(self) -> usize {
        Self::HEADER_SIZE
    }

    pub fn payload_size(self) -> usize {
        self.block_size() - self.header_size()
    }
}

/// A fully decoded block: identity, position, and payload.
#[derive(Debug, Clone)]
pub struct DecodedBlock {
    pub uid: Uid,
    pub block_number: u32,
    /// Raw payload bytes, including any `0x1A` padding.
    pub payload: Vec<u8>,
    /// Present only when `block_number == 0`.
    pub metadata: Option<BlockMetadata>,
}

/// Encodes and decodes single blocks of one version, one UID, and
/// (optionally) one password. Stateless beyond its own fields, so separate
/// instances share nothing and are freely usable from different threads.
pub struct BlockCodec {
    version: BlockVersion,
    uid: Uid,
    whitener: Option<Whitener>,
}

impl BlockCodec {
    pub fn new(version: BlockVersion, uid: Uid, password: Option<&str>) -> Self {
        let whitener = password.map(|p| Whitener::new(p, version.block_size()));
        Self {
            version,
            uid,
            whitener,
        }
    }

    pub fn version(&self) -> BlockVersion {
        self.version
    }

    pub fn uid(&self) -> Uid {
        self.uid
    }

    pub fn block_size(&self) -> usize {
        self.version.block_size()
    }

    pub fn payload_size(&self) -> usize {
        self.version.payload_size()
    }

    /// The first four on-wire bytes this codec's blocks begin with, after
    /// whitening if a password is configured. Used by the scanner to probe
    /// raw media without attempting a full decode first.
    pub fn expected_prefix(&self) -> [u8; 4] {
        let mut prefix = [0u8; 4];
        prefix[..3].copy_from_slice(MAGIC);
        prefix[3] = self.version.as_u8();
        if let Some(w) = &self.whitener {
            for (b, k) in prefix.iter_mut().zip(w.keystream().iter()) {
                *b ^= k;
            }
        }
        prefix
    }

    /// Encode one block.
    ///
    /// For `block_number == 0`, `payload` is ignored and the metadata map
    /// is serialised instead (canonical order `FNM, SNM, FSZ, FDT, SDT,
    /// HSH`, padded with `0x1A`). For `block_number > 0`, `payload` must be
    /// exactly `payload_size()` bytes — short final-block payloads are the
    /// caller's (the driver's) responsibility to pad before calling.
    pub fn encode(
        &self,
        block_number: u32,
        payload: &[u8],
        metadata: Option<&BlockMetadata>,
    ) -> SbxResult<Vec<u8>> {
        let payload_size = self.payload_size();

        let body: Vec<u8> = if block_number == 0 {
            let empty = BlockMetadata::default();
            let meta = metadata.unwrap_or(&empty);
            let mut data = meta.encode();
            if data.len() > payload_size {
                return Err(SbxError::BadSize);
            }
            data.resize(payload_size, SENTINEL);
            data
        } else {
            if payload.len() != payload_size {
                return Err(SbxError::BadSize);
            }
            payload.to_vec()
        };

        let mut crc_input = Vec::with_capacity(6 + 4 + body.len());
        crc_input.extend_from_slice(self.uid.as_bytes());
        crc_input.extend_from_slice(&block_number.to_be_bytes());
        crc_input.extend_from_slice(&body);
        let crc = crc16(self.version.as_u8(), &crc_input);

        let mut block = Vec::with_capacity(self.block_size());
        block.extend_from_slice(MAGIC);
        block.push(self.version.as_u8());
        block.extend_from_slice(&crc.to_be_bytes());
        block.extend_from_slice(&crc_input);

        if let Some(w) = &self.whitener {
            w.xor(&mut block);
        }
        Ok(block)
    }

    /// Decode and validate one block. Any format violation comes back as an
    /// `SbxError` value — never a panic, never partial state.
    pub fn decode(&self, block_bytes: &[u8]) -> SbxResult<DecodedBlock> {
        if block_bytes.len() != self.block_size() {
            return Err(SbxError::BadSize);
        }

        let mut buf = block_bytes.to_vec();
        if let Some(w) = &self.whitener {
            w.xor(&mut buf);
        }

        if &buf[0..3] != MAGIC {
            return Err(SbxError::BadMagic);
        }
        let ver_byte = buf[3];
        BlockVersion::from_u8(ver_byte).ok_or(SbxError::UnsupportedVersion(ver_byte))?;

        let stored_crc = u16::from_be_bytes([buf[4], buf[5]]);
        let expected_crc = crc16(ver_byte, &buf[6..]);
        if stored_crc != expected_crc {
            return Err(SbxError::BadCrc);
        }

        let uid = Uid(buf[6..12].try_into().unwrap());
        let block_number = u32::from_be_bytes(buf[12..16].try_into().unwrap());
        let payload = buf[16..].to_vec();

        let metadata = if block_number == 0 {
            Some(BlockMetadata::decode(&payload)?)
        } else {
            None
        };

        Ok(DecodedBlock {
            uid,
            block_number,
            payload,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{multihash_sha256, sha256};

    fn codec(version: BlockVersion, password: Option<&str>) -> BlockCodec {
        BlockCodec::new(version, Uid([1, 2, 3, 4, 5, 6]), password)
    }

    #[test]
    fn roundtrip_data_block() {
        let c = codec(BlockVersion::V1, None);
        let mut payload = vec![0u8; c.payload_size()];
        payload[..3].copy_from_slice(b"ABC");
        let encoded = c.encode(1, &payload, None).unwrap();
        assert_eq!(encoded.len(), 512);
        let decoded = c.decode(&encoded).unwrap();
        assert_eq!(decoded.block_number, 1);
        assert_eq!(decoded.payload, payload);
        assert_eq!(decoded.uid, c.uid());
    }

    #[test]
    fn roundtrip_metadata_block() {
        let c = codec(BlockVersion::V1, None);
        let digest = sha256(b"ABC");
        let meta = BlockMetadata {
            filename: Some("f.bin".into()),
            file_size: Some(3),
            content_hash: Some(multihash_sha256(&digest)),
            ..Default::default()
        };
        let encoded = c.encode(0, &[], Some(&meta)).unwrap();
        let decoded = c.decode(&encoded).unwrap();
        assert_eq!(decoded.block_number, 0);
        assert_eq!(decoded.metadata.unwrap(), meta);
    }

    #[test]
    fn bad_crc_on_bit_flip() {
        let c = codec(BlockVersion::V1, None);
        let payload = vec![0x1Au8; c.payload_size()];
        let mut encoded = c.encode(1, &payload, None).unwrap();
        encoded[6] ^= 0x01; // flip a bit inside the CRC-covered region
        assert!(matches!(c.decode(&encoded), Err(SbxError::BadCrc)));
    }

    #[test]
    fn bad_magic() {
        let c = codec(BlockVersion::V1, None);
        let payload = vec![0x1Au8; c.payload_size()];
        let mut encoded = c.encode(1, &payload, None).unwrap();
        encoded[0] = b'X';
        assert!(matches!(c.decode(&encoded), Err(SbxError::BadMagic)));
    }

    #[test]
    fn bad_size() {
        let c = codec(BlockVersion::V1, None);
        assert!(matches!(c.decode(&[0u8; 10]), Err(SbxError::BadSize)));
    }

    #[test]
    fn whitened_roundtrip() {
        let c = codec(BlockVersion::V1, Some("hunter2"));
        let payload = vec![0xAAu8; c.payload_size()];
        let encoded = c.encode(1, &payload, None).unwrap();
        // On-wire bytes must not start with the plaintext magic.
        assert_ne!(&encoded[0..4], b"SBx\x01");
        let decoded = c.decode(&encoded).unwrap();
        assert_eq!(decoded.payload, payload);
    }

    #[test]
    fn expected_prefix_matches_encoded_block_start() {
        let c = codec(BlockVersion::V2, Some("pw"));
        let payload = vec![0u8; c.payload_size()];
        let encoded = c.encode(1, &payload, None).unwrap();
        assert_eq!(&encoded[0..4], &c.expected_prefix());
    }

    #[test]
    fn version_block_sizes() {
        assert_eq!(BlockVersion::V1.block_size(), 512);
        assert_eq!(BlockVersion::V1.payload_size(), 496);
        assert_eq!(BlockVersion::V2.block_size(), 128);
        assert_eq!(BlockVersion::V2.payload_size(), 112);
        assert_eq!(BlockVersion::V3.block_size(), 4096);
        assert_eq!(BlockVersion::V3.payload_size(), 4080);
    }
}
