//! # sbxbox — .sbx carve-able container format reference implementation
//!
//! Format guarantees:
//! - Every block is fixed-size, self-describing, and independently carveable:
//!   magic, version, CRC-16, UID, and block number all live in every block,
//!   never only in a header or trailer
//! - Block size is fixed per version (1/2/3 => 512/128/4096 bytes); no
//!   negotiation, no variable framing
//! - CRC-16/XMODEM covers every byte after the CRC field itself, seeded with
//!   the version number so blocks from two different versions never pass
//!   each other's check by accident
//! - Block 0, if present, carries a TLV metadata stream; all other blocks
//!   carry raw payload bytes in strict ascending block-number order
//! - A scanner can recover blocks from raw, unstructured media without any
//!   index: every block proves its own validity on sight
//! - An optional password only obfuscates bytes on the wire (XOR keystream);
//!   it is not an access-control or integrity mechanism

pub mod container;
pub mod driver;
pub mod block;
pub mod crc16;
pub mod error;
pub mod hash;
pub mod metadata;
pub mod recovery;
pub mod uid;
pub mod whitener;

// Flat re-exports for the most common types.
pub use block::{BlockCodec, BlockVersion, DecodedBlock};
pub use container::{decode_file, encode_file, DecodeOptions, EncodeOptions};
pub use driver::{DecodeMode, DecodeReport, Decoder, EncodeReport, Encoder};
pub use error::{SbxError, SbxResult};
pub use metadata::BlockMetadata;
pub use recovery::reconstruct::{reconstruct, ReconstructOptions, ReconstructOutcome, Selector};
pub use recovery::scanner::{scan, ScanOptions, ScanReport};
pub use recovery::RecoveryIndex;
pub use uid::Uid;
