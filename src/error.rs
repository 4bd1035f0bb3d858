//! Error taxonomy for the `.sbx` block codec and recovery pipeline.
//!
//! One enum, not one-per-subsystem: unlike a multi-codec/multi-format
//! crate, SeqBox has a single frozen wire format, so a single `SbxError`
//! carries every kind from the codec, the drivers, and the recovery
//! pipeline alike. Decode failures are always non-fatal to the caller —
//! they come back as a value, never a panic.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SbxError {
    #[error("block has the wrong size")]
    BadSize,
    #[error("block magic does not match \"SBx\"")]
    BadMagic,
    #[error("block version {0} is not supported")]
    UnsupportedVersion(u8),
    #[error("block CRC mismatch")]
    BadCrc,
    #[error("metadata TLV stream truncated")]
    TruncatedTlv,
    #[error("block {found} is out of order (expected {expected})")]
    BlocksOutOfOrder { expected: u32, found: u32 },
    #[error("decoded content hash does not match stored HSH")]
    HashMismatch,
    #[error("not a SeqBox container")]
    NotASeqBoxFile,
    #[error("target path already exists")]
    TargetExists,
    #[error("no block records matched the requested selector")]
    NothingToRecover,
    #[error("I/O error on source: {0}")]
    SourceIoError(std::io::Error),
    #[error("I/O error on index store: {0}")]
    IndexIoError(std::io::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("index record corrupt: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SbxResult<T> = Result<T, SbxError>;
