//! High-level file-based embedding API over the block driver (C3).
//!
//! ```no_run
//! use sbxbox::container::{encode_file, decode_file, EncodeOptions, DecodeOptions};
//!
//! encode_file("photo.jpg", "photo.jpg.sbx", EncodeOptions::default())?;
//! decode_file("photo.jpg.sbx", "photo.jpg", DecodeOptions::default())?;
//! # Ok::<(), sbxbox::error::SbxError>(())
//! ```

use std::fs::{self, File};
use std::path::Path;
use std::time::UNIX_EPOCH;

use chrono::Utc;

use crate::block::{BlockCodec, BlockVersion};
use crate::driver::{DecodeMode, DecodeReport, Decoder, Encoder, EncodeReport, MetadataInput};
use crate::error::{SbxError, SbxResult};
use crate::uid::Uid;

#[derive(Debug, Clone)]
pub struct EncodeOptions {
    pub version: BlockVersion,
    /// `None` draws a fresh random UID.
    pub uid: Option<Uid>,
    pub password: Option<String>,
    /// Omit this to produce a container with no block 0 at all.
    pub include_metadata: bool,
    pub overwrite: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            version: BlockVersion::V1,
            uid: None,
            password: None,
            include_metadata: true,
            overwrite: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DecodeOptions {
    pub password: Option<String>,
    pub mode: DecodeMode,
    pub overwrite: bool,
    /// Run the decoder without writing a target file — integrity check only.
    pub test_only: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            password: None,
            mode: DecodeMode::Strict,
            overwrite: false,
            test_only: false,
        }
    }
}

/// Encode `source` into a new `.sbx` container at `container`.
pub fn encode_file<P: AsRef<Path>, Q: AsRef<Path>>(
    source: P,
    container: Q,
    opts: EncodeOptions,
) -> SbxResult<EncodeReport> {
    let source = source.as_ref();
    let container = container.as_ref();
    if container.exists() && !opts.overwrite {
        return Err(SbxError::TargetExists);
    }

    let uid = opts.uid.unwrap_or_else(Uid::random);
    let codec = BlockCodec::new(opts.version, uid, opts.password.as_deref());

    let mut src_file = File::open(source)?;

    let metadata_input = if opts.include_metadata {
        let fs_meta = fs::metadata(source)?;
        let filename = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        let sbx_name = container
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        let file_datetime = fs_meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64);

        Some(MetadataInput {
            filename,
            sbx_name,
            file_datetime,
            sbx_datetime: Some(Utc::now().timestamp()),
            precomputed_hash: None,
        })
    } else {
        None
    };

    let mut out_file = File::create(container)?;
    Encoder::encode(&mut src_file, &mut out_file, &codec, metadata_input)
}

/// Decode a `.sbx` container at `container` into `target`.
pub fn decode_file<P: AsRef<Path>, Q: AsRef<Path>>(
    container: P,
    target: Q,
    opts: DecodeOptions,
) -> SbxResult<DecodeReport> {
    let container = container.as_ref();
    let target = target.as_ref();
    if !opts.test_only && target.exists() && !opts.overwrite {
        return Err(SbxError::TargetExists);
    }

    let mut in_file = File::open(container)?;
    if opts.test_only {
        Decoder::run(
            &mut in_file,
            None::<&mut File>,
            opts.password.as_deref(),
            opts.mode,
        )
    } else {
        let mut out_file = File::create(target)?;
        Decoder::run(
            &mut in_file,
            Some(&mut out_file),
            opts.password.as_deref(),
            opts.mode,
        )
    }
}
