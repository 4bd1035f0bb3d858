//! Reconstruction (§4.4.3): walk the populated index and rebuild one `.sbx`
//! container per selected UID.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::block::BlockCodec;
use crate::error::{SbxError, SbxResult};
use crate::recovery::RecoveryIndex;
use crate::uid::Uid;

/// Which containers to rebuild.
#[derive(Debug, Clone)]
pub enum Selector {
    All,
    Uids(Vec<Uid>),
    /// Original filenames or container filenames, resolved via the `meta`
    /// relation.
    Names(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct ReconstructOptions {
    pub destination: PathBuf,
    pub fill: bool,
    pub overwrite: bool,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReconstructOutcome {
    pub uid: Uid,
    pub output_path: PathBuf,
    pub blocks_written: u32,
    pub missing_blocks: u32,
    pub filled_blocks: u32,
}

impl ReconstructOutcome {
    pub fn summary(&self) -> String {
        format!(
            "{}: {} -> {} block(s) written, {} missing ({} filled)",
            self.uid,
            self.output_path.display(),
            self.blocks_written,
            self.missing_blocks,
            self.filled_blocks,
        )
    }
}

/// Resolve `selector` to a concrete UID list. Aborts with
/// `NothingToRecover` if any requested name/UID has no block records.
fn resolve(index: &RecoveryIndex, selector: &Selector) -> SbxResult<Vec<Uid>> {
    let uids: Vec<Uid> = match selector {
        Selector::All => index.all_uids().collect(),
        Selector::Uids(list) => list.clone(),
        Selector::Names(names) => {
            let mut found = Vec::new();
            for name in names {
                let matches = index.resolve_name(name);
                if matches.is_empty() {
                    return Err(SbxError::NothingToRecover);
                }
                found.extend(matches);
            }
            found
        }
    };

    if uids.is_empty() {
        return Err(SbxError::NothingToRecover);
    }
    for uid in &uids {
        if index.blocks_of(*uid).is_empty() {
            return Err(SbxError::NothingToRecover);
        }
    }
    Ok(uids)
}

/// Reconstruct every UID resolved by `selector` into `opts.destination`.
/// Returns one outcome per successfully reconstructed UID, plus a separate
/// error list for UIDs whose very first recorded block failed to decode —
/// fatal, since codec parameters can't be trusted from there on.
pub fn reconstruct(
    index: &RecoveryIndex,
    selector: &Selector,
    opts: &ReconstructOptions,
) -> SbxResult<(Vec<ReconstructOutcome>, Vec<(Uid, SbxError)>)> {
    let uids = resolve(index, selector)?;
    std::fs::create_dir_all(&opts.destination)?;

    let mut outcomes = Vec::new();
    let mut errors = Vec::new();

    for uid in uids {
        match reconstruct_one(index, uid, opts) {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => errors.push((uid, e)),
        }
    }

    Ok((outcomes, errors))
}

fn reconstruct_one(
    index: &RecoveryIndex,
    uid: Uid,
    opts: &ReconstructOptions,
) -> SbxResult<ReconstructOutcome> {
    let version_byte = index.version_of(uid).ok_or(SbxError::NothingToRecover)?;
    let version = crate::block::BlockVersion::from_u8(version_byte)
        .ok_or(SbxError::UnsupportedVersion(version_byte))?;
    let codec = BlockCodec::new(version, uid, opts.password.as_deref());

    let recs = index.blocks_of(uid);
    let output_path = unique_output_path(&opts.destination, index, uid, opts.overwrite);
    let mut out = File::create(&output_path)?;

    let mut last_emitted: Option<u32> = None;
    let mut missing_blocks = 0u32;
    let mut filled_blocks = 0u32;
    let mut blocks_written = 0u32;

    for (i, rec) in recs.iter().enumerate() {
        let expected_next = last_emitted.map(|l| l + 1).unwrap_or(0);
        if rec.block_number > expected_next {
            for gap in expected_next..rec.block_number {
                if gap == 0 {
                    continue; // a synthesised block 0 is worse than none
                }
                missing_blocks += 1;
                if opts.fill {
                    let zero_payload = vec![0u8; codec.payload_size()];
                    let block = codec.encode(gap, &zero_payload, None)?;
                    out.write_all(&block)?;
                    blocks_written += 1;
                    filled_blocks += 1;
                }
            }
        }

        let source_path = index
            .source_path(rec.source_id)
            .ok_or(SbxError::NothingToRecover)?
            .to_path_buf();
        let mut src = File::open(&source_path).map_err(SbxError::SourceIoError)?;
        src.seek(SeekFrom::Start(rec.offset))
            .map_err(SbxError::SourceIoError)?;
        let mut buf = vec![0u8; codec.block_size()];
        src.read_exact(&mut buf).map_err(SbxError::SourceIoError)?;

        if i == 0 {
            // Confirms codec parameters before trusting the rest of the run.
            codec.decode(&buf)?;
        }

        out.write_all(&buf)?;
        blocks_written += 1;
        last_emitted = Some(rec.block_number);
    }

    out.flush()?;
    Ok(ReconstructOutcome {
        uid,
        output_path,
        blocks_written,
        missing_blocks,
        filled_blocks,
    })
}

fn unique_output_path(dest: &Path, index: &RecoveryIndex, uid: Uid, overwrite: bool) -> PathBuf {
    let base_name = index
        .meta_of(uid)
        .and_then(|m| m.sbxname.clone())
        .unwrap_or_else(|| format!("{}.sbx", uid.to_hex()));

    let candidate = dest.join(&base_name);
    if overwrite || !candidate.exists() {
        return candidate;
    }

    let (stem, ext) = split_name(&base_name);
    for n in 1.. {
        let numbered = match &ext {
            Some(ext) => format!("{stem}({n}).{ext}"),
            None => format!("{stem}({n})"),
        };
        let candidate = dest.join(numbered);
        if !candidate.exists() {
            return candidate;
        }
    }
    unreachable!("destination directory cannot hold infinitely many same-named files")
}

fn split_name(name: &str) -> (String, Option<String>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), Some(ext.to_string())),
        _ => (name.to_string(), None),
    }
}
