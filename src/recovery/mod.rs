//! Scanner/reconstructor index store (§6.4 schema): four relations —
//! `source`, `meta`, `uids`, `blocks` — held in memory and persisted as an
//! append-only, crc32fast-framed, `serde_json`-lines log. A scan aborted
//! mid-run still leaves a usable partial index: opening the log replays it
//! and stops at the first record whose checksum fails or whose bytes are
//! short, rather than failing the whole open.
//!
//! This is the "simple append-only log with in-memory indices built on
//! open" option named for the index store — chosen over an embedded
//! database since none is otherwise used anywhere in this codebase.

pub mod scanner;
pub mod reconstruct;

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crc32fast::Hasher as Crc32;
use serde::{Deserialize, Serialize};

use crate::error::SbxResult;
use crate::uid::Uid;

/// `source(id, path)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRec {
    pub id: u32,
    pub path: PathBuf,
}

/// `meta(uid, filesize, filename, sbxname, file_datetime, sbx_datetime, source_id)`
/// — one row per observed block 0. `-1` means "unknown" for the timestamps,
/// matching spec/upstream precedent of treating an absent `FDT`/`SDT` as
/// absent rather than zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaRec {
    pub uid: Uid,
    pub filesize: Option<u64>,
    pub filename: Option<String>,
    pub sbxname: Option<String>,
    pub file_datetime: i64,
    pub sbx_datetime: i64,
    pub source_id: u32,
}

/// `uids(uid, version)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UidRec {
    pub uid: Uid,
    pub version: u8,
}

/// `blocks(uid, block_number, source_id, offset)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BlockRec {
    pub uid: Uid,
    pub block_number: u32,
    pub source_id: u32,
    pub offset: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
enum LogRecord {
    Source(SourceRec),
    Uid(UidRec),
    Meta(MetaRec),
    Block(BlockRec),
}

const COMMIT_INTERVAL: Duration = Duration::from_millis(500);

/// The populated index: four relations, plus the append-only log that
/// backs them on disk.
pub struct RecoveryIndex {
    log: BufWriter<File>,
    last_commit: Instant,

    sources: Vec<SourceRec>,
    uids: HashMap<Uid, u8>,
    metas: Vec<MetaRec>,
    blocks: HashMap<Uid, Vec<BlockRec>>,
}

impl RecoveryIndex {
    /// Create a fresh index log at `path`, truncating any existing file.
    pub fn create<P: AsRef<Path>>(path: P) -> SbxResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(crate::error::SbxError::IndexIoError)?;
        Ok(Self {
            log: BufWriter::new(file),
            last_commit: Instant::now(),
            sources: Vec::new(),
            uids: HashMap::new(),
            metas: Vec::new(),
            blocks: HashMap::new(),
        })
    }

    /// Open an existing index log, replaying every well-formed record into
    /// memory, then reopen it for appending further records.
    pub fn open<P: AsRef<Path>>(path: P) -> SbxResult<Self> {
        let mut index = Self {
            log: BufWriter::new(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .map_err(crate::error::SbxError::IndexIoError)?,
            ),
            last_commit: Instant::now(),
            sources: Vec::new(),
            uids: HashMap::new(),
            metas: Vec::new(),
            blocks: HashMap::new(),
        };

        let read_file = File::open(&path).map_err(crate::error::SbxError::IndexIoError)?;
        let mut reader = BufReader::new(read_file);
        while let Some(record) = read_record(&mut reader) {
            index.apply(record);
        }
        Ok(index)
    }

    fn apply(&mut self, record: LogRecord) {
        match record {
            LogRecord::Source(r) => self.sources.push(r),
            LogRecord::Uid(r) => {
                self.uids.entry(r.uid).or_insert(r.version);
            }
            LogRecord::Meta(r) => self.metas.push(r),
            LogRecord::Block(r) => self.blocks.entry(r.uid).or_default().push(r),
        }
    }

    fn append(&mut self, record: &LogRecord) -> SbxResult<()> {
        let bytes = serde_json::to_vec(record)?;
        let mut crc = Crc32::new();
        crc.update(&bytes);
        self.log
            .write_all(&crc.finalize().to_le_bytes())
            .map_err(crate::error::SbxError::IndexIoError)?;
        self.log
            .write_all(&(bytes.len() as u32).to_le_bytes())
            .map_err(crate::error::SbxError::IndexIoError)?;
        self.log
            .write_all(&bytes)
            .map_err(crate::error::SbxError::IndexIoError)?;
        if self.last_commit.elapsed() >= COMMIT_INTERVAL {
            self.commit()?;
        }
        Ok(())
    }

    /// Force a durable flush of all buffered records. Called automatically
    /// roughly every half second of wall-clock scan time, and should be
    /// called once more when a scan finishes.
    pub fn commit(&mut self) -> SbxResult<()> {
        self.log.flush().map_err(crate::error::SbxError::IndexIoError)?;
        self.last_commit = Instant::now();
        Ok(())
    }

    pub fn add_source(&mut self, path: PathBuf) -> SbxResult<u32> {
        let id = self.sources.len() as u32;
        let rec = SourceRec { id, path };
        self.append(&LogRecord::Source(rec.clone()))?;
        self.sources.push(rec);
        Ok(id)
    }

    pub fn add_uid(&mut self, uid: Uid, version: u8) -> SbxResult<()> {
        if self.uids.contains_key(&uid) {
            return Ok(());
        }
        self.append(&LogRecord::Uid(UidRec { uid, version }))?;
        self.uids.insert(uid, version);
        Ok(())
    }

    pub fn add_meta(&mut self, meta: MetaRec) -> SbxResult<()> {
        self.append(&LogRecord::Meta(meta.clone()))?;
        self.metas.push(meta);
        Ok(())
    }

    pub fn add_block(&mut self, block: BlockRec) -> SbxResult<()> {
        self.append(&LogRecord::Block(block))?;
        self.blocks.entry(block.uid).or_default().push(block);
        Ok(())
    }

    pub fn sources(&self) -> &[SourceRec] {
        &self.sources
    }

    pub fn source_path(&self, id: u32) -> Option<&Path> {
        self.sources.iter().find(|s| s.id == id).map(|s| s.path.as_path())
    }

    pub fn all_uids(&self) -> impl Iterator<Item = Uid> + '_ {
        self.uids.keys().copied()
    }

    pub fn version_of(&self, uid: Uid) -> Option<u8> {
        self.uids.get(&uid).copied()
    }

    /// First observed metadata row for `uid`, if any block 0 was seen.
    pub fn meta_of(&self, uid: Uid) -> Option<&MetaRec> {
        self.metas.iter().find(|m| m.uid == uid)
    }

    /// Resolve a selector string (original filename or container filename)
    /// to every UID whose observed metadata matches it exactly.
    pub fn resolve_name(&self, name: &str) -> Vec<Uid> {
        self.metas
            .iter()
            .filter(|m| {
                m.filename.as_deref() == Some(name) || m.sbxname.as_deref() == Some(name)
            })
            .map(|m| m.uid)
            .collect()
    }

    /// Full block list for `uid`, de-duplicated by block number and ordered
    /// ascending. Ties between offsets carrying the same block number are
    /// broken by original insertion order — any copy is correct, since the
    /// scanner only ever records blocks that already passed CRC.
    pub fn blocks_of(&self, uid: Uid) -> Vec<BlockRec> {
        let Some(recs) = self.blocks.get(&uid) else {
            return Vec::new();
        };
        let mut seen = std::collections::HashSet::new();
        let mut deduped: Vec<BlockRec> = Vec::new();
        for rec in recs {
            if seen.insert(rec.block_number) {
                deduped.push(*rec);
            }
        }
        deduped.sort_by_key(|r| r.block_number);
        deduped
    }
}

impl Drop for RecoveryIndex {
    fn drop(&mut self) {
        let _ = self.log.flush();
    }
}

fn read_record<R: Read>(reader: &mut R) -> Option<LogRecord> {
    let mut crc_buf = [0u8; 4];
    if read_exact_or_eof(reader, &mut crc_buf)?.is_none() {
        return None;
    }
    let mut len_buf = [0u8; 4];
    read_exact_or_eof(reader, &mut len_buf)??;
    let expected_crc = u32::from_le_bytes(crc_buf);
    let len = u32::from_le_bytes(len_buf) as usize;

    let mut body = vec![0u8; len];
    read_exact_or_eof(reader, &mut body)??;

    let mut crc = Crc32::new();
    crc.update(&body);
    if crc.finalize() != expected_crc {
        return None;
    }
    serde_json::from_slice(&body).ok()
}

/// `Some(Some(()))` on a full read, `Some(None)` on a clean EOF before any
/// byte was consumed, `None` on a short/torn read (truncated tail).
fn read_exact_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> Option<Option<()>> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return if filled == 0 { Some(None) } else { None };
            }
            Ok(n) => filled += n,
            Err(_) => return None,
        }
    }
    Some(Some(()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn roundtrip_through_reopen() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_path_buf();

        {
            let mut idx = RecoveryIndex::create(&path).unwrap();
            let sid = idx.add_source(PathBuf::from("disk.img")).unwrap();
            let uid = Uid([1, 2, 3, 4, 5, 6]);
            idx.add_uid(uid, 1).unwrap();
            idx.add_block(BlockRec {
                uid,
                block_number: 1,
                source_id: sid,
                offset: 512,
            })
            .unwrap();
            idx.commit().unwrap();
        }

        let reopened = RecoveryIndex::open(&path).unwrap();
        let uid = Uid([1, 2, 3, 4, 5, 6]);
        assert_eq!(reopened.version_of(uid), Some(1));
        assert_eq!(reopened.blocks_of(uid).len(), 1);
        assert_eq!(reopened.source_path(0), Some(Path::new("disk.img")));
    }

    #[test]
    fn dedup_by_block_number() {
        let tmp = NamedTempFile::new().unwrap();
        let mut idx = RecoveryIndex::create(tmp.path()).unwrap();
        let uid = Uid([9; 6]);
        idx.add_uid(uid, 1).unwrap();
        for offset in [1024, 2048] {
            idx.add_block(BlockRec {
                uid,
                block_number: 1,
                source_id: 0,
                offset,
            })
            .unwrap();
        }
        let blocks = idx.blocks_of(uid);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].offset, 1024);
    }

    #[test]
    fn truncated_tail_stops_replay_without_failing() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_path_buf();
        {
            let mut idx = RecoveryIndex::create(&path).unwrap();
            idx.add_source(PathBuf::from("a")).unwrap();
            idx.commit().unwrap();
        }
        // Append a torn record: a CRC/length header with no body.
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[1, 2, 3, 4, 99, 0, 0, 0]).unwrap();
        }
        let reopened = RecoveryIndex::open(&path).unwrap();
        assert_eq!(reopened.sources().len(), 1);
    }
}
