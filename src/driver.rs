//! Encoder / decoder drivers (C3): stream a source file to and from a
//! sequence of blocks.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::block::{BlockCodec, BlockVersion, DecodedBlock, MAGIC};
use crate::error::{SbxError, SbxResult};
use crate::hash::{multihash_sha256, RunningHash};
use crate::metadata::{BlockMetadata, SENTINEL};
use crate::uid::Uid;
use crate::whitener::Whitener;

/// Caller-supplied fields for the metadata block. `precomputed_hash` lets a
/// caller that already knows the digest skip the encoder's hashing pass.
#[derive(Debug, Clone, Default)]
pub struct MetadataInput {
    pub filename: Option<String>,
    pub sbx_name: Option<String>,
    pub file_datetime: Option<i64>,
    pub sbx_datetime: Option<i64>,
    pub precomputed_hash: Option<[u8; 32]>,
}

#[derive(Debug, Clone, Default)]
pub struct EncodeReport {
    pub blocks_written: u32,
    pub source_bytes: u64,
    pub container_bytes: u64,
}

impl EncodeReport {
    pub fn overhead_pct(&self) -> f64 {
        if self.source_bytes == 0 {
            return 0.0;
        }
        (self.container_bytes as f64 - self.source_bytes as f64) / self.source_bytes as f64 * 100.0
    }

    pub fn summary(&self) -> String {
        format!(
            "{} blocks, {} bytes -> {} bytes ({:+.1}% overhead)",
            self.blocks_written,
            self.source_bytes,
            self.container_bytes,
            self.overhead_pct()
        )
    }
}

/// Batches small block writes into larger sequential ones, cutting syscall
/// count when block versions are small and source files are large.
struct WriteBuffer<W: Write> {
    inner: W,
    buf: Vec<u8>,
    capacity: usize,
}

impl<W: Write> WriteBuffer<W> {
    fn new(inner: W, capacity: usize) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(capacity),
            capacity,
        }
    }

    fn write_block(&mut self, block: &[u8]) -> SbxResult<()> {
        self.buf.extend_from_slice(block);
        if self.buf.len() >= self.capacity {
            self.inner.write_all(&self.buf)?;
            self.buf.clear();
        }
        Ok(())
    }

    fn finish(mut self) -> SbxResult<()> {
        if !self.buf.is_empty() {
            self.inner.write_all(&self.buf)?;
        }
        self.inner.flush()?;
        Ok(())
    }
}

const WRITE_BUFFER_BLOCKS: usize = 64;

pub struct Encoder;

impl Encoder {
    /// Stream `source` through `codec` into `dest`, one block at a time.
    ///
    /// When `metadata` is `Some`, block 0 is emitted first: the entire
    /// source is hashed in a dedicated pass (unless the caller already
    /// supplied a digest) before any block is written — a clean separation
    /// over interleaving hashing with block I/O. When `metadata` is `None`,
    /// no block 0 is written at all.
    pub fn encode<R: Read + Seek, W: Write>(
        source: &mut R,
        dest: &mut W,
        codec: &BlockCodec,
        metadata: Option<MetadataInput>,
    ) -> SbxResult<EncodeReport> {
        let source_len = source.seek(SeekFrom::End(0))?;
        source.seek(SeekFrom::Start(0))?;

        let payload_size = codec.payload_size();
        let mut buffer = WriteBuffer::new(dest, codec.block_size() * WRITE_BUFFER_BLOCKS);
        let mut container_bytes = 0u64;
        let mut blocks_written = 0u32;

        if let Some(input) = metadata {
            let digest = match input.precomputed_hash {
                Some(d) => d,
                None => {
                    let digest = hash_stream(source)?;
                    source.seek(SeekFrom::Start(0))?;
                    digest
                }
            };

            let meta = BlockMetadata {
                filename: input.filename,
                sbx_name: input.sbx_name,
                file_size: Some(source_len),
                file_datetime: input.file_datetime,
                sbx_datetime: input.sbx_datetime,
                content_hash: Some(multihash_sha256(&digest)),
                unknown: Vec::new(),
            };

            let block = codec.encode(0, &[], Some(&meta))?;
            container_bytes += block.len() as u64;
            blocks_written += 1;
            buffer.write_block(&block)?;
        }

        let mut block_number = 1u32;
        let mut chunk = vec![0u8; payload_size];
        loop {
            let n = read_fill(source, &mut chunk)?;
            if n == 0 {
                break;
            }
            if n < payload_size {
                for b in &mut chunk[n..] {
                    *b = SENTINEL;
                }
            }
            let block = codec.encode(block_number, &chunk, None)?;
            container_bytes += block.len() as u64;
            buffer.write_block(&block)?;
            blocks_written += 1;
            block_number += 1;
            if n < payload_size {
                break;
            }
        }

        buffer.finish()?;

        Ok(EncodeReport {
            blocks_written,
            source_bytes: source_len,
            container_bytes,
        })
    }
}

fn hash_stream<R: Read>(source: &mut R) -> SbxResult<[u8; 32]> {
    let mut running = RunningHash::new();
    let mut chunk = [0u8; 64 * 1024];
    loop {
        let n = source.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        running.update(&chunk[..n]);
    }
    Ok(running.finalize())
}

/// Read until `buf` is full or the source is exhausted, returning the
/// number of bytes actually placed (short only at EOF — `Read::read` may
/// itself return short reads before EOF, which this loops through).
fn read_fill<R: Read>(source: &mut R, buf: &mut [u8]) -> SbxResult<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = source.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Strict mode aborts on the first ordering or decode violation; continue
/// mode accumulates warnings and keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    Strict,
    Continue,
}

#[derive(Debug, Clone, Default)]
pub struct DecodeReport {
    pub blocks_read: u32,
    pub bytes_written: u64,
    pub missed_blocks: u32,
    pub hash_checked: bool,
    pub hash_ok: bool,
    pub eof_marker_count: u32,
}

impl DecodeReport {
    pub fn summary(&self) -> String {
        let hash_part = if self.hash_checked {
            if self.hash_ok {
                "hash OK".to_string()
            } else {
                "HASH MISMATCH".to_string()
            }
        } else {
            "no hash to check".to_string()
        };
        format!(
            "{} blocks read, {} bytes written, {} missed, {}",
            self.blocks_read, self.bytes_written, self.missed_blocks, hash_part
        )
    }
}

/// Determine the block version from a container's first four raw bytes,
/// stripping the whitener first if a password is configured. The keystream
/// prefix is identical regardless of the final block size, since whitener
/// generation only ever appends to and truncates a single running chain.
pub fn sniff_version(raw_prefix: &[u8; 4], password: Option<&str>) -> SbxResult<BlockVersion> {
    let mut probe = *raw_prefix;
    if let Some(pw) = password {
        Whitener::new(pw, 4).xor(&mut probe);
    }
    if &probe[0..3] != MAGIC {
        return Err(SbxError::NotASeqBoxFile);
    }
    BlockVersion::from_u8(probe[3]).ok_or(SbxError::UnsupportedVersion(probe[3]))
}

pub struct Decoder;

impl Decoder {
    /// Decode a container from `source` into `dest` (or nowhere, for
    /// test-only/info-only runs). The version is sniffed from the stream
    /// itself; the caller never has to know it in advance.
    pub fn run<R: Read, W: Write>(
        source: &mut R,
        mut dest: Option<&mut W>,
        password: Option<&str>,
        mode: DecodeMode,
    ) -> SbxResult<DecodeReport> {
        let mut prefix = [0u8; 4];
        let n = read_fill(source, &mut prefix)?;
        if n < 4 {
            return Err(SbxError::NotASeqBoxFile);
        }
        let version = sniff_version(&prefix, password)?;
        let codec = BlockCodec::new(version, Uid([0u8; 6]), password);
        let block_size = codec.block_size();

        let mut report = DecodeReport::default();
        let mut metadata: Option<BlockMetadata> = None;
        let mut last_emitted = 0u32;
        let mut written = 0u64;
        let mut running_hash = RunningHash::new();
        let mut last_payload_tail = [0u8; 4];
        let mut first = true;

        loop {
            let block_bytes = if first {
                first = false;
                let mut buf = vec![0u8; block_size];
                buf[..4].copy_from_slice(&prefix);
                let got = read_fill(source, &mut buf[4..])?;
                if got < block_size - 4 {
                    break; // truncated before the first block even completed
                }
                buf
            } else {
                let mut buf = vec![0u8; block_size];
                let got = read_fill(source, &mut buf)?;
                if got < block_size {
                    break; // any short read is a clean end-of-stream, not a decode failure
                }
                buf
            };

            match codec.decode(&block_bytes) {
                Ok(decoded) => {
                    report.blocks_read += 1;
                    Self::apply_block(
                        decoded,
                        mode,
                        &mut metadata,
                        &mut last_emitted,
                        &mut written,
                        &mut running_hash,
                        &mut last_payload_tail,
                        &mut report,
                        dest.as_deref_mut(),
                    )?;
                }
                Err(e) => {
                    if mode == DecodeMode::Strict {
                        return Err(e);
                    }
                    report.missed_blocks += 1;
                }
            }
        }

        report.bytes_written = written;
        let has_hash = metadata
            .as_ref()
            .and_then(|m| m.sha256_digest())
            .is_some();
        if has_hash {
            let expected = metadata.as_ref().unwrap().sha256_digest().unwrap();
            report.hash_checked = true;
            let actual = running_hash.finalize();
            report.hash_ok = actual == expected;
            if !report.hash_ok {
                return Err(SbxError::HashMismatch);
            }
        } else if metadata.as_ref().map(|m| m.file_size.is_none()).unwrap_or(true) {
            report.eof_marker_count = trailing_sentinels(&last_payload_tail);
        }

        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_block<W: Write>(
        decoded: DecodedBlock,
        mode: DecodeMode,
        metadata: &mut Option<BlockMetadata>,
        last_emitted: &mut u32,
        written: &mut u64,
        running_hash: &mut RunningHash,
        last_payload_tail: &mut [u8; 4],
        report: &mut DecodeReport,
        dest: Option<&mut W>,
    ) -> SbxResult<()> {
        if decoded.block_number == 0 {
            if metadata.is_none() {
                *metadata = decoded.metadata;
            }
            return Ok(());
        }

        if decoded.block_number > *last_emitted + 1 {
            if mode == DecodeMode::Strict {
                return Err(SbxError::BlocksOutOfOrder {
                    expected: *last_emitted + 1,
                    found: decoded.block_number,
                });
            }
            report.missed_blocks += decoded.block_number - *last_emitted - 1;
        }
        *last_emitted = decoded.block_number;

        let mut payload = decoded.payload;
        if let Some(meta) = metadata.as_ref() {
            if let Some(fsz) = meta.file_size {
                let remaining = fsz.saturating_sub(*written);
                let take = (payload.len() as u64).min(remaining) as usize;
                payload.truncate(take);
            }
        }

        *last_payload_tail = [0u8; 4];
        let tail_len = payload.len().min(4);
        last_payload_tail[4 - tail_len..].copy_from_slice(&payload[payload.len() - tail_len..]);

        running_hash.update(&payload);
        *written += payload.len() as u64;

        if let Some(w) = dest {
            w.write_all(&payload)?;
        }
        Ok(())
    }
}

fn trailing_sentinels(tail: &[u8; 4]) -> u32 {
    tail.iter().rev().take_while(|&&b| b == SENTINEL).count() as u32
}
