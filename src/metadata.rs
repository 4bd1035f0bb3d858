//! Metadata block (block 0) payload: a typed struct instead of the
//! prototype's dynamic string-keyed map, per the "Dynamic metadata map"
//! design note — one `Option<T>` field per recognised tag, plus an
//! `unknown` catch-all list so forward compatibility is preserved.

use crate::error::SbxResult;
use crate::hash::parse_multihash;

/// Sentinel that pads unused payload bytes and terminates TLV parsing.
pub const SENTINEL: u8 = 0x1A;

/// Canonical emission order: only present fields are written, each once.
const TAG_ORDER: [&[u8; 3]; 6] = [b"FNM", b"SNM", b"FSZ", b"FDT", b"SDT", b"HSH"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockMetadata {
    /// Original filename (`FNM`), UTF-8.
    pub filename: Option<String>,
    /// Container filename (`SNM`), UTF-8.
    pub sbx_name: Option<String>,
    /// Original file size in bytes (`FSZ`).
    pub file_size: Option<u64>,
    /// Original file mtime, epoch seconds (`FDT`). `-1` means unknown.
    pub file_datetime: Option<i64>,
    /// Container creation time, epoch seconds (`SDT`). `-1` means unknown.
    pub sbx_datetime: Option<i64>,
    /// Multihash-framed content hash (`HSH`): `code(1) || len(1) || digest`.
    pub content_hash: Option<Vec<u8>>,
    /// Any TLV tag not recognised above, preserved verbatim.
    pub unknown: Vec<([u8; 3], Vec<u8>)>,
}

impl BlockMetadata {
    pub fn is_empty(&self) -> bool {
        self.filename.is_none()
            && self.sbx_name.is_none()
            && self.file_size.is_none()
            && self.file_datetime.is_none()
            && self.sbx_datetime.is_none()
            && self.content_hash.is_none()
            && self.unknown.is_empty()
    }

    /// SHA-256 digest bytes, if `HSH` is present and well-formed.
    pub fn sha256_digest(&self) -> Option<[u8; 32]> {
        let hash = self.content_hash.as_ref()?;
        let (_, digest) = parse_multihash(hash)?;
        digest.try_into().ok()
    }

    /// Serialise to the canonical TLV byte sequence (unpadded — the caller
    /// pads to `payload_size` with [`SENTINEL`]).
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for tag in TAG_ORDER {
            match *tag {
                b"FNM" => emit(&mut out, tag, self.filename.as_ref().map(|s| s.as_bytes())),
                b"SNM" => emit(&mut out, tag, self.sbx_name.as_ref().map(|s| s.as_bytes())),
                b"FSZ" => emit_u64(&mut out, tag, self.file_size),
                b"FDT" => emit_i64(&mut out, tag, self.file_datetime),
                b"SDT" => emit_i64(&mut out, tag, self.sbx_datetime),
                b"HSH" => emit(&mut out, tag, self.content_hash.as_deref()),
                _ => unreachable!(),
            }
        }
        for (tag, value) in &self.unknown {
            out.extend_from_slice(tag);
            out.push(value.len() as u8);
            out.extend_from_slice(value);
        }
        out
    }

    /// Parse a TLV stream, stopping at the `0x1A 0x1A 0x1A` sentinel or at
    /// payload end. Unknown tags are preserved, not skipped outright; a
    /// declared length that would run past the end of the payload is treated
    /// the same as reaching payload end — parsing stops silently and
    /// whatever was parsed so far is returned, it is never a hard error.
    pub fn decode(payload: &[u8]) -> SbxResult<Self> {
        let mut meta = BlockMetadata::default();
        let mut p = 0usize;
        while p + 3 <= payload.len() {
            if &payload[p..p + 3] == [SENTINEL, SENTINEL, SENTINEL] {
                break;
            }
            let tag: [u8; 3] = payload[p..p + 3].try_into().unwrap();
            p += 3;
            if p >= payload.len() {
                break;
            }
            let len = payload[p] as usize;
            p += 1;
            if p + len > payload.len() {
                break;
            }
            let value = &payload[p..p + len];
            p += len;

            match &tag {
                b"FNM" => meta.filename = Some(String::from_utf8_lossy(value).into_owned()),
                b"SNM" => meta.sbx_name = Some(String::from_utf8_lossy(value).into_owned()),
                b"FSZ" => meta.file_size = Some(be_u64(value)),
                b"FDT" => meta.file_datetime = Some(be_i64(value)),
                b"SDT" => meta.sbx_datetime = Some(be_i64(value)),
                b"HSH" => meta.content_hash = Some(value.to_vec()),
                _ => meta.unknown.push((tag, value.to_vec())),
            }
        }
        Ok(meta)
    }
}

fn emit(out: &mut Vec<u8>, tag: &[u8; 3], value: Option<&[u8]>) {
    if let Some(v) = value {
        out.extend_from_slice(tag);
        out.push(v.len() as u8);
        out.extend_from_slice(v);
    }
}

fn emit_u64(out: &mut Vec<u8>, tag: &[u8; 3], value: Option<u64>) {
    if let Some(v) = value {
        let bytes = v.to_be_bytes();
        out.extend_from_slice(tag);
        out.push(bytes.len() as u8);
        out.extend_from_slice(&bytes);
    }
}

fn emit_i64(out: &mut Vec<u8>, tag: &[u8; 3], value: Option<i64>) {
    if let Some(v) = value {
        let bytes = v.to_be_bytes();
        out.extend_from_slice(tag);
        out.push(bytes.len() as u8);
        out.extend_from_slice(&bytes);
    }
}

fn be_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    let n = bytes.len().min(8);
    buf[8 - n..].copy_from_slice(&bytes[bytes.len() - n..]);
    u64::from_be_bytes(buf)
}

fn be_i64(bytes: &[u8]) -> i64 {
    be_u64(bytes) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{multihash_sha256, sha256};

    #[test]
    fn roundtrip_all_fields() {
        let digest = sha256(b"ABC");
        let meta = BlockMetadata {
            filename: Some("file.bin".into()),
            sbx_name: Some("file.bin.sbx".into()),
            file_size: Some(3),
            file_datetime: Some(1_700_000_000),
            sbx_datetime: Some(1_700_000_100),
            content_hash: Some(multihash_sha256(&digest)),
            unknown: Vec::new(),
        };
        let encoded = meta.encode();
        let decoded = BlockMetadata::decode(&encoded).unwrap();
        assert_eq!(decoded, meta);
    }

    #[test]
    fn empty_metadata_roundtrips() {
        let meta = BlockMetadata::default();
        let encoded = meta.encode();
        assert!(encoded.is_empty());
        assert_eq!(BlockMetadata::decode(&encoded).unwrap(), meta);
    }

    #[test]
    fn sentinel_stops_parsing() {
        let mut payload = Vec::new();
        payload.extend_from_slice(b"FSZ");
        payload.push(8);
        payload.extend_from_slice(&42u64.to_be_bytes());
        payload.extend_from_slice(&[SENTINEL; 10]);
        let decoded = BlockMetadata::decode(&payload).unwrap();
        assert_eq!(decoded.file_size, Some(42));
    }

    #[test]
    fn unknown_tag_preserved() {
        let mut payload = Vec::new();
        payload.extend_from_slice(b"ZZZ");
        payload.push(2);
        payload.extend_from_slice(b"hi");
        let decoded = BlockMetadata::decode(&payload).unwrap();
        assert_eq!(decoded.unknown, vec![(*b"ZZZ", b"hi".to_vec())]);
    }

    #[test]
    fn overlong_length_stops_parsing_silently() {
        let mut payload = Vec::new();
        payload.extend_from_slice(b"FNM");
        payload.push(200); // claims 200 bytes but none follow
        let decoded = BlockMetadata::decode(&payload).unwrap();
        assert_eq!(decoded, BlockMetadata::default());
    }
}
