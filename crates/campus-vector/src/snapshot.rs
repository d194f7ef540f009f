//! On-disk snapshot of a `VectorIndex`.
//!
//! Layout (little-endian):
//!
//! ```text
//! 0   magic        b"CMPX"
//! 4   version      u16
//! 6   flags        u16 (reserved, 0)
//! 8   dim          u32
//! 12  reserved     u32
//! 16  count        u64  passages == rows
//! 24  created_at   i64  unix millis
//! 32  vectors_len  u64  bytes of f32 rows
//! 40  meta_len     u64  bytes of JSON passages
//! 48  checksum     [u8; 16] blake3(vectors ++ meta), truncated
//! 64  vectors, then meta
//! ```
//!
//! Snapshots are written to a temp file in the destination directory and
//! renamed into place, so readers see either the old file or the new one.
use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use tempfile::NamedTempFile;

use campus_core::types::Passage;
use campus_core::{Error, Result};

pub const MAGIC: &[u8; 4] = b"CMPX";
pub const VERSION: u16 = 1;
pub const HEADER_LEN: usize = 64;
const CHECKSUM_LEN: usize = 16;

/// Decoded snapshot contents.
#[derive(Debug)]
pub struct Snapshot {
    pub dim: usize,
    pub created_at: DateTime<Utc>,
    pub vectors: Vec<f32>,
    pub passages: Vec<Passage>,
}

fn checksum(vectors: &[u8], meta: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(vectors);
    hasher.update(meta);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&hasher.finalize().as_bytes()[..CHECKSUM_LEN]);
    out
}

fn unavailable(path: &Path, what: impl std::fmt::Display) -> Error {
    Error::IndexUnavailable(format!("{}: {what}", path.display()))
}

pub fn write_snapshot(path: &Path, dim: usize, vectors: &[f32], passages: &[Passage]) -> Result<()> {
    if vectors.len() != dim * passages.len() {
        return Err(Error::CountMismatch { vectors: vectors.len() / dim.max(1), passages: passages.len() });
    }
    let dim32 = u32::try_from(dim).map_err(|_| Error::InvalidArgument(format!("dimension {dim} too large")))?;
    let vector_bytes: Vec<u8> = vectors.iter().flat_map(|x| x.to_le_bytes()).collect();
    let meta = serde_json::to_vec(passages).map_err(|e| Error::InvalidArgument(format!("passage metadata: {e}")))?;

    let mut header = Vec::with_capacity(HEADER_LEN);
    header.extend_from_slice(MAGIC);
    header.extend_from_slice(&VERSION.to_le_bytes());
    header.extend_from_slice(&0u16.to_le_bytes());
    header.extend_from_slice(&dim32.to_le_bytes());
    header.extend_from_slice(&0u32.to_le_bytes());
    header.extend_from_slice(&(passages.len() as u64).to_le_bytes());
    header.extend_from_slice(&Utc::now().timestamp_millis().to_le_bytes());
    header.extend_from_slice(&(vector_bytes.len() as u64).to_le_bytes());
    header.extend_from_slice(&(meta.len() as u64).to_le_bytes());
    header.extend_from_slice(&checksum(&vector_bytes, &meta));
    debug_assert_eq!(header.len(), HEADER_LEN);

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&header)?;
    tmp.write_all(&vector_bytes)?;
    tmp.write_all(&meta)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    tracing::info!(path = %path.display(), passages = passages.len(), dim, "snapshot written");
    Ok(())
}

fn u16_at(b: &[u8], at: usize) -> u16 { u16::from_le_bytes([b[at], b[at + 1]]) }

fn u32_at(b: &[u8], at: usize) -> u32 {
    let mut a = [0u8; 4];
    a.copy_from_slice(&b[at..at + 4]);
    u32::from_le_bytes(a)
}

fn u64_at(b: &[u8], at: usize) -> u64 {
    let mut a = [0u8; 8];
    a.copy_from_slice(&b[at..at + 8]);
    u64::from_le_bytes(a)
}

/// Reads and fully validates a snapshot. Every failure, including a missing
/// file, is reported as `IndexUnavailable`.
pub fn read_snapshot(path: &Path, expected_dim: Option<usize>) -> Result<Snapshot> {
    let bytes = fs::read(path).map_err(|e| unavailable(path, e))?;
    if bytes.len() < HEADER_LEN {
        return Err(unavailable(path, "truncated header"));
    }
    if &bytes[0..4] != MAGIC {
        return Err(unavailable(path, "not an index snapshot"));
    }
    let version = u16_at(&bytes, 4);
    if version != VERSION {
        return Err(unavailable(path, format!("unsupported snapshot version {version}")));
    }
    let dim = u32_at(&bytes, 8) as usize;
    let count = u64_at(&bytes, 16);
    let created_ms = u64_at(&bytes, 24) as i64;
    let vectors_len = u64_at(&bytes, 32);
    let meta_len = u64_at(&bytes, 40);
    if dim == 0 {
        return Err(unavailable(path, "zero dimension"));
    }
    if let Some(expected) = expected_dim {
        if expected != dim {
            return Err(unavailable(path, format!("snapshot dimension {dim}, embedder produces {expected}")));
        }
    }
    let expected_vectors = count.checked_mul(dim as u64).and_then(|n| n.checked_mul(4));
    if expected_vectors != Some(vectors_len) {
        return Err(unavailable(path, "vector section does not match header counts"));
    }
    let body_len = vectors_len.checked_add(meta_len);
    if body_len != Some((bytes.len() - HEADER_LEN) as u64) {
        return Err(unavailable(path, "file length does not match header"));
    }

    let body = &bytes[HEADER_LEN..];
    let (vector_bytes, meta) = body.split_at(vectors_len as usize);
    if checksum(vector_bytes, meta)[..] != bytes[48..HEADER_LEN] {
        return Err(unavailable(path, "checksum mismatch"));
    }

    let passages: Vec<Passage> =
        serde_json::from_slice(meta).map_err(|e| unavailable(path, format!("passage metadata: {e}")))?;
    if passages.len() as u64 != count {
        return Err(unavailable(path, "passage count does not match header"));
    }
    let vectors: Vec<f32> = vector_bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    if vectors.iter().any(|x| !x.is_finite()) {
        return Err(unavailable(path, "non-finite vector value"));
    }
    let mut seen = std::collections::HashSet::with_capacity(passages.len());
    if !passages.iter().all(|p| seen.insert(p.id)) {
        return Err(unavailable(path, "duplicate passage ids"));
    }
    let created_at = Utc.timestamp_millis_opt(created_ms).single().unwrap_or_default();

    tracing::debug!(path = %path.display(), passages = passages.len(), dim, %created_at, "snapshot read");
    Ok(Snapshot { dim, created_at, vectors, passages })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn passages() -> Vec<Passage> {
        (0..3)
            .map(|i| Passage { id: i, text: format!("text {i}"), source_id: format!("doc_{i}"), chunk_index: 0 })
            .collect()
    }

    fn write_sample(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("index.snap");
        let vectors = vec![1.0, 0.0, 0.0, 1.0, 0.6, 0.8];
        write_snapshot(&path, 2, &vectors, &passages()).expect("write");
        path
    }

    #[test]
    fn roundtrip_preserves_rows_and_passages() {
        let dir = TempDir::new().expect("tmp");
        let path = write_sample(&dir);
        let snap = read_snapshot(&path, Some(2)).expect("read");
        assert_eq!(snap.dim, 2);
        assert_eq!(snap.vectors, vec![1.0, 0.0, 0.0, 1.0, 0.6, 0.8]);
        assert_eq!(snap.passages, passages());
        assert!(snap.created_at <= Utc::now());
    }

    #[test]
    fn missing_file_is_unavailable() {
        let dir = TempDir::new().expect("tmp");
        let err = read_snapshot(&dir.path().join("nope.snap"), None).unwrap_err();
        assert!(matches!(err, Error::IndexUnavailable(_)));
    }

    #[test]
    fn truncated_file_is_unavailable() {
        let dir = TempDir::new().expect("tmp");
        let path = write_sample(&dir);
        let bytes = fs::read(&path).expect("read");
        for len in [0, 10, HEADER_LEN, bytes.len() - 1] {
            fs::write(&path, &bytes[..len]).expect("write");
            assert!(matches!(read_snapshot(&path, None), Err(Error::IndexUnavailable(_))), "len {len}");
        }
    }

    #[test]
    fn flipped_body_byte_fails_checksum() {
        let dir = TempDir::new().expect("tmp");
        let path = write_sample(&dir);
        let mut bytes = fs::read(&path).expect("read");
        bytes[HEADER_LEN + 1] ^= 0x40;
        fs::write(&path, &bytes).expect("write");
        let err = read_snapshot(&path, None).unwrap_err();
        assert!(err.to_string().contains("checksum"), "{err}");
    }

    #[test]
    fn wrong_magic_and_dimension_are_rejected() {
        let dir = TempDir::new().expect("tmp");
        let path = write_sample(&dir);
        assert!(matches!(read_snapshot(&path, Some(3)), Err(Error::IndexUnavailable(_))));

        let mut bytes = fs::read(&path).expect("read");
        bytes[0] = b'X';
        fs::write(&path, &bytes).expect("write");
        assert!(matches!(read_snapshot(&path, None), Err(Error::IndexUnavailable(_))));
    }

    #[test]
    fn write_leaves_no_temp_files() {
        let dir = TempDir::new().expect("tmp");
        write_sample(&dir);
        write_sample(&dir);
        let names: Vec<_> = fs::read_dir(dir.path()).expect("ls").map(|e| e.expect("entry").file_name()).collect();
        assert_eq!(names, vec![std::ffi::OsString::from("index.snap")]);
    }
}
