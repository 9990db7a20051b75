use crate::errors::GitError;
use anyhow::{anyhow, bail, Context, Result};
use flate2::bufread::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use sha1::{Digest, Sha1};
use std::fmt;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub mod blob;
pub mod commit;
pub mod delta;
pub mod pack;
pub mod tree;

/// The four object kinds of the on-disk and pack formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
    Tag,
}

impl ObjectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Tree => "tree",
            ObjectKind::Commit => "commit",
            ObjectKind::Tag => "tag",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "blob" => Ok(ObjectKind::Blob),
            "tree" => Ok(ObjectKind::Tree),
            "commit" => Ok(ObjectKind::Commit),
            "tag" => Ok(ObjectKind::Tag),
            _ => Err(anyhow!("Unknown object kind: {}", s)),
        }
    }
}

/// A typed object that can serialize its payload and store itself.
pub trait GitObject {
    fn kind(&self) -> ObjectKind;

    fn payload(&self) -> Result<Vec<u8>>;

    fn hash(&self) -> Result<String> {
        let payload = self.payload()?;
        Ok(hash_hex(&serialize_object(self.kind(), &payload)))
    }

    fn save(&self, objects_dir: &Path) -> Result<String> {
        put(objects_dir, self.kind(), &self.payload()?)
    }
}

/// Canonical serialized form: `kind SP decimal_length NUL payload`.
/// The digest is always computed over this form.
pub fn serialize_object(kind: ObjectKind, payload: &[u8]) -> Vec<u8> {
    let header = format!("{} {}\0", kind, payload.len());
    let mut out = Vec::with_capacity(header.len() + payload.len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(payload);
    out
}

pub fn hash_hex(serialized: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(serialized);
    hex::encode(hasher.finalize())
}

/// Two-level sharded path: `objects/<hex[0:2]>/<hex[2:40]>`.
pub fn object_path(objects_dir: &Path, hash: &str) -> PathBuf {
    objects_dir.join(&hash[..2]).join(&hash[2..])
}

/// Stores a typed payload and returns its hex digest. Idempotent: an object
/// already present on disk is left untouched.
pub fn put(objects_dir: &Path, kind: ObjectKind, payload: &[u8]) -> Result<String> {
    let serialized = serialize_object(kind, payload);
    let hash = hash_hex(&serialized);
    write_object(objects_dir, &hash, &serialized)?;
    Ok(hash)
}

/// Stores an already-serialized object under a digest the caller has
/// computed. The pack ingest path uses this to avoid re-hashing.
pub fn put_raw(objects_dir: &Path, hash: &str, serialized: &[u8]) -> Result<()> {
    write_object(objects_dir, hash, serialized)
}

fn write_object(objects_dir: &Path, hash: &str, serialized: &[u8]) -> Result<()> {
    let path = object_path(objects_dir, hash);
    if path.exists() {
        return Ok(());
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(serialized)
        .context("Failed to compress object")?;
    let compressed = encoder.finish().context("Failed to finish compression")?;

    let dir = path.parent().context("Invalid object path")?;
    fs::create_dir_all(dir).context("Failed to create object directory")?;

    // Write-then-rename keeps racing writers from exposing a torn file.
    let tmp = dir.join(format!("tmp-{}-{}", std::process::id(), &hash[2..]));
    fs::write(&tmp, compressed)
        .with_context(|| format!("Failed to write object {}", hash))?;
    fs::rename(&tmp, &path)
        .with_context(|| format!("Failed to move object {} into place", hash))?;
    Ok(())
}

/// Reads an object back as `(kind, payload)`, verifying the header's length
/// field against the actual payload.
pub fn get(objects_dir: &Path, hash: &str) -> Result<(ObjectKind, Vec<u8>)> {
    if hash.len() != 40 || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
        bail!("Invalid object hash: {}", hash);
    }

    let path = object_path(objects_dir, hash);
    let compressed = match fs::read(&path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(GitError::NotFound(hash.to_string()).into());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read object {}", hash));
        }
    };

    let mut decoder = ZlibDecoder::new(&compressed[..]);
    let mut data = Vec::new();
    decoder
        .read_to_end(&mut data)
        .map_err(|e| GitError::corrupt(hash, format!("zlib: {}", e)))?;

    let null_pos = data
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| GitError::corrupt(hash, "missing header terminator"))?;

    let header = std::str::from_utf8(&data[..null_pos])
        .map_err(|_| GitError::corrupt(hash, "header is not UTF-8"))?;
    let (kind, size) = header
        .split_once(' ')
        .ok_or_else(|| GitError::corrupt(hash, "malformed header"))?;

    let kind: ObjectKind = kind
        .parse()
        .map_err(|_| GitError::corrupt(hash, format!("unknown kind {:?}", kind)))?;
    let size: usize = size
        .parse()
        .map_err(|_| GitError::corrupt(hash, "non-decimal length"))?;

    let payload = data[null_pos + 1..].to_vec();
    if payload.len() != size {
        return Err(GitError::corrupt(
            hash,
            format!("length {} does not match payload {}", size, payload.len()),
        )
        .into());
    }

    Ok((kind, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn put_get_round_trip() {
        let tmp = tempdir().unwrap();
        let hash = put(tmp.path(), ObjectKind::Blob, b"hello").unwrap();
        assert_eq!(hash, "b6fc4c620b67d95f953a5c1c1230aaab5db5a1b0");

        let (kind, payload) = get(tmp.path(), &hash).unwrap();
        assert_eq!(kind, ObjectKind::Blob);
        assert_eq!(payload, b"hello");
    }

    #[test]
    fn empty_blob_digest() {
        let tmp = tempdir().unwrap();
        let hash = put(tmp.path(), ObjectKind::Blob, b"").unwrap();
        assert_eq!(hash, "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391");
    }

    #[test]
    fn put_is_idempotent() {
        let tmp = tempdir().unwrap();
        let hash = put(tmp.path(), ObjectKind::Blob, b"twice").unwrap();
        let path = object_path(tmp.path(), &hash);
        let first = fs::read(&path).unwrap();

        let again = put(tmp.path(), ObjectKind::Blob, b"twice").unwrap();
        assert_eq!(hash, again);
        assert_eq!(first, fs::read(&path).unwrap());
    }

    #[test]
    fn stored_file_is_compressed_canonical_form() {
        let tmp = tempdir().unwrap();
        let hash = put(tmp.path(), ObjectKind::Blob, b"hello").unwrap();

        let compressed = fs::read(object_path(tmp.path(), &hash)).unwrap();
        let mut decoder = ZlibDecoder::new(&compressed[..]);
        let mut data = Vec::new();
        decoder.read_to_end(&mut data).unwrap();
        assert_eq!(data, b"blob 5\0hello");
        assert_eq!(hash_hex(&data), hash);
    }

    #[test]
    fn get_missing_is_not_found() {
        let tmp = tempdir().unwrap();
        let err = get(tmp.path(), "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GitError>(),
            Some(GitError::NotFound(_))
        ));
    }

    #[test]
    fn get_rejects_length_mismatch() {
        let tmp = tempdir().unwrap();
        // A header that lies about its payload size.
        let serialized = b"blob 99\0hello";
        let hash = hash_hex(serialized);
        put_raw(tmp.path(), &hash, serialized).unwrap();

        let err = get(tmp.path(), &hash).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GitError>(),
            Some(GitError::Corrupt { .. })
        ));
    }

    #[test]
    fn get_rejects_garbage_compression() {
        let tmp = tempdir().unwrap();
        let hash = "0123456789012345678901234567890123456789";
        let path = object_path(tmp.path(), hash);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"not zlib at all").unwrap();

        let err = get(tmp.path(), hash).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GitError>(),
            Some(GitError::Corrupt { .. })
        ));
    }
}
