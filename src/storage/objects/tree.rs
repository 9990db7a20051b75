use super::blob::Blob;
use super::{get, GitObject, ObjectKind};
use anyhow::{bail, Context, Result};
use indicatif::ProgressBar;
use std::fs;
use std::path::Path;

pub const MODE_FILE: &str = "100644";
pub const MODE_EXEC: &str = "100755";
pub const MODE_SYMLINK: &str = "120000";
pub const MODE_DIR: &str = "40000";

/// A single entry of a tree object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Octal mode string without leading zeros, e.g. "100644" or "40000".
    pub mode: String,
    /// Entry name: an arbitrary byte sequence not containing SP or NUL.
    /// Names are not required to be UTF-8.
    pub name: Vec<u8>,
    /// Hex digest of the referenced object.
    pub hash: String,
}

impl TreeEntry {
    pub fn kind(&self) -> &'static str {
        if self.mode == MODE_DIR {
            "tree"
        } else {
            "blob"
        }
    }

    /// Mode left-padded to six digits, for display only.
    pub fn padded_mode(&self) -> String {
        format!("{:0>6}", self.mode)
    }

    /// Lossy text form of the name, for display only.
    pub fn display_name(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }

    fn is_dir(&self) -> bool {
        self.mode == MODE_DIR
    }

    /// Canonical ordering key: directories compare as if their name carried
    /// a trailing '/'. This matches stock git, so tree digests agree with it
    /// even when a file `x` and a directory `x.y` share a prefix.
    fn sort_key(&self) -> Vec<u8> {
        let mut key = self.name.clone();
        if self.is_dir() {
            key.push(b'/');
        }
        key
    }
}

/// A directory object: entries in strictly increasing canonical order.
#[derive(Debug)]
pub struct Tree {
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    pub fn load(objects_dir: &Path, hash: &str) -> Result<Self> {
        let (kind, payload) = get(objects_dir, hash)?;
        if kind != ObjectKind::Tree {
            bail!("Object {} is a {}, not a tree", hash, kind);
        }
        Self::parse(&payload)
    }

    /// Parses the payload: repeated `mode SP name NUL digest20`.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let mut entries = Vec::new();
        let mut pos = 0;

        while pos < payload.len() {
            let space = payload[pos..]
                .iter()
                .position(|&b| b == b' ')
                .context("Tree entry has no mode terminator")?;
            let mode = std::str::from_utf8(&payload[pos..pos + space])
                .context("Tree entry mode is not ASCII")?
                .to_string();
            pos += space + 1;

            let null = payload[pos..]
                .iter()
                .position(|&b| b == 0)
                .context("Tree entry has no name terminator")?;
            let name = payload[pos..pos + null].to_vec();
            pos += null + 1;

            if payload.len() < pos + 20 {
                bail!("Tree entry digest is truncated");
            }
            let hash = hex::encode(&payload[pos..pos + 20]);
            pos += 20;

            entries.push(TreeEntry { mode, name, hash });
        }

        Ok(Tree { entries })
    }

    fn sort_entries(&mut self) {
        self.entries.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    }
}

impl GitObject for Tree {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Tree
    }

    fn payload(&self) -> Result<Vec<u8>> {
        let mut content = Vec::new();
        for entry in &self.entries {
            content.extend_from_slice(entry.mode.as_bytes());
            content.push(b' ');
            content.extend_from_slice(&entry.name);
            content.push(0);
            let raw = hex::decode(&entry.hash)
                .with_context(|| format!("Entry {} has a non-hex digest", entry.display_name()))?;
            content.extend_from_slice(&raw);
        }
        Ok(content)
    }
}

/// Walks `dir`, storing a blob per regular file and a tree per subdirectory,
/// and returns the hex digest of the resulting root tree. Entries named
/// exactly `.git` are skipped, as are filesystem kinds this tool does not
/// model (symlinks, sockets, devices).
pub fn write_tree_from_dir(objects_dir: &Path, dir: &Path) -> Result<String> {
    let mut tree = Tree {
        entries: Vec::new(),
    };

    for entry in
        fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?
    {
        let entry = entry?;
        let name = file_name_bytes(entry.file_name());

        if name == b".git" {
            continue;
        }

        let file_type = entry.file_type()?;
        if file_type.is_file() {
            let hash = Blob::from_file(&entry.path())?.save(objects_dir)?;
            tree.entries.push(TreeEntry {
                mode: MODE_FILE.to_string(),
                name,
                hash,
            });
        } else if file_type.is_dir() {
            let hash = write_tree_from_dir(objects_dir, &entry.path())?;
            tree.entries.push(TreeEntry {
                mode: MODE_DIR.to_string(),
                name,
                hash,
            });
        } else {
            log::debug!("write-tree: skipping {}", entry.path().display());
        }
    }

    tree.sort_entries();
    tree.save(objects_dir)
}

/// Materializes a stored tree into `target`, creating directories and
/// writing blob contents byte-for-byte. On Unix, mode 100755 entries get the
/// executable bit and 120000 entries become symlinks; elsewhere both fall
/// back to plain files.
pub fn materialize(
    objects_dir: &Path,
    tree_hash: &str,
    target: &Path,
    progress: Option<&ProgressBar>,
) -> Result<()> {
    let tree = Tree::load(objects_dir, tree_hash)?;

    for entry in &tree.entries {
        let path = target.join(entry_file_name(&entry.name));
        if let Some(pb) = progress {
            pb.set_message(entry.display_name().into_owned());
            pb.inc(1);
        }

        if entry.is_dir() {
            fs::create_dir_all(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            materialize(objects_dir, &entry.hash, &path, progress)?;
            continue;
        }

        let blob = Blob::load(objects_dir, &entry.hash)?;
        if entry.mode == MODE_SYMLINK {
            write_symlink(&blob.data, &path)?;
            continue;
        }

        fs::write(&path, &blob.data)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if entry.mode == MODE_EXEC {
            set_executable(&path)?;
        }
    }

    Ok(())
}

/// Raw bytes of a directory entry's name. On Unix this is lossless; other
/// platforms fall back to the lossy text form.
#[cfg(unix)]
fn file_name_bytes(name: std::ffi::OsString) -> Vec<u8> {
    use std::os::unix::ffi::OsStringExt;
    name.into_vec()
}

#[cfg(not(unix))]
fn file_name_bytes(name: std::ffi::OsString) -> Vec<u8> {
    name.to_string_lossy().into_owned().into_bytes()
}

/// Filesystem name for a stored entry name, inverse of `file_name_bytes`.
#[cfg(unix)]
fn entry_file_name(name: &[u8]) -> std::ffi::OsString {
    use std::os::unix::ffi::OsStringExt;
    std::ffi::OsString::from_vec(name.to_vec())
}

#[cfg(not(unix))]
fn entry_file_name(name: &[u8]) -> std::ffi::OsString {
    String::from_utf8_lossy(name).into_owned().into()
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .with_context(|| format!("Failed to mark {} executable", path.display()))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn write_symlink(target_bytes: &[u8], path: &Path) -> Result<()> {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;
    let target = OsStr::from_bytes(target_bytes);
    std::os::unix::fs::symlink(target, path)
        .with_context(|| format!("Failed to create symlink {}", path.display()))
}

#[cfg(not(unix))]
fn write_symlink(target_bytes: &[u8], path: &Path) -> Result<()> {
    fs::write(path, target_bytes)
        .with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::objects::{hash_hex, put, serialize_object};
    use tempfile::tempdir;

    const EMPTY_BLOB: &str = "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391";

    #[test]
    fn single_entry_payload_layout() {
        let tree = Tree {
            entries: vec![TreeEntry {
                mode: MODE_FILE.to_string(),
                name: b"a".to_vec(),
                hash: EMPTY_BLOB.to_string(),
            }],
        };

        let mut expected = b"100644 a\0".to_vec();
        expected.extend_from_slice(&hex::decode(EMPTY_BLOB).unwrap());
        assert_eq!(tree.payload().unwrap(), expected);
    }

    #[test]
    fn parse_round_trip_preserves_order() {
        let entries = vec![
            TreeEntry {
                mode: MODE_FILE.to_string(),
                name: b"a.txt".to_vec(),
                hash: "11".repeat(20),
            },
            TreeEntry {
                mode: MODE_DIR.to_string(),
                name: b"sub".to_vec(),
                hash: "22".repeat(20),
            },
        ];
        let tree = Tree {
            entries: entries.clone(),
        };

        let parsed = Tree::parse(&tree.payload().unwrap()).unwrap();
        assert_eq!(parsed.entries, entries);
    }

    #[test]
    fn directories_sort_with_virtual_trailing_slash() {
        let mut tree = Tree {
            entries: vec![
                TreeEntry {
                    mode: MODE_DIR.to_string(),
                    name: b"a".to_vec(),
                    hash: "11".repeat(20),
                },
                TreeEntry {
                    mode: MODE_FILE.to_string(),
                    name: b"a.b".to_vec(),
                    hash: "22".repeat(20),
                },
            ],
        };
        tree.sort_entries();

        // "a.b" < "a/" bytewise, so the file precedes the directory.
        let names: Vec<&[u8]> = tree.entries.iter().map(|e| e.name.as_slice()).collect();
        assert_eq!(names, vec![&b"a.b"[..], &b"a"[..]]);
    }

    #[test]
    fn non_utf8_names_survive_encode_and_decode() {
        let tree = Tree {
            entries: vec![TreeEntry {
                mode: MODE_FILE.to_string(),
                name: vec![b'f', 0xff, b'x'],
                hash: "11".repeat(20),
            }],
        };

        let parsed = Tree::parse(&tree.payload().unwrap()).unwrap();
        assert_eq!(parsed.entries, tree.entries);
        assert_eq!(parsed.entries[0].display_name(), "f\u{fffd}x");
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_file_names_round_trip_through_the_store() {
        use std::ffi::OsString;
        use std::os::unix::ffi::OsStringExt;

        let tmp = tempdir().unwrap();
        let objects = tempdir().unwrap();

        let file_name = OsString::from_vec(vec![b'f', 0xff, b'x']);
        fs::write(tmp.path().join(&file_name), "data").unwrap();

        let hash = write_tree_from_dir(objects.path(), tmp.path()).unwrap();
        let tree = Tree::load(objects.path(), &hash).unwrap();
        assert_eq!(tree.entries[0].name, vec![b'f', 0xff, b'x']);

        let out = tempdir().unwrap();
        materialize(objects.path(), &hash, out.path(), None).unwrap();
        assert_eq!(fs::read(out.path().join(&file_name)).unwrap(), b"data");
    }

    #[test]
    fn write_tree_is_stable_and_skips_git_dir() {
        let tmp = tempdir().unwrap();
        let objects = tempdir().unwrap();

        fs::write(tmp.path().join("b.txt"), "B\n").unwrap();
        fs::write(tmp.path().join("a.txt"), "A\n").unwrap();
        fs::create_dir(tmp.path().join(".git")).unwrap();
        fs::write(tmp.path().join(".git").join("HEAD"), "ref: x\n").unwrap();

        let first = write_tree_from_dir(objects.path(), tmp.path()).unwrap();
        let second = write_tree_from_dir(objects.path(), tmp.path()).unwrap();
        assert_eq!(first, second);

        // Same content in a different location hashes identically.
        let moved = tempdir().unwrap();
        fs::write(moved.path().join("a.txt"), "A\n").unwrap();
        fs::write(moved.path().join("b.txt"), "B\n").unwrap();
        assert_eq!(
            write_tree_from_dir(objects.path(), moved.path()).unwrap(),
            first
        );

        // And matches a digest computed by hand.
        let blob_a = put(objects.path(), ObjectKind::Blob, b"A\n").unwrap();
        let blob_b = put(objects.path(), ObjectKind::Blob, b"B\n").unwrap();
        let mut payload = Vec::new();
        for (name, hash) in [("a.txt", &blob_a), ("b.txt", &blob_b)] {
            payload.extend_from_slice(format!("100644 {}\0", name).as_bytes());
            payload.extend_from_slice(&hex::decode(hash).unwrap());
        }
        let expected = hash_hex(&serialize_object(ObjectKind::Tree, &payload));
        assert_eq!(first, expected);
    }

    #[test]
    fn materialize_restores_files() {
        let src = tempdir().unwrap();
        let objects = tempdir().unwrap();

        fs::write(src.path().join("top.txt"), "top").unwrap();
        fs::create_dir(src.path().join("sub")).unwrap();
        fs::write(src.path().join("sub").join("inner.txt"), "inner").unwrap();

        let root = write_tree_from_dir(objects.path(), src.path()).unwrap();

        let out = tempdir().unwrap();
        materialize(objects.path(), &root, out.path(), None).unwrap();

        assert_eq!(fs::read(out.path().join("top.txt")).unwrap(), b"top");
        assert_eq!(
            fs::read(out.path().join("sub").join("inner.txt")).unwrap(),
            b"inner"
        );
    }

    #[cfg(unix)]
    #[test]
    fn materialize_honors_exec_and_symlink_modes() {
        use std::os::unix::fs::PermissionsExt;

        let objects = tempdir().unwrap();
        let script = put(objects.path(), ObjectKind::Blob, b"#!/bin/sh\n").unwrap();
        let link = put(objects.path(), ObjectKind::Blob, b"run.sh").unwrap();

        let mut tree = Tree {
            entries: vec![
                TreeEntry {
                    mode: MODE_EXEC.to_string(),
                    name: b"run.sh".to_vec(),
                    hash: script,
                },
                TreeEntry {
                    mode: MODE_SYMLINK.to_string(),
                    name: b"alias".to_vec(),
                    hash: link,
                },
            ],
        };
        tree.sort_entries();
        let hash = tree.save(objects.path()).unwrap();

        let out = tempdir().unwrap();
        materialize(objects.path(), &hash, out.path(), None).unwrap();

        let mode = fs::metadata(out.path().join("run.sh"))
            .unwrap()
            .permissions()
            .mode();
        assert_ne!(mode & 0o111, 0);

        let target = fs::read_link(out.path().join("alias")).unwrap();
        assert_eq!(target, std::path::PathBuf::from("run.sh"));
    }
}
