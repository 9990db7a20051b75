use super::{get, GitObject, ObjectKind};
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

/// Raw file content, stored verbatim.
pub struct Blob {
    pub data: Vec<u8>,
}

impl Blob {
    pub fn from_file(file_path: &Path) -> Result<Self> {
        let data = fs::read(file_path)
            .with_context(|| format!("Failed to read file: {}", file_path.display()))?;
        Ok(Blob { data })
    }

    pub fn load(objects_dir: &Path, hash: &str) -> Result<Self> {
        let (kind, payload) = get(objects_dir, hash)?;
        if kind != ObjectKind::Blob {
            bail!("Object {} is a {}, not a blob", hash, kind);
        }
        Ok(Blob { data: payload })
    }
}

impl GitObject for Blob {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Blob
    }

    fn payload(&self) -> Result<Vec<u8>> {
        Ok(self.data.clone())
    }
}
