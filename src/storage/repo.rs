use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Handle to a repository's working directory and its `.git` directory.
///
/// Every store, ref and checkout operation receives this value; nothing in
/// the crate locates `.git` through process-wide state. Non-clone commands
/// open it from the current directory, the clone driver from its target.
#[derive(Debug, Clone)]
pub struct Repository {
    workdir: PathBuf,
    gitdir: PathBuf,
}

impl Repository {
    pub fn open(workdir: impl Into<PathBuf>) -> Self {
        let workdir = workdir.into();
        let gitdir = workdir.join(".git");
        Self { workdir, gitdir }
    }

    pub fn open_current() -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to determine current directory")?;
        Ok(Self::open(cwd))
    }

    /// Creates the `.git` skeleton and a HEAD pointing at `refs/heads/main`.
    pub async fn init(path: &Path) -> Result<Self> {
        let repo = Self::open(path);

        fs::create_dir_all(repo.objects_dir())
            .await
            .context("Failed to create objects directory")?;
        fs::create_dir_all(repo.refs_dir().join("heads"))
            .await
            .context("Failed to create refs directory")?;
        fs::write(repo.head_path(), "ref: refs/heads/main\n")
            .await
            .context("Failed to write HEAD")?;

        Ok(repo)
    }

    pub fn is_initialized(path: &Path) -> bool {
        path.join(".git").exists()
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn gitdir(&self) -> &Path {
        &self.gitdir
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.gitdir.join("objects")
    }

    pub fn refs_dir(&self) -> PathBuf {
        self.gitdir.join("refs")
    }

    pub fn head_path(&self) -> PathBuf {
        self.gitdir.join("HEAD")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn init_creates_skeleton() {
        let tmp = tempdir().unwrap();
        let repo = Repository::init(tmp.path()).await.unwrap();

        assert!(repo.objects_dir().exists());
        assert!(repo.refs_dir().join("heads").exists());
        let head = std::fs::read_to_string(repo.head_path()).unwrap();
        assert_eq!(head, "ref: refs/heads/main\n");
        assert!(Repository::is_initialized(tmp.path()));
    }
}
