use crate::connection::{protocol, HttpTransport};
use crate::errors::GitError;
use crate::storage::objects::commit::Commit;
use crate::storage::objects::pack::Packfile;
use crate::storage::objects::tree::materialize;
use crate::storage::objects::{put_raw, serialize_object};
use crate::storage::refs::{write_head_detached, write_head_symbolic, write_ref};
use crate::storage::repo::Repository;
use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

pub(crate) struct CloneCommand {
    url: String,
    target: PathBuf,
}

impl CloneCommand {
    pub fn new(url: impl Into<String>, target: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            target: target.into(),
        }
    }

    /// Init -> Discover -> Want -> Receive -> Ingest -> Checkout. Any failure
    /// aborts the command; partial state under `.git` is left as-is, and a
    /// re-run replays safely because object writes are idempotent.
    pub async fn execute(&self) -> Result<()> {
        if Repository::is_initialized(&self.target) {
            bail!(
                "Target directory '{}' already contains a repository",
                self.target.display()
            );
        }

        println!("Cloning into '{}'...", self.target.display());
        tokio::fs::create_dir_all(&self.target)
            .await
            .context("Failed to create target directory")?;
        let repo = Repository::init(&self.target)
            .await
            .context("Failed to initialize repository")?;

        let transport = HttpTransport::new(&self.url)?;

        let advertisement = transport.discover_refs().await?;
        let refs = protocol::parse_ref_advertisement(&advertisement)?;
        log::debug!("remote advertised {} refs", refs.len());
        let target = protocol::select_clone_target(&refs)?;

        println!("Fetching objects...");
        let request = protocol::build_fetch_request(&target.head_hash)?;
        let response = transport.fetch_pack(request).await?;

        let pack_start = protocol::find_pack_start(&response)
            .ok_or_else(|| GitError::Transport("response carries no packfile".to_string()))?;
        let packfile = Packfile::parse(&response[pack_start..])?;

        println!("Unpacking {} objects...", packfile.objects.len());
        let objects_dir = repo.objects_dir();
        for obj in &packfile.objects {
            put_raw(&objects_dir, &obj.hash, &serialize_object(obj.kind, &obj.data))?;
        }

        match &target.branch {
            Some((name, hash)) => {
                write_ref(repo.gitdir(), name, hash).await?;
                write_head_symbolic(&repo.head_path(), name).await?;
            }
            None => {
                log::warn!("remote has no main or master branch, leaving HEAD detached");
                write_head_detached(&repo.head_path(), &target.head_hash).await?;
            }
        }

        println!("Checking out files...");
        let commit = Commit::load(&objects_dir, &target.head_hash)
            .context("Failed to read the fetched HEAD commit")?;

        let progress = ProgressBar::new_spinner();
        progress.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {pos} files {wide_msg}")
                .unwrap(),
        );
        materialize(&objects_dir, &commit.tree, repo.workdir(), Some(&progress))?;
        progress.finish_and_clear();

        println!("Clone of '{}' completed", self.url);
        Ok(())
    }
}

pub async fn clone_command(url: &str, target_dir: &str) -> Result<()> {
    CloneCommand::new(url, target_dir).execute().await
}
