use crate::storage::objects::commit::Commit;
use crate::storage::objects::GitObject;
use crate::storage::repo::Repository;
use anyhow::{ensure, Result};

pub fn commit_tree_command(
    repo: &Repository,
    tree_hash: &str,
    parent: Option<&str>,
    message: &str,
) -> Result<()> {
    ensure_hash("tree", tree_hash)?;
    if let Some(parent) = parent {
        ensure_hash("parent", parent)?;
    }

    let commit = Commit::new(
        tree_hash.to_string(),
        parent.map(str::to_string),
        message.to_string(),
    );
    let hash = commit.save(&repo.objects_dir())?;

    println!("{}", hash);
    Ok(())
}

fn ensure_hash(what: &str, hash: &str) -> Result<()> {
    ensure!(
        hash.len() == 40 && hash.bytes().all(|b| b.is_ascii_hexdigit()),
        "Invalid {} hash: {}",
        what,
        hash
    );
    Ok(())
}
