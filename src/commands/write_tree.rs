use crate::storage::objects::tree::write_tree_from_dir;
use crate::storage::repo::Repository;
use anyhow::Result;

pub fn write_tree_command(repo: &Repository) -> Result<()> {
    let hash = write_tree_from_dir(&repo.objects_dir(), repo.workdir())?;
    println!("{}", hash);
    Ok(())
}
