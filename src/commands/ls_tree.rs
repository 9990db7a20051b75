use crate::storage::objects::tree::Tree;
use crate::storage::repo::Repository;
use anyhow::Result;

pub fn ls_tree_command(repo: &Repository, name_only: bool, tree_hash: &str) -> Result<()> {
    let tree = Tree::load(&repo.objects_dir(), tree_hash)?;

    for entry in &tree.entries {
        if name_only {
            println!("{}", entry.display_name());
        } else {
            println!(
                "{} {} {}\t{}",
                entry.padded_mode(),
                entry.kind(),
                entry.hash,
                entry.display_name()
            );
        }
    }

    Ok(())
}
