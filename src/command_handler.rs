use crate::cli::Commands;
use crate::commands::{
    cat_file::cat_file_command,
    clone::clone_command,
    commit_tree::commit_tree_command,
    hash_object::hash_object_command,
    init::init_command,
    ls_tree::ls_tree_command,
    write_tree::write_tree_command,
};
use crate::storage::repo::Repository;
use anyhow::Result;

pub async fn handle_command(command: Commands) -> Result<()> {
    match command {
        Commands::Init => {
            init_command().await?;
        }
        Commands::CatFile {
            pretty_print,
            show_type,
            show_size,
            object_hash,
        } => {
            let repo = Repository::open_current()?;
            cat_file_command(&repo, pretty_print, show_type, show_size, &object_hash)?;
        }
        Commands::HashObject { write, file_path } => {
            let repo = Repository::open_current()?;
            hash_object_command(&repo, write, &file_path)?;
        }
        Commands::LsTree {
            name_only,
            tree_hash,
        } => {
            let repo = Repository::open_current()?;
            ls_tree_command(&repo, name_only, &tree_hash)?;
        }
        Commands::WriteTree => {
            let repo = Repository::open_current()?;
            write_tree_command(&repo)?;
        }
        Commands::CommitTree {
            tree_hash,
            parent,
            message,
        } => {
            let repo = Repository::open_current()?;
            commit_tree_command(&repo, &tree_hash, parent.as_deref(), &message)?;
        }
        Commands::Clone { url, target_dir } => {
            clone_command(&url, &target_dir).await?;
        }
    }
    Ok(())
}
