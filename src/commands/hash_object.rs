use crate::storage::objects::blob::Blob;
use crate::storage::objects::GitObject;
use crate::storage::repo::Repository;
use anyhow::Result;
use std::path::Path;

pub fn hash_object_command(repo: &Repository, write: bool, file_path: &str) -> Result<()> {
    let blob = Blob::from_file(Path::new(file_path))?;

    let hash = if write {
        blob.save(&repo.objects_dir())?
    } else {
        blob.hash()?
    };

    println!("{}", hash);
    Ok(())
}
