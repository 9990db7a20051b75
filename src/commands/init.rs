use crate::storage::repo::Repository;
use anyhow::{Context, Result};
use std::path::Path;

pub async fn init_command() -> Result<()> {
    Repository::init(Path::new("."))
        .await
        .context("Failed to initialize repository")?;

    println!("Initialized git directory");
    Ok(())
}
