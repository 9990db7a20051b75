use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

/// Writes `refs/<name>` (creating parent directories) with a trailing newline.
pub async fn write_ref(refs_dir: &Path, ref_name: &str, hash: &str) -> Result<()> {
    let ref_path = refs_dir.join(ref_name);
    if let Some(parent) = ref_path.parent() {
        fs::create_dir_all(parent).await?;
    }

    fs::write(&ref_path, format!("{hash}\n"))
        .await
        .with_context(|| format!("Failed to write ref {}", ref_name))?;
    Ok(())
}

pub async fn read_ref(refs_dir: &Path, ref_name: &str) -> Result<String> {
    let ref_path = refs_dir.join(ref_name);
    let data = fs::read(&ref_path)
        .await
        .with_context(|| format!("Failed to read ref: {:?}", ref_path))?;

    let content = String::from_utf8(data)
        .with_context(|| format!("Ref file contains invalid UTF-8: {:?}", ref_path))?;
    Ok(content.trim().to_string())
}

/// HEAD naming a branch: `ref: refs/heads/<branch>\n`.
pub async fn write_head_symbolic(head_path: &Path, ref_name: &str) -> Result<()> {
    fs::write(head_path, format!("ref: {ref_name}\n"))
        .await
        .context("Failed to write HEAD")
}

/// Detached HEAD: the bare hex digest.
pub async fn write_head_detached(head_path: &Path, hash: &str) -> Result<()> {
    fs::write(head_path, format!("{hash}\n"))
        .await
        .context("Failed to write HEAD")
}
