use crate::storage::objects::get;
use crate::storage::repo::Repository;
use anyhow::{Context, Result};
use std::io::Write;

pub fn cat_file_command(
    repo: &Repository,
    pretty_print: bool,
    show_type: bool,
    show_size: bool,
    object_hash: &str,
) -> Result<()> {
    let (kind, payload) = get(&repo.objects_dir(), object_hash)?;

    match (show_type, show_size, pretty_print) {
        (true, false, false) => println!("{}", kind),
        (false, true, false) => println!("{}", payload.len()),
        (false, false, _) => print_payload(&payload)?,
        _ => {
            println!("{}", kind);
            println!("{}", payload.len());
            print_payload(&payload)?;
        }
    }

    Ok(())
}

fn print_payload(payload: &[u8]) -> Result<()> {
    let mut stdout = std::io::stdout();
    stdout
        .write_all(payload)
        .and_then(|_| stdout.flush())
        .context("Failed to write object payload")
}
