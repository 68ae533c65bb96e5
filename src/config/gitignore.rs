// src/config/gitignore.rs

//! Keep the machine-local overlay out of version control.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::errors::Result;

/// Make sure `entry` appears on its own line in `<root>/.gitignore`.
///
/// Creates the file when missing. Returns `true` if the file was changed.
pub fn ensure_ignored(root: &Path, entry: &str) -> Result<bool> {
    let path = root.join(".gitignore");
    let mut content = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    if content.lines().any(|line| line.trim() == entry) {
        return Ok(false);
    }

    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    if !content.is_empty() {
        content.push('\n');
    }
    content.push_str("# sympack\n");
    content.push_str(entry);
    content.push('\n');

    fs::write(&path, content)?;
    info!(?path, entry, "added local config to .gitignore");
    Ok(true)
}
