// src/hooks/scratch.rs

//! Scratch runtime directory reset

use super::HookOutcome;
use crate::error::{Error, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Empty `path`, creating it if missing
///
/// The directory itself is kept so ownership set up by tmpfiles survives;
/// only its contents (stale sockets, pid files) are removed.
pub fn reset_directory(path: &Path) -> Result<HookOutcome> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(Error::InvalidPath(format!(
                "{} exists and is not a directory",
                path.display()
            )));
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            fs::create_dir_all(path)?;
            info!("Created scratch directory {}", path.display());
            return Ok(HookOutcome::Applied(vec![path.to_path_buf()]));
        }
        Err(e) => return Err(e.into()),
    }

    let mut removed = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let entry_path = entry.path();
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(&entry_path)?;
        } else {
            fs::remove_file(&entry_path)?;
        }
        debug!("Removed stale {}", entry_path.display());
        removed.push(entry_path);
    }

    if removed.is_empty() {
        debug!("Scratch directory {} already clean", path.display());
        return Ok(HookOutcome::Unchanged);
    }

    info!(
        "Cleared {} stale entries from {}",
        removed.len(),
        path.display()
    );
    Ok(HookOutcome::Applied(removed))
}
