// src/filesystem/staging.rs

//! Staged output directories
//!
//! Output is assembled in a hidden directory next to its destination and
//! swapped into place entry by entry once everything succeeded. Dropping a
//! `StagedDir` without committing removes the staging area, so a failed run
//! leaves the destination untouched (and uncreated).

use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// A staging area next to its final destination
#[derive(Debug)]
pub struct StagedDir {
    stage: TempDir,
    destination: PathBuf,
}

impl StagedDir {
    /// Create a staging area beside `destination`
    ///
    /// The staging directory lives in the destination's parent so commits
    /// are plain renames on the same filesystem.
    pub fn new(destination: &Path) -> Result<Self> {
        let parent = match destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;
        let stage = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(parent)?;
        debug!("Staging into {}", stage.path().display());

        Ok(Self {
            stage,
            destination: destination.to_path_buf(),
        })
    }

    /// Path of the staging area
    pub fn path(&self) -> &Path {
        self.stage.path()
    }

    /// Final destination directory
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Move every named top-level entry from the stage into the destination
    ///
    /// Existing entries with the same name are replaced. Returns the final
    /// paths in the order given. If any move fails, entries already swapped
    /// are moved back and their predecessors restored before the error is
    /// returned. The staging area is removed afterwards.
    pub fn commit(self, entries: &[&str]) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.destination)?;
        let retired = self.stage.path().join(".retired");
        fs::create_dir_all(&retired)?;

        let mut committed = Vec::with_capacity(entries.len());
        let mut swapped: Vec<(&str, bool)> = Vec::with_capacity(entries.len());
        for &name in entries {
            let had_previous = self.destination.join(name).symlink_metadata().is_ok();
            match self.swap_in(name, &retired, had_previous) {
                Ok(target) => {
                    swapped.push((name, had_previous));
                    committed.push(target);
                }
                Err(e) => {
                    self.roll_back(&swapped, &retired);
                    return Err(e);
                }
            }
        }

        Ok(committed)
    }

    fn swap_in(&self, name: &str, retired: &Path, had_previous: bool) -> Result<PathBuf> {
        let staged = self.stage.path().join(name);
        let target = self.destination.join(name);

        if had_previous {
            // Retired entries are removed together with the stage
            fs::rename(&target, retired.join(name))?;
            debug!("Retired previous {}", target.display());
        }
        if let Err(e) = fs::rename(&staged, &target) {
            if had_previous {
                let _ = fs::rename(retired.join(name), &target);
            }
            return Err(e.into());
        }
        debug!("Committed {}", target.display());
        Ok(target)
    }

    fn roll_back(&self, swapped: &[(&str, bool)], retired: &Path) {
        for (name, had_previous) in swapped.iter().rev() {
            let target = self.destination.join(name);
            if let Err(e) = fs::rename(&target, self.stage.path().join(name)) {
                warn!("Failed to withdraw {}: {}", target.display(), e);
                continue;
            }
            if *had_previous {
                if let Err(e) = fs::rename(retired.join(name), &target) {
                    warn!("Failed to restore previous {}: {}", target.display(), e);
                    continue;
                }
            }
            debug!("Rolled back {}", target.display());
        }
    }
}

/// Recursively copy a directory tree
///
/// Symlinks are not followed and are skipped.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<u64> {
    let mut copied = 0u64;
    for entry in walkdir::WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(std::io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| crate::Error::InvalidPath(e.to_string()))?;
        let target = dst.join(relative);

        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}
