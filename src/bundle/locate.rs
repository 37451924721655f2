// src/bundle/locate.rs

//! Locating the VPN client profile and the `gen/` tree in an extracted bundle

use crate::error::{Error, Result};
use glob::Pattern;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Paths of the two artifacts a bundle must provide
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedArtifacts {
    pub vpn_profile: PathBuf,
    pub gen_dir: PathBuf,
}

/// Find exactly one client profile and exactly one `gen` directory under `root`
///
/// The contents of a `gen` directory are not searched.
pub fn locate_artifacts(root: &Path, profile_pattern: &str, gen_name: &str) -> Result<LocatedArtifacts> {
    let pattern = Pattern::new(profile_pattern)
        .map_err(|e| Error::Config(format!("invalid profile pattern '{}': {}", profile_pattern, e)))?;

    let mut profiles = Vec::new();
    let mut gen_dirs = Vec::new();

    let mut walker = WalkDir::new(root).min_depth(1).sort_by_file_name().into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry.map_err(std::io::Error::from)?;
        let name = entry.file_name().to_string_lossy();

        if entry.file_type().is_dir() {
            if name == gen_name {
                debug!("Found config tree at {}", entry.path().display());
                gen_dirs.push(entry.path().to_path_buf());
                walker.skip_current_dir();
            }
        } else if entry.file_type().is_file() && pattern.matches(&name) {
            debug!("Found client profile {}", entry.path().display());
            profiles.push(entry.path().to_path_buf());
        }
    }

    let vpn_profile = exactly_one(profiles, profile_pattern, "client VPN profile")?;
    let gen_dir = exactly_one(gen_dirs, &format!("{}/", gen_name), "configuration tree")?;

    Ok(LocatedArtifacts {
        vpn_profile,
        gen_dir,
    })
}

fn exactly_one(mut found: Vec<PathBuf>, pattern: &str, what: &str) -> Result<PathBuf> {
    match found.len() {
        0 => Err(Error::MissingArtifact(format!(
            "no {} matching '{}' in bundle",
            what, pattern
        ))),
        1 => Ok(found.remove(0)),
        _ => Err(Error::AmbiguousArtifact {
            pattern: pattern.to_string(),
            candidates: found,
        }),
    }
}
