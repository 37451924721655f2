// src/bundle/archive.rs

//! Bundle archive extraction
//!
//! The coordinator ships bundles as gzip-compressed tarballs; plain tar is
//! accepted as well. Only directories and regular files are extracted.

use crate::error::{Error, Result};
use crate::filesystem::path::safe_join;
use flate2::read::GzDecoder;
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;
use tar::{Archive, EntryType};
use tracing::{debug, warn};

/// Maximum size of a single bundle entry (64 MB)
pub const MAX_ENTRY_SIZE: u64 = 64 * 1024 * 1024;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Counts from one extraction run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractStats {
    pub files: usize,
    pub directories: usize,
    pub skipped: usize,
}

/// Extract bundle bytes into `dest`
pub fn extract_bundle(bytes: &[u8], dest: &Path) -> Result<ExtractStats> {
    if bytes.is_empty() {
        return Err(Error::Archive("bundle is empty".to_string()));
    }

    let reader: Box<dyn Read + '_> = if bytes.starts_with(&GZIP_MAGIC) {
        debug!("Bundle is gzip-compressed");
        Box::new(GzDecoder::new(Cursor::new(bytes)))
    } else {
        Box::new(Cursor::new(bytes))
    };

    let mut archive = Archive::new(reader);
    let mut stats = ExtractStats::default();

    let entries = archive
        .entries()
        .map_err(|e| Error::Archive(format!("failed to read archive entries: {}", e)))?;

    for entry in entries {
        let mut entry =
            entry.map_err(|e| Error::Archive(format!("failed to read archive entry: {}", e)))?;

        let entry_path = entry
            .path()
            .map_err(|e| Error::Archive(format!("failed to get entry path: {}", e)))?
            .into_owned();

        let target = match safe_join(dest, &entry_path) {
            Ok(target) => target,
            // A bare "./" root entry carries nothing
            Err(Error::InvalidPath(_)) if entry.header().entry_type().is_dir() => continue,
            Err(e) => {
                return Err(Error::Archive(format!(
                    "unsafe entry '{}': {}",
                    entry_path.display(),
                    e
                )));
            }
        };

        match entry.header().entry_type() {
            EntryType::Directory => {
                fs::create_dir_all(&target)?;
                stats.directories += 1;
            }
            EntryType::Regular | EntryType::Continuous => {
                let size = entry.size();
                if size > MAX_ENTRY_SIZE {
                    return Err(Error::Archive(format!(
                        "entry '{}' is {} bytes (limit {})",
                        entry_path.display(),
                        size,
                        MAX_ENTRY_SIZE
                    )));
                }
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                entry.unpack(&target).map_err(|e| {
                    Error::Archive(format!(
                        "failed to unpack '{}': {}",
                        entry_path.display(),
                        e
                    ))
                })?;
                stats.files += 1;
            }
            other => {
                warn!(
                    "Skipping unsupported entry '{}' ({:?})",
                    entry_path.display(),
                    other
                );
                stats.skipped += 1;
            }
        }
    }

    debug!(
        "Extracted {} files, {} directories ({} skipped)",
        stats.files, stats.directories, stats.skipped
    );
    Ok(stats)
}
