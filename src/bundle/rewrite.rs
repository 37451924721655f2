// src/bundle/rewrite.rs

//! Rewriting relative config-tree references to the runtime location
//!
//! Bundle files refer to the config tree as `gen/...`. On the node the tree
//! lives at an absolute path (`/etc/scion/gen` by default), so every such
//! reference is rewritten file by file. A reference is `gen/` (optionally
//! written `./gen/`) at the start of a file or after a byte that cannot be
//! part of a path; `/etc/scion/gen/` and `regen/` are therefore left alone,
//! which also keeps the rewrite from compounding when applied twice.

use crate::error::{Error, Result};
use rayon::prelude::*;
use regex::bytes::Regex;
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Outcome of rewriting a directory tree
#[derive(Debug, Default, Clone)]
pub struct RewriteReport {
    /// Regular files examined
    pub files_scanned: usize,
    /// Files that contained at least one reference (sorted)
    pub files_rewritten: Vec<PathBuf>,
    /// Total references replaced
    pub replacements: usize,
}

/// Substitutes a relative root with an absolute one
#[derive(Debug, Clone)]
pub struct PathRewriter {
    pattern: Regex,
    replacement: Vec<u8>,
}

impl PathRewriter {
    /// Create a rewriter for `relative_root` (e.g. `gen`) -> `absolute_root`
    /// (e.g. `/etc/scion/gen`)
    pub fn new(relative_root: &str, absolute_root: &Path) -> Result<Self> {
        let relative = relative_root.trim_end_matches('/');
        if relative.is_empty() {
            return Err(Error::Config("relative root must not be empty".to_string()));
        }
        let expr = format!(
            r"(?-u)(^|[^A-Za-z0-9_./\-])(?:\./)?{}/",
            regex::escape(relative)
        );
        let pattern = Regex::new(&expr)
            .map_err(|e| Error::Config(format!("invalid rewrite pattern: {}", e)))?;

        let absolute = absolute_root.to_string_lossy();
        let mut replacement = b"${1}".to_vec();
        replacement.extend_from_slice(absolute.trim_end_matches('/').replace('$', "$$").as_bytes());
        replacement.push(b'/');

        Ok(Self {
            pattern,
            replacement,
        })
    }

    /// Count relative-root references in `content`
    pub fn count_references(&self, content: &[u8]) -> usize {
        self.pattern.find_iter(content).count()
    }

    /// Rewrite `content`, borrowing it unchanged when nothing matches
    pub fn rewrite_bytes<'a>(&self, content: &'a [u8]) -> Cow<'a, [u8]> {
        self.pattern.replace_all(content, self.replacement.as_slice())
    }

    /// Rewrite one file in place. Returns the number of references replaced;
    /// a file without references is not written.
    pub fn rewrite_file(&self, path: &Path) -> Result<usize> {
        let content = fs::read(path)?;
        let count = self.count_references(&content);
        if count == 0 {
            return Ok(0);
        }

        if let Cow::Owned(rewritten) = self.rewrite_bytes(&content) {
            fs::write(path, rewritten)?;
            debug!("Rewrote {} reference(s) in {}", count, path.display());
        }
        Ok(count)
    }

    /// Rewrite every regular file under `root`
    ///
    /// Files are independent of each other and processed in parallel.
    pub fn rewrite_tree(&self, root: &Path) -> Result<RewriteReport> {
        let mut files = Vec::new();
        for entry in WalkDir::new(root).follow_links(false) {
            let entry = entry.map_err(std::io::Error::from)?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }

        let counts = files
            .par_iter()
            .map(|path| self.rewrite_file(path).map(|count| (path, count)))
            .collect::<Result<Vec<_>>>()?;

        let mut report = RewriteReport {
            files_scanned: files.len(),
            ..Default::default()
        };
        for (path, count) in counts {
            if count > 0 {
                report.files_rewritten.push(path.clone());
                report.replacements += count;
            }
        }
        report.files_rewritten.sort();

        Ok(report)
    }
}
