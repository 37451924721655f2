// src/services/resources.rs

//! Filesystem paths and accounts the services need before they start

use std::fmt;
use std::path::PathBuf;

/// One tmpfiles.d entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TmpfilesEntry {
    /// tmpfiles.d type character (`d`, `D`, ...)
    pub entry_type: char,
    pub path: PathBuf,
    pub mode: u32,
    pub owner: String,
    pub group: String,
}

impl TmpfilesEntry {
    /// Directory owned by `owner:group`
    pub fn directory(path: impl Into<PathBuf>, mode: u32, owner: &str, group: &str) -> Self {
        Self {
            entry_type: 'd',
            path: path.into(),
            mode,
            owner: owner.to_string(),
            group: group.to_string(),
        }
    }

    /// Config line without trailing newline, e.g. `d /run/shm/sciond 0755 scion scion -`
    pub fn to_line(&self) -> String {
        format!(
            "{} {} {:04o} {} {} -",
            self.entry_type,
            self.path.display(),
            self.mode,
            self.owner,
            self.group
        )
    }
}

impl fmt::Display for TmpfilesEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

/// System user with a primary group of the same name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemAccount {
    pub user: String,
    pub group: String,
    pub home: PathBuf,
    pub description: String,
}
