// src/units/user_group.rs

//! Service account creation
//!
//! The live system is changed through `groupadd`/`useradd`. A target root is
//! edited directly: entries are appended to its `etc/group` and `etc/passwd`
//! with the highest free system id.

use super::UnitInstaller;
use crate::services::SystemAccount;
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

/// System ids are allocated downwards from here
const SYSTEM_ID_MAX: u32 = 999;
const SYSTEM_ID_MIN: u32 = 100;

const NOLOGIN_SHELL: &str = "/usr/sbin/nologin";

impl UnitInstaller {
    pub(super) fn user_exists(&self, name: &str) -> bool {
        if self.is_live_root() {
            nix::unistd::User::from_name(name).ok().flatten().is_some()
        } else {
            db_entry(&self.root.join("etc/passwd"), name).is_some()
        }
    }

    pub(super) fn group_exists(&self, name: &str) -> bool {
        if self.is_live_root() {
            nix::unistd::Group::from_name(name).ok().flatten().is_some()
        } else {
            db_entry(&self.root.join("etc/group"), name).is_some()
        }
    }

    /// Create the group and user of `account`; returns the names created
    pub(super) fn ensure_account(&self, account: &SystemAccount) -> Result<Vec<String>> {
        let mut created = Vec::new();
        if self.create_group(&account.group)? {
            created.push(format!("group:{}", account.group));
        }
        if self.create_user(account)? {
            created.push(format!("user:{}", account.user));
        }
        Ok(created)
    }

    fn create_group(&self, name: &str) -> Result<bool> {
        if self.group_exists(name) {
            debug!("Group '{}' already exists, skipping", name);
            return Ok(false);
        }

        if self.is_live_root() {
            let status = Command::new("groupadd")
                .args(["--system", name])
                .status()
                .context("Failed to run groupadd")?;
            if !status.success() {
                return Err(anyhow::anyhow!(
                    "groupadd failed with exit code: {:?}",
                    status.code()
                ));
            }
        } else {
            let group_path = self.root.join("etc/group");
            let gid = free_system_id(&group_path)?;
            append_line(&group_path, &format!("{}:x:{}:", name, gid))?;
        }

        info!("Created group '{}' (root: {})", name, self.root.display());
        Ok(true)
    }

    fn create_user(&self, account: &SystemAccount) -> Result<bool> {
        if self.user_exists(&account.user) {
            debug!("User '{}' already exists, skipping", account.user);
            return Ok(false);
        }

        if self.is_live_root() {
            let home = account.home.display().to_string();
            let status = Command::new("useradd")
                .args([
                    "--system",
                    "--home-dir",
                    &home,
                    "--no-create-home",
                    "--shell",
                    NOLOGIN_SHELL,
                    "--gid",
                    &account.group,
                    "--comment",
                    &account.description,
                    &account.user,
                ])
                .status()
                .context("Failed to run useradd")?;
            if !status.success() {
                return Err(anyhow::anyhow!(
                    "useradd failed with exit code: {:?}",
                    status.code()
                ));
            }
        } else {
            let gid = db_entry(&self.root.join("etc/group"), &account.group)
                .and_then(|fields| fields.get(2).and_then(|g| g.parse::<u32>().ok()))
                .ok_or_else(|| anyhow::anyhow!("group '{}' not found in target", account.group))?;
            let passwd_path = self.root.join("etc/passwd");
            let uid = free_system_id(&passwd_path)?;
            append_line(
                &passwd_path,
                &format!(
                    "{}:x:{}:{}:{}:{}:{}",
                    account.user,
                    uid,
                    gid,
                    account.description,
                    account.home.display(),
                    NOLOGIN_SHELL
                ),
            )?;
        }

        info!("Created user '{}' (root: {})", account.user, self.root.display());
        Ok(true)
    }
}

/// Colon-separated fields of the entry named `name`
fn db_entry(path: &Path, name: &str) -> Option<Vec<String>> {
    let content = fs::read_to_string(path).ok()?;
    content
        .lines()
        .map(|line| line.split(':').map(String::from).collect::<Vec<_>>())
        .find(|fields| fields.first().map(String::as_str) == Some(name))
}

/// Highest unused id in the system range of a passwd/group file
fn free_system_id(path: &Path) -> Result<u32> {
    let used: BTreeSet<u32> = fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .filter_map(|line| line.split(':').nth(2)?.parse().ok())
        .collect();

    (SYSTEM_ID_MIN..=SYSTEM_ID_MAX)
        .rev()
        .find(|id| !used.contains(id))
        .ok_or_else(|| anyhow::anyhow!("no free system id left in {}", path.display()))
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    // A last line without a newline would swallow the new entry
    let unterminated = fs::read(path)
        .map(|content| content.last().is_some_and(|b| *b != b'\n'))
        .unwrap_or(false);

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    if unterminated {
        writeln!(file)?;
    }
    writeln!(file, "{}", line)?;
    Ok(())
}
