// src/units/tmpfiles.rs

//! tmpfiles.d and sysusers.d installation

use super::render::{render_sysusers, render_tmpfiles};
use super::UnitInstaller;
use crate::services::{SystemAccount, TmpfilesEntry};
use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::debug;

/// File name used under tmpfiles.d and sysusers.d
pub const CONFIG_FILE_NAME: &str = "scionlab.conf";

impl UnitInstaller {
    /// Write the tmpfiles.d file; on the live root also apply it
    ///
    /// A target root gets its directories created by systemd-tmpfiles on
    /// first boot.
    pub(super) fn install_tmpfiles(&self, entries: &[TmpfilesEntry]) -> Result<PathBuf> {
        let dir = self.root.join("etc/tmpfiles.d");
        fs::create_dir_all(&dir)?;
        let path = dir.join(CONFIG_FILE_NAME);
        fs::write(&path, render_tmpfiles(entries))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!("Wrote {} tmpfiles entries to {}", entries.len(), path.display());

        if self.is_live_root() {
            self.apply_tmpfiles(&path)?;
        }
        Ok(path)
    }

    fn apply_tmpfiles(&self, path: &std::path::Path) -> Result<()> {
        let available = Command::new("systemd-tmpfiles")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        if !available {
            debug!("systemd-tmpfiles not available, skipping");
            return Ok(());
        }

        let status = Command::new("systemd-tmpfiles")
            .arg("--create")
            .arg(path)
            .status()
            .context("Failed to run systemd-tmpfiles")?;
        if status.success() {
            debug!("Applied {}", path.display());
            Ok(())
        } else {
            Err(anyhow::anyhow!("systemd-tmpfiles --create {} failed", path.display()))
        }
    }

    /// Write the sysusers.d file declaring the service accounts
    pub(super) fn install_sysusers(&self, accounts: &[SystemAccount]) -> Result<PathBuf> {
        let dir = self.root.join("usr/lib/sysusers.d");
        fs::create_dir_all(&dir)?;
        let path = dir.join(CONFIG_FILE_NAME);
        fs::write(&path, render_sysusers(accounts))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!("Wrote sysusers config {}", path.display());
        Ok(path)
    }
}
