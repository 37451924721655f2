// src/units/systemd.rs

//! Unit enablement
//!
//! On the live root units are enabled with `systemctl`. For any other root
//! the `[Install]` section is read back from the written unit and the
//! `.wants`/`.requires` symlinks are created directly, so the host's
//! systemd is never touched.

use super::UnitInstaller;
use anyhow::{bail, Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs as unix_fs;
use std::process::{Command, Stdio};
use tracing::{debug, info};

impl UnitInstaller {
    /// Run `systemctl <args>` on the live root
    ///
    /// Returns `Ok(false)` when there is nothing to talk to: a target root,
    /// or a host without systemctl (containers, build chroots).
    fn systemctl(&self, args: &[&str]) -> Result<bool> {
        let command = format!("systemctl {}", args.join(" "));
        if !self.is_live_root() {
            debug!("Skipping '{}' for target root", command);
            return Ok(false);
        }

        let status = match Command::new("systemctl")
            .args(args)
            .stdout(Stdio::null())
            .status()
        {
            Ok(status) => status,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("systemctl not available, skipping '{}'", command);
                return Ok(false);
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to run {}", command)),
        };
        if !status.success() {
            bail!("'{}' failed ({})", command, status);
        }
        Ok(true)
    }

    /// `systemctl daemon-reload`; no-op for a target root
    pub(super) fn daemon_reload(&self) -> Result<()> {
        if self.systemctl(&["daemon-reload"])? {
            debug!("Reloaded systemd daemon");
        }
        Ok(())
    }

    /// Enable a unit written to the unit directory
    pub(super) fn enable(&self, unit: &str) -> Result<()> {
        if !self.is_live_root() {
            return self.enable_in_target(unit);
        }
        if self.systemctl(&["enable", unit])? {
            info!("Enabled unit '{}'", unit);
        }
        Ok(())
    }

    fn enable_in_target(&self, unit: &str) -> Result<()> {
        let unit_path = self.unit_dir().join(unit);
        let content = fs::read_to_string(&unit_path)
            .with_context(|| format!("Failed to read unit file {}", unit_path.display()))?;

        let links = [
            ("wants", parse_install_section(&content, "WantedBy")),
            ("requires", parse_install_section(&content, "RequiredBy")),
        ];
        if links.iter().all(|(_, targets)| targets.is_empty()) {
            debug!("Unit '{}' has no [Install] targets, nothing to enable", unit);
            return Ok(());
        }

        // Units live next to the .wants directories
        let link_target = format!("../{}", unit);
        for (suffix, targets) in &links {
            for target in targets {
                let link_dir = self.unit_dir().join(format!("{}.{}", target, suffix));
                fs::create_dir_all(&link_dir)?;

                let link = link_dir.join(unit);
                if fs::symlink_metadata(&link).is_ok() {
                    continue;
                }
                unix_fs::symlink(&link_target, &link).with_context(|| {
                    format!("Failed to create symlink {} -> {}", link.display(), link_target)
                })?;
                debug!("Created symlink {} -> {}", link.display(), link_target);
            }
        }

        info!("Enabled unit '{}' in {}", unit, self.root.display());
        Ok(())
    }
}

/// Values of `key` in the `[Install]` section, whitespace-split
pub fn parse_install_section(content: &str, key: &str) -> Vec<String> {
    let mut results = Vec::new();
    let mut in_install = false;

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('[') {
            in_install = trimmed == "[Install]";
            continue;
        }
        if !in_install {
            continue;
        }

        if let Some(value) = trimmed
            .strip_prefix(key)
            .and_then(|rest| rest.strip_prefix('='))
        {
            results.extend(value.split_whitespace().map(String::from));
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_install_section() {
        let content = "[Unit]\nDescription=x\nWantedBy=ignored.target\n\n[Install]\nWantedBy=scionlab.target multi-user.target\nRequiredBy=critical.target\n";
        assert_eq!(
            parse_install_section(content, "WantedBy"),
            vec!["scionlab.target", "multi-user.target"]
        );
        assert_eq!(parse_install_section(content, "RequiredBy"), vec!["critical.target"]);
        assert!(parse_install_section("[Service]\nExecStart=/bin/true\n", "WantedBy").is_empty());
    }

    #[test]
    fn test_enable_in_target_creates_relative_symlink() {
        let temp_dir = tempfile::tempdir().unwrap();
        let installer = UnitInstaller::new(temp_dir.path());
        fs::create_dir_all(installer.unit_dir()).unwrap();
        fs::write(
            installer.unit_dir().join("scionlab.target"),
            "[Unit]\nDescription=lab\n\n[Install]\nWantedBy=multi-user.target\n",
        )
        .unwrap();

        installer.enable("scionlab.target").unwrap();
        // Second enable leaves the existing link alone
        installer.enable("scionlab.target").unwrap();

        let link = installer
            .unit_dir()
            .join("multi-user.target.wants/scionlab.target");
        assert_eq!(fs::read_link(&link).unwrap(), std::path::PathBuf::from("../scionlab.target"));
        assert!(link.exists());
    }

    #[test]
    fn test_systemctl_skipped_for_target_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let installer = UnitInstaller::new(temp_dir.path());
        assert!(!installer.systemctl(&["daemon-reload"]).unwrap());
        assert!(installer.daemon_reload().is_ok());
    }

    #[test]
    fn test_enable_missing_unit_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        let installer = UnitInstaller::new(temp_dir.path());
        assert!(installer.enable("nope.service").is_err());
    }
}
