// src/units/mod.rs

//! Service graph installation for systemd
//!
//! ## Target Root Support
//!
//! Installation works against the live system (`/`) or any other root
//! directory, such as a mounted image being prepared for a node. When
//! root != `/`:
//! - the `scion` user and group are appended to the target's passwd/group
//! - units are enabled via symlinks, not `systemctl`
//! - tmpfiles.d entries are written but applied only on first boot
//! - the host system is never modified

mod render;
mod systemd;
mod tmpfiles;
mod user_group;

pub use render::{escape_exec_arg, render_service, render_sysusers, render_target, render_tmpfiles};
pub use systemd::parse_install_section;
pub use tmpfiles::CONFIG_FILE_NAME;

use crate::services::ServiceGraph;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Relative location of written unit files
pub const UNIT_DIR: &str = "etc/systemd/system";

/// What an installation wrote and enabled
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    /// Unit files, in start order
    pub units: Vec<PathBuf>,
    /// tmpfiles.d and sysusers.d files
    pub support_files: Vec<PathBuf>,
    /// Units successfully enabled
    pub enabled: Vec<String>,
    /// Accounts created (`group:<name>` / `user:<name>`)
    pub accounts_created: Vec<String>,
}

/// Writes and enables the units of a `ServiceGraph` under a root
#[derive(Debug, Clone)]
pub struct UnitInstaller {
    /// Root filesystem path (usually "/")
    root: PathBuf,
}

impl UnitInstaller {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn is_live_root(&self) -> bool {
        self.root == Path::new("/")
    }

    /// Directory unit files are written to
    pub fn unit_dir(&self) -> PathBuf {
        self.root.join(UNIT_DIR)
    }

    /// Unit name and text for every unit of the graph, in start order
    pub fn render_units(&self, graph: &ServiceGraph) -> Result<Vec<(String, String)>> {
        let order = graph.start_order()?;
        order
            .into_iter()
            .map(|name| {
                let text = if name == graph.target().name {
                    render_target(graph.target())
                } else {
                    let desc = graph
                        .service(&name)
                        .ok_or_else(|| anyhow::anyhow!("unit {} not in graph", name))?;
                    render_service(desc, graph.hook_runner())
                };
                Ok((name, text))
            })
            .collect()
    }

    /// Install the graph
    ///
    /// Accounts and files are required to succeed. Enabling and reloading
    /// only warn on failure, leaving the written units for manual repair.
    pub fn install(&self, graph: &ServiceGraph) -> Result<InstallReport> {
        let mut report = InstallReport::default();

        for account in graph.accounts() {
            let created = self
                .ensure_account(account)
                .with_context(|| format!("Failed to create account '{}'", account.user))?;
            report.accounts_created.extend(created);
        }

        report.support_files.push(self.install_sysusers(graph.accounts())?);
        report.support_files.push(self.install_tmpfiles(graph.tmpfiles())?);

        let unit_dir = self.unit_dir();
        fs::create_dir_all(&unit_dir)
            .with_context(|| format!("Failed to create {}", unit_dir.display()))?;
        for (name, text) in self.render_units(graph)? {
            let path = unit_dir.join(&name);
            fs::write(&path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            report.units.push(path);
        }
        info!(
            "Wrote {} units to {}",
            report.units.len(),
            unit_dir.display()
        );

        if let Err(e) = self.daemon_reload() {
            warn!("Failed to reload systemd daemon: {}", e);
        }

        // The VPN is pulled in by the target, not enabled on its own
        let to_enable = std::iter::once(graph.target().name.clone())
            .chain(graph.roles().iter().map(|d| d.unit_name()));
        for unit in to_enable {
            match self.enable(&unit) {
                Ok(()) => report.enabled.push(unit),
                Err(e) => warn!("Failed to enable unit '{}': {}", unit, e),
            }
        }

        Ok(report)
    }
}
