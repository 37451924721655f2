// src/provision.rs

//! End-to-end provisioning
//!
//! Provisioning runs in two phases. `plan` resolves the configuration bundle
//! into one canonical `ConfigBundle` and derives the service graph from it.
//! It writes nothing outside a scratch directory: a tarball source is checked
//! by transforming it there and discarding the result. `apply` performs the
//! real transform, if one is pending, and installs the units.
//!
//! A tarball is only transformed when `output_dir` does not yet hold a
//! transformed bundle, or when re-transforming was requested. Every transform
//! draws a new host identity, so repeated installs keep the current one.

use crate::bundle::{BundleTransformer, ConfigBundle};
use crate::config::{BundleSource, NodeConfig};
use crate::error::Result;
use crate::services::{ServiceGraph, ServiceGraphBuilder};
use crate::units::{InstallReport, UnitInstaller};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A tarball transform deferred to `apply`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransform {
    pub tarball: PathBuf,
    pub output_dir: PathBuf,
}

/// Resolved bundle plus the graph built from it
#[derive(Debug, Clone)]
pub struct Plan {
    /// Final bundle location; does not exist yet while a transform is pending
    pub bundle: ConfigBundle,
    pub graph: ServiceGraph,
    pub transform: Option<PendingTransform>,
}

/// Drives the bundle transformer, graph builder and installer
#[derive(Debug, Clone, Default)]
pub struct Provisioner {
    retransform: bool,
}

impl Provisioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transform a tarball source even if `output_dir` already holds a bundle
    pub fn with_retransform(mut self, retransform: bool) -> Self {
        self.retransform = retransform;
        self
    }

    /// Resolve the bundle and build the service graph
    pub fn plan(&self, config: &NodeConfig) -> Result<Plan> {
        config.validate()?;
        let isd_as = config.isd_as()?;

        let (bundle, transform) = match config.resolve_source()? {
            BundleSource::Tarball(tarball) => {
                let bundle = ConfigBundle::in_dir(&config.output_dir);
                if bundle.is_transformed() && !self.retransform {
                    info!(
                        "Using bundle already in {}; {} is not re-transformed",
                        config.output_dir.display(),
                        tarball.display()
                    );
                    (bundle, None)
                } else {
                    check_tarball(&tarball)?;
                    let pending = PendingTransform {
                        tarball,
                        output_dir: config.output_dir.clone(),
                    };
                    (bundle, Some(pending))
                }
            }
            BundleSource::Paths {
                vpn_config,
                config_dir,
            } => (ConfigBundle::new(vpn_config, config_dir), None),
        };
        if transform.is_none() {
            bundle.verify_present()?;
        }

        let graph = ServiceGraphBuilder::new(config.binaries.clone())
            .build_for(&bundle, &isd_as.file_fmt())?;

        Ok(Plan {
            bundle,
            graph,
            transform,
        })
    }

    /// Run the pending transform, then install the planned units under `root`
    pub fn apply(&self, plan: &Plan, root: &Path) -> anyhow::Result<InstallReport> {
        if let Some(pending) = &plan.transform {
            info!("Transforming bundle {}", pending.tarball.display());
            let bundle = BundleTransformer::new(&pending.output_dir).transform_file(&pending.tarball)?;
            if bundle != plan.bundle {
                anyhow::bail!(
                    "Transformed bundle at {} does not match the plan ({})",
                    bundle.config_dir().display(),
                    plan.bundle.config_dir().display()
                );
            }
        }

        let report = UnitInstaller::new(root).install(&plan.graph)?;
        info!(
            "Provisioned AS {}: {} units, {} enabled",
            plan.graph.isd_as(),
            report.units.len(),
            report.enabled.len()
        );
        Ok(report)
    }
}

/// Transform `tarball` into a scratch directory that is removed again
fn check_tarball(tarball: &Path) -> Result<()> {
    let scratch = tempfile::Builder::new().prefix("scionlab-plan-").tempdir()?;
    BundleTransformer::new(scratch.path().join("out")).transform_file(tarball)?;
    debug!("{} transforms cleanly", tarball.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::fs;

    #[test]
    fn test_plan_from_existing_paths() {
        let temp_dir = tempfile::tempdir().unwrap();
        let vpn = temp_dir.path().join("client-scionlab.conf");
        let gen_dir = temp_dir.path().join("gen");
        fs::write(&vpn, "client\n").unwrap();
        fs::create_dir(&gen_dir).unwrap();

        let config = NodeConfig {
            isd_as: Some("16-ffaa:0:1002".to_string()),
            vpn_config: Some(vpn.clone()),
            config_dir: Some(gen_dir),
            ..NodeConfig::default()
        };
        let plan = Provisioner::new().plan(&config).unwrap();
        assert!(plan.transform.is_none());
        assert_eq!(plan.bundle.vpn_config(), vpn);
        assert_eq!(plan.graph.isd_as().file_fmt(), "16-ffaa_0_1002");
    }

    #[test]
    fn test_plan_rejects_missing_vpn_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = NodeConfig {
            isd_as: Some("16-ffaa_0_1002".to_string()),
            vpn_config: Some(temp_dir.path().join("missing.conf")),
            config_dir: Some(temp_dir.path().to_path_buf()),
            ..NodeConfig::default()
        };
        match Provisioner::new().plan(&config).unwrap_err() {
            Error::Validation { field, .. } => assert_eq!(field, "vpn_config"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_plan_unreadable_tarball_writes_nothing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let output = temp_dir.path().join("scion");
        let config = NodeConfig {
            isd_as: Some("16-ffaa_0_1002".to_string()),
            tarball: Some(PathBuf::from("/nonexistent/bundle.tar.gz")),
            output_dir: output.clone(),
            ..NodeConfig::default()
        };
        assert!(matches!(
            Provisioner::new().plan(&config).unwrap_err(),
            Error::Archive(_)
        ));
        assert!(!output.exists());
    }

    #[test]
    fn test_plan_reuses_transformed_output() {
        let temp_dir = tempfile::tempdir().unwrap();
        let output = temp_dir.path().join("scion");
        let bundle = ConfigBundle::in_dir(&output);
        fs::create_dir_all(bundle.config_dir()).unwrap();
        fs::write(bundle.vpn_config(), "client\n").unwrap();
        fs::write(bundle.config_dir().join("scionlab-config.json"), "{}").unwrap();

        // The tarball is never read while the output is reused
        let config = NodeConfig {
            isd_as: Some("16-ffaa_0_1002".to_string()),
            tarball: Some(PathBuf::from("/nonexistent/bundle.tar.gz")),
            output_dir: output.clone(),
            ..NodeConfig::default()
        };
        let plan = Provisioner::new().plan(&config).unwrap();
        assert!(plan.transform.is_none());
        assert_eq!(plan.bundle, bundle);

        assert!(matches!(
            Provisioner::new()
                .with_retransform(true)
                .plan(&config)
                .unwrap_err(),
            Error::Archive(_)
        ));
    }
}
