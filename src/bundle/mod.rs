// src/bundle/mod.rs

//! Configuration bundle transformation
//!
//! The coordinator hands out a tarball holding an OpenVPN client profile and
//! a `gen/` tree of per-role configuration. Transforming it:
//!
//! 1. extracts the archive into a private working directory
//! 2. locates exactly one client profile and exactly one `gen/` tree
//! 3. stages both next to the output directory
//! 4. rewrites `gen/` references to the absolute runtime path
//! 5. injects a freshly generated host identity into `gen/scionlab-config.json`
//! 6. swaps the staged artifacts into the output directory
//!
//! Any failure before step 6 leaves the output directory as it was.
//!
//! Step 5 draws new randomness on every run, so transforming the same
//! tarball twice yields identical paths but a different identity.

mod archive;
mod identity;
mod locate;
mod rewrite;

pub use archive::{extract_bundle, ExtractStats, MAX_ENTRY_SIZE};
pub use identity::{inject_identity, HostIdentity, HOST_ID_FIELD, HOST_SECRET_FIELD, IDENTITY_LEN};
pub use locate::{locate_artifacts, LocatedArtifacts};
pub use rewrite::{PathRewriter, RewriteReport};

use crate::error::{Error, Result};
use crate::filesystem::{copy_tree, StagedDir};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default output directory for the normalized bundle
pub const DEFAULT_OUTPUT_DIR: &str = "/etc/scion";

/// Absolute location of the config tree on a deployed node
pub const DEFAULT_RUNTIME_GEN_DIR: &str = "/etc/scion/gen";

/// Name of the config tree inside the bundle (and the relative root rewritten)
pub const GEN_DIR_NAME: &str = "gen";

/// File name pattern identifying the client VPN profile
pub const CLIENT_PROFILE_PATTERN: &str = "client-scionlab*.conf";

/// File name the client profile is stored under
pub const CLIENT_PROFILE_NAME: &str = "client-scionlab.conf";

/// Host identity document, relative to the config tree
pub const IDENTITY_DOCUMENT: &str = "scionlab-config.json";

/// A resolved VPN profile and config directory
///
/// Both paths are always present together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigBundle {
    vpn_config: PathBuf,
    config_dir: PathBuf,
}

impl ConfigBundle {
    /// Pair a VPN profile with a config directory
    pub fn new(vpn_config: impl Into<PathBuf>, config_dir: impl Into<PathBuf>) -> Self {
        Self {
            vpn_config: vpn_config.into(),
            config_dir: config_dir.into(),
        }
    }

    /// The bundle a transform into `output_dir` produces
    pub fn in_dir(output_dir: &Path) -> Self {
        Self::new(
            output_dir.join(CLIENT_PROFILE_NAME),
            output_dir.join(GEN_DIR_NAME),
        )
    }

    /// True once the profile and the identity document are both in place
    pub fn is_transformed(&self) -> bool {
        self.vpn_config.is_file() && self.config_dir.join(IDENTITY_DOCUMENT).is_file()
    }

    /// Path to the OpenVPN client profile
    pub fn vpn_config(&self) -> &Path {
        &self.vpn_config
    }

    /// Path to the config tree
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Check both artifacts exist on disk
    pub fn verify_present(&self) -> Result<()> {
        if !self.vpn_config.is_file() {
            return Err(Error::validation(
                "vpn_config",
                format!("{} is not a file", self.vpn_config.display()),
            ));
        }
        if !self.config_dir.is_dir() {
            return Err(Error::validation(
                "config_dir",
                format!("{} is not a directory", self.config_dir.display()),
            ));
        }
        Ok(())
    }
}

/// Turns a downloaded bundle into a normalized `ConfigBundle`
#[derive(Debug, Clone)]
pub struct BundleTransformer {
    output_dir: PathBuf,
    runtime_gen_dir: PathBuf,
}

impl BundleTransformer {
    /// Transform into `output_dir`, rewriting references to `/etc/scion/gen`
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            runtime_gen_dir: PathBuf::from(DEFAULT_RUNTIME_GEN_DIR),
        }
    }

    /// Override the absolute path written in place of `gen/`
    pub fn with_runtime_gen_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.runtime_gen_dir = dir.into();
        self
    }

    /// Output directory the artifacts are committed to
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Read a tarball from disk and transform it
    pub fn transform_file(&self, tarball: &Path) -> Result<ConfigBundle> {
        let bytes = fs::read(tarball).map_err(|e| {
            Error::Archive(format!("cannot read {}: {}", tarball.display(), e))
        })?;
        self.transform(&bytes)
    }

    /// Transform bundle bytes
    ///
    /// The input is never modified; all writes happen in a private working
    /// directory, a staging directory, and finally the output directory.
    pub fn transform(&self, bytes: &[u8]) -> Result<ConfigBundle> {
        let rewriter = PathRewriter::new(GEN_DIR_NAME, &self.runtime_gen_dir)?;

        let work = tempfile::Builder::new().prefix("scionlab-bundle-").tempdir()?;
        let stats = extract_bundle(bytes, work.path())?;
        info!("Extracted bundle ({} files)", stats.files);

        let found = locate_artifacts(work.path(), CLIENT_PROFILE_PATTERN, GEN_DIR_NAME)?;
        debug!(
            "Bundle artifacts: profile {}, tree {}",
            found.vpn_profile.display(),
            found.gen_dir.display()
        );

        let staged = StagedDir::new(&self.output_dir)?;
        fs::copy(&found.vpn_profile, staged.path().join(CLIENT_PROFILE_NAME))?;
        let copied = copy_tree(&found.gen_dir, &staged.path().join(GEN_DIR_NAME))?;
        debug!("Staged client profile and {} config files", copied);

        let report = rewriter.rewrite_tree(staged.path())?;
        info!(
            "Rewrote {} reference(s) to {} in {} of {} files",
            report.replacements,
            self.runtime_gen_dir.display(),
            report.files_rewritten.len(),
            report.files_scanned
        );

        let document = staged.path().join(GEN_DIR_NAME).join(IDENTITY_DOCUMENT);
        if !document.is_file() {
            return Err(Error::MissingArtifact(format!(
                "{}/{} not found in bundle",
                GEN_DIR_NAME, IDENTITY_DOCUMENT
            )));
        }
        inject_identity(&document, &HostIdentity::generate())?;

        staged.commit(&[CLIENT_PROFILE_NAME, GEN_DIR_NAME])?;

        let bundle = ConfigBundle::in_dir(&self.output_dir);
        info!(
            "Bundle ready: {} and {}",
            bundle.vpn_config().display(),
            bundle.config_dir().display()
        );
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_present_names_missing_field() {
        let temp_dir = tempfile::tempdir().unwrap();
        let vpn = temp_dir.path().join("client-scionlab.conf");
        let gen_dir = temp_dir.path().join("gen");

        let bundle = ConfigBundle::new(&vpn, &gen_dir);
        match bundle.verify_present().unwrap_err() {
            Error::Validation { field, .. } => assert_eq!(field, "vpn_config"),
            other => panic!("unexpected {:?}", other),
        }

        fs::write(&vpn, "client\n").unwrap();
        match bundle.verify_present().unwrap_err() {
            Error::Validation { field, .. } => assert_eq!(field, "config_dir"),
            other => panic!("unexpected {:?}", other),
        }

        fs::create_dir(&gen_dir).unwrap();
        assert!(bundle.verify_present().is_ok());
    }

    #[test]
    fn test_in_dir_is_transformed() {
        let temp_dir = tempfile::tempdir().unwrap();
        let bundle = ConfigBundle::in_dir(temp_dir.path());
        assert_eq!(bundle.vpn_config(), temp_dir.path().join(CLIENT_PROFILE_NAME));
        assert!(!bundle.is_transformed());

        fs::write(bundle.vpn_config(), "client\n").unwrap();
        fs::create_dir(bundle.config_dir()).unwrap();
        assert!(!bundle.is_transformed());

        fs::write(bundle.config_dir().join(IDENTITY_DOCUMENT), "{}").unwrap();
        assert!(bundle.is_transformed());
    }

    #[test]
    fn test_transform_file_unreadable() {
        let transformer = BundleTransformer::new("/nonexistent/out");
        let err = transformer
            .transform_file(Path::new("/nonexistent/bundle.tar.gz"))
            .unwrap_err();
        assert!(matches!(err, Error::Archive(_)));
    }
}
