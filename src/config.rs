// src/config.rs

//! Node configuration file
//!
//! ```toml
//! isd_as = "16-ffaa_0_1002"
//! tarball = "/root/scionlab-config.tar.gz"
//! output_dir = "/etc/scion"
//!
//! [binaries]
//! border_router = "/opt/scion/bin/scion-router"
//!
//! [logging]
//! level = "debug"
//! ```
//!
//! The bundle comes either from `tarball` or from an already-transformed
//! pair of `vpn_config` and `config_dir`, never a mix of both.

use crate::bundle::DEFAULT_OUTPUT_DIR;
use crate::error::{Error, Result};
use crate::isd_as::IsdAs;
use crate::services::BinaryPaths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default config file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/scionlab/node.toml";

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Where the configuration bundle comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleSource {
    /// Coordinator tarball, transformed into `output_dir`
    Tarball(PathBuf),
    /// Already-normalized paths
    Paths { vpn_config: PathBuf, config_dir: PathBuf },
}

/// Contents of the node configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    /// ISD-AS identifier, e.g. `16-ffaa_0_1002`
    pub isd_as: Option<String>,
    pub tarball: Option<PathBuf>,
    pub vpn_config: Option<PathBuf>,
    pub config_dir: Option<PathBuf>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub binaries: BinaryPaths,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            isd_as: None,
            tarball: None,
            vpn_config: None,
            config_dir: None,
            output_dir: default_output_dir(),
            binaries: BinaryPaths::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Read and parse a config file (not yet validated)
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::parse(&content)?;
        debug!("Loaded node config from {}", path.display());
        Ok(config)
    }

    /// Parse config text (not yet validated)
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Check the identifier and the bundle source
    pub fn validate(&self) -> Result<()> {
        self.isd_as()?;
        self.resolve_source()?;
        Ok(())
    }

    /// The decomposed ISD-AS identifier
    pub fn isd_as(&self) -> Result<IsdAs> {
        let raw = self
            .isd_as
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::validation("isd_as", "missing"))?;
        IsdAs::parse(raw).map_err(|e| Error::validation("isd_as", e.to_string()))
    }

    /// Resolve exactly one bundle source
    ///
    /// Either `tarball` alone, or `vpn_config` together with `config_dir`.
    pub fn resolve_source(&self) -> Result<BundleSource> {
        match (&self.tarball, &self.vpn_config, &self.config_dir) {
            (Some(tarball), None, None) => Ok(BundleSource::Tarball(tarball.clone())),
            (None, Some(vpn_config), Some(config_dir)) => Ok(BundleSource::Paths {
                vpn_config: vpn_config.clone(),
                config_dir: config_dir.clone(),
            }),
            (Some(_), _, _) => Err(Error::validation(
                "tarball",
                "cannot be combined with vpn_config or config_dir",
            )),
            (None, Some(_), None) => Err(Error::validation(
                "config_dir",
                "required together with vpn_config",
            )),
            (None, None, Some(_)) => Err(Error::validation(
                "vpn_config",
                "required together with config_dir",
            )),
            (None, None, None) => Err(Error::validation(
                "tarball",
                "either tarball or vpn_config and config_dir must be set",
            )),
        }
    }
}
