// src/cli/mod.rs
//! CLI definitions for scionlab-node
//!
//! This module contains the command-line interface definitions using clap.
//! The command implementations are in the `commands` module.
//!
//! - `transform` - Normalize a coordinator tarball into /etc/scion
//! - `plan` - Show the service graph for a node configuration
//! - `install` - Transform (if needed) and install the systemd units
//! - `hook` - Pre-start hooks called from the generated units

use clap::{Args, Parser, Subcommand};
use scionlab_node::bundle::DEFAULT_OUTPUT_DIR;
use std::path::PathBuf;

mod hook;

pub use hook::HookCommands;

#[derive(Parser)]
#[command(name = "scionlab-node")]
#[command(author = "SCIONLab node contributors")]
#[command(version)]
#[command(about = "Provision a SCIONLab AS node from a coordinator configuration bundle", long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Transform a coordinator tarball into a normalized configuration bundle
    Transform {
        /// Path to the downloaded tarball (.tar or .tar.gz)
        tarball: PathBuf,

        /// Directory receiving client-scionlab.conf and gen/
        #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
        output: PathBuf,
    },

    /// Show the services, start order and units that would be installed
    Plan {
        #[command(flatten)]
        node: NodeArgs,

        /// Print the full unit file text
        #[arg(long)]
        units: bool,
    },

    /// Resolve the bundle and install the service units
    Install {
        #[command(flatten)]
        node: NodeArgs,

        /// Installation root directory
        #[arg(short, long, default_value = "/")]
        root: PathBuf,

        /// Transform the tarball again even if the output directory holds a
        /// bundle (draws a new host identity)
        #[arg(long)]
        retransform: bool,
    },

    /// Pre-start hooks run by the service manager
    #[command(subcommand)]
    Hook(HookCommands),
}

/// Node configuration file plus per-field overrides
#[derive(Args, Debug, Clone, Default)]
pub struct NodeArgs {
    /// Node configuration file (default: /etc/scionlab/node.toml, if present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// ISD-AS identifier, e.g. 16-ffaa_0_1002
    #[arg(long)]
    pub isd_as: Option<String>,

    /// Coordinator tarball to transform
    #[arg(long, conflicts_with_all = ["vpn_config", "config_dir"])]
    pub tarball: Option<PathBuf>,

    /// Already-transformed VPN client profile
    #[arg(long, requires = "config_dir")]
    pub vpn_config: Option<PathBuf>,

    /// Already-transformed config directory
    #[arg(long, requires = "vpn_config")]
    pub config_dir: Option<PathBuf>,

    /// Output directory for a transformed tarball
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}
