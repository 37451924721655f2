// src/lib.rs

//! SCIONLab AS node provisioning
//!
//! Turns a configuration bundle downloaded from the SCIONLab coordinator into
//! a running SCION AS node.
//!
//! # Architecture
//!
//! - Bundle: extract, rewrite `gen/` paths, inject a fresh host identity
//! - Services: derive dispatcher, border router, control service and daemon
//!   descriptors plus the lab target from the bundle and ISD-AS identifier
//! - Units: render the graph as systemd units and install them under a root
//! - Hooks: idempotent pre-start actions (TLS bootstrap, scratch reset)
//! - Provision: resolve the bundle source, then build and install the graph

pub mod bundle;
pub mod config;
mod error;
pub mod filesystem;
pub mod hooks;
pub mod isd_as;
pub mod provision;
pub mod services;
pub mod units;

pub use bundle::{BundleTransformer, ConfigBundle, HostIdentity};
pub use config::{BundleSource, LoggingConfig, NodeConfig};
pub use error::{Error, Result};
pub use hooks::{HookOutcome, PreStartHook, TlsBootstrap};
pub use isd_as::IsdAs;
pub use provision::{PendingTransform, Plan, Provisioner};
pub use services::{
    BinaryPaths, GraphInputs, ServiceDescriptor, ServiceGraph, ServiceGraphBuilder, ServiceRole,
};
pub use units::{InstallReport, UnitInstaller};
