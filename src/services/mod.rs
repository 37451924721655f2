// src/services/mod.rs

//! Service graph for a SCIONLab AS node
//!
//! Four role services run per AS, all instanced by the ISD-AS identifier:
//!
//! ```text
//! openvpn-scionlab.service
//!         |
//!         v
//! scionlab-dispatcher@IA ---> border-router@IA
//!                        ---> control-service@IA
//!                        ---> daemon@IA
//!         |
//!         v
//! scionlab.target
//! ```
//!
//! The dispatcher is the root of the role graph. Every other role requires
//! it and is ordered after it; a dispatcher failure does not stop its
//! dependents, which restart on their own policy. The lab target requires
//! the VPN tunnel and wants the four roles.

mod builder;
mod descriptor;
mod graph;
mod resources;

pub use builder::{
    BinaryPaths, GraphInputs, ServiceGraphBuilder, BOOT_TARGET, DAEMON_SCRATCH_DIR,
    DISPATCHER_SCRATCH_DIR, LAB_TARGET, SCION_USER, STATE_DIR, TLS_CERT_PATH, TLS_DIR,
    TLS_KEY_PATH, VPN_UNIT_BASE,
};
pub use descriptor::{
    ExecCommand, RestartKind, RestartPolicy, ServiceDescriptor, ServiceRole,
    DEFAULT_RESTART_BACKOFF,
};
pub use graph::{AggregateTarget, ServiceGraph};
pub use resources::{SystemAccount, TmpfilesEntry};
