// src/services/builder.rs

//! Service graph construction
//!
//! The builder takes the resolved bundle paths and the ISD-AS identifier and
//! derives every descriptor from fixed role templates. Executables come from
//! `BinaryPaths`, so nothing is looked up on the host while building.

use super::descriptor::{ExecCommand, ServiceDescriptor, ServiceRole};
use super::graph::{AggregateTarget, ServiceGraph};
use super::resources::{SystemAccount, TmpfilesEntry};
use crate::bundle::ConfigBundle;
use crate::error::{Error, Result};
use crate::hooks::{PreStartHook, TlsBootstrap};
use crate::isd_as::IsdAs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Runtime user and group of the SCION services
pub const SCION_USER: &str = "scion";

/// Working and state directory of the SCION services
pub const STATE_DIR: &str = "/var/lib/scion";

/// Dispatcher socket directory, emptied before each start
pub const DISPATCHER_SCRATCH_DIR: &str = "/run/shm/dispatcher";

/// Daemon socket directory, emptied before each start
pub const DAEMON_SCRATCH_DIR: &str = "/run/shm/sciond";

/// Directory holding the control-service TLS material
pub const TLS_DIR: &str = "/etc/scion/gen-certs";

/// Control-service TLS private key
pub const TLS_KEY_PATH: &str = "/etc/scion/gen-certs/tls.key";

/// Control-service TLS certificate
pub const TLS_CERT_PATH: &str = "/etc/scion/gen-certs/tls.pem";

/// VPN tunnel unit base name
pub const VPN_UNIT_BASE: &str = "openvpn-scionlab";

/// Lab aggregate target
pub const LAB_TARGET: &str = "scionlab.target";

/// Target the lab target is enabled under
pub const BOOT_TARGET: &str = "multi-user.target";

/// Executables referenced by the generated units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinaryPaths {
    pub dispatcher: PathBuf,
    pub border_router: PathBuf,
    pub control_service: PathBuf,
    pub daemon: PathBuf,
    pub openvpn: PathBuf,
    pub openssl: PathBuf,
    /// This tool, invoked by the supervisor to run pre-start hooks
    pub provisioner: PathBuf,
}

impl Default for BinaryPaths {
    fn default() -> Self {
        Self {
            dispatcher: PathBuf::from("/usr/bin/scion-dispatcher"),
            border_router: PathBuf::from("/usr/bin/scion-router"),
            control_service: PathBuf::from("/usr/bin/scion-control"),
            daemon: PathBuf::from("/usr/bin/scion-daemon"),
            openvpn: PathBuf::from("/usr/sbin/openvpn"),
            openssl: PathBuf::from("/usr/bin/openssl"),
            provisioner: PathBuf::from("/usr/bin/scionlab-node"),
        }
    }
}

impl BinaryPaths {
    /// Executable for a role
    pub fn for_role(&self, role: ServiceRole) -> &Path {
        match role {
            ServiceRole::Dispatcher => &self.dispatcher,
            ServiceRole::BorderRouter => &self.border_router,
            ServiceRole::ControlService => &self.control_service,
            ServiceRole::Daemon => &self.daemon,
        }
    }
}

/// Builder inputs, each of which may be missing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphInputs {
    pub vpn_config: Option<PathBuf>,
    pub config_dir: Option<PathBuf>,
    pub isd_as: Option<String>,
}

impl GraphInputs {
    /// Inputs from a resolved bundle plus identifier
    pub fn from_bundle(bundle: &ConfigBundle, isd_as: impl Into<String>) -> Self {
        Self {
            vpn_config: Some(bundle.vpn_config().to_path_buf()),
            config_dir: Some(bundle.config_dir().to_path_buf()),
            isd_as: Some(isd_as.into()),
        }
    }
}

/// Derives a `ServiceGraph` from a bundle and an ISD-AS identifier
#[derive(Debug, Clone, Default)]
pub struct ServiceGraphBuilder {
    binaries: BinaryPaths,
}

impl ServiceGraphBuilder {
    pub fn new(binaries: BinaryPaths) -> Self {
        Self { binaries }
    }

    pub fn binaries(&self) -> &BinaryPaths {
        &self.binaries
    }

    /// Shorthand for `build(&GraphInputs::from_bundle(bundle, isd_as))`
    pub fn build_for(&self, bundle: &ConfigBundle, isd_as: &str) -> Result<ServiceGraph> {
        self.build(&GraphInputs::from_bundle(bundle, isd_as))
    }

    /// Build the complete graph, or fail naming the first missing input
    pub fn build(&self, inputs: &GraphInputs) -> Result<ServiceGraph> {
        let vpn_config = inputs
            .vpn_config
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| Error::validation("vpn_config", "missing"))?;
        let config_dir = inputs
            .config_dir
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| Error::validation("config_dir", "missing"))?;
        let raw_isd_as = inputs
            .isd_as
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::validation("isd_as", "missing"))?;
        let isd_as =
            IsdAs::parse(raw_isd_as).map_err(|e| Error::validation("isd_as", e.to_string()))?;

        let vpn = self.vpn_descriptor(vpn_config);
        let vpn_unit = vpn.unit_name();

        let dispatcher_unit = format!(
            "{}@{}.service",
            ServiceRole::Dispatcher.base_name(),
            isd_as.file_fmt()
        );
        let roles: Vec<ServiceDescriptor> = ServiceRole::ALL
            .iter()
            .map(|role| self.role_descriptor(*role, config_dir, &isd_as, &vpn_unit, &dispatcher_unit))
            .collect();
        for desc in &roles {
            debug!(
                "{} runs {}",
                desc.unit_name(),
                desc.exec.argv().join(" ")
            );
        }

        let target = AggregateTarget {
            name: LAB_TARGET.to_string(),
            description: format!("SCIONLab AS {}", isd_as),
            requires: BTreeSet::from([vpn_unit.clone()]),
            after: BTreeSet::from([vpn_unit]),
            wants: roles.iter().map(|d| d.unit_name()).collect(),
            wanted_by: Some(BOOT_TARGET.to_string()),
        };

        let graph = ServiceGraph::assemble(
            isd_as,
            self.binaries.provisioner.clone(),
            vpn,
            roles,
            target,
            runtime_directories(),
            vec![SystemAccount {
                user: SCION_USER.to_string(),
                group: SCION_USER.to_string(),
                home: PathBuf::from(STATE_DIR),
                description: "SCION services".to_string(),
            }],
        )?;

        info!(
            "Built service graph for {} ({} services + {})",
            graph.isd_as(),
            graph.services().count(),
            LAB_TARGET
        );
        Ok(graph)
    }

    fn vpn_descriptor(&self, vpn_config: &Path) -> ServiceDescriptor {
        let exec = ExecCommand::new(&self.binaries.openvpn)
            .arg("--config")
            .arg(vpn_config.display().to_string());
        let mut desc = ServiceDescriptor::new(
            VPN_UNIT_BASE,
            "OpenVPN tunnel to the SCIONLab coordinator",
            exec,
        );
        desc.config_file = Some(vpn_config.to_path_buf());
        // Relative paths in the profile resolve against its own directory
        desc.working_directory = vpn_config.parent().map(Path::to_path_buf);
        desc
    }

    fn role_descriptor(
        &self,
        role: ServiceRole,
        config_dir: &Path,
        isd_as: &IsdAs,
        vpn_unit: &str,
        dispatcher_unit: &str,
    ) -> ServiceDescriptor {
        let config_file = role.config_file(config_dir, isd_as);
        let exec = ExecCommand::new(self.binaries.for_role(role))
            .arg("--config")
            .arg(config_file.display().to_string());

        let mut desc = ServiceDescriptor::new(
            role.base_name(),
            format!("{} {}", role.description(), isd_as),
            exec,
        );
        desc.role = Some(role);
        desc.instance = Some(isd_as.file_fmt());
        desc.config_file = Some(config_file);

        if role != ServiceRole::Dispatcher {
            desc.depends_on.insert(dispatcher_unit.to_string());
        }
        desc.after.insert(vpn_unit.to_string());
        desc.part_of = Some(LAB_TARGET.to_string());
        desc.wanted_by = Some(LAB_TARGET.to_string());

        desc.pre_start = match role {
            ServiceRole::Dispatcher => {
                vec![PreStartHook::ResetDirectory(PathBuf::from(DISPATCHER_SCRATCH_DIR))]
            }
            ServiceRole::Daemon => {
                vec![PreStartHook::ResetDirectory(PathBuf::from(DAEMON_SCRATCH_DIR))]
            }
            ServiceRole::ControlService => vec![PreStartHook::TlsBootstrap(
                TlsBootstrap::new(TLS_KEY_PATH, TLS_CERT_PATH).with_openssl(&self.binaries.openssl),
            )],
            ServiceRole::BorderRouter => Vec::new(),
        };

        desc.user = Some(SCION_USER.to_string());
        desc.group = Some(SCION_USER.to_string());
        desc.working_directory = Some(PathBuf::from(STATE_DIR));
        desc.environment.insert("TZ".to_string(), "UTC".to_string());
        desc
    }
}

fn runtime_directories() -> Vec<TmpfilesEntry> {
    vec![
        TmpfilesEntry::directory(DISPATCHER_SCRATCH_DIR, 0o755, SCION_USER, SCION_USER),
        TmpfilesEntry::directory(DAEMON_SCRATCH_DIR, 0o755, SCION_USER, SCION_USER),
        TmpfilesEntry::directory(STATE_DIR, 0o755, SCION_USER, SCION_USER),
        TmpfilesEntry::directory(TLS_DIR, 0o750, SCION_USER, SCION_USER),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> GraphInputs {
        GraphInputs {
            vpn_config: Some(PathBuf::from("/etc/scion/client-scionlab.conf")),
            config_dir: Some(PathBuf::from("/etc/scion/gen")),
            isd_as: Some("16-ffaa_0_1002".to_string()),
        }
    }

    fn field_of(err: Error) -> String {
        match err {
            Error::Validation { field, .. } => field,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_missing_inputs_name_field() {
        let builder = ServiceGraphBuilder::default();

        let mut missing = inputs();
        missing.vpn_config = None;
        assert_eq!(field_of(builder.build(&missing).unwrap_err()), "vpn_config");

        let mut missing = inputs();
        missing.config_dir = None;
        assert_eq!(field_of(builder.build(&missing).unwrap_err()), "config_dir");

        let mut missing = inputs();
        missing.isd_as = Some("  ".to_string());
        assert_eq!(field_of(builder.build(&missing).unwrap_err()), "isd_as");

        assert_eq!(field_of(builder.build(&GraphInputs::default()).unwrap_err()), "vpn_config");
    }

    #[test]
    fn test_malformed_isd_as_is_validation_error() {
        let mut bad = inputs();
        bad.isd_as = Some("ISD-isd-AS-as".to_string());
        let err = ServiceGraphBuilder::default().build(&bad).unwrap_err();
        assert_eq!(field_of(err), "isd_as");
    }

    #[test]
    fn test_role_templates() {
        let graph = ServiceGraphBuilder::default().build(&inputs()).unwrap();

        let cs = graph.role(ServiceRole::ControlService).unwrap();
        assert_eq!(cs.unit_name(), "scionlab-control-service@16-ffaa_0_1002.service");
        assert_eq!(
            cs.exec.argv(),
            vec![
                "/usr/bin/scion-control",
                "--config",
                "/etc/scion/gen/ISD16/ASffaa_0_1002/cs16-ffaa_0_1002-1/cs.toml"
            ]
        );
        match cs.pre_start.as_slice() {
            [PreStartHook::TlsBootstrap(tls)] => {
                assert_eq!(tls.key, PathBuf::from(TLS_KEY_PATH));
                assert_eq!(tls.openssl, PathBuf::from("/usr/bin/openssl"));
            }
            other => panic!("unexpected hooks {:?}", other),
        }

        let br = graph.role(ServiceRole::BorderRouter).unwrap();
        assert!(br.pre_start.is_empty());

        for desc in graph.roles() {
            assert_eq!(desc.user.as_deref(), Some("scion"));
            assert_eq!(desc.environment.get("TZ").map(String::as_str), Some("UTC"));
            assert_eq!(desc.working_directory, Some(PathBuf::from(STATE_DIR)));
            assert_eq!(desc.restart.backoff.as_secs(), 10);
        }
    }

    #[test]
    fn test_scratch_hooks() {
        let graph = ServiceGraphBuilder::default().build(&inputs()).unwrap();
        let dispatcher = graph.role(ServiceRole::Dispatcher).unwrap();
        let daemon = graph.role(ServiceRole::Daemon).unwrap();

        assert_eq!(
            dispatcher.pre_start,
            vec![PreStartHook::ResetDirectory(PathBuf::from("/run/shm/dispatcher"))]
        );
        assert_eq!(
            daemon.pre_start,
            vec![PreStartHook::ResetDirectory(PathBuf::from("/run/shm/sciond"))]
        );
        assert!(graph
            .tmpfiles()
            .iter()
            .any(|e| e.path == Path::new("/run/shm/sciond")));
    }

    #[test]
    fn test_injected_binaries() {
        let binaries = BinaryPaths {
            border_router: PathBuf::from("/opt/scion/bin/router"),
            provisioner: PathBuf::from("/opt/scion/bin/scionlab-node"),
            ..BinaryPaths::default()
        };
        let graph = ServiceGraphBuilder::new(binaries).build(&inputs()).unwrap();
        assert_eq!(
            graph.role(ServiceRole::BorderRouter).unwrap().exec.program,
            PathBuf::from("/opt/scion/bin/router")
        );
        assert_eq!(graph.hook_runner(), Path::new("/opt/scion/bin/scionlab-node"));
    }

    #[test]
    fn test_vpn_descriptor() {
        let graph = ServiceGraphBuilder::default().build(&inputs()).unwrap();
        let vpn = graph.vpn();
        assert_eq!(vpn.unit_name(), "openvpn-scionlab.service");
        assert_eq!(vpn.role, None);
        assert!(vpn.depends_on.is_empty());
        assert_eq!(vpn.working_directory, Some(PathBuf::from("/etc/scion")));
        assert_eq!(graph.aggregates_requiring(&vpn.unit_name()).len(), 1);
    }
}
