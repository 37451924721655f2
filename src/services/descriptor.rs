// src/services/descriptor.rs

//! Service descriptors
//!
//! A descriptor is the supervisor-neutral description of one long-running
//! process: what to execute, which units must be up first, which hooks run
//! before start, and how failures are restarted. Instance names and
//! dependency edges are typed fields; unit names are only assembled when
//! asked for.

use crate::hooks::PreStartHook;
use crate::isd_as::IsdAs;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Delay before a failed service is restarted
pub const DEFAULT_RESTART_BACKOFF: Duration = Duration::from_secs(10);

/// The four SCION roles run on an AS node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServiceRole {
    Dispatcher,
    BorderRouter,
    ControlService,
    Daemon,
}

impl ServiceRole {
    /// All roles, dispatcher first
    pub const ALL: [ServiceRole; 4] = [
        Self::Dispatcher,
        Self::BorderRouter,
        Self::ControlService,
        Self::Daemon,
    ];

    /// Unit base name, before the `@` instance separator
    pub fn base_name(self) -> &'static str {
        match self {
            Self::Dispatcher => "scionlab-dispatcher",
            Self::BorderRouter => "scionlab-border-router",
            Self::ControlService => "scionlab-control-service",
            Self::Daemon => "scionlab-daemon",
        }
    }

    /// Human-readable description
    pub fn description(self) -> &'static str {
        match self {
            Self::Dispatcher => "SCION Dispatcher",
            Self::BorderRouter => "SCION Border Router",
            Self::ControlService => "SCION Control Service",
            Self::Daemon => "SCION Daemon",
        }
    }

    /// Role configuration file inside the generated tree
    ///
    /// `config_dir/ISD<isd>/AS<as>/<role dir>/<file>.toml`, with the border
    /// router and control service directories carrying the full ISD-AS.
    pub fn config_file(self, config_dir: &Path, ia: &IsdAs) -> PathBuf {
        let as_dir = config_dir
            .join(format!("ISD{}", ia.isd()))
            .join(format!("AS{}", ia.as_file()));
        match self {
            Self::Dispatcher => as_dir.join("dispatcher").join("disp.toml"),
            Self::BorderRouter => as_dir.join(format!("br{}-1", ia.file_fmt())).join("br.toml"),
            Self::ControlService => as_dir.join(format!("cs{}-1", ia.file_fmt())).join("cs.toml"),
            Self::Daemon => as_dir.join("endhost").join("sd.toml"),
        }
    }
}

impl fmt::Display for ServiceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Dispatcher => "dispatcher",
            Self::BorderRouter => "border-router",
            Self::ControlService => "control-service",
            Self::Daemon => "daemon",
        };
        write!(f, "{}", name)
    }
}

/// Executable plus its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl ExecCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Program followed by arguments
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 1);
        argv.push(self.program.display().to_string());
        argv.extend(self.args.iter().cloned());
        argv
    }
}

/// When the supervisor restarts a service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartKind {
    Always,
    OnFailure,
    Never,
}

impl RestartKind {
    /// systemd `Restart=` value
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::OnFailure => "on-failure",
            Self::Never => "no",
        }
    }
}

/// Restart kind plus fixed backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    pub kind: RestartKind,
    pub backoff: Duration,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            kind: RestartKind::Always,
            backoff: DEFAULT_RESTART_BACKOFF,
        }
    }
}

/// One supervised service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    /// SCION role, `None` for the VPN tunnel
    pub role: Option<ServiceRole>,
    pub base_name: String,
    /// Instance suffix after `@`
    pub instance: Option<String>,
    pub description: String,
    pub exec: ExecCommand,
    pub config_file: Option<PathBuf>,
    /// Units that must be active first (requirement plus ordering)
    pub depends_on: BTreeSet<String>,
    /// Units ordered before this one without being required
    pub after: BTreeSet<String>,
    /// Aggregate unit whose stop/restart propagates here
    pub part_of: Option<String>,
    pub pre_start: Vec<PreStartHook>,
    pub restart: RestartPolicy,
    pub user: Option<String>,
    pub group: Option<String>,
    pub working_directory: Option<PathBuf>,
    pub environment: BTreeMap<String, String>,
    /// Target pulling this unit in when enabled directly
    pub wanted_by: Option<String>,
}

impl ServiceDescriptor {
    /// Descriptor with no edges, hooks or runtime settings
    pub fn new(base_name: impl Into<String>, description: impl Into<String>, exec: ExecCommand) -> Self {
        Self {
            role: None,
            base_name: base_name.into(),
            instance: None,
            description: description.into(),
            exec,
            config_file: None,
            depends_on: BTreeSet::new(),
            after: BTreeSet::new(),
            part_of: None,
            pre_start: Vec::new(),
            restart: RestartPolicy::default(),
            user: None,
            group: None,
            working_directory: None,
            environment: BTreeMap::new(),
            wanted_by: None,
        }
    }

    /// Full unit name, e.g. `scionlab-dispatcher@16-ffaa_0_1002.service`
    pub fn unit_name(&self) -> String {
        match &self.instance {
            Some(instance) => format!("{}@{}.service", self.base_name, instance),
            None => format!("{}.service", self.base_name),
        }
    }

    /// Every unit this one is ordered after
    pub fn ordering_predecessors(&self) -> impl Iterator<Item = &String> {
        self.depends_on.union(&self.after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_name_with_and_without_instance() {
        let mut desc = ServiceDescriptor::new("openvpn-scionlab", "VPN", ExecCommand::new("/usr/sbin/openvpn"));
        assert_eq!(desc.unit_name(), "openvpn-scionlab.service");

        desc.base_name = "scionlab-dispatcher".to_string();
        desc.instance = Some("16-ffaa_0_1002".to_string());
        assert_eq!(desc.unit_name(), "scionlab-dispatcher@16-ffaa_0_1002.service");
    }

    #[test]
    fn test_role_config_files() {
        let ia = IsdAs::parse("16-ffaa_0_1002").unwrap();
        let gen_dir = Path::new("/etc/scion/gen");

        assert_eq!(
            ServiceRole::BorderRouter.config_file(gen_dir, &ia),
            PathBuf::from("/etc/scion/gen/ISD16/ASffaa_0_1002/br16-ffaa_0_1002-1/br.toml")
        );
        assert_eq!(
            ServiceRole::ControlService.config_file(gen_dir, &ia),
            PathBuf::from("/etc/scion/gen/ISD16/ASffaa_0_1002/cs16-ffaa_0_1002-1/cs.toml")
        );
        assert_eq!(
            ServiceRole::Daemon.config_file(gen_dir, &ia),
            PathBuf::from("/etc/scion/gen/ISD16/ASffaa_0_1002/endhost/sd.toml")
        );
        assert_eq!(
            ServiceRole::Dispatcher.config_file(gen_dir, &ia),
            PathBuf::from("/etc/scion/gen/ISD16/ASffaa_0_1002/dispatcher/disp.toml")
        );
    }

    #[test]
    fn test_exec_argv() {
        let exec = ExecCommand::new("/usr/bin/scion-router")
            .arg("--config")
            .arg("/etc/scion/gen/br.toml");
        assert_eq!(
            exec.argv(),
            vec!["/usr/bin/scion-router", "--config", "/etc/scion/gen/br.toml"]
        );
    }

    #[test]
    fn test_default_restart_policy() {
        let policy = RestartPolicy::default();
        assert_eq!(policy.kind, RestartKind::Always);
        assert_eq!(policy.backoff.as_secs(), 10);
        assert_eq!(policy.kind.as_str(), "always");
    }

    #[test]
    fn test_ordering_predecessors_union() {
        let mut desc = ServiceDescriptor::new("x", "x", ExecCommand::new("/bin/true"));
        desc.depends_on.insert("a.service".to_string());
        desc.after.insert("a.service".to_string());
        desc.after.insert("b.service".to_string());
        let preds: Vec<_> = desc.ordering_predecessors().cloned().collect();
        assert_eq!(preds, vec!["a.service", "b.service"]);
    }
}
