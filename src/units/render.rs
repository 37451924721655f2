// src/units/render.rs

//! systemd unit, tmpfiles.d and sysusers.d text

use crate::services::{AggregateTarget, ServiceDescriptor, SystemAccount, TmpfilesEntry};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::Path;

const GENERATED_HEADER: &str =
    "# Generated by scionlab-node. Changes are overwritten on the next install.\n";

/// Quote one command-line word for `ExecStart=`
///
/// `%` and `$` are doubled so systemd passes them through literally.
pub fn escape_exec_arg(arg: &str) -> String {
    let escaped = arg.replace('%', "%%").replace('$', "$$");
    let needs_quotes = escaped.is_empty()
        || escaped
            .chars()
            .any(|c| c.is_whitespace() || c == '"' || c == '\'' || c == '\\' || c == ';');
    if !needs_quotes {
        return escaped;
    }

    let mut quoted = String::with_capacity(escaped.len() + 2);
    quoted.push('"');
    for c in escaped.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

fn command_line(argv: &[String]) -> String {
    argv.iter()
        .map(|a| escape_exec_arg(a))
        .collect::<Vec<_>>()
        .join(" ")
}

fn join(names: &BTreeSet<String>) -> String {
    names.iter().map(String::as_str).collect::<Vec<_>>().join(" ")
}

/// Render a service unit; hooks run through `hook_runner`
pub fn render_service(desc: &ServiceDescriptor, hook_runner: &Path) -> String {
    let mut out = String::from(GENERATED_HEADER);

    out.push_str("\n[Unit]\n");
    let _ = writeln!(out, "Description={}", desc.description);
    if !desc.depends_on.is_empty() {
        let _ = writeln!(out, "Requires={}", join(&desc.depends_on));
    }
    let after: BTreeSet<String> = desc.ordering_predecessors().cloned().collect();
    if !after.is_empty() {
        let _ = writeln!(out, "After={}", join(&after));
    }
    if let Some(part_of) = &desc.part_of {
        let _ = writeln!(out, "PartOf={}", part_of);
    }

    out.push_str("\n[Service]\nType=simple\n");
    if let Some(user) = &desc.user {
        let _ = writeln!(out, "User={}", user);
    }
    if let Some(group) = &desc.group {
        let _ = writeln!(out, "Group={}", group);
    }
    if let Some(dir) = &desc.working_directory {
        let _ = writeln!(out, "WorkingDirectory={}", dir.display());
    }
    for (key, value) in &desc.environment {
        let _ = writeln!(out, "Environment={}", escape_exec_arg(&format!("{}={}", key, value)));
    }
    for hook in &desc.pre_start {
        let mut argv = vec![hook_runner.display().to_string()];
        argv.extend(hook.command_args(&desc.unit_name()));
        let _ = writeln!(out, "ExecStartPre={}", command_line(&argv));
    }
    let _ = writeln!(out, "ExecStart={}", command_line(&desc.exec.argv()));
    let _ = writeln!(out, "Restart={}", desc.restart.kind.as_str());
    let _ = writeln!(out, "RestartSec={}", desc.restart.backoff.as_secs());

    if let Some(wanted_by) = &desc.wanted_by {
        out.push_str("\n[Install]\n");
        let _ = writeln!(out, "WantedBy={}", wanted_by);
    }

    out
}

/// Render the aggregate target
pub fn render_target(target: &AggregateTarget) -> String {
    let mut out = String::from(GENERATED_HEADER);

    out.push_str("\n[Unit]\n");
    let _ = writeln!(out, "Description={}", target.description);
    if !target.requires.is_empty() {
        let _ = writeln!(out, "Requires={}", join(&target.requires));
    }
    if !target.after.is_empty() {
        let _ = writeln!(out, "After={}", join(&target.after));
    }
    if !target.wants.is_empty() {
        let _ = writeln!(out, "Wants={}", join(&target.wants));
    }

    if let Some(wanted_by) = &target.wanted_by {
        out.push_str("\n[Install]\n");
        let _ = writeln!(out, "WantedBy={}", wanted_by);
    }

    out
}

/// Render a tmpfiles.d file
pub fn render_tmpfiles(entries: &[TmpfilesEntry]) -> String {
    let mut out = String::from(GENERATED_HEADER);
    for entry in entries {
        out.push_str(&entry.to_line());
        out.push('\n');
    }
    out
}

/// Render a sysusers.d file
pub fn render_sysusers(accounts: &[SystemAccount]) -> String {
    let mut out = String::from(GENERATED_HEADER);
    for account in accounts {
        let _ = writeln!(out, "g {} -", account.group);
        let _ = writeln!(
            out,
            "u {} -:{} \"{}\" {}",
            account.user,
            account.group,
            account.description,
            account.home.display()
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{GraphInputs, ServiceGraphBuilder, ServiceRole};
    use std::path::PathBuf;

    fn graph() -> crate::services::ServiceGraph {
        ServiceGraphBuilder::default()
            .build(&GraphInputs {
                vpn_config: Some(PathBuf::from("/etc/scion/client-scionlab.conf")),
                config_dir: Some(PathBuf::from("/etc/scion/gen")),
                isd_as: Some("16-ffaa_0_1002".to_string()),
            })
            .unwrap()
    }

    #[test]
    fn test_escape_exec_arg() {
        assert_eq!(escape_exec_arg("/etc/scion/gen"), "/etc/scion/gen");
        assert_eq!(escape_exec_arg("/CN=scion_def_srv"), "/CN=scion_def_srv");
        assert_eq!(escape_exec_arg("a b"), "\"a b\"");
        assert_eq!(escape_exec_arg("50%"), "50%%");
        assert_eq!(escape_exec_arg(""), "\"\"");
        assert_eq!(escape_exec_arg("say \"hi\""), "\"say \\\"hi\\\"\"");
    }

    #[test]
    fn test_render_border_router() {
        let graph = graph();
        let br = graph.role(ServiceRole::BorderRouter).unwrap();
        let text = render_service(br, graph.hook_runner());

        assert!(text.contains("Requires=scionlab-dispatcher@16-ffaa_0_1002.service\n"));
        assert!(text.contains(
            "After=openvpn-scionlab.service scionlab-dispatcher@16-ffaa_0_1002.service\n"
        ));
        assert!(text.contains("PartOf=scionlab.target\n"));
        assert!(text.contains("User=scion\nGroup=scion\n"));
        assert!(text.contains("WorkingDirectory=/var/lib/scion\n"));
        assert!(text.contains("Environment=TZ=UTC\n"));
        assert!(text.contains(
            "ExecStart=/usr/bin/scion-router --config /etc/scion/gen/ISD16/ASffaa_0_1002/br16-ffaa_0_1002-1/br.toml\n"
        ));
        assert!(text.contains("Restart=always\nRestartSec=10\n"));
        assert!(text.contains("[Install]\nWantedBy=scionlab.target\n"));
        assert!(!text.contains("ExecStartPre="));
    }

    #[test]
    fn test_render_pre_start_hooks() {
        let graph = graph();

        let dispatcher = render_service(graph.role(ServiceRole::Dispatcher).unwrap(), graph.hook_runner());
        assert!(dispatcher.contains(
            "ExecStartPre=/usr/bin/scionlab-node hook reset-dir --service scionlab-dispatcher@16-ffaa_0_1002.service /run/shm/dispatcher\n"
        ));
        assert!(!dispatcher.contains("Requires="));

        let cs = render_service(graph.role(ServiceRole::ControlService).unwrap(), graph.hook_runner());
        assert!(cs.contains("ExecStartPre=/usr/bin/scionlab-node hook tls-bootstrap --service scionlab-control-service@16-ffaa_0_1002.service --key /etc/scion/gen-certs/tls.key"));
        assert!(cs.contains("--days 3650"));
    }

    #[test]
    fn test_render_target() {
        let graph = graph();
        let text = render_target(graph.target());
        assert!(text.contains("Requires=openvpn-scionlab.service\n"));
        assert!(text.contains("After=openvpn-scionlab.service\n"));
        assert!(text.contains("Wants=scionlab-border-router@16-ffaa_0_1002.service"));
        assert!(text.contains("WantedBy=multi-user.target\n"));
    }

    #[test]
    fn test_render_vpn_without_install() {
        let graph = graph();
        let text = render_service(graph.vpn(), graph.hook_runner());
        assert!(text.contains("ExecStart=/usr/sbin/openvpn --config /etc/scion/client-scionlab.conf\n"));
        assert!(text.contains("WorkingDirectory=/etc/scion\n"));
        assert!(!text.contains("[Install]"));
        assert!(!text.contains("User="));
    }

    #[test]
    fn test_render_sysusers_and_tmpfiles() {
        let graph = graph();
        let sysusers = render_sysusers(graph.accounts());
        assert!(sysusers.contains("g scion -\n"));
        assert!(sysusers.contains("u scion -:scion \"SCION services\" /var/lib/scion\n"));

        let tmpfiles = render_tmpfiles(graph.tmpfiles());
        assert!(tmpfiles.contains("d /run/shm/dispatcher 0755 scion scion -\n"));
        assert!(tmpfiles.contains("d /etc/scion/gen-certs 0750 scion scion -\n"));
    }
}
