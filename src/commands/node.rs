// src/commands/node.rs

//! Plan and install commands

use crate::cli::{Cli, Commands, NodeArgs};
use anyhow::{Context, Result};
use scionlab_node::config::DEFAULT_CONFIG_PATH;
use scionlab_node::units::UnitInstaller;
use scionlab_node::{NodeConfig, Plan, Provisioner};
use std::path::Path;
use tracing::{debug, info};

/// Load the node config and apply command-line overrides
///
/// Without `--config`, the default file is used if it exists. Source flags
/// replace the file's whole bundle source rather than merging with it.
pub fn load_node_config(args: &NodeArgs) -> Result<NodeConfig> {
    let mut config = match &args.config {
        Some(path) => NodeConfig::load(path)?,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            NodeConfig::load(Path::new(DEFAULT_CONFIG_PATH))?
        }
        None => {
            debug!("No config file, using command-line values only");
            NodeConfig::default()
        }
    };

    if let Some(isd_as) = &args.isd_as {
        config.isd_as = Some(isd_as.clone());
    }
    if args.tarball.is_some() || args.vpn_config.is_some() || args.config_dir.is_some() {
        config.tarball = args.tarball.clone();
        config.vpn_config = args.vpn_config.clone();
        config.config_dir = args.config_dir.clone();
    }
    if let Some(output_dir) = &args.output_dir {
        config.output_dir = output_dir.clone();
    }

    config.validate()?;
    Ok(config)
}

/// Level for the log filter when `RUST_LOG` is unset
pub fn log_level(cli: &Cli) -> String {
    if cli.verbose {
        return "debug".to_string();
    }
    let node = match &cli.command {
        Commands::Plan { node, .. } | Commands::Install { node, .. } => node,
        _ => return "info".to_string(),
    };
    let path = node
        .config
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
    NodeConfig::load(path)
        .map(|c| c.logging.level)
        .unwrap_or_else(|_| "info".to_string())
}

fn prepare(provisioner: &Provisioner, args: &NodeArgs) -> Result<Plan> {
    let config = load_node_config(args)?;
    provisioner
        .plan(&config)
        .context("Failed to prepare the node configuration")
}

/// Print the service graph
pub fn cmd_plan(args: &NodeArgs, show_units: bool) -> Result<()> {
    let plan = prepare(&Provisioner::new(), args)?;
    let graph = &plan.graph;

    println!("AS {} ({})", graph.isd_as(), graph.isd_as().file_fmt());
    println!("VPN profile: {}", plan.bundle.vpn_config().display());
    println!("Config tree: {}", plan.bundle.config_dir().display());
    if let Some(pending) = &plan.transform {
        println!(
            "Install transforms {} into {} (new host identity)",
            pending.tarball.display(),
            pending.output_dir.display()
        );
    }
    println!();
    println!("Start order:");
    for (i, unit) in graph.start_order()?.iter().enumerate() {
        println!("  {}. {}", i + 1, unit);
        if let Some(desc) = graph.service(unit) {
            if let Some(config_file) = &desc.config_file {
                println!("       config: {}", config_file.display());
            }
            for hook in &desc.pre_start {
                println!("       pre-start: {}", hook.name());
            }
        }
    }

    if show_units {
        // Rendering does not depend on the root
        let installer = UnitInstaller::new(Path::new("/"));
        for (name, text) in installer.render_units(graph)? {
            println!("\n### {}\n{}", name, text);
        }
    }
    Ok(())
}

/// Resolve the bundle and install the units under `root`
///
/// A tarball source is transformed only if `output_dir` holds no bundle yet,
/// unless `retransform` is set.
pub fn cmd_install(args: &NodeArgs, root: &Path, retransform: bool) -> Result<()> {
    let provisioner = Provisioner::new().with_retransform(retransform);
    let plan = prepare(&provisioner, args)?;

    let report = provisioner.apply(&plan, root)?;
    if plan.transform.is_some() {
        info!("Bundle transformed into {}", plan.bundle.config_dir().display());
    }

    println!("Installed {} units under {}", report.units.len(), root.display());
    for unit in &report.enabled {
        println!("  enabled {}", unit);
    }
    for account in &report.accounts_created {
        println!("  created {}", account);
    }
    if report.enabled.len() + 1 < report.units.len() {
        println!("Some units could not be enabled; see the log for details.");
    }
    Ok(())
}
