// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, HookCommands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins unless --verbose is given
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(commands::log_level(&cli)))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Transform { tarball, output } => commands::cmd_transform(&tarball, &output),
        Commands::Plan { node, units } => commands::cmd_plan(&node, units),
        Commands::Install {
            node,
            root,
            retransform,
        } => commands::cmd_install(&node, &root, retransform),
        Commands::Hook(hook) => match hook {
            HookCommands::TlsBootstrap {
                service,
                key,
                cert,
                subject,
                days,
                bits,
                openssl,
            } => commands::cmd_hook_tls_bootstrap(&service, key, cert, subject, days, bits, openssl),
            HookCommands::ResetDir { service, dir } => commands::cmd_hook_reset_dir(&service, &dir),
        },
    }
}
