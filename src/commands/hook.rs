// src/commands/hook.rs

//! Pre-start hook commands
//!
//! These are the targets of the `ExecStartPre=` lines in the generated
//! units. A non-zero exit makes the supervisor skip that one start attempt.

use anyhow::Result;
use scionlab_node::hooks::{HookOutcome, PreStartHook, TlsBootstrap};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Generate missing TLS material
#[allow(clippy::too_many_arguments)]
pub fn cmd_hook_tls_bootstrap(
    service: &str,
    key: PathBuf,
    cert: PathBuf,
    subject: String,
    days: u32,
    bits: u32,
    openssl: PathBuf,
) -> Result<()> {
    let tls = TlsBootstrap {
        key,
        cert,
        subject,
        days,
        bits,
        openssl,
    };
    report(PreStartHook::TlsBootstrap(tls).run(service)?);
    Ok(())
}

/// Empty a scratch directory
pub fn cmd_hook_reset_dir(service: &str, dir: &Path) -> Result<()> {
    report(PreStartHook::ResetDirectory(dir.to_path_buf()).run(service)?);
    Ok(())
}

fn report(outcome: HookOutcome) {
    match outcome {
        HookOutcome::Unchanged => debug!("Nothing to do"),
        HookOutcome::Applied(paths) => {
            for path in paths {
                debug!("Touched {}", path.display());
            }
        }
    }
}
