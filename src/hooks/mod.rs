// src/hooks/mod.rs

//! Pre-start hooks attached to service descriptors
//!
//! Hooks run immediately before a service process starts. The supervisor
//! invokes them through `scionlab-node hook ...`, so each hook knows how to
//! describe itself as command-line arguments as well as how to run.
//!
//! A failing hook is reported for its own service only; sibling services are
//! unaffected.

mod scratch;
mod tls;

pub use scratch::reset_directory;
pub use tls::{TlsBootstrap, DEFAULT_TLS_BITS, DEFAULT_TLS_DAYS, DEFAULT_TLS_SUBJECT};

use crate::error::{Error, Result};
use std::path::PathBuf;

/// What a hook changed on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    /// Paths created or cleared by this run
    Applied(Vec<PathBuf>),
    /// Nothing needed doing
    Unchanged,
}

impl HookOutcome {
    /// True when the hook did not touch the filesystem
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged)
    }
}

/// A hook run before a service starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreStartHook {
    /// Create the control-service TLS key and certificate if absent
    TlsBootstrap(TlsBootstrap),
    /// Empty a scratch runtime directory (stale sockets from a crashed run)
    ResetDirectory(PathBuf),
}

impl PreStartHook {
    /// Subcommand name under `scionlab-node hook`
    pub fn name(&self) -> &'static str {
        match self {
            Self::TlsBootstrap(_) => "tls-bootstrap",
            Self::ResetDirectory(_) => "reset-dir",
        }
    }

    /// Arguments following the hook runner binary when run for `service`
    pub fn command_args(&self, service: &str) -> Vec<String> {
        let mut args = vec![
            "hook".to_string(),
            self.name().to_string(),
            "--service".to_string(),
            service.to_string(),
        ];
        match self {
            Self::TlsBootstrap(tls) => {
                args.extend([
                    "--key".to_string(),
                    tls.key.display().to_string(),
                    "--cert".to_string(),
                    tls.cert.display().to_string(),
                    "--subject".to_string(),
                    tls.subject.clone(),
                    "--days".to_string(),
                    tls.days.to_string(),
                    "--bits".to_string(),
                    tls.bits.to_string(),
                    "--openssl".to_string(),
                    tls.openssl.display().to_string(),
                ]);
            }
            Self::ResetDirectory(path) => args.push(path.display().to_string()),
        }
        args
    }

    /// Run the hook on behalf of `service`
    pub fn run(&self, service: &str) -> Result<HookOutcome> {
        let result = match self {
            Self::TlsBootstrap(tls) => tls.run(),
            Self::ResetDirectory(path) => reset_directory(path),
        };

        result.map_err(|e| {
            let reason = match e {
                Error::HookFailure { reason, .. } => reason,
                other => other.to_string(),
            };
            Error::HookFailure {
                hook: self.name().to_string(),
                service: service.to_string(),
                reason,
            }
        })
    }
}
