// src/cli/hook.rs
//! Pre-start hook commands

use clap::Subcommand;
use scionlab_node::hooks::{DEFAULT_TLS_BITS, DEFAULT_TLS_DAYS, DEFAULT_TLS_SUBJECT};
use scionlab_node::services::{TLS_CERT_PATH, TLS_KEY_PATH};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum HookCommands {
    /// Create the control-service TLS key and self-signed certificate if missing
    TlsBootstrap {
        /// Unit the hook runs for (used in error reports)
        #[arg(long, default_value = "scionlab-control-service")]
        service: String,

        /// Private key path
        #[arg(long, default_value = TLS_KEY_PATH)]
        key: PathBuf,

        /// Certificate path
        #[arg(long, default_value = TLS_CERT_PATH)]
        cert: PathBuf,

        /// Certificate subject
        #[arg(long, default_value = DEFAULT_TLS_SUBJECT)]
        subject: String,

        /// Certificate validity in days
        #[arg(long, default_value_t = DEFAULT_TLS_DAYS)]
        days: u32,

        /// RSA key size in bits
        #[arg(long, default_value_t = DEFAULT_TLS_BITS)]
        bits: u32,

        /// openssl executable
        #[arg(long, default_value = "openssl")]
        openssl: PathBuf,
    },

    /// Empty a scratch runtime directory, creating it if missing
    ResetDir {
        /// Unit the hook runs for (used in error reports)
        #[arg(long, default_value = "scionlab-node")]
        service: String,

        /// Directory to reset
        dir: PathBuf,
    },
}
