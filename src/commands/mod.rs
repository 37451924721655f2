// src/commands/mod.rs
//! Command handlers for the scionlab-node CLI

mod hook;
mod node;
mod transform;

pub use hook::{cmd_hook_reset_dir, cmd_hook_tls_bootstrap};
pub use node::{cmd_install, cmd_plan, log_level};
pub use transform::cmd_transform;
