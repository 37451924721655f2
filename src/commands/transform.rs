// src/commands/transform.rs

//! Bundle transformation command

use anyhow::{Context, Result};
use scionlab_node::BundleTransformer;
use std::path::Path;
use tracing::info;

/// Transform `tarball` into `output`
pub fn cmd_transform(tarball: &Path, output: &Path) -> Result<()> {
    info!("Transforming {} into {}", tarball.display(), output.display());

    let bundle = BundleTransformer::new(output)
        .transform_file(tarball)
        .with_context(|| format!("Failed to transform {}", tarball.display()))?;

    println!("VPN profile:   {}", bundle.vpn_config().display());
    println!("Config tree:   {}", bundle.config_dir().display());
    println!("A fresh host identity was written; re-running transform replaces it.");
    Ok(())
}
