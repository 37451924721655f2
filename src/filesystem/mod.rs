// src/filesystem/mod.rs

//! Filesystem helpers for bundle handling
//!
//! - Sanitization of untrusted archive entry paths
//! - Staged output directories that are committed atomically or not at all

pub mod path;
mod staging;

pub use staging::{copy_tree, StagedDir};
