// src/filesystem/path.rs

//! Path sanitization for bundle archive entries
//!
//! Configuration bundles are downloaded from a coordinator and unpacked on
//! the node, so every entry path is treated as untrusted. Entries must be
//! relative and must not climb out of the extraction root.

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Sanitize an archive entry path
///
/// - Rejects absolute paths
/// - Rejects `..` components
/// - Drops `.` components
/// - Rejects paths that are empty after normalization
///
/// ```
/// use scionlab_node::filesystem::path::sanitize_entry_path;
/// use std::path::PathBuf;
///
/// assert_eq!(
///     sanitize_entry_path("./gen/ISD16/topology.json").unwrap(),
///     PathBuf::from("gen/ISD16/topology.json")
/// );
/// assert!(sanitize_entry_path("/etc/passwd").is_err());
/// assert!(sanitize_entry_path("gen/../../etc/passwd").is_err());
/// ```
pub fn sanitize_entry_path(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Normal(c) => normalized.push(c),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(Error::PathTraversal(path.display().to_string()));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(Error::PathTraversal(format!(
                    "absolute entry path {}",
                    path.display()
                )));
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(Error::InvalidPath(format!(
            "empty entry path '{}'",
            path.display()
        )));
    }

    Ok(normalized)
}

/// Join an untrusted relative path onto a root
///
/// The joined path is verified to stay under `root` when both sides can be
/// canonicalized; otherwise the sanitization check alone applies.
pub fn safe_join(root: impl AsRef<Path>, path: impl AsRef<Path>) -> Result<PathBuf> {
    let root = root.as_ref();
    let sanitized = sanitize_entry_path(path.as_ref())?;
    let joined = root.join(&sanitized);

    if let (Ok(canonical_root), Ok(canonical_joined)) =
        (root.canonicalize(), joined.canonicalize())
        && !canonical_joined.starts_with(&canonical_root)
    {
        return Err(Error::PathTraversal(format!(
            "{} escapes {}",
            joined.display(),
            root.display()
        )));
    }

    Ok(joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_entry_path_normal() {
        assert_eq!(
            sanitize_entry_path("gen/dispatcher/disp.toml").unwrap(),
            PathBuf::from("gen/dispatcher/disp.toml")
        );
        assert_eq!(
            sanitize_entry_path("./client-scionlab-16.conf").unwrap(),
            PathBuf::from("client-scionlab-16.conf")
        );
        assert_eq!(
            sanitize_entry_path("gen/./ISD16/./x").unwrap(),
            PathBuf::from("gen/ISD16/x")
        );
    }

    #[test]
    fn test_sanitize_entry_path_absolute_rejected() {
        assert!(matches!(
            sanitize_entry_path("/etc/scion/gen"),
            Err(Error::PathTraversal(_))
        ));
    }

    #[test]
    fn test_sanitize_entry_path_traversal_rejected() {
        assert!(sanitize_entry_path("..").is_err());
        assert!(sanitize_entry_path("../gen").is_err());
        assert!(sanitize_entry_path("gen/../../x").is_err());
    }

    #[test]
    fn test_sanitize_entry_path_empty_rejected() {
        assert!(matches!(sanitize_entry_path(""), Err(Error::InvalidPath(_))));
        assert!(matches!(sanitize_entry_path("./"), Err(Error::InvalidPath(_))));
    }

    #[test]
    fn test_safe_join() {
        let root = PathBuf::from("/tmp/bundle-stage");
        assert_eq!(
            safe_join(&root, "gen/sd.toml").unwrap(),
            PathBuf::from("/tmp/bundle-stage/gen/sd.toml")
        );
        assert!(safe_join(&root, "../etc/passwd").is_err());
    }
}
