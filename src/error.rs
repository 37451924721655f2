// src/error.rs

//! Error types for the SCIONLab node provisioner

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for provisioning operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while transforming a bundle or deriving the service graph
///
/// Every variant except `HookFailure` is raised before any service starts
/// and is fatal for the provisioning run.
#[derive(Error, Debug)]
pub enum Error {
    /// Bundle archive is unreadable, corrupt, or contains unsafe entries
    #[error("archive error: {0}")]
    Archive(String),

    /// An expected artifact is absent from the bundle
    #[error("missing artifact: {0}")]
    MissingArtifact(String),

    /// More than one candidate matched an artifact that must be unique
    #[error("ambiguous artifact '{pattern}': {} candidates ({})", .candidates.len(), join_paths(.candidates))]
    AmbiguousArtifact {
        pattern: String,
        candidates: Vec<PathBuf>,
    },

    /// Host identity document cannot be parsed or updated
    #[error("malformed identity document {}: {reason}", .path.display())]
    MalformedIdentityDocument { path: PathBuf, reason: String },

    /// Graph or configuration precondition unmet
    #[error("validation failed for '{field}': {reason}")]
    Validation { field: String, reason: String },

    /// A pre-start hook could not complete
    #[error("hook '{hook}' failed for {service}: {reason}")]
    HookFailure {
        hook: String,
        service: String,
        reason: String,
    },

    /// ISD-AS identifier could not be decomposed
    #[error("invalid ISD-AS identifier '{value}': {reason}")]
    InvalidIsdAs { value: String, reason: String },

    /// Archive entry or path attempts to escape its root
    #[error("path traversal attempt: {0}")]
    PathTraversal(String),

    /// Path is empty or otherwise unusable
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Node configuration file missing or unusable
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error wrapper
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error wrapper
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl Error {
    /// Build a validation error naming the offending field
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True for both absent and ambiguous artifacts
    pub fn is_missing_artifact(&self) -> bool {
        matches!(self, Self::MissingArtifact(_) | Self::AmbiguousArtifact { .. })
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_artifact_classification() {
        assert!(Error::MissingArtifact("gen/".to_string()).is_missing_artifact());
        assert!(
            Error::AmbiguousArtifact {
                pattern: "client-scionlab*.conf".to_string(),
                candidates: vec![PathBuf::from("a.conf"), PathBuf::from("b.conf")],
            }
            .is_missing_artifact()
        );
        assert!(!Error::Archive("truncated".to_string()).is_missing_artifact());
    }

    #[test]
    fn test_validation_message_names_field() {
        let err = Error::validation("vpn_config", "not set");
        assert_eq!(err.to_string(), "validation failed for 'vpn_config': not set");
    }

    #[test]
    fn test_ambiguous_message_lists_candidates() {
        let err = Error::AmbiguousArtifact {
            pattern: "client-scionlab*.conf".to_string(),
            candidates: vec![PathBuf::from("x/a.conf"), PathBuf::from("y/b.conf")],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 candidates"));
        assert!(msg.contains("x/a.conf, y/b.conf"));
    }
}
