// src/bundle/identity.rs

//! Per-host identity material
//!
//! Every transform draws a fresh host id and host secret and writes them into
//! the host-identity JSON document. Identity is deliberately regenerated on
//! each transform; it is never cached between runs.

use crate::error::{Error, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::info;

/// Length in bytes of the host id and the host secret
pub const IDENTITY_LEN: usize = 16;

/// JSON field holding the host id
pub const HOST_ID_FIELD: &str = "host_id";

/// JSON field holding the host secret
pub const HOST_SECRET_FIELD: &str = "host_secret";

/// Host id and secret, drawn independently from the OS random source
#[derive(Clone, PartialEq, Eq)]
pub struct HostIdentity {
    host_id: [u8; IDENTITY_LEN],
    host_secret: [u8; IDENTITY_LEN],
}

impl HostIdentity {
    /// Generate a fresh identity
    pub fn generate() -> Self {
        let mut host_id = [0u8; IDENTITY_LEN];
        let mut host_secret = [0u8; IDENTITY_LEN];
        OsRng.fill_bytes(&mut host_id);
        OsRng.fill_bytes(&mut host_secret);

        // Equal draws are astronomically unlikely; redraw rather than accept one
        while host_secret == host_id {
            OsRng.fill_bytes(&mut host_secret);
        }

        Self {
            host_id,
            host_secret,
        }
    }

    /// Raw host id bytes
    pub fn host_id(&self) -> &[u8; IDENTITY_LEN] {
        &self.host_id
    }

    /// Host id, lowercase hex
    pub fn host_id_hex(&self) -> String {
        hex::encode(self.host_id)
    }

    /// Host secret, lowercase hex. Never log this value.
    pub fn host_secret_hex(&self) -> String {
        hex::encode(self.host_secret)
    }

    /// Set `host_id` and `host_secret` on a JSON object, keeping other keys
    pub fn apply_to(&self, document: &mut Value) -> std::result::Result<(), String> {
        let kind = json_kind(document);
        let object = document
            .as_object_mut()
            .ok_or_else(|| format!("expected a JSON object, found {}", kind))?;
        object.insert(HOST_ID_FIELD.to_string(), Value::String(self.host_id_hex()));
        object.insert(
            HOST_SECRET_FIELD.to_string(),
            Value::String(self.host_secret_hex()),
        );
        Ok(())
    }
}

impl fmt::Debug for HostIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostIdentity")
            .field("host_id", &self.host_id_hex())
            .field("host_secret", &"<redacted>")
            .finish()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Write `identity` into the JSON document at `path`
///
/// The document is rewritten pretty-printed and restricted to mode 0600.
pub fn inject_identity(path: &Path, identity: &HostIdentity) -> Result<()> {
    let malformed = |reason: String| Error::MalformedIdentityDocument {
        path: path.to_path_buf(),
        reason,
    };

    let content = fs::read(path)?;
    let mut document: Value =
        serde_json::from_slice(&content).map_err(|e| malformed(e.to_string()))?;
    identity.apply_to(&mut document).map_err(malformed)?;

    let mut rendered = serde_json::to_string_pretty(&document)?;
    rendered.push('\n');
    fs::write(path, rendered)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }

    info!(
        "Injected host identity (host_id {}) into {}",
        identity.host_id_hex(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_distinct_values() {
        let identity = HostIdentity::generate();
        assert_ne!(identity.host_id_hex(), identity.host_secret_hex());
        assert_eq!(identity.host_id_hex().len(), IDENTITY_LEN * 2);
        assert_eq!(identity.host_secret_hex().len(), IDENTITY_LEN * 2);
    }

    #[test]
    fn test_generate_is_fresh_each_time() {
        let a = HostIdentity::generate();
        let b = HostIdentity::generate();
        assert_ne!(a.host_id(), b.host_id());
        assert_ne!(a.host_secret_hex(), b.host_secret_hex());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let identity = HostIdentity::generate();
        let rendered = format!("{:?}", identity);
        assert!(rendered.contains(&identity.host_id_hex()));
        assert!(!rendered.contains(&identity.host_secret_hex()));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_inject_into_empty_object() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("scionlab-config.json");
        fs::write(&path, "{}").unwrap();

        let identity = HostIdentity::generate();
        inject_identity(&path, &identity).unwrap();

        let doc: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let object = doc.as_object().unwrap();
        assert_eq!(object.len(), 2);
        assert_eq!(object[HOST_ID_FIELD], identity.host_id_hex());
        assert_eq!(object[HOST_SECRET_FIELD], identity.host_secret_hex());
    }

    #[test]
    fn test_inject_preserves_other_keys() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("scionlab-config.json");
        fs::write(&path, r#"{"version": 3, "host_id": "old"}"#).unwrap();

        inject_identity(&path, &HostIdentity::generate()).unwrap();

        let doc: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["version"], 3);
        assert_ne!(doc[HOST_ID_FIELD], "old");
    }

    #[test]
    fn test_inject_rejects_invalid_json() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("scionlab-config.json");
        fs::write(&path, "{not json").unwrap();

        let err = inject_identity(&path, &HostIdentity::generate()).unwrap_err();
        assert!(matches!(err, Error::MalformedIdentityDocument { .. }));
        // Document left as it was
        assert_eq!(fs::read_to_string(&path).unwrap(), "{not json");
    }

    #[test]
    fn test_inject_rejects_non_object() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("scionlab-config.json");
        fs::write(&path, "[1, 2]").unwrap();

        let err = inject_identity(&path, &HostIdentity::generate()).unwrap_err();
        match err {
            Error::MalformedIdentityDocument { reason, .. } => assert!(reason.contains("an array")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_apply_to_names_document_kind() {
        let identity = HostIdentity::generate();

        let mut null = Value::Null;
        assert_eq!(
            identity.apply_to(&mut null).unwrap_err(),
            "expected a JSON object, found null"
        );

        let mut object = serde_json::json!({"as": "16-ffaa:0:1002"});
        identity.apply_to(&mut object).unwrap();
        assert_eq!(object[HOST_ID_FIELD], Value::String(identity.host_id_hex()));
        assert_eq!(object["as"], "16-ffaa:0:1002");
    }

    #[cfg(unix)]
    #[test]
    fn test_inject_restricts_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("scionlab-config.json");
        fs::write(&path, "{}").unwrap();

        inject_identity(&path, &HostIdentity::generate()).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
