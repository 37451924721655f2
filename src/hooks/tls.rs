// src/hooks/tls.rs

//! Control-service TLS bootstrap
//!
//! The control service needs a TLS keypair for its QUIC/gRPC endpoints. On
//! first start a 2048-bit RSA key and a self-signed certificate are created
//! with `openssl`; once both exist the hook does nothing.

use super::HookOutcome;
use crate::error::{Error, Result};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Certificate validity in days
pub const DEFAULT_TLS_DAYS: u32 = 3650;

/// RSA key size in bits
pub const DEFAULT_TLS_BITS: u32 = 2048;

/// Certificate subject
pub const DEFAULT_TLS_SUBJECT: &str = "/CN=scion_def_srv";

/// Parameters of the TLS bootstrap hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsBootstrap {
    pub key: PathBuf,
    pub cert: PathBuf,
    pub subject: String,
    pub days: u32,
    pub bits: u32,
    pub openssl: PathBuf,
}

impl TlsBootstrap {
    /// Bootstrap `key` and `cert` with the default subject, validity and size
    pub fn new(key: impl Into<PathBuf>, cert: impl Into<PathBuf>) -> Self {
        Self {
            key: key.into(),
            cert: cert.into(),
            subject: DEFAULT_TLS_SUBJECT.to_string(),
            days: DEFAULT_TLS_DAYS,
            bits: DEFAULT_TLS_BITS,
            openssl: PathBuf::from("openssl"),
        }
    }

    /// Use a specific `openssl` executable
    pub fn with_openssl(mut self, openssl: impl Into<PathBuf>) -> Self {
        self.openssl = openssl.into();
        self
    }

    /// Generate whatever is missing. Existing files are never overwritten.
    pub fn run(&self) -> Result<HookOutcome> {
        let mut created = Vec::new();

        if self.key.exists() {
            debug!("TLS key {} present", self.key.display());
        } else {
            self.generate_key()?;
            info!("Generated TLS key {}", self.key.display());
            created.push(self.key.clone());
        }

        if self.cert.exists() {
            debug!("TLS certificate {} present", self.cert.display());
        } else {
            self.generate_cert()?;
            info!(
                "Generated self-signed certificate {} ({} days)",
                self.cert.display(),
                self.days
            );
            created.push(self.cert.clone());
        }

        if created.is_empty() {
            Ok(HookOutcome::Unchanged)
        } else {
            Ok(HookOutcome::Applied(created))
        }
    }

    fn generate_key(&self) -> Result<()> {
        ensure_parent(&self.key)?;

        // The key file exists with mode 0600 before openssl writes into it
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        drop(options.open(&self.key)?);

        let bits = self.bits.to_string();
        let result = self.openssl(&["genrsa", "-out", path_arg(&self.key)?, &bits]);
        if result.is_err() {
            // Leave no empty key behind, or the next start would skip generation
            let _ = fs::remove_file(&self.key);
        }
        result
    }

    fn generate_cert(&self) -> Result<()> {
        ensure_parent(&self.cert)?;

        let days = self.days.to_string();
        let result = self.openssl(&[
            "req",
            "-new",
            "-x509",
            "-key",
            path_arg(&self.key)?,
            "-out",
            path_arg(&self.cert)?,
            "-days",
            &days,
            "-subj",
            &self.subject,
        ]);
        if result.is_err() {
            let _ = fs::remove_file(&self.cert);
        }
        result
    }

    fn openssl(&self, args: &[&str]) -> Result<()> {
        debug!("Running {} {}", self.openssl.display(), args.join(" "));
        let output = Command::new(&self.openssl)
            .args(args)
            .output()
            .map_err(|e| self.failure(format!("failed to run {}: {}", self.openssl.display(), e)))?;

        if !output.status.success() {
            return Err(self.failure(format!(
                "openssl {} exited with {:?}: {}",
                args.first().copied().unwrap_or_default(),
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    fn failure(&self, reason: String) -> Error {
        Error::HookFailure {
            hook: "tls-bootstrap".to_string(),
            service: "control service".to_string(),
            reason,
        }
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn path_arg(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| Error::InvalidPath(format!("{} is not valid UTF-8", path.display())))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// Stand-in for openssl: writes "<subcommand>" to the -out file and logs calls
    const FAKE_OPENSSL: &str = r#"#!/bin/sh
cmd="$1"
shift
out=""
while [ $# -gt 0 ]; do
    case "$1" in
        -out) out="$2"; shift ;;
    esac
    shift
done
echo "$cmd" >> "$(dirname "$0")/calls.log"
printf 'fake %s\n' "$cmd" > "$out"
"#;

    fn fake_openssl(dir: &Path) -> PathBuf {
        let path = dir.join("openssl");
        fs::write(&path, FAKE_OPENSSL).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn calls(dir: &Path) -> Vec<String> {
        fs::read_to_string(dir.join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_bootstrap_creates_key_then_cert() {
        let temp_dir = tempfile::tempdir().unwrap();
        let tool_dir = temp_dir.path().join("bin");
        fs::create_dir_all(&tool_dir).unwrap();
        let certs = temp_dir.path().join("gen-certs");

        let hook = TlsBootstrap::new(certs.join("tls.key"), certs.join("tls.pem"))
            .with_openssl(fake_openssl(&tool_dir));

        let outcome = hook.run().unwrap();
        assert_eq!(
            outcome,
            HookOutcome::Applied(vec![certs.join("tls.key"), certs.join("tls.pem")])
        );
        assert_eq!(calls(&tool_dir), vec!["genrsa", "req"]);

        let mode = fs::metadata(certs.join("tls.key")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_bootstrap_second_run_is_noop() {
        let temp_dir = tempfile::tempdir().unwrap();
        let tool_dir = temp_dir.path().join("bin");
        fs::create_dir_all(&tool_dir).unwrap();
        let key = temp_dir.path().join("tls.key");
        let cert = temp_dir.path().join("tls.pem");

        let hook = TlsBootstrap::new(&key, &cert).with_openssl(fake_openssl(&tool_dir));
        hook.run().unwrap();
        let key_before = fs::read(&key).unwrap();
        let cert_mtime = fs::metadata(&cert).unwrap().modified().unwrap();

        let outcome = hook.run().unwrap();
        assert!(outcome.is_unchanged());
        assert_eq!(calls(&tool_dir).len(), 2);
        assert_eq!(fs::read(&key).unwrap(), key_before);
        assert_eq!(fs::metadata(&cert).unwrap().modified().unwrap(), cert_mtime);
    }

    #[test]
    fn test_bootstrap_existing_key_only_generates_cert() {
        let temp_dir = tempfile::tempdir().unwrap();
        let tool_dir = temp_dir.path().join("bin");
        fs::create_dir_all(&tool_dir).unwrap();
        let key = temp_dir.path().join("tls.key");
        fs::write(&key, "existing key").unwrap();

        let hook = TlsBootstrap::new(&key, temp_dir.path().join("tls.pem"))
            .with_openssl(fake_openssl(&tool_dir));
        hook.run().unwrap();

        assert_eq!(calls(&tool_dir), vec!["req"]);
        assert_eq!(fs::read_to_string(&key).unwrap(), "existing key");
    }

    #[test]
    fn test_bootstrap_missing_openssl_fails_cleanly() {
        let temp_dir = tempfile::tempdir().unwrap();
        let key = temp_dir.path().join("tls.key");

        let hook = TlsBootstrap::new(&key, temp_dir.path().join("tls.pem"))
            .with_openssl(temp_dir.path().join("no-such-openssl"));

        let err = hook.run().unwrap_err();
        assert!(matches!(err, Error::HookFailure { .. }));
        assert!(!key.exists(), "failed generation must not leave an empty key");
    }
}
