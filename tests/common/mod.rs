// tests/common/mod.rs

//! Shared test utilities for integration tests.
//!
//! Bundles are built in memory with the `tar` crate so tests never depend on
//! fixture files or a real coordinator download.

#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;

pub const ISD_AS: &str = "16-ffaa_0_1002";

pub const CLIENT_PROFILE: &[u8] = b"client
dev tun
proto udp
remote vpn.scionlab.org 1194
# keys are inline
status gen/openvpn-status.log
";

pub const BR_TOML: &[u8] = b"[general]
id = \"br16-ffaa_0_1002-1\"
config_dir = \"gen/ISD16/ASffaa_0_1002/br16-ffaa_0_1002-1\"

[log.console]
level = \"info\"
";

pub const CS_TOML: &[u8] = b"[general]
id = \"cs16-ffaa_0_1002-1\"
config_dir = \"gen/ISD16/ASffaa_0_1002/cs16-ffaa_0_1002-1\"

[trust_db]
connection = \"/var/lib/scion/cs16-ffaa_0_1002-1.trust.db\"
";

pub const SD_TOML: &[u8] = b"[general]
id = \"sd16-ffaa_0_1002\"
config_dir = \"gen/ISD16/ASffaa_0_1002/endhost\"
";

pub const DISP_TOML: &[u8] = b"[dispatcher]
id = \"dispatcher\"
socket_file_mode = \"0770\"
";

/// Build an uncompressed tar from `(path, content)` pairs
pub fn tar_bundle(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, *content).unwrap();
    }
    builder.into_inner().unwrap()
}

/// Gzip-compress `bytes`
pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

/// A tar holding one file whose name is written verbatim into the header
///
/// `tar::Builder` refuses unsafe names, so the header is filled by hand.
pub fn tar_with_raw_name(name: &str, content: &[u8]) -> Vec<u8> {
    let mut header = tar::Header::new_gnu();
    {
        let gnu = header.as_gnu_mut().unwrap();
        gnu.name[..name.len()].copy_from_slice(name.as_bytes());
    }
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_entry_type(tar::EntryType::Regular);
    header.set_cksum();

    let mut builder = tar::Builder::new(Vec::new());
    builder.append(&header, content).unwrap();
    builder.into_inner().unwrap()
}

/// Files of a complete coordinator bundle, as `(path, content)` pairs
pub fn sample_files() -> Vec<(&'static str, &'static [u8])> {
    vec![
        ("client-scionlab-test.conf", CLIENT_PROFILE),
        ("gen/scionlab-config.json", b"{}"),
        (
            "gen/ISD16/ASffaa_0_1002/br16-ffaa_0_1002-1/br.toml",
            BR_TOML,
        ),
        (
            "gen/ISD16/ASffaa_0_1002/cs16-ffaa_0_1002-1/cs.toml",
            CS_TOML,
        ),
        ("gen/ISD16/ASffaa_0_1002/endhost/sd.toml", SD_TOML),
        ("gen/ISD16/ASffaa_0_1002/dispatcher/disp.toml", DISP_TOML),
    ]
}

/// Gzip-compressed sample bundle, as shipped by the coordinator
pub fn sample_bundle() -> Vec<u8> {
    gzip(&tar_bundle(&sample_files()))
}
