// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Arguments shared by `plan` and `install`
fn node_args() -> Vec<Arg> {
    vec![
        Arg::new("config")
            .short('c')
            .long("config")
            .value_name("FILE")
            .help("Node configuration file (default: /etc/scionlab/node.toml, if present)"),
        Arg::new("isd_as")
            .long("isd-as")
            .value_name("ISD-AS")
            .help("ISD-AS identifier, e.g. 16-ffaa_0_1002"),
        Arg::new("tarball")
            .long("tarball")
            .value_name("PATH")
            .help("Coordinator tarball to transform"),
        Arg::new("vpn_config")
            .long("vpn-config")
            .value_name("PATH")
            .help("Already-transformed VPN client profile"),
        Arg::new("config_dir")
            .long("config-dir")
            .value_name("DIR")
            .help("Already-transformed config directory"),
        Arg::new("output_dir")
            .long("output-dir")
            .value_name("DIR")
            .help("Output directory for a transformed tarball"),
    ]
}

/// `--service`, naming the unit a hook runs for
fn service_arg(default: &'static str) -> Arg {
    Arg::new("service")
        .long("service")
        .default_value(default)
        .help("Unit the hook runs for (used in error reports)")
}

fn build_cli() -> Command {
    Command::new("scionlab-node")
        .version(env!("CARGO_PKG_VERSION"))
        .author("SCIONLab node contributors")
        .about("Provision a SCIONLab AS node from a coordinator configuration bundle")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Enable debug logging"),
        )
        .subcommand(
            Command::new("transform")
                .about("Transform a coordinator tarball into a normalized configuration bundle")
                .arg(Arg::new("tarball").required(true).help("Path to the downloaded tarball"))
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .default_value("/etc/scion")
                        .help("Directory receiving client-scionlab.conf and gen/"),
                ),
        )
        .subcommand(
            Command::new("plan")
                .about("Show the services, start order and units that would be installed")
                .args(node_args())
                .arg(
                    Arg::new("units")
                        .long("units")
                        .action(ArgAction::SetTrue)
                        .help("Print the full unit file text"),
                ),
        )
        .subcommand(
            Command::new("install")
                .about("Resolve the bundle and install the service units")
                .args(node_args())
                .arg(
                    Arg::new("root")
                        .short('r')
                        .long("root")
                        .default_value("/")
                        .help("Installation root directory"),
                )
                .arg(
                    Arg::new("retransform")
                        .long("retransform")
                        .action(ArgAction::SetTrue)
                        .help("Transform the tarball again even if the output directory holds a bundle (draws a new host identity)"),
                ),
        )
        .subcommand(
            Command::new("hook")
                .about("Pre-start hooks run by the service manager")
                .subcommand(
                    Command::new("tls-bootstrap")
                        .about("Create the control-service TLS key and self-signed certificate if missing")
                        .arg(service_arg("scionlab-control-service"))
                        .arg(
                            Arg::new("key")
                                .long("key")
                                .default_value("/etc/scion/gen-certs/tls.key")
                                .help("Private key path"),
                        )
                        .arg(
                            Arg::new("cert")
                                .long("cert")
                                .default_value("/etc/scion/gen-certs/tls.pem")
                                .help("Certificate path"),
                        )
                        .arg(
                            Arg::new("subject")
                                .long("subject")
                                .default_value("/CN=scion_def_srv")
                                .help("Certificate subject"),
                        )
                        .arg(
                            Arg::new("days")
                                .long("days")
                                .default_value("3650")
                                .help("Certificate validity in days"),
                        )
                        .arg(
                            Arg::new("bits")
                                .long("bits")
                                .default_value("2048")
                                .help("RSA key size in bits"),
                        )
                        .arg(
                            Arg::new("openssl")
                                .long("openssl")
                                .default_value("openssl")
                                .help("openssl executable"),
                        ),
                )
                .subcommand(
                    Command::new("reset-dir")
                        .about("Empty a scratch runtime directory, creating it if missing")
                        .arg(service_arg("scionlab-node"))
                        .arg(Arg::new("dir").required(true).help("Directory to reset")),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("scionlab-node.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
