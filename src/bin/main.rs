//! meshnamed binary entry point.

use clap::{Parser, Subcommand};
use meshname_dns::codec::{address_from_domain, domain_for};
use meshname_dns::{generate_config, telemetry, Config, DnsServer};
use std::net::Ipv6Addr;
use std::path::PathBuf;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

/// DNS server for meshname domains.
#[derive(Parser, Debug)]
#[command(name = "meshnamed")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML).
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the DNS server.
    Daemon {
        /// JSON zone file; overrides `dns.zone_file`.
        zone_file: Option<PathBuf>,
    },
    /// Print a starter zone config for an address.
    Genconf {
        /// IPv6 address the config is for.
        ip: Ipv6Addr,
        /// Zone suffix.
        #[arg(long, default_value = "meshname")]
        zone: String,
    },
    /// Print the address a meshname domain encodes.
    Lookup {
        /// Domain, e.g. aib7cwwdeob2vtnqf2cfnm7ilq.meshname
        domain: String,
    },
    /// Print the meshname domain for an address.
    ReverseLookup {
        /// IPv6 address.
        ip: Ipv6Addr,
        /// Zone suffix.
        #[arg(long, default_value = "meshname")]
        zone: String,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<Config, config::ConfigError> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path.clone()));
    }
    builder
        .add_source(
            config::Environment::with_prefix("MESHNAMED")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    match args.command {
        Command::Genconf { ip, zone } => {
            println!("{}", generate_config(&ip, &zone)?);
            Ok(())
        }
        Command::Lookup { domain } => {
            println!("{}", address_from_domain(&domain)?);
            Ok(())
        }
        Command::ReverseLookup { ip, zone } => {
            println!("{}", domain_for(&ip, &zone));
            Ok(())
        }
        Command::Daemon { zone_file } => {
            let mut config = load_config(args.config.as_ref())?;
            if zone_file.is_some() {
                config.dns.zone_file = zone_file;
            }
            run_daemon(config).await
        }
    }
}

async fn run_daemon(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    // Initialize telemetry
    telemetry::init(&config.telemetry).map_err(|e| e as Box<dyn std::error::Error>)?;

    info!(
        listen_addr = %config.dns.listen_addr,
        networks = %config.dns.networks,
        zone_file = ?config.dns.zone_file,
        "Starting meshnamed"
    );

    let server = DnsServer::new(config.dns)?;
    server.start().await?;

    let mut hangup = signal(SignalKind::hangup())?;
    let mut terminate = signal(SignalKind::terminate())?;

    loop {
        tokio::select! {
            _ = hangup.recv() => {
                info!("SIGHUP received, reloading zone file");
                if let Err(e) = server.reload() {
                    warn!("reload failed: {}", e);
                }
            }
            _ = terminate.recv() => {
                info!("SIGTERM received");
                break;
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!("failed to listen for ctrl-c: {}", e);
                }
                break;
            }
        }
    }

    server.stop().await?;
    info!("meshnamed shutdown complete");
    Ok(())
}
