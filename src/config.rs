//! Configuration types for meshname-dns.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::DnsError;
use crate::network::{NetworkRegistry, DEFAULT_NETWORKS};
use crate::resolver::{RemoteLookupPolicy, ResolverOptions};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// DNS server configuration.
    #[serde(default)]
    pub dns: DnsConfig,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// DNS server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    /// UDP address to listen on. The loopback default suits a private
    /// resolver; public deployments listen on port 53.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Zone suffix bindings, e.g. "ygg=200::/7,cjd=fc00::/8,meshname=::/0".
    #[serde(default = "default_networks")]
    pub networks: String,

    /// Which clients may trigger forwarding.
    #[serde(default)]
    pub remote_lookups: RemoteLookupPolicy,

    /// Also merge Authority and Additional sections of forwarded responses.
    #[serde(default)]
    pub merge_all_sections: bool,

    /// Timeout for one forward exchange, in seconds.
    #[serde(default = "default_forward_timeout_secs")]
    pub forward_timeout_secs: u64,

    /// Port queried on forward targets.
    #[serde(default = "default_forward_port")]
    pub forward_port: u16,

    /// JSON zone file with locally served records.
    #[serde(default)]
    pub zone_file: Option<PathBuf>,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            networks: default_networks(),
            remote_lookups: RemoteLookupPolicy::default(),
            merge_all_sections: false,
            forward_timeout_secs: default_forward_timeout_secs(),
            forward_port: default_forward_port(),
            zone_file: None,
        }
    }
}

impl DnsConfig {
    /// Parse the configured suffix bindings.
    pub fn network_registry(&self) -> Result<NetworkRegistry, DnsError> {
        self.networks.parse()
    }

    /// Forward timeout as a `Duration`.
    pub fn forward_timeout(&self) -> Duration {
        Duration::from_secs(self.forward_timeout_secs)
    }

    /// Resolver switches derived from this config.
    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            remote_lookups: self.remote_lookups,
            merge_all_sections: self.merge_all_sections,
        }
    }

    /// Reject settings that cannot work.
    pub fn validate(&self) -> Result<(), DnsError> {
        if self.forward_timeout_secs == 0 {
            return Err(DnsError::Config(
                "forward_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.forward_port == 0 {
            return Err(DnsError::Config("forward_port must not be 0".to_string()));
        }
        let networks = self.network_registry()?;
        if networks.is_empty() {
            return Err(DnsError::Config("no zone suffix is configured".to_string()));
        }
        Ok(())
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter (e.g., "info", "debug", "meshname_dns=debug,warn").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,

    /// Prometheus metrics exporter address.
    #[serde(default)]
    pub prometheus_addr: Option<SocketAddr>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            prometheus_addr: None,
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((std::net::Ipv6Addr::LOCALHOST, 53535))
}

fn default_networks() -> String {
    DEFAULT_NETWORKS.to_string()
}

fn default_forward_timeout_secs() -> u64 {
    5
}

fn default_forward_port() -> u16 {
    crate::forward::DNS_PORT
}

fn default_log_level() -> String {
    "info".to_string()
}
