//! Meshname DNS - a DNS server for self-certifying names on IPv6 mesh networks.
//!
//! A meshname domain carries its own server address: the label right before
//! the zone suffix is the 26-character lowercase base32 encoding of a 16-byte
//! IPv6 address. The server answers from a local zone table when it holds
//! that label and otherwise forwards the question to the address the label
//! decodes to, provided the address lies inside the subnet bound to the
//! suffix.
//!
//! ## Features
//!
//! - Reversible label ⇄ IPv6 address codec
//! - Per-suffix subnet trust filter (`ygg=200::/7,cjd=fc00::/8,meshname=::/0`)
//! - Local zone table loaded from a JSON object stream, reloadable at runtime
//! - Batched forwarding, one exchange per target address per request
//! - Start/stop lifecycle with a bind handshake
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          meshname-dns                            │
//! │                                                                  │
//! │  ┌──────────────┐    ┌──────────────────┐                        │
//! │  │ Zone loader  │───▶│   DNS State      │                        │
//! │  │ (SIGHUP)     │    │ zones + networks │                        │
//! │  └──────────────┘    └────────┬─────────┘                        │
//! │                               │ snapshot per request             │
//! │                               ▼                                  │
//! │  UDP ──▶ ┌──────────────────┐    ┌──────────┐    ┌───────────┐   │
//! │          │ MeshnameHandler  │───▶│ Resolver │───▶│ Forwarder │──▶ target:53
//! │  UDP ◀── └──────────────────┘    └──────────┘    └───────────┘   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## DNS Resolution
//!
//! ```text
//! www.aib7cwwdeob2vtnqf2cfnm7ilq.ygg.
//!   → suffix "ygg" bound to 200::/7?
//!   → label in the zone table → answer locally
//!   → else decode label → 203:f15a:c323:83aa:cdb0:2e84:56b3:e85c
//!   → inside 200::/7 → forward to [203:f15a:...]:53
//! ```
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use meshname_dns::{DnsConfig, DnsServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), meshname_dns::DnsError> {
//!     let config = DnsConfig {
//!         listen_addr: "[::1]:53535".parse().unwrap(),
//!         zone_file: Some("/etc/meshnamed.conf".into()),
//!         ..Default::default()
//!     };
//!
//!     let server = DnsServer::new(config)?;
//!     server.start().await?;
//!     tokio::signal::ctrl_c().await?;
//!     server.stop().await
//! }
//! ```

#![warn(missing_docs)]

pub mod codec;
pub mod config;
pub mod error;
pub mod forward;
pub mod handler;
pub mod loader;
pub mod metrics;
pub mod network;
pub mod record;
pub mod resolver;
pub mod server;
pub mod state;
pub mod telemetry;
pub mod zone;

// Re-export main types
pub use codec::{decode_label, domain_for, encode_label};
pub use config::{Config, DnsConfig, LogFormat, TelemetryConfig};
pub use error::{DecodeError, DnsError, ForwardError, QuestionError};
pub use forward::{Forwarder, UdpForwarder};
pub use handler::MeshnameHandler;
pub use loader::{generate_config, load_zone_file, parse_zone_config};
pub use network::NetworkRegistry;
pub use resolver::{RemoteLookupPolicy, Resolver, ResolverOptions};
pub use server::DnsServer;
pub use state::DnsState;
pub use zone::ZoneTable;
