//! Zone suffix → trusted subnet bindings.
//!
//! Forwarding goes to whatever address a name encodes, so each suffix is
//! pinned to the address space of the network it belongs to. A decoded
//! address outside that subnet is never contacted.

use ipnet::Ipv6Net;
use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;

use crate::error::DnsError;

/// Default bindings: Yggdrasil, cjdns and the catch-all `meshname` zone.
pub const DEFAULT_NETWORKS: &str = "ygg=200::/7,cjd=fc00::/8,meshname=::/0";

/// Mapping from zone suffix to the subnet its addresses must lie in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkRegistry {
    bindings: BTreeMap<String, Ipv6Net>,
}

fn normalize_suffix(suffix: &str) -> String {
    suffix.trim_matches('.').to_ascii_lowercase()
}

impl NetworkRegistry {
    /// Create an empty registry. It validates nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `suffix` to `subnet`, replacing any previous binding.
    pub fn bind(&mut self, suffix: &str, subnet: Ipv6Net) {
        self.bindings.insert(normalize_suffix(suffix), subnet.trunc());
    }

    /// True iff `suffix` is bound and `addr` lies inside its subnet.
    pub fn validate(&self, suffix: &str, addr: &Ipv6Addr) -> bool {
        self.subnet(suffix)
            .is_some_and(|subnet| subnet.contains(addr))
    }

    /// Subnet bound to `suffix`, if any.
    pub fn subnet(&self, suffix: &str) -> Option<&Ipv6Net> {
        self.bindings.get(&normalize_suffix(suffix))
    }

    /// Whether `suffix` is served at all.
    pub fn contains_suffix(&self, suffix: &str) -> bool {
        self.bindings.contains_key(&normalize_suffix(suffix))
    }

    /// Bound suffixes in sorted order.
    pub fn suffixes(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// True if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Parses `suffix=CIDR` pairs separated by commas, e.g.
/// `ygg=200::/7,cjd=fc00::/8`.
impl FromStr for NetworkRegistry {
    type Err = DnsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut registry = NetworkRegistry::new();

        for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (suffix, cidr) = pair
                .split_once('=')
                .ok_or_else(|| DnsError::InvalidNetwork(format!("missing '=' in {pair:?}")))?;

            let suffix = suffix.trim();
            if normalize_suffix(suffix).is_empty() {
                return Err(DnsError::InvalidNetwork(format!("empty suffix in {pair:?}")));
            }

            let subnet: Ipv6Net = cidr
                .trim()
                .parse()
                .map_err(|e| DnsError::InvalidNetwork(format!("{cidr:?}: {e}")))?;

            registry.bind(suffix, subnet);
        }

        Ok(registry)
    }
}

impl fmt::Display for NetworkRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (suffix, subnet) in &self.bindings {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{suffix}={subnet}")?;
            first = false;
        }
        Ok(())
    }
}
