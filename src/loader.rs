//! JSON zone config loading and starter config generation.
//!
//! A zone file is a stream of concatenated objects:
//!
//! ```text
//! {"Domain": "aib7cwwdeob2vtnqf2cfnm7ilq",
//!  "Records": ["test.aib7cwwdeob2vtnqf2cfnm7ilq.meshname. AAAA 201:1697:567c:1375:3fd1:3a2b:4b85:cd1e"]}
//! ```

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::net::Ipv6Addr;
use std::path::Path;
use tracing::{debug, info};

use crate::codec::{domain_for, encode_label};
use crate::error::DnsError;
use crate::record::parse_record;
use crate::zone::ZoneTable;

/// One object of the zone config stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneEntry {
    /// Label the records are served under.
    #[serde(rename = "Domain")]
    pub domain: String,

    /// Record texts in `owner [TTL] [class] type rdata` form.
    #[serde(rename = "Records", default)]
    pub records: Vec<String>,
}

/// Read and parse the zone file at `path`.
pub fn load_zone_file(path: impl AsRef<Path>) -> Result<ZoneTable, DnsError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let zones = parse_zone_config(BufReader::new(file))?;

    info!(
        path = %path.display(),
        labels = zones.len(),
        records = zones.records_count(),
        "zone config loaded"
    );
    Ok(zones)
}

/// Parse a stream of zone objects into a fresh table.
///
/// The first malformed object or record aborts the whole parse; a partial
/// table is never returned.
pub fn parse_zone_config<R: Read>(reader: R) -> Result<ZoneTable, DnsError> {
    let mut zones = ZoneTable::new();
    let stream = serde_json::Deserializer::from_reader(reader).into_iter::<ZoneEntry>();

    for entry in stream {
        let entry = entry.map_err(|e| DnsError::ConfigSyntax(e.to_string()))?;
        if entry.domain.is_empty() {
            return Err(DnsError::ConfigSyntax("empty Domain".to_string()));
        }

        zones.declare(&entry.domain);
        for text in &entry.records {
            let record = parse_record(text).map_err(|e| {
                DnsError::ConfigSyntax(format!("domain {:?}: {}", entry.domain, e))
            })?;
            zones.insert(&entry.domain, record);
        }

        debug!(
            domain = %entry.domain,
            records = entry.records.len(),
            "zone entry parsed"
        );
    }

    Ok(zones)
}

/// Starter config for `addr`: its label with one AAAA record pointing back
/// at the address.
pub fn generate_config(addr: &Ipv6Addr, zone: &str) -> Result<String, DnsError> {
    let entry = ZoneEntry {
        domain: encode_label(addr),
        records: vec![format!("{} AAAA {}", domain_for(addr, zone), addr)],
    };
    serde_json::to_string_pretty(&entry).map_err(|e| DnsError::Config(e.to_string()))
}
