//! Shared DNS state: the live zone table and network registry.
//!
//! Both tables sit behind one `RwLock` as `Arc` snapshots. Request handling
//! clones the `Arc`s under a brief read lock and works on that snapshot;
//! reconfiguration builds a new table off-lock and publishes it with a
//! pointer swap under the write lock. A reader therefore sees one complete
//! generation or the next, never a mix.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

use crate::metrics;
use crate::network::NetworkRegistry;
use crate::zone::ZoneTable;

/// One consistent view of the tables.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Local records.
    pub zones: Arc<ZoneTable>,
    /// Suffix → subnet bindings.
    pub networks: Arc<NetworkRegistry>,
    /// Incremented on every swap.
    pub generation: u64,
}

/// Thread-safe handle to the live tables.
#[derive(Debug, Clone)]
pub struct DnsState {
    inner: Arc<RwLock<DnsStateInner>>,
}

#[derive(Debug, Default)]
struct DnsStateInner {
    zones: Arc<ZoneTable>,
    networks: Arc<NetworkRegistry>,
    generation: u64,
}

impl Default for DnsState {
    fn default() -> Self {
        Self::new(ZoneTable::new(), NetworkRegistry::new())
    }
}

impl DnsState {
    /// Create state serving the given tables.
    pub fn new(zones: ZoneTable, networks: NetworkRegistry) -> Self {
        Self {
            inner: Arc::new(RwLock::new(DnsStateInner {
                zones: Arc::new(zones),
                networks: Arc::new(networks),
                generation: 0,
            })),
        }
    }

    /// Current tables.
    pub fn snapshot(&self) -> Snapshot {
        let inner = self.inner.read();
        Snapshot {
            zones: Arc::clone(&inner.zones),
            networks: Arc::clone(&inner.networks),
            generation: inner.generation,
        }
    }

    /// Current zone table.
    pub fn zones(&self) -> Arc<ZoneTable> {
        Arc::clone(&self.inner.read().zones)
    }

    /// Current network registry.
    pub fn networks(&self) -> Arc<NetworkRegistry> {
        Arc::clone(&self.inner.read().networks)
    }

    /// Generation counter.
    pub fn generation(&self) -> u64 {
        self.inner.read().generation
    }

    /// Publish a new zone table, dropping the previous one.
    pub fn replace_zones(&self, zones: ZoneTable) {
        let zones = Arc::new(zones);
        let mut inner = self.inner.write();
        inner.zones = zones;
        inner.generation = inner.generation.wrapping_add(1);
        debug!(
            labels = inner.zones.len(),
            generation = inner.generation,
            "replaced zone table"
        );
    }

    /// Publish a new network registry, dropping the previous one.
    pub fn replace_networks(&self, networks: NetworkRegistry) {
        let networks = Arc::new(networks);
        let mut inner = self.inner.write();
        inner.networks = networks;
        inner.generation = inner.generation.wrapping_add(1);
        debug!(
            networks = %inner.networks,
            generation = inner.generation,
            "replaced network registry"
        );
    }

    /// Publish both tables in one swap.
    pub fn replace(&self, zones: ZoneTable, networks: NetworkRegistry) {
        let zones = Arc::new(zones);
        let networks = Arc::new(networks);
        let mut inner = self.inner.write();
        inner.zones = zones;
        inner.networks = networks;
        inner.generation = inner.generation.wrapping_add(1);
        debug!(generation = inner.generation, "replaced zone table and networks");
    }

    /// Emit current state metrics.
    pub fn emit_metrics(&self) {
        let snapshot = self.snapshot();
        metrics::record_state_counts(
            snapshot.zones.len(),
            snapshot.zones.records_count(),
            snapshot.networks.len(),
        );
        metrics::record_generation(snapshot.generation);
    }
}
