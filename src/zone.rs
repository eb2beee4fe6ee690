//! Locally authoritative records, keyed by label.

use hickory_proto::rr::{DNSClass, Name, Record, RecordType};
use std::collections::HashMap;

/// Mapping from label to the records served for names under it.
///
/// A table is built once and then published whole through
/// [`DnsState::replace_zones`](crate::state::DnsState::replace_zones); it is
/// never edited while readers can see it.
#[derive(Debug, Clone, Default)]
pub struct ZoneTable {
    /// label -> records, in config order
    entries: HashMap<String, Vec<Record>>,
}

impl ZoneTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record under `label`.
    pub fn insert(&mut self, label: &str, record: Record) {
        self.entries
            .entry(label.to_ascii_lowercase())
            .or_default()
            .push(record);
    }

    /// Make `label` known without any records.
    ///
    /// A known label is answered locally even when nothing matches, so it is
    /// never forwarded.
    pub fn declare(&mut self, label: &str) {
        self.entries.entry(label.to_ascii_lowercase()).or_default();
    }

    /// Whether `label` is served locally.
    pub fn contains(&self, label: &str) -> bool {
        self.entries.contains_key(&label.to_ascii_lowercase())
    }

    /// Records under `label` whose owner, type and class match the question
    /// exactly. Empty when the label is unknown or nothing matches.
    pub fn lookup(
        &self,
        label: &str,
        name: &Name,
        rtype: RecordType,
        class: DNSClass,
    ) -> Vec<Record> {
        let Some(records) = self.entries.get(&label.to_ascii_lowercase()) else {
            return Vec::new();
        };

        records
            .iter()
            .filter(|r| r.record_type() == rtype && r.dns_class() == class && r.name() == name)
            .cloned()
            .collect()
    }

    /// Records stored under `label`.
    pub fn records(&self, label: &str) -> &[Record] {
        self.entries
            .get(&label.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Known labels.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no label is served.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of records over all labels.
    pub fn records_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}
