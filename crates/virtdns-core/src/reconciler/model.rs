//! Lease file records and the reconciled host table

use serde::Deserialize;
use std::collections::BTreeMap;

/// One virtual machine from the domain/MAC source (`<bridge>.macs`)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LeaseEntry {
    /// Registered hostname of the domain
    pub domain: String,
    /// Hardware addresses of the domain's interfaces
    pub macs: Vec<String>,
}

/// One address lease from the address-lease source (`<bridge>.status`)
///
/// dnsmasq also records `expiry-time`, `hostname` and `client-id`; those keys
/// are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusEntry {
    #[serde(rename = "mac-address")]
    pub mac_address: String,
    #[serde(rename = "ip-address")]
    pub ip_address: String,
}

/// Join result for a single hardware address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRecord {
    /// Hardware address (table key)
    pub mac_address: String,
    /// Domain name, from the domain/MAC source
    pub name: Option<String>,
    /// IP address, from the address-lease source
    pub address: Option<String>,
}

impl HostRecord {
    /// Create a record known only by name
    pub fn named(mac_address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            mac_address: mac_address.into(),
            name: Some(name.into()),
            address: None,
        }
    }

    /// `(address, name)` once both halves of the join are present
    pub fn resolved(&self) -> Option<(&str, &str)> {
        match (&self.address, &self.name) {
            (Some(address), Some(name)) => Some((address.as_str(), name.as_str())),
            _ => None,
        }
    }
}

/// Hardware address → record map produced by one reconciliation pass
///
/// Ordered by MAC so that rendering the same inputs always yields the same
/// bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostTable {
    records: BTreeMap<String, HostRecord>,
}

impl HostTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the record for its MAC
    pub fn insert(&mut self, record: HostRecord) {
        self.records.insert(record.mac_address.clone(), record);
    }

    pub fn get(&self, mac_address: &str) -> Option<&HostRecord> {
        self.records.get(mac_address)
    }

    pub fn get_mut(&mut self, mac_address: &str) -> Option<&mut HostRecord> {
        self.records.get_mut(mac_address)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records, resolved or not
    pub fn records(&self) -> impl Iterator<Item = &HostRecord> {
        self.records.values()
    }

    /// `(address, name)` pairs of the records eligible for output
    pub fn resolved(&self) -> impl Iterator<Item = (&str, &str)> {
        self.records.values().filter_map(HostRecord::resolved)
    }
}
