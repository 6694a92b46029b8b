//! Reconciliation of libvirt lease files into a host table
//!
//! Each pass:
//!
//! 1. Reads the domain/MAC source and keeps entries whose domain passes the
//!    [`DomainFilter`], creating one [`HostRecord`] per MAC
//! 2. Reads the address-lease source and fills in the address of every
//!    record whose MAC it mentions
//! 3. Replaces the stored [`HostTable`] with the new one
//!
//! A malformed source counts as empty for that pass. A missing source counts
//! as empty too, since libvirt creates the files lazily.

mod filter;
mod model;

pub use filter::DomainFilter;
pub use model::{HostRecord, HostTable, LeaseEntry, StatusEntry};

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Join lease entries with status entries
///
/// Pure apart from logging: identical inputs always give an identical table.
pub fn build_host_table(
    filter: &DomainFilter,
    leases: &[LeaseEntry],
    statuses: &[StatusEntry],
) -> HostTable {
    let mut table = HostTable::new();

    for entry in leases {
        if !filter.matches(&entry.domain) {
            debug!("ignore hostname {} (unknown domain)", entry.domain);
            continue;
        }

        info!("found hostname {}", entry.domain);
        for mac in &entry.macs {
            debug!("adding host {} at {}", entry.domain, mac);
            table.insert(HostRecord::named(mac.as_str(), entry.domain.as_str()));
        }
    }

    for status in statuses {
        match table.get_mut(&status.mac_address) {
            Some(record) => record.address = Some(status.ip_address.clone()),
            None => debug!("ignore MAC {} (no matching host)", status.mac_address),
        }
    }

    table
}

/// Owner of the current host table
#[derive(Debug)]
pub struct Reconciler {
    macs_path: PathBuf,
    status_path: PathBuf,
    filter: DomainFilter,
    table: HostTable,
}

impl Reconciler {
    /// Create a reconciler for the given source files
    ///
    /// The table starts empty; call [`Reconciler::reconcile`] to populate it.
    pub fn new(
        macs_path: impl Into<PathBuf>,
        status_path: impl Into<PathBuf>,
        filter: DomainFilter,
    ) -> Self {
        Self {
            macs_path: macs_path.into(),
            status_path: status_path.into(),
            filter,
            table: HostTable::new(),
        }
    }

    /// Re-read both sources and rebuild the table
    ///
    /// The new table is built independently and swapped in only once
    /// complete, so readers of [`Reconciler::table`] never see a partial join.
    ///
    /// # Errors
    ///
    /// Only I/O failures other than a missing file. Malformed content is
    /// logged and treated as an empty source.
    pub async fn reconcile(&mut self) -> Result<&HostTable> {
        let leases: Vec<LeaseEntry> = read_source(&self.macs_path, "macs").await?;
        let statuses: Vec<StatusEntry> = read_source(&self.status_path, "status").await?;

        self.table = build_host_table(&self.filter, &leases, &statuses);
        debug!(
            "reconciled {} host(s), {} resolved",
            self.table.len(),
            self.table.resolved().count()
        );

        Ok(&self.table)
    }

    /// The table produced by the most recent pass
    pub fn table(&self) -> &HostTable {
        &self.table
    }

    /// Path of the domain/MAC source
    pub fn macs_path(&self) -> &Path {
        &self.macs_path
    }

    /// Path of the address-lease source
    pub fn status_path(&self) -> &Path {
        &self.status_path
    }
}

/// Read a JSON array source, degrading to empty on missing or malformed input
async fn read_source<T: DeserializeOwned>(path: &Path, label: &str) -> Result<Vec<T>> {
    let content = match tokio::fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("{} file {} does not exist yet", label, path.display());
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(Error::source(format!(
                "Failed to read {} file {}: {}",
                label,
                path.display(),
                e
            )));
        }
    };

    match serde_json::from_slice(&content) {
        Ok(entries) => Ok(entries),
        Err(e) => {
            warn!("failed to read {} file {}: {}", label, path.display(), e);
            Ok(Vec::new())
        }
    }
}
