//! Configuration types for virtdns
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::reconciler::DomainFilter;

/// Directory where libvirt keeps per-bridge dnsmasq state
pub const LIBVIRT_DNSMASQ_DIR: &str = "/var/lib/libvirt/dnsmasq";

/// Bridge used when none is given
pub const DEFAULT_BRIDGE: &str = "virbr0";

/// Hosts file written when none is given
pub const DEFAULT_HOSTS_FILE: &str = "dnsmasq.hosts";

/// Main virtdns configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtDnsConfig {
    /// Input lease files
    pub sources: SourceConfig,

    /// Output hosts file
    #[serde(default)]
    pub hosts: HostsConfig,

    /// Domain suffixes to publish; empty publishes nothing
    #[serde(default)]
    pub domains: Vec<String>,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl VirtDnsConfig {
    /// Create a configuration with default paths for the given bridge
    pub fn for_bridge(bridge: &str) -> Self {
        Self {
            sources: SourceConfig::for_bridge(bridge),
            hosts: HostsConfig::default(),
            domains: Vec::new(),
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.sources.validate()?;
        self.hosts.validate()?;
        self.engine.validate()?;

        let hosts = &self.hosts.path;
        if *hosts == self.sources.macs_file || *hosts == self.sources.status_file {
            return Err(crate::Error::config(format!(
                "Hosts file {} must not be one of the lease files",
                hosts.display()
            )));
        }

        for domain in &self.domains {
            if domain.is_empty() {
                return Err(crate::Error::config("Domain suffix cannot be empty"));
            }
            if domain.starts_with('.') {
                return Err(crate::Error::config(format!(
                    "Domain suffix '{}' must not start with a dot",
                    domain
                )));
            }
        }

        Ok(())
    }

    /// Build the domain filter from the configured suffixes
    pub fn domain_filter(&self) -> DomainFilter {
        DomainFilter::new(self.domains.iter().cloned())
    }
}

impl Default for VirtDnsConfig {
    fn default() -> Self {
        Self::for_bridge(DEFAULT_BRIDGE)
    }
}

/// Input lease file configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Domain/MAC source (`<bridge>.macs`)
    pub macs_file: PathBuf,

    /// Address-lease source (`<bridge>.status`)
    pub status_file: PathBuf,
}

impl SourceConfig {
    /// Derive libvirt's default file locations for a bridge
    pub fn for_bridge(bridge: &str) -> Self {
        let dir = Path::new(LIBVIRT_DNSMASQ_DIR);
        Self {
            macs_file: dir.join(format!("{}.macs", bridge)),
            status_file: dir.join(format!("{}.status", bridge)),
        }
    }

    /// Override the domain/MAC source, if given
    pub fn with_macs_file(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.macs_file = path;
        }
        self
    }

    /// Override the address-lease source, if given
    pub fn with_status_file(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.status_file = path;
        }
        self
    }

    /// Validate the source configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.macs_file.as_os_str().is_empty() {
            return Err(crate::Error::config("MAC file path cannot be empty"));
        }
        if self.status_file.as_os_str().is_empty() {
            return Err(crate::Error::config("Status file path cannot be empty"));
        }
        if self.macs_file == self.status_file {
            return Err(crate::Error::config(format!(
                "MAC file and status file must differ (both are {})",
                self.macs_file.display()
            )));
        }
        Ok(())
    }
}

/// Output hosts file configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostsConfig {
    /// Path of the hosts file
    #[serde(default = "default_hosts_path")]
    pub path: PathBuf,

    /// Write through a temporary file and rename
    #[serde(default)]
    pub atomic: bool,
}

impl HostsConfig {
    /// Validate the hosts configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.path.as_os_str().is_empty() {
            return Err(crate::Error::config("Hosts file path cannot be empty"));
        }
        Ok(())
    }
}

impl Default for HostsConfig {
    fn default() -> Self {
        Self {
            path: default_hosts_path(),
            atomic: false,
        }
    }
}

fn default_hosts_path() -> PathBuf {
    PathBuf::from(DEFAULT_HOSTS_FILE)
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capacity of the change queue between watchers and the event loop
    ///
    /// When full, new change batches are dropped (with a warning log). A full
    /// queue already holds a batch whose pass will re-read both sources.
    ///
    /// Default: 1024 batches
    #[serde(default = "default_change_queue_capacity")]
    pub change_queue_capacity: usize,

    /// Capacity of the engine event channel used for monitoring
    ///
    /// Default: 256 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.change_queue_capacity == 0 {
            return Err(crate::Error::config("Change queue capacity must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            change_queue_capacity: default_change_queue_capacity(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_change_queue_capacity() -> usize {
    1024
}

fn default_event_channel_capacity() -> usize {
    256
}
