// # virtdns-core
//
// Core library for keeping a dnsmasq additional-hosts file in sync with the
// lease files libvirt maintains for a virtual bridge.
//
// ## Architecture Overview
//
// - **ChangeSource**: Trait for watching one input file for modifications
// - **Reconciler**: Joins the domain/MAC source with the address-lease source
// - **HostsSink**: Trait for serializing the reconciled host table
// - **SyncEngine**: Event loop that runs a reconcile + write pass per change
//
// ## Data Flow
//
// ```text
// ChangeSource (.macs) ──┐
//                        ├── queue ── SyncEngine ── Reconciler ── HostsSink
// ChangeSource (.status)─┘
// ```

pub mod traits;
pub mod engine;
pub mod reconciler;
pub mod hosts;
pub mod config;
pub mod error;

// Re-export core types for convenience
pub use traits::{ChangeSource, HostsSink};
pub use engine::{SyncEngine, EngineEvent};
pub use reconciler::{DomainFilter, HostRecord, HostTable, Reconciler};
pub use config::{VirtDnsConfig, SourceConfig, HostsConfig, EngineConfig};
pub use error::{Error, Result};
pub use hosts::{FileHostsSink, MemoryHostsSink};
