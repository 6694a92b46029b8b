//! Core traits for virtdns
//!
//! This module defines the abstract interfaces at the edges of the pipeline.
//!
//! - [`ChangeSource`]: Watch one input file for modifications
//! - [`HostsSink`]: Persist the reconciled host table

pub mod change_source;
pub mod hosts_sink;

pub use change_source::{ChangeBatch, ChangeKind, ChangeSource, ChangeStream};
pub use hosts_sink::HostsSink;
