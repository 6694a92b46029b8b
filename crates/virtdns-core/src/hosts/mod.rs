// # Hosts Sink Implementations
//
// This module provides implementations of the HostsSink trait and the
// serialization shared by all of them.
//
// ## Format
//
// dnsmasq `addn-hosts` convention, one resolved record per line:
//
// ```text
// 192.168.122.45 vm1.example.com
// ```

pub mod file;
pub mod memory;

pub use file::FileHostsSink;
pub use memory::MemoryHostsSink;

use crate::reconciler::HostTable;
use std::fmt::Write;

/// Render the resolved records of a table in hosts file format
///
/// Records lacking a name or an address are skipped.
pub fn render_hosts(table: &HostTable) -> String {
    let mut out = String::new();
    for (address, name) in table.resolved() {
        // Writing to a String cannot fail
        let _ = writeln!(out, "{} {}", address, name);
    }
    out
}
