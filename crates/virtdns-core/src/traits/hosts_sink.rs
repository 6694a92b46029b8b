// # Hosts Sink Trait
//
// Defines the interface for persisting the reconciled host table.
//
// ## Implementations
//
// - File-based: [`crate::hosts::FileHostsSink`]
// - In-memory: [`crate::hosts::MemoryHostsSink`]

use async_trait::async_trait;

use crate::reconciler::HostTable;

/// Trait for hosts sink implementations
///
/// A sink receives the complete table after every reconciliation pass and
/// replaces whatever it held before. Only resolved records (both name and
/// address known) are emitted.
#[async_trait]
pub trait HostsSink: Send + Sync {
    /// Replace the sink's content with the given table
    ///
    /// # Returns
    ///
    /// The number of host lines written
    async fn write(&self, table: &HostTable) -> Result<usize, crate::Error>;

    /// Human-readable description of the destination, for logging
    fn describe(&self) -> String;
}
