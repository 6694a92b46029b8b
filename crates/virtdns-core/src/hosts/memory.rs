// # Memory Hosts Sink
//
// In-memory implementation of HostsSink, for tests and embedding.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::render_hosts;
use crate::Error;
use crate::reconciler::HostTable;
use crate::traits::HostsSink;

/// Hosts sink that keeps the last rendered content in memory
///
/// Clones share the same buffer, so a test can hand one clone to the engine
/// and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct MemoryHostsSink {
    inner: Arc<RwLock<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    content: String,
    writes: usize,
}

impl MemoryHostsSink {
    /// Create a new, empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Content produced by the last write
    pub async fn content(&self) -> String {
        self.inner.read().await.content.clone()
    }

    /// Number of writes performed so far
    pub async fn write_count(&self) -> usize {
        self.inner.read().await.writes
    }
}

#[async_trait]
impl HostsSink for MemoryHostsSink {
    async fn write(&self, table: &HostTable) -> Result<usize, Error> {
        let content = render_hosts(table);
        let mut guard = self.inner.write().await;
        guard.content = content;
        guard.writes += 1;
        Ok(table.resolved().count())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
