// # File Hosts Sink
//
// File-based implementation of HostsSink.
//
// ## Write Modes
//
// - In place (default): the hosts file is truncated and rewritten
// - Atomic: content goes to `<path>.tmp` first and is renamed onto the
//   hosts file, so a resolver re-reading it never sees a partial file
//
// Only the daemon's single event loop writes through a sink; there is no
// locking against other writers.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::render_hosts;
use crate::Error;
use crate::reconciler::HostTable;
use crate::traits::HostsSink;

/// Hosts sink writing the dnsmasq additional-hosts file
///
/// # Example
///
/// ```rust,no_run
/// use virtdns_core::hosts::FileHostsSink;
/// use virtdns_core::reconciler::HostTable;
/// use virtdns_core::traits::HostsSink;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let sink = FileHostsSink::new("dnsmasq.hosts").with_atomic(true);
///     let lines = sink.write(&HostTable::new()).await?;
///     assert_eq!(lines, 0);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileHostsSink {
    path: PathBuf,
    atomic: bool,
}

impl FileHostsSink {
    /// Create a sink writing in place to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            atomic: false,
        }
    }

    /// Enable or disable write-then-rename
    pub fn with_atomic(mut self, atomic: bool) -> Self {
        self.atomic = atomic;
        self
    }

    /// The hosts file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `content` to `path`, truncating it first
    async fn write_file(path: &Path, content: &[u8]) -> Result<(), Error> {
        let mut file = fs::File::create(path).await.map_err(|e| {
            Error::hosts_file(format!("Failed to create {}: {}", path.display(), e))
        })?;

        file.write_all(content).await.map_err(|e| {
            Error::hosts_file(format!("Failed to write to {}: {}", path.display(), e))
        })?;

        file.flush().await.map_err(|e| {
            Error::hosts_file(format!("Failed to flush {}: {}", path.display(), e))
        })?;

        Ok(())
    }

    /// Get path to temporary file for atomic writes
    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl HostsSink for FileHostsSink {
    async fn write(&self, table: &HostTable) -> Result<usize, Error> {
        let content = render_hosts(table);

        if self.atomic {
            let temp_path = self.temp_path();
            Self::write_file(&temp_path, content.as_bytes()).await?;

            fs::rename(&temp_path, &self.path).await.map_err(|e| {
                Error::hosts_file(format!(
                    "Failed to rename {} to {}: {}",
                    temp_path.display(),
                    self.path.display(),
                    e
                ))
            })?;
        } else {
            Self::write_file(&self.path, content.as_bytes()).await?;
        }

        let lines = table.resolved().count();
        tracing::trace!("wrote {} host(s) to {}", lines, self.path.display());
        Ok(lines)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
