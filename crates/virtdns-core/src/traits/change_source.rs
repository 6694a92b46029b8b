// # Change Source Trait
//
// Defines the interface for observing modifications to one input file.
//
// ## Implementations
//
// - Filesystem notifications: `virtdns-source-notify` crate
// - Test doubles: `tests/common/mod.rs`
//
// ## Usage
//
// ```rust,ignore
// use virtdns_core::ChangeSource;
// use tokio_stream::StreamExt;
//
// let source = /* ChangeSource implementation */;
// let mut stream = source.watch();
// while let Some(batch) = stream.next().await {
//     let batch = batch?;
//     println!("{} changed: {:?}", batch.path.display(), batch.kinds);
// }
// ```

use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio_stream::Stream;

/// What happened to the watched file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// The watch was established; the file may have changed before this
    Attached,
    /// File was created or renamed onto the watched path
    Created,
    /// File content or metadata was written
    Modified,
    /// File was removed or renamed away
    Removed,
    /// Any other notification concerning the file
    Other,
}

/// One batch of notifications for a watched file
///
/// The payload is informational only. Consumers re-read the whole file
/// rather than interpreting individual kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeBatch {
    /// The watched path the batch refers to
    pub path: PathBuf,
    /// Notification kinds, in arrival order
    pub kinds: Vec<ChangeKind>,
}

impl ChangeBatch {
    /// Create a new change batch
    pub fn new(path: impl Into<PathBuf>, kinds: Vec<ChangeKind>) -> Self {
        Self {
            path: path.into(),
            kinds,
        }
    }
}

/// Stream returned by [`ChangeSource::watch`]
pub type ChangeStream = Pin<Box<dyn Stream<Item = crate::Result<ChangeBatch>> + Send + 'static>>;

/// Trait for change source implementations
///
/// A change source observes exactly one path and yields a batch whenever the
/// file behind it is created, written or replaced.
///
/// ## Contract
///
/// - The stream is lazy and infinite: it never ends under normal conditions
/// - A path that does not exist yet is not an error; the source waits for it
/// - An `Err` item means the underlying watch mechanism failed and the
///   stream must be considered dead
/// - Sources are not restartable: `watch()` hands out the only stream
/// - Once the OS watch is in place the source yields a batch holding
///   [`ChangeKind::Attached`], so a change made before the watch existed is
///   still followed by a batch
pub trait ChangeSource: Send + Sync {
    /// The file being watched
    fn path(&self) -> &Path;

    /// Watch the file for changes
    fn watch(&self) -> ChangeStream;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_keeps_arrival_order() {
        let batch = ChangeBatch::new(
            "/var/lib/libvirt/dnsmasq/virbr0.status",
            vec![ChangeKind::Created, ChangeKind::Modified],
        );
        assert_eq!(batch.kinds, vec![ChangeKind::Created, ChangeKind::Modified]);
        assert_eq!(batch.path, PathBuf::from("/var/lib/libvirt/dnsmasq/virbr0.status"));
    }
}
