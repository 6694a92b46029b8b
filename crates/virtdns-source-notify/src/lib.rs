// # Notify Change Source
//
// This crate provides a ChangeSource backed by the `notify` crate: inotify on
// Linux, kqueue/FSEvents elsewhere, with notify's own polling fallback.
//
// ## Watching a File That May Not Exist
//
// The source watches the file's parent directory, not the file itself, and
// keeps only notifications naming the file. This covers:
//
// - files created after the daemon starts (libvirt creates them lazily)
// - files replaced by rename, which would orphan a watch on the old inode
//
// When the parent directory is missing too, the source re-checks for it on a
// fixed interval and attaches once it exists.
//
// ## Batching
//
// Notifications that are already queued when one arrives are folded into the
// same ChangeBatch.

use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::{EventKind, RecursiveMode, Watcher};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info};

use virtdns_core::traits::{ChangeBatch, ChangeKind, ChangeSource, ChangeStream};
use virtdns_core::{Error, Result};

/// How often a missing parent directory is looked for
pub const DEFAULT_DIRECTORY_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// File change source using native filesystem notifications
pub struct NotifyChangeSource {
    path: PathBuf,
    directory_poll_interval: Duration,
    started: AtomicBool,
}

impl NotifyChangeSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            directory_poll_interval: DEFAULT_DIRECTORY_POLL_INTERVAL,
            started: AtomicBool::new(false),
        }
    }

    /// Set how often a missing parent directory is looked for
    pub fn with_directory_poll_interval(mut self, interval: Duration) -> Self {
        self.directory_poll_interval = interval;
        self
    }
}

impl ChangeSource for NotifyChangeSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn watch(&self) -> ChangeStream {
        if self.started.swap(true, Ordering::SeqCst) {
            return Box::pin(tokio_stream::once(Err(Error::watcher(format!(
                "{} is already being watched",
                self.path.display()
            )))));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let path = self.path.clone();
        let interval = self.directory_poll_interval;

        tokio::spawn(async move {
            if let Err(e) = watch_file(&path, interval, &tx).await {
                let _ = tx.send(Err(e));
            }
        });

        Box::pin(UnboundedReceiverStream::new(rx))
    }
}

/// Directory holding `path`, `.` for a bare file name
fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Map a notification kind onto what it means for the watched file
///
/// Read accesses are dropped: the reconciler reads the file after every
/// change and must not trigger itself.
fn classify(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(ChangeKind::Removed),
        EventKind::Modify(ModifyKind::Name(_)) => Some(ChangeKind::Created),
        EventKind::Modify(_) => Some(ChangeKind::Modified),
        EventKind::Remove(_) => Some(ChangeKind::Removed),
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => Some(ChangeKind::Modified),
        EventKind::Access(_) => None,
        EventKind::Any | EventKind::Other => Some(ChangeKind::Other),
    }
}

/// What a raw notification means for `file_name`, if anything
fn relevant(event: &notify::Event, file_name: &OsStr) -> Option<ChangeKind> {
    if event
        .paths
        .iter()
        .any(|p| p.file_name() == Some(file_name))
    {
        classify(&event.kind)
    } else {
        None
    }
}

async fn watch_file(
    path: &Path,
    directory_poll_interval: Duration,
    tx: &mpsc::UnboundedSender<Result<ChangeBatch>>,
) -> Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::watcher(format!("{} does not name a file", path.display())))?
        .to_os_string();
    let directory = parent_dir(path);

    while !directory.is_dir() {
        if tx.is_closed() {
            return Ok(());
        }
        debug!("waiting for directory {} to appear", directory.display());
        tokio::time::sleep(directory_poll_interval).await;
    }

    let (raw_tx, mut raw_rx) = mpsc::unbounded_channel();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        let _ = raw_tx.send(res);
    })
    .map_err(|e| Error::watcher(format!("Failed to create watcher: {}", e)))?;

    watcher
        .watch(&directory, RecursiveMode::NonRecursive)
        .map_err(|e| Error::watcher(format!("Failed to watch {}: {}", directory.display(), e)))?;
    info!("watching {}", path.display());

    if tx
        .send(Ok(ChangeBatch::new(path, vec![ChangeKind::Attached])))
        .is_err()
    {
        return Ok(());
    }

    loop {
        let first = tokio::select! {
            res = raw_rx.recv() => res,
            _ = tx.closed() => {
                debug!("stream for {} dropped, stopping watcher", path.display());
                return Ok(());
            }
        };
        let Some(first) = first else {
            break;
        };

        let kinds = collect_batch(first, &mut raw_rx, &file_name).map_err(|e| {
            Error::watcher(format!("Watch on {} failed: {}", directory.display(), e))
        })?;
        if kinds.is_empty() {
            continue;
        }

        if tx.send(Ok(ChangeBatch::new(path, kinds))).is_err() {
            debug!("stream for {} dropped, stopping watcher", path.display());
            return Ok(());
        }
    }

    Err(Error::watcher(format!(
        "Notification channel for {} closed",
        directory.display()
    )))
}

/// Fold `first` and every notification queued behind it into the kinds
/// relevant to `file_name`
fn collect_batch(
    first: notify::Result<notify::Event>,
    raw_rx: &mut mpsc::UnboundedReceiver<notify::Result<notify::Event>>,
    file_name: &OsStr,
) -> notify::Result<Vec<ChangeKind>> {
    let mut kinds = Vec::new();
    let mut next = Some(first);

    while let Some(res) = next {
        if let Some(kind) = relevant(&res?, file_name) {
            kinds.push(kind);
        }
        next = raw_rx.try_recv().ok();
    }

    Ok(kinds)
}
