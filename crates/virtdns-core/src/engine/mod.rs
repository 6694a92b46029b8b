//! Sync engine
//!
//! The SyncEngine is responsible for:
//! - Forwarding change batches from every ChangeSource onto one queue
//! - Running one reconcile + write pass at startup
//! - Running one reconcile + write pass per dequeued batch
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐
//! │ ChangeSource │── forward task ──┐
//! └──────────────┘                  │
//! ┌──────────────┐                  ▼
//! │ ChangeSource │── forward task ── queue ──► SyncEngine
//! └──────────────┘                                │
//!                                 ┌───────────────┴───────────────┐
//!                                 ▼                               ▼
//!                          ┌────────────┐                  ┌────────────┐
//!                          │ Reconciler │── &HostTable ──► │ HostsSink  │
//!                          └────────────┘                  └────────────┘
//! ```
//!
//! ## Phases
//!
//! 1. Initializing: one pass before any change is observed
//! 2. Steady: wait for a batch, run a pass to completion, repeat
//!
//! Passes never overlap, so the table and the hosts file have a single
//! writer without locking.

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::reconciler::Reconciler;
use crate::traits::{ChangeBatch, ChangeSource, ChangeStream, HostsSink};
use std::path::PathBuf;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinSet;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

/// Events emitted by the SyncEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Watchers attached, initial pass about to run
    Started {
        sources: usize,
    },

    /// A change batch was dequeued
    ChangeReceived {
        path: PathBuf,
    },

    /// A pass completed and the hosts sink was rewritten
    HostsWritten {
        hosts: usize,
    },

    /// Engine stopped
    Stopped {
        reason: String,
    },
}

/// Core sync engine
///
/// ## Lifecycle
///
/// 1. Create with [`SyncEngine::new()`]
/// 2. Start with [`SyncEngine::run()`]
/// 3. Engine runs until Ctrl-C or a fatal error
///
/// ## Errors
///
/// A failing change source, a change source whose stream ends, an
/// unreadable (not merely missing or malformed) input file and a failed hosts
/// write all stop the engine with an error.
pub struct SyncEngine {
    /// Watched input files
    sources: Vec<Box<dyn ChangeSource>>,

    /// Owner of the current host table
    reconciler: Reconciler,

    /// Destination of every pass
    sink: Box<dyn HostsSink>,

    /// Capacity of the shared change queue
    change_queue_capacity: usize,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl SyncEngine {
    /// Create a new sync engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        sources: Vec<Box<dyn ChangeSource>>,
        reconciler: Reconciler,
        sink: Box<dyn HostsSink>,
        config: &EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;
        if sources.is_empty() {
            return Err(Error::config("No change sources configured"));
        }

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let engine = Self {
            sources,
            reconciler,
            sink,
            change_queue_capacity: config.change_queue_capacity,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Run the engine until Ctrl-C
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error)`: Fatal error
    pub async fn run(&mut self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run the engine until the given signal fires, instead of Ctrl-C
    ///
    /// Intended for tests and for embedding the engine in a larger program
    /// that manages its own shutdown.
    pub async fn run_with_shutdown(
        &mut self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    /// Run a single reconcile + write pass
    ///
    /// # Returns
    ///
    /// The number of host lines written
    pub async fn sync_once(&mut self) -> Result<usize> {
        let table = self.reconciler.reconcile().await?;
        let hosts = self.sink.write(table).await?;
        info!("wrote {} host(s) to {}", hosts, self.sink.describe());

        self.emit_event(EngineEvent::HostsWritten { hosts });
        Ok(hosts)
    }

    /// The reconciler, for inspecting the current table
    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    async fn run_internal(
        &mut self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        let (queue_tx, mut queue_rx) = mpsc::channel(self.change_queue_capacity);

        // Dropping the set aborts the forwarders on every exit path
        let mut forwarders = JoinSet::new();
        for source in &self.sources {
            let path = source.path().to_path_buf();
            debug!("starting watcher for {}", path.display());
            forwarders.spawn(forward_changes(path, source.watch(), queue_tx.clone()));
        }
        drop(queue_tx);

        self.emit_event(EngineEvent::Started {
            sources: self.sources.len(),
        });

        // Initializing
        if let Err(e) = self.sync_once().await {
            return Err(self.fail(e));
        }

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        };
        tokio::pin!(shutdown);

        // Steady
        loop {
            tokio::select! {
                message = queue_rx.recv() => {
                    let batch = match message {
                        Some(Ok(batch)) => batch,
                        Some(Err(e)) => return Err(self.fail(e)),
                        None => {
                            return Err(self.fail(Error::watcher("all change sources stopped")));
                        }
                    };

                    debug!("received event: {:?}", batch);
                    self.emit_event(EngineEvent::ChangeReceived {
                        path: batch.path,
                    });

                    if let Err(e) = self.sync_once().await {
                        return Err(self.fail(e));
                    }
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    self.emit_event(EngineEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    forwarders.abort_all();
                    return Ok(());
                }
            }
        }
    }

    /// Log a fatal error and announce the stop
    fn fail(&self, e: Error) -> Error {
        error!("engine stopping: {}", e);
        self.emit_event(EngineEvent::Stopped {
            reason: e.to_string(),
        });
        e
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}

/// Forward one source's batches onto the shared queue
///
/// A full queue drops the batch: the queue already holds a batch whose pass
/// starts after this change and re-reads both files.
async fn forward_changes(
    path: PathBuf,
    mut stream: ChangeStream,
    tx: mpsc::Sender<Result<ChangeBatch>>,
) {
    while let Some(item) = stream.next().await {
        match item {
            Ok(batch) => match tx.try_send(Ok(batch)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(
                        "change queue full, dropping batch for {} (a pending pass covers it)",
                        path.display()
                    );
                }
                Err(TrySendError::Closed(_)) => return,
            },
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                return;
            }
        }
    }

    let _ = tx
        .send(Err(Error::watcher(format!(
            "watcher for {} stopped",
            path.display()
        ))))
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hosts::MemoryHostsSink;
    use crate::reconciler::DomainFilter;
    use tokio_stream::wrappers::ReceiverStream;

    struct EmptySource(PathBuf);

    impl ChangeSource for EmptySource {
        fn path(&self) -> &std::path::Path {
            &self.0
        }

        fn watch(&self) -> ChangeStream {
            Box::pin(tokio_stream::pending::<Result<ChangeBatch>>())
        }
    }

    #[test]
    fn test_new_requires_sources() {
        let reconciler = Reconciler::new("a.macs", "a.status", DomainFilter::default());
        let result = SyncEngine::new(
            Vec::new(),
            reconciler,
            Box::new(MemoryHostsSink::new()),
            &EngineConfig::default(),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_forward_drops_when_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let (source_tx, source_rx) = mpsc::channel(4);
        for _ in 0..3 {
            source_tx
                .send(Ok(ChangeBatch::new("virbr0.status", Vec::new())))
                .await
                .unwrap();
        }
        drop(source_tx);

        let forwarder = tokio::spawn(forward_changes(
            PathBuf::from("virbr0.status"),
            Box::pin(ReceiverStream::new(source_rx)),
            tx,
        ));

        // One batch fit; the rest were dropped; the closing error waited for room
        assert!(matches!(rx.recv().await, Some(Ok(_))));
        assert!(matches!(rx.recv().await, Some(Err(Error::Watcher(_)))));
        assert!(rx.recv().await.is_none());
        forwarder.await.unwrap();
    }

    #[tokio::test]
    async fn test_sync_once_emits_event() {
        let dir = tempfile::tempdir().unwrap();
        let reconciler = Reconciler::new(
            dir.path().join("virbr0.macs"),
            dir.path().join("virbr0.status"),
            DomainFilter::new(["example.com"]),
        );
        let sink = MemoryHostsSink::new();
        let (mut engine, mut events) = SyncEngine::new(
            vec![Box::new(EmptySource(dir.path().join("virbr0.macs")))],
            reconciler,
            Box::new(sink.clone()),
            &EngineConfig::default(),
        )
        .unwrap();

        assert_eq!(engine.sync_once().await.unwrap(), 0);
        assert_eq!(events.recv().await, Some(EngineEvent::HostsWritten { hosts: 0 }));
        assert_eq!(sink.write_count().await, 1);
    }
}
