//! Test doubles and common utilities for contract tests
//!
//! This module provides controllable change sources and a scratch lease
//! directory so tests can drive the engine without real file notifications.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tracing_subscriber::fmt::MakeWriter;
use virtdns_core::error::Result;
use virtdns_core::traits::{ChangeBatch, ChangeKind, ChangeSource, ChangeStream};
use virtdns_core::{DomainFilter, EngineEvent, Reconciler};

pub const VM1_MAC: &str = "52:54:00:11:11:11";
pub const VM2_MAC: &str = "52:54:00:22:22:22";

/// A change source that emits batches on demand
pub struct ControlledChangeSource {
    path: PathBuf,
    engine_rx: std::sync::Mutex<Option<mpsc::UnboundedReceiver<Result<ChangeBatch>>>>,
    watch_call_count: Arc<AtomicUsize>,
}

impl ControlledChangeSource {
    /// Create a new controlled source and the sender that feeds it
    pub fn new(path: impl Into<PathBuf>) -> (Self, mpsc::UnboundedSender<Result<ChangeBatch>>) {
        let (test_tx, engine_rx) = mpsc::unbounded_channel();

        let source = Self {
            path: path.into(),
            engine_rx: std::sync::Mutex::new(Some(engine_rx)),
            watch_call_count: Arc::new(AtomicUsize::new(0)),
        };

        (source, test_tx)
    }

    /// Get the number of times watch() was called
    pub fn watch_call_count(&self) -> usize {
        self.watch_call_count.load(Ordering::SeqCst)
    }
}

impl ChangeSource for ControlledChangeSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn watch(&self) -> ChangeStream {
        self.watch_call_count.fetch_add(1, Ordering::SeqCst);

        let rx = self
            .engine_rx
            .lock()
            .unwrap()
            .take()
            .expect("watch() can only be called once");

        Box::pin(tokio_stream::wrappers::UnboundedReceiverStream::new(rx))
    }
}

/// A change source that never emits anything
pub struct IdleChangeSource {
    path: PathBuf,
}

impl IdleChangeSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ChangeSource for IdleChangeSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn watch(&self) -> ChangeStream {
        Box::pin(tokio_stream::pending::<Result<ChangeBatch>>())
    }
}

/// A modification batch for `path`
pub fn modified(path: &Path) -> Result<ChangeBatch> {
    Ok(ChangeBatch::new(path, vec![ChangeKind::Modified]))
}

/// Scratch directory laid out like `/var/lib/libvirt/dnsmasq`
pub struct LeaseDir {
    dir: TempDir,
}

impl LeaseDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn macs_path(&self) -> PathBuf {
        self.dir.path().join("virbr0.macs")
    }

    pub fn status_path(&self) -> PathBuf {
        self.dir.path().join("virbr0.status")
    }

    pub fn hosts_path(&self) -> PathBuf {
        self.dir.path().join("dnsmasq.hosts")
    }

    pub fn write_macs(&self, content: &str) {
        std::fs::write(self.macs_path(), content).expect("write macs file");
    }

    pub fn write_status(&self, content: &str) {
        std::fs::write(self.status_path(), content).expect("write status file");
    }

    pub fn read_hosts(&self) -> String {
        std::fs::read_to_string(self.hosts_path()).expect("read hosts file")
    }

    pub fn reconciler(&self, domains: &[&str]) -> Reconciler {
        Reconciler::new(
            self.macs_path(),
            self.status_path(),
            DomainFilter::new(domains.iter().copied()),
        )
    }
}

/// `macs` file content for (domain, macs) pairs
pub fn macs_json(entries: &[(&str, &[&str])]) -> String {
    let entries: Vec<_> = entries
        .iter()
        .map(|(domain, macs)| serde_json::json!({ "domain": domain, "macs": macs }))
        .collect();
    serde_json::Value::Array(entries).to_string()
}

/// `status` file content for (mac, ip) pairs
pub fn status_json(entries: &[(&str, &str)]) -> String {
    let entries: Vec<_> = entries
        .iter()
        .map(|(mac, ip)| {
            serde_json::json!({
                "ip-address": ip,
                "mac-address": mac,
                "hostname": "ignored",
                "expiry-time": 1700000000
            })
        })
        .collect();
    serde_json::Value::Array(entries).to_string()
}

/// Wait until `count` passes have been reported
pub async fn wait_for_passes(events: &mut mpsc::Receiver<EngineEvent>, count: usize) {
    let mut seen = 0;
    while seen < count {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("engine event within timeout")
            .expect("event channel open");
        if matches!(event, EngineEvent::HostsWritten { .. }) {
            seen += 1;
        }
    }
}

/// Log sink for asserting on emitted messages
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
