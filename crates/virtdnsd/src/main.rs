// # virtdnsd - virtdns daemon
//
// Thin integration layer: parses the command line, sets up logging and the
// runtime, wires two notify change sources, a reconciler and a hosts file
// sink into a SyncEngine, and runs it until SIGINT/SIGTERM.
//
// ## Usage
//
// ```bash
// virtdnsd -d example.com -d lab.local -h /etc/dnsmasq.d/virt.hosts -v
// ```
//
// reads `/var/lib/libvirt/dnsmasq/virbr0.macs` and `virbr0.status` and
// writes one `<ip> <domain>` line per running guest under either suffix.
// Point dnsmasq at the output with `addn-hosts=`.

use anyhow::Result;
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{Level, debug, error, info, trace, warn};
use tracing_subscriber::FmtSubscriber;

use virtdns_core::config::{DEFAULT_BRIDGE, DEFAULT_HOSTS_FILE};
use virtdns_core::traits::ChangeSource;
use virtdns_core::{FileHostsSink, HostsConfig, Reconciler, SyncEngine, VirtDnsConfig};
use virtdns_source_notify::NotifyChangeSource;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum VirtDnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (watcher failure, unwritable hosts file)
    RuntimeError = 2,
}

impl From<VirtDnsExitCode> for ExitCode {
    fn from(code: VirtDnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Keep a dnsmasq hosts file in sync with libvirt's lease files
#[derive(Parser, Debug)]
#[command(name = "virtdnsd", version, disable_help_flag = true)]
struct Cli {
    /// Publish hosts under this domain suffix (repeatable)
    #[arg(short = 'd', long = "domain", value_name = "SUFFIX")]
    domains: Vec<String>,

    /// Hosts file to write
    #[arg(short = 'h', long, value_name = "PATH", default_value = DEFAULT_HOSTS_FILE)]
    hosts_file: PathBuf,

    /// libvirt bridge whose lease files are read
    #[arg(short = 'b', long, value_name = "NAME", default_value = DEFAULT_BRIDGE)]
    bridge: String,

    /// Domain/MAC file [default: /var/lib/libvirt/dnsmasq/<bridge>.macs]
    #[arg(short = 'M', long, value_name = "PATH")]
    mac_file: Option<PathBuf>,

    /// Lease status file [default: /var/lib/libvirt/dnsmasq/<bridge>.status]
    #[arg(short = 'S', long, value_name = "PATH")]
    status_file: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,

    /// Write the hosts file via a temporary file and rename
    #[arg(long)]
    atomic: bool,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,
}

impl Cli {
    /// Build the daemon configuration
    fn into_config(self) -> VirtDnsConfig {
        let mut config = VirtDnsConfig::for_bridge(&self.bridge);
        config.sources = config
            .sources
            .with_macs_file(self.mac_file)
            .with_status_file(self.status_file);
        config.hosts = HostsConfig {
            path: self.hosts_file,
            atomic: self.atomic,
        };
        config.domains = self.domains;
        config
    }

    /// Validate what the configuration cannot see
    fn validate(&self) -> Result<()> {
        if self.bridge.is_empty() && (self.mac_file.is_none() || self.status_file.is_none()) {
            anyhow::bail!("--bridge cannot be empty unless both --mac-file and --status-file are given");
        }
        Ok(())
    }

    /// Map `-v` count to a log level, saturating at DEBUG
    fn log_level(&self) -> Level {
        match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            _ => Level::DEBUG,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = cli.validate() {
        eprintln!("Configuration error: {}", e);
        return VirtDnsExitCode::ConfigError.into();
    }

    let log_level = cli.log_level();
    let config = cli.into_config();

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return VirtDnsExitCode::ConfigError.into();
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return VirtDnsExitCode::ConfigError.into();
    }

    info!("Starting virtdnsd");
    if config.domains.is_empty() {
        warn!(
            "no --domain given; every host is filtered out and {} will stay empty",
            config.hosts.path.display()
        );
    }

    // Passes are strictly sequential; one thread is enough
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return VirtDnsExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {}", e);
            VirtDnsExitCode::RuntimeError
        } else {
            VirtDnsExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: VirtDnsConfig) -> Result<()> {
    info!("MAC file: {}", config.sources.macs_file.display());
    info!("Status file: {}", config.sources.status_file.display());
    info!("Hosts file: {}", config.hosts.path.display());
    for domain in &config.domains {
        info!("Publishing domain: {}", domain);
    }

    let sources: Vec<Box<dyn ChangeSource>> = vec![
        Box::new(NotifyChangeSource::new(&config.sources.macs_file)),
        Box::new(NotifyChangeSource::new(&config.sources.status_file)),
    ];
    let reconciler = Reconciler::new(
        &config.sources.macs_file,
        &config.sources.status_file,
        config.domain_filter(),
    );
    let sink = FileHostsSink::new(&config.hosts.path).with_atomic(config.hosts.atomic);

    let (mut engine, mut events) =
        SyncEngine::new(sources, reconciler, Box::new(sink), &config.engine)?;

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            trace!("engine event: {:?}", event);
        }
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => info!("Received shutdown signal: {}", signal),
            Err(e) => error!("Signal handling failed, shutting down: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    engine.run_with_shutdown(Some(shutdown_rx)).await?;
    debug!("engine stopped");

    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let name = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(name)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
