//! NetStation demo entry point.
//!
//! Loads the configuration, connects to the acquisition host, and runs one
//! marker session: 26 event markers labelled `A`..`Z`, each preceded by an
//! attention command and a time-synch point.
//!
//! # Usage
//!
//! ```text
//! netstation-demo [OPTIONS] [CONFIG]
//!
//! Arguments:
//!   [CONFIG]    TOML config file [env: NETSTATION_CONFIG] [default: netstation.toml]
//!
//! Options:
//!   --simulate  Run against an in-process simulated device
//! ```
//!
//! A missing config file means "use the defaults".  `--simulate` starts a
//! `DeviceSimulator` on a loopback port and points the client at it instead
//! of the configured device.
//!
//! # Threads (for beginners)
//!
//! `EgiConnection` uses ordinary blocking sockets, while the simulator is a
//! Tokio task.  The session therefore runs inside `spawn_blocking`, which
//! moves it to a thread where blocking is allowed and keeps the runtime's
//! worker threads free to serve the simulator.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use netstation_client::application::marker_session::{MarkerPlan, MarkerSessionUseCase};
use netstation_client::infrastructure::{
    config::load_config,
    connection::{EgiConnection, TransportOptions},
    simulator::{DeviceBehavior, DeviceSimulator},
};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Runs one NetStation marker session.
#[derive(Debug, Parser)]
#[command(
    name = "netstation-demo",
    about = "Sends a series of event markers to a NetStation acquisition host",
    version
)]
struct Cli {
    /// TOML config file.  Defaults apply when the file does not exist.
    #[arg(default_value = "netstation.toml", env = "NETSTATION_CONFIG")]
    config: PathBuf,

    /// Run against an in-process simulated device on a loopback port.
    #[arg(long)]
    simulate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    // RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.log_level)),
        )
        .init();

    info!("NetStation demo starting");

    // ── Target device ─────────────────────────────────────────────────────────
    let (address, port, simulator) = if cli.simulate {
        let sim = DeviceSimulator::bind(
            SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
            DeviceBehavior::Accept,
        )
        .await
        .context("starting device simulator")?;
        let local = sim.local_addr().context("reading simulator address")?;
        let SocketAddr::V4(local) = local else {
            bail!("simulator bound to non-IPv4 address {local}");
        };
        info!("simulating NetStation at {local}");
        (*local.ip(), local.port(), Some(sim.spawn()))
    } else {
        (config.device.address, config.device.port, None)
    };

    // ── Marker session ────────────────────────────────────────────────────────
    let options = TransportOptions::from(&config.transport);
    let use_case = MarkerSessionUseCase::new(MarkerPlan::from(&config.session));
    let plan = use_case.plan();
    info!(
        "running {} markers every {:?} as {} against {address}:{port}",
        plan.markers, plan.interval, plan.system_spec
    );

    let report = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        let mut conn = EgiConnection::with_options(options);
        conn.connect(address, port)?;
        let report = use_case.run(&mut conn);
        if let Some(version) = conn.protocol_version() {
            info!("device protocol version {version}");
        }
        conn.disconnect();
        Ok(report?)
    })
    .await
    .context("session thread panicked")??;

    if let Some(handle) = simulator {
        handle.abort();
    }

    if report.failed_commands > 0 {
        warn!(
            "{} of {} markers sent; {} commands failed",
            report.markers_sent, config.session.markers, report.failed_commands
        );
    } else {
        info!("all {} markers sent", report.markers_sent);
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
