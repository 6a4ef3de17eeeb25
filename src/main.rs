//! VoxRelay — main entry point.
//!
//! Bring-up order: logger, configuration (JSON file argument or
//! defaults), fault monitor, registry, channels, router thread, TCP
//! acceptor thread. The detection sender is the seam for the audio
//! classifier; the reference binary keeps it idle.
//!
//! Listener bring-up goes through the critical-path backoff policy:
//! repeated bind failures exhaust it and the process halts deliberately
//! with a non-zero exit code.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use log::{error, info, warn};

use voxrelay::acceptor::{self, ConnectionAcceptor};
use voxrelay::actuator::ActuatorController;
use voxrelay::adapters::gpio::MemoryBank;
use voxrelay::adapters::tcp::TcpAcceptor;
use voxrelay::channel;
use voxrelay::config::{CMD_CHANNEL_DEPTH, DETECT_CHANNEL_DEPTH, SystemConfig};
use voxrelay::error::{Error, classify};
use voxrelay::faults::FaultMonitor;
use voxrelay::registry::SessionRegistry;
use voxrelay::router::{self, CommandRouter};

fn load_config() -> Result<SystemConfig> {
    let config = match std::env::args().nth(1) {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config file {path}"))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing config file {path}"))?
        }
        None => {
            warn!("no config file given, using defaults");
            SystemConfig::default()
        }
    };
    config
        .validate()
        .map_err(|msg| anyhow::anyhow!("invalid configuration: {msg}"))?;
    Ok(config)
}

fn bind_listener(config: &SystemConfig, faults: &FaultMonitor) -> Result<TcpAcceptor> {
    loop {
        match TcpAcceptor::bind(&config.listen_addr) {
            Ok(acceptor) => return Ok(acceptor),
            Err(e) => {
                let class = classify(&Error::Net(e));
                if !faults.handle("server socket init", class, true) {
                    faults.halt("server socket init exhausted");
                    bail!("could not bind {} ({e})", config.listen_addr);
                }
            }
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("VoxRelay v{}", env!("CARGO_PKG_VERSION"));

    let config = Arc::new(load_config()?);
    let faults = Arc::new(FaultMonitor::new(&config));
    let registry = Arc::new(SessionRegistry::new(&config));

    let (cmd_tx, cmd_rx) = channel::bounded(CMD_CHANNEL_DEPTH);
    let (detect_tx, detect_rx) = channel::bounded(DETECT_CHANNEL_DEPTH);

    // Real deployments wire PinBank over the target HAL here.
    let actuator = ActuatorController::new(MemoryBank::new());

    let router_handle = router::spawn(CommandRouter::new(
        cmd_rx,
        detect_rx,
        Arc::clone(&registry),
        actuator,
        Arc::clone(&faults),
        &config,
    ));

    let listener = bind_listener(&config, &faults)?;
    let accept_handle = acceptor::spawn(ConnectionAcceptor::new(
        listener,
        Arc::clone(&registry),
        cmd_tx,
        Arc::clone(&faults),
        Arc::clone(&config),
    ));

    // The classifier collaborator owns this sender in a full deployment;
    // keeping it alive here keeps the detection channel open.
    let _detect_tx = detect_tx;

    let _ = accept_handle.join();
    let _ = router_handle.join();

    if faults.fatal() {
        error!("halting after critical-path exhaustion");
        std::process::exit(1);
    }
    Ok(())
}
