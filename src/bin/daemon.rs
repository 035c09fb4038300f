// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! atond: system service that owns the PWM output, runs the heating control
//! loop, and accepts control requests over HTTP.

use aton_heater::config;
use aton_heater::control::ControlLoop;
use aton_heater::http;
use aton_heater::pwm::Hardware;
use aton_heater::sensor::FileTemperatureSource;
use aton_heater::state::{SharedState, SystemState};
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::Notify;
use tokio::time::Duration;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "atond", about = "Water heater PWM control daemon")]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: String,

    /// Override the listen address.
    #[arg(short, long)]
    listen: Option<String>,

    /// Override the temperature file.
    #[arg(short, long)]
    temp_file: Option<String>,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config_path = config::resolve_config_path(Some(&cli.config));
    let cfg = config::load_config(&config_path)
        .with_context(|| format!("Cannot start without a valid config at {}", config_path.display()))?;

    let listen = cli.listen.unwrap_or_else(|| cfg.daemon.listen.clone());
    let temp_path = cli
        .temp_file
        .map(PathBuf::from)
        .unwrap_or_else(|| cfg.daemon.temp_path.clone());

    log::info!(
        "maxTemp {:.1}, enableOffset {:.1}, sensor {}",
        cfg.max_temp,
        cfg.enable_offset,
        temp_path.display()
    );

    let hardware = Hardware::open(&cfg.daemon);
    let state = SharedState::new(
        SystemState::new(cfg.max_temp),
        cfg.enable_offset,
        hardware.mode(),
    );

    let listener = TcpListener::bind(&listen)
        .await
        .with_context(|| format!("Failed to bind {listen}"))?;
    log::info!("Listening on {listen}");

    let shutdown = Arc::new(Notify::new());

    // Signal handler
    let shutdown_signal = shutdown.clone();
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
        log::info!("Received shutdown signal");
        shutdown_signal.notify_waiters();
    });

    // Control loop
    let source = FileTemperatureSource::new(
        temp_path,
        Duration::from_secs(cfg.daemon.stale_after_secs),
    );
    let control = ControlLoop::new(
        state.clone(),
        Box::new(source),
        hardware,
        Duration::from_millis(cfg.daemon.poll_interval_ms),
    );
    let control_task = tokio::spawn(control.run(shutdown.clone()));

    // Accept client connections
    http::serve(listener, state, shutdown).await;

    // Wait for the loop to switch the heater off
    control_task.await?;
    log::info!("Daemon shutting down");
    Ok(())
}
