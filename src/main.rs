//! # Sensor Bridge
//!
//! Samples the HYT939/HP206C I2C sensors and the serial anemometer, logs
//! every combined record to CSV and relays a summary line to the downstream
//! serial consumer.

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use std::path::PathBuf;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use sensor_bridge::acquisition::{AcquisitionLoop, AcquisitionSettings};
use sensor_bridge::config::Config;
use sensor_bridge::relay::encoder::encode_record;
use sensor_bridge::sensors::bus::{BusLayout, BusSensorReader, LinuxI2cProvider};
use sensor_bridge::serial::{SerialLineReader, SerialWriter};
use sensor_bridge::telemetry::logger::log_file_path;
use sensor_bridge::telemetry::{CsvRecordLog, TelemetryWindow};

/// Default configuration file location
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// File name of the rolling diagnostic log
const DIAGNOSTICS_FILE_NAME: &str = "sensor-bridge.log";

#[derive(Debug, Parser)]
#[command(name = "sensor-bridge", version, about)]
struct Args {
    /// Configuration file; built-in defaults are used if it does not exist
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Print the final telemetry window as JSON on shutdown
    #[arg(long)]
    dump_window: bool,
}

/// Main entry point for Sensor Bridge
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration and set up logging
///    - Open the anemometer and relay serial ports
///    - Create the CSV record log
///
/// 2. **Acquisition**
///    - Spawn the acquisition loop on its own task
///    - Wait for Ctrl+C or SIGTERM
///
/// 3. **Graceful Shutdown**
///    - Signal the loop, wait for it to close both serial ports
///    - Log totals
///
/// # Errors
///
/// Returns error if the configuration is invalid or a serial port or the
/// record log cannot be opened. Faults after start-up never end the run.
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_found = args.config.exists();
    let config = if config_found {
        Config::load(&args.config)?
    } else {
        Config::default()
    };

    let _guard = init_tracing(config.logging.diagnostics_dir.as_deref());

    info!("Sensor Bridge v{} starting...", env!("CARGO_PKG_VERSION"));
    if config_found {
        info!("Loaded configuration from {}", args.config.display());
    } else {
        warn!("{} not found, using built-in defaults", args.config.display());
    }

    // Device-open faults end the run here, before the loop starts
    let anemometer = SerialLineReader::open(
        &config.serial.anemometer_port,
        config.serial.anemometer_baud,
        config.serial.read_timeout(),
    )?
    .with_max_line_bytes(config.serial.max_line_bytes);
    let relay = SerialWriter::open(&config.serial.relay_port, config.serial.relay_baud)?;

    let log_path = log_file_path(&config.log.dir, &config.log.file_prefix, Local::now());
    let log = CsvRecordLog::create(&log_path)?;

    let bus = BusSensorReader::new(
        LinuxI2cProvider::new(&config.bus.device),
        BusLayout::from(&config.bus),
        config.bus.settle(),
    );

    let window = TelemetryWindow::new(config.acquisition.max_points);
    let acquisition = AcquisitionLoop::new(
        bus,
        Box::new(anemometer),
        Box::new(relay),
        Box::new(log),
        window.clone(),
        acquisition_settings(&config),
    );

    let mut terminate = signal(SignalKind::terminate())?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(acquisition.run(shutdown_rx));
    info!("Press Ctrl+C to exit");

    let reason = wait_for_shutdown(&mut terminate).await?;
    info!("Received {}, shutting down...", reason);
    shutdown_tx.send(true)?;

    let stats = task.await?;
    info!(
        "Total cycles: {} ({} without anemometer data, {} log failures, {} relay failures)",
        stats.cycles, stats.missing_lines, stats.log_failures, stats.relay_failures
    );
    if let Some(latest) = window.latest() {
        info!("Last record: {}", encode_record(&latest));
    }
    info!(
        "Window holds {} of {} records, log written to {}",
        window.len(),
        window.capacity(),
        log_path.display()
    );

    if args.dump_window {
        println!("{}", serde_json::to_string_pretty(&window.plot_data())?);
    }

    Ok(())
}

/// Install the tracing subscriber
///
/// Logs go to stdout, and to a daily rolling file when `diagnostics_dir` is
/// set. The returned guard must be held until exit so buffered file output
/// is flushed.
fn init_tracing(diagnostics_dir: Option<&str>) -> Option<WorkerGuard> {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer());

    match diagnostics_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, DIAGNOSTICS_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    }
}

/// Wait for Ctrl+C or SIGTERM and name the one that arrived
async fn wait_for_shutdown(terminate: &mut Signal) -> std::io::Result<&'static str> {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            Ok("Ctrl+C")
        }
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

fn acquisition_settings(config: &Config) -> AcquisitionSettings {
    AcquisitionSettings {
        period: config.acquisition.period(),
        max_line_attempts: config.serial.max_line_attempts,
        status_interval: config.acquisition.status_interval_cycles,
    }
}
