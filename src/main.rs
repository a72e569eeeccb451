//! sensorpi Binary Entry Point
//!
//! This binary runs the sensor collection loop.
//! Core functionality is provided by the `sensorpi` library crate.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use sensorpi::{
    AppConfig, Collector, ConfigError, DeviceCache, DriverRegistry, InfluxSinkBuilder, Scheduler,
    Sink,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// sensorpi - Sensor Telemetry Collector
#[derive(Parser, Debug)]
#[command(name = "sensorpi", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        default_value = "configs/config.yaml",
        env = "SENSORPI_CONFIG"
    )]
    config: String,

    /// Seconds between cycle starts (overrides config file)
    #[arg(
        short,
        long,
        env = "SENSORPI_INTERVAL",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    interval: Option<u64>,

    /// Measurement name (overrides config file)
    #[arg(short, long, env = "SENSORPI_MEASUREMENT")]
    measurement: Option<String>,

    /// InfluxDB URL (overrides config file)
    #[arg(long, env = "SENSORPI_INFLUX_URL")]
    influx_url: Option<String>,

    /// InfluxDB database (overrides config file)
    #[arg(long, env = "SENSORPI_DATABASE")]
    database: Option<String>,

    /// Run a single pass, print the batch as JSON and exit without writing
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sensorpi=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("sensorpi - Sensor Telemetry Collector");

    // Parse CLI arguments
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(ConfigError::MissingSensors) => {
            tracing::error!(
                "Configuration '{}' has no 'sensors' section; nothing to collect",
                cli.config
            );
            return ExitCode::from(2);
        }
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            return ExitCode::from(2);
        }
    };

    match run(&cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Fatal error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Load the file, apply CLI/env overrides (CLI > ENV > config file), validate.
fn load_config(cli: &Cli) -> Result<AppConfig, ConfigError> {
    tracing::info!("Loading configuration from: {}", cli.config);
    let mut config = AppConfig::from_file(&cli.config)?;

    if let Some(interval) = cli.interval {
        config.run.interval = Duration::from_secs(interval);
    }
    if let Some(measurement) = &cli.measurement {
        config.run.measurement = Some(measurement.clone());
    }
    if let Some(url) = &cli.influx_url {
        config.influx.url = url.clone();
    }
    if let Some(database) = &cli.database {
        config.influx.database = database.clone();
    }

    config.validate()?;
    Ok(config)
}

async fn run(cli: &Cli, config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let sensors = config.sensor_set()?;
    let measurement = config.run.measurement_name().to_string();

    tracing::info!("Sensors: {}, Measurement: {}", sensors.len(), measurement);

    // Device handles live for the whole run and are released on exit
    let cache = Arc::new(DeviceCache::new());
    let registry = DriverRegistry::with_defaults(&config.hardware, Arc::clone(&cache));
    tracing::debug!(?registry, "Driver registry built");

    let collector =
        Collector::new(Arc::new(registry)).with_driver_timeout(config.run.driver_timeout);

    if cli.once {
        let batch = collector
            .collect(&sensors, &measurement, chrono::Utc::now())
            .await;
        cache.release();
        println!("{}", serde_json::to_string_pretty(&batch)?);
        return Ok(());
    }

    // Build sink
    let (username, password) = config.influx.resolved_credentials();
    let url = config.influx.resolved_url();
    tracing::info!("Initializing InfluxDB sink at: {} (database: {})", url, config.influx.database);

    let sink = InfluxSinkBuilder::new(url, config.influx.database.clone())
        .credentials(username, password)
        .timeout(config.influx.timeout)
        .build()?;

    // A database that cannot be prepared now may still come up later
    if let Err(e) = sink.ensure_database().await {
        tracing::warn!("Failed to ensure database '{}': {}", sink.database(), e);
    }

    let scheduler = Scheduler::new(
        collector,
        Arc::new(sink),
        sensors,
        measurement,
        config.run.effective_interval(),
    )?;
    tracing::info!("Collecting every {:?}", scheduler.interval());

    tracing::info!("Press Ctrl+C to shutdown");
    let stats = scheduler.run(shutdown_signal()).await;

    tracing::info!("Releasing devices...");
    cache.release();

    tracing::info!(
        "Shutdown complete ({} cycles, {} batches written, {} dropped)",
        stats.cycles,
        stats.batches_written,
        stats.batches_dropped
    );
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }
}
