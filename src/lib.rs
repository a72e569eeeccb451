//! sensorpi - Sensor Telemetry Collector
//!
//! Polls the sensors attached to a single-board computer at a fixed period and
//! forwards each batch of readings to InfluxDB. It can be used as a library
//! by other Rust projects, or run as a standalone binary with the `sensorpi`
//! executable.
//!
//! # Architecture
//!
//! - **Sensor**: Closed sensor/protocol enums and per-sensor configuration
//! - **Driver**: Hardware reads (1-Wire, IIO, I2C, SPI, camera) and the dispatch registry
//! - **Collector**: Per-cycle measurement pass and the scheduling loop
//! - **Storage**: Batches, line protocol and the InfluxDB sink
//! - **Config**: YAML configuration and validation
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sensorpi::{AppConfig, Collector, DeviceCache, DriverRegistry};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load("configs/config.yaml")?;
//! let cache = Arc::new(DeviceCache::new());
//! let registry = DriverRegistry::with_defaults(&config.hardware, Arc::clone(&cache));
//! let collector = Collector::new(Arc::new(registry));
//!
//! let batch = collector
//!     .collect(&config.sensor_set()?, "env", chrono::Utc::now())
//!     .await;
//! println!("{} records", batch.len());
//! cache.release();
//! # Ok(())
//! # }
//! ```

pub mod collector;
pub mod config;
pub mod driver;
pub mod sensor;
pub mod storage;

pub use collector::{Collector, CycleOutcome, RunStats, Scheduler, SchedulerError};
pub use config::{AppConfig, ConfigError};
pub use driver::{DeviceCache, Driver, DriverError, DriverRegistry, RegistryError};
pub use sensor::{DriverKey, Protocol, SaveConfig, SensorConfig, SensorKind, SensorSet};
pub use storage::{Batch, FieldMap, InfluxSink, InfluxSinkBuilder, Record, Sink, StorageError};
