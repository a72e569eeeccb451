//! Collector Layer
//!
//! The measurement orchestration loop: one pass over the configured sensors
//! per cycle, a shared timestamp per batch, and a fixed-period scheduler
//! that hands each batch to the sink.
//!
//! # Architecture
//!
//! - [`Collector`]: visits every sensor once, isolating per-sensor failures
//! - [`Scheduler`]: drift-compensated loop with graceful shutdown
//! - [`RunStats`]: counters returned when the loop stops
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use sensorpi::collector::{Collector, Scheduler};
//! use sensorpi::config::AppConfig;
//! use sensorpi::driver::{DeviceCache, DriverRegistry};
//! use sensorpi::storage::InfluxSinkBuilder;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load("configs/config.yaml")?;
//! let registry = DriverRegistry::with_defaults(&config.hardware, Arc::new(DeviceCache::new()));
//! let sink = InfluxSinkBuilder::new("http://localhost:8086", "sensorpi").build()?;
//! let scheduler = Scheduler::new(
//!     Collector::new(Arc::new(registry)),
//!     Arc::new(sink),
//!     config.sensor_set()?,
//!     "env",
//!     Duration::from_secs(60),
//! )?;
//! let stats = scheduler.run(async { let _ = tokio::signal::ctrl_c().await; }).await;
//! # Ok(())
//! # }
//! ```

mod measure;
mod scheduler;

pub use measure::Collector;
pub use scheduler::{CycleOutcome, RunStats, Scheduler, SchedulerError};
