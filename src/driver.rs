//! Driver Layer
//!
//! Hardware reads behind a uniform contract, and the registry that maps a
//! configured sensor to the driver serving it.
//!
//! # Architecture
//!
//! - [`Driver`]: one blocking read returning a [`FieldMap`](crate::storage::FieldMap)
//! - [`FrameSource`] / [`FrameStore`]: capture and save capabilities of imaging sensors
//! - [`DriverRegistry`]: exact-match lookup by (type, protocol)
//! - [`DeviceCache`]: I2C/SPI handles kept open across cycles
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sensorpi::config::HardwareConfig;
//! use sensorpi::driver::{DeviceCache, DriverRegistry};
//! use sensorpi::sensor::{Protocol, SensorConfig, SensorKind};
//!
//! let cache = Arc::new(DeviceCache::new());
//! let registry = DriverRegistry::with_defaults(&HardwareConfig::default(), cache);
//! let sensor = SensorConfig::new(SensorKind::Bme280).with_protocol(Protocol::I2c);
//! let driver = registry.resolve(sensor.kind, sensor.protocol).unwrap();
//! let fields = driver.read(&sensor);
//! ```

pub mod bmx280;
mod cache;
pub mod camera;
pub mod dht11;
pub mod ds18b20;
pub mod registers;
mod registry;
mod traits;
pub mod tsl2591;

pub use cache::DeviceCache;
pub use registry::{DriverRegistry, RegistryError};
pub use traits::{Driver, DriverError, Frame, FrameSource, FrameStore};
