//! Configuration module for sensorpi.
//!
//! Provides YAML-based configuration loading and validation for:
//! - InfluxDB settings (url, database, credentials, timeout)
//! - Run settings (interval, measurement, driver timeout)
//! - Hardware locations (I2C bus, sysfs roots, camera command)
//! - Sensor definitions, inline or from an include directory

mod app;
mod sensors;
mod validation;

pub use app::{AppConfig, HardwareConfig, InfluxConfig, RunConfig};
pub use sensors::load_sensors_from_dir;
pub use validation::{ConfigError, expand_env_vars};

// Re-export constants
pub use app::{DEFAULT_CAMERA_WARMUP, DEFAULT_INTERVAL, MIN_INTERVAL};
