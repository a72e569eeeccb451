//! Sensor data model
//!
//! - [`SensorKind`] / [`Protocol`] / [`DriverKey`]: closed type and bus enums
//! - [`SensorConfig`] / [`SaveConfig`]: one configured sensor instance
//! - [`SensorSet`]: the validated, read-only set the loop iterates

mod config;
mod kind;
mod set;

pub use config::{SaveConfig, SensorConfig};
pub use kind::{DriverKey, Protocol, SensorKind};
pub use set::SensorSet;
