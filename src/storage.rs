//! Storage Layer
//!
//! The time-series sink that batches are handed to at the end of each cycle:
//!
//! - [`Sink`]: Boundary trait used by the scheduler
//! - [`InfluxSink`] / [`InfluxSinkBuilder`]: InfluxDB 1.x HTTP implementation
//! - [`Batch`] / [`Record`] / [`FieldMap`]: Data written per cycle

mod builder;
mod error;
mod influx;
pub mod line_protocol;
mod sink;
mod types;

pub use builder::{DEFAULT_REQUEST_TIMEOUT, InfluxSinkBuilder};
pub use error::StorageError;
pub use influx::InfluxSink;
pub use sink::Sink;
pub use types::{Batch, FieldMap, Record, Tags};
