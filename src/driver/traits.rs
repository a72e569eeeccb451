//! Core driver traits and types.

use std::path::Path;

use image::DynamicImage;
use thiserror::Error;

use crate::sensor::SensorConfig;
use crate::storage::FieldMap;

/// Errors a single hardware read can end in.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Device file or sysfs I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// I2C/SPI transfer failed.
    #[error("bus error: {0}")]
    Bus(String),

    /// The device answered with an unexpected identification register.
    #[error("unexpected chip id {found:#04x} (expected {expected})")]
    ChipId { found: u8, expected: &'static str },

    /// The device could not be located.
    #[error("device not found: {0}")]
    NotFound(String),

    /// The device answered but the data is unusable.
    #[error("invalid reading: {0}")]
    InvalidReading(String),

    /// A channel hit its maximum count.
    #[error("sensor saturated: {0}")]
    Saturated(String),

    /// Capture program failed.
    #[error("camera error: {0}")]
    Camera(String),

    /// Frame could not be decoded or encoded.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Addressing the driver cannot work with.
    #[error("config error: {0}")]
    Config(String),

    /// A timed-out earlier read still holds the device.
    #[error("device busy: {0}")]
    Busy(String),

    /// The read did not finish in time.
    #[error("timeout elapsed")]
    Timeout,

    /// The blocking task running the read panicked or was cancelled.
    #[error("driver task failed: {0}")]
    Task(String),
}

/// Core trait for sensor drivers.
///
/// A driver performs one blocking hardware read for one configured sensor and
/// formats it into a [`FieldMap`]. Drivers are shared behind `Arc` and called
/// from the blocking thread pool, so they must be `Send + Sync`; any mutable
/// device state lives behind the [`DeviceCache`](super::DeviceCache).
///
/// # Error Handling Philosophy
///
/// A read either produces the complete field set or fails:
///
/// - **Success**: every field the sensor type defines is present. A driver
///   never returns a partially populated map.
/// - **Failure** (device absent, bus error, checksum mismatch, saturation):
///   return `Err(DriverError)`. The collector logs it against the sensor and
///   leaves the sensor out of the current batch; the pass carries on.
pub trait Driver: Send + Sync {
    /// Human-readable driver name used in logs.
    fn name(&self) -> &'static str;

    /// Perform one read for `sensor`.
    fn read(&self, sensor: &SensorConfig) -> Result<FieldMap, DriverError>;
}

/// One captured camera frame.
#[derive(Debug, Clone)]
pub struct Frame {
    image: DynamicImage,
}

impl Frame {
    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Capability: take a raw frame from an imaging sensor.
pub trait FrameSource: Send + Sync {
    fn capture(&self, sensor: &SensorConfig) -> Result<Frame, DriverError>;
}

/// Capability: persist a frame to local storage.
pub trait FrameStore: Send + Sync {
    /// Write `frame` to `target`; the extension selects the encoding.
    fn save(&self, frame: &Frame, target: &Path) -> Result<(), DriverError>;
}
