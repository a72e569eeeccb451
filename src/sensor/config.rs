//! Per-sensor configuration.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::sensor::{DriverKey, Protocol, SensorKind};

/// Timestamp format inserted into saved image file names.
const SAVE_TIMESTAMP_FORMAT: &str = "%d_%m_%Y_%H_%M_%S";

fn default_rotate() -> bool {
    true
}

/// One configured sensor instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Sensor hardware type.
    #[serde(rename = "type")]
    pub kind: SensorKind,
    /// Access bus (only for types reachable over more than one bus).
    #[serde(default)]
    pub protocol: Protocol,
    /// GPIO pin: SPI chip select, or the DHT11 data pin matched against
    /// the overlay node `dht11@<pin in hex>`.
    #[serde(default)]
    pub pin: Option<u8>,
    /// I2C address; defaults per sensor type.
    #[serde(default)]
    pub address: Option<u8>,
    /// Explicit device: 1-Wire id, IIO device name or SPI device path.
    #[serde(default)]
    pub device: Option<String>,
    /// Free-text comment stored as a tag.
    #[serde(default)]
    pub comment: Option<String>,
    /// Rotate camera frames by 180° (default: true).
    #[serde(default = "default_rotate")]
    pub rotate: bool,
    /// Persist a captured frame every cycle.
    #[serde(default)]
    pub save: Option<SaveConfig>,
}

/// Where and how a captured frame is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveConfig {
    /// Target file; the extension selects the image format.
    pub path: PathBuf,
    /// Append the capture time to the file name.
    #[serde(default)]
    pub timestamp: bool,
}

impl SaveConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            timestamp: false,
        }
    }

    pub fn with_timestamp(mut self, timestamp: bool) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Resolve the file to write for a capture taken at `now`.
    ///
    /// With `timestamp` set, `/data/img.png` becomes
    /// `/data/img_01_05_2024_12_00_00.png`.
    pub fn target_path<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> PathBuf
    where
        Tz::Offset: std::fmt::Display,
    {
        if !self.timestamp {
            return self.path.clone();
        }
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stamp = now.format(SAVE_TIMESTAMP_FORMAT);
        let file_name = match self.path.extension() {
            Some(ext) => format!("{}_{}.{}", stem, stamp, ext.to_string_lossy()),
            None => format!("{}_{}", stem, stamp),
        };
        self.path.with_file_name(file_name)
    }
}

impl SensorConfig {
    /// Create a configuration with defaults for everything but the type.
    pub fn new(kind: SensorKind) -> Self {
        Self {
            kind,
            protocol: Protocol::None,
            pin: None,
            address: None,
            device: None,
            comment: None,
            rotate: true,
            save: None,
        }
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_pin(mut self, pin: u8) -> Self {
        self.pin = Some(pin);
        self
    }

    pub fn with_address(mut self, address: u8) -> Self {
        self.address = Some(address);
        self
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_rotate(mut self, rotate: bool) -> Self {
        self.rotate = rotate;
        self
    }

    pub fn with_save(mut self, save: SaveConfig) -> Self {
        self.save = Some(save);
        self
    }

    /// Registry key for this sensor.
    pub fn driver_key(&self) -> DriverKey {
        DriverKey::new(self.kind, self.protocol)
    }

    /// Configured I2C address, falling back to the type default.
    pub fn i2c_address(&self) -> Option<u8> {
        self.address.or_else(|| self.kind.default_i2c_address())
    }

    /// SPI device node: the explicit `device`, else the node wired to the
    /// chip-select `pin` (GPIO8 = CE0, GPIO7 = CE1).
    pub fn spi_device(&self) -> Option<PathBuf> {
        if let Some(device) = &self.device {
            return Some(PathBuf::from(device));
        }
        match self.pin {
            Some(8) => Some(PathBuf::from("/dev/spidev0.0")),
            Some(7) => Some(PathBuf::from("/dev/spidev0.1")),
            _ => None,
        }
    }

    /// Check the addressing fields against the sensor type.
    ///
    /// # Errors
    /// Returns a human-readable reason if the entry cannot be served.
    pub fn validate(&self) -> Result<(), String> {
        let key = self.driver_key();
        if !key.is_supported() {
            let supported: Vec<&str> = self
                .kind
                .supported_protocols()
                .iter()
                .map(|p| p.as_ref())
                .collect();
            return Err(format!(
                "protocol '{}' is not implemented for type '{}' (supported: {})",
                self.protocol,
                self.kind,
                supported.join(", ")
            ));
        }

        if self.protocol == Protocol::Spi && self.spi_device().is_none() {
            return Err(match self.pin {
                Some(pin) => format!(
                    "spi chip-select pin {} has no spidev node; use pin 7 or 8 or set 'device'",
                    pin
                ),
                None => "spi sensors need a chip-select 'pin' or a 'device'".to_string(),
            });
        }

        if let Some(save) = &self.save {
            if !self.kind.is_imaging() {
                return Err(format!("type '{}' cannot save images", self.kind));
            }
            if save.path.file_name().is_none() || !has_extension(&save.path) {
                return Err(format!(
                    "save path '{}' needs a file name with an image extension (.png, .jpg)",
                    save.path.display()
                ));
            }
        }

        Ok(())
    }
}

fn has_extension(path: &Path) -> bool {
    path.extension().is_some_and(|e| !e.is_empty())
}
