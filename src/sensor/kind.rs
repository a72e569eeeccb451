//! Closed sets of sensor types and bus protocols.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Supported sensor hardware.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SensorKind {
    /// DS18B20 1-Wire temperature probe.
    Ds18b20,
    /// DHT11 temperature/humidity sensor (kernel IIO driver).
    Dht11,
    /// TSL2591 light sensor.
    Tsl2591,
    /// BMP280 temperature/pressure sensor.
    Bmp280,
    /// BME280 temperature/pressure/humidity sensor.
    Bme280,
    /// Raspberry Pi camera module.
    Camera,
}

impl SensorKind {
    /// Protocols a built-in driver exists for.
    pub fn supported_protocols(self) -> &'static [Protocol] {
        match self {
            Self::Ds18b20 | Self::Dht11 | Self::Tsl2591 | Self::Camera => &[Protocol::None],
            Self::Bmp280 | Self::Bme280 => &[Protocol::I2c, Protocol::Spi],
        }
    }

    /// Whether the kind can capture and save frames.
    pub fn is_imaging(self) -> bool {
        matches!(self, Self::Camera)
    }

    /// Factory-default I2C address.
    pub fn default_i2c_address(self) -> Option<u8> {
        match self {
            Self::Bmp280 | Self::Bme280 => Some(0x76),
            Self::Tsl2591 => Some(0x29),
            _ => None,
        }
    }
}

/// Physical bus a sensor is reached over.
///
/// `None` is used by types that have a single fixed access path.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Protocol {
    #[default]
    None,
    I2c,
    Spi,
}

/// Registry key: a sensor type plus the bus it is read over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DriverKey {
    pub kind: SensorKind,
    pub protocol: Protocol,
}

impl DriverKey {
    pub fn new(kind: SensorKind, protocol: Protocol) -> Self {
        Self { kind, protocol }
    }

    /// Whether a built-in driver exists for this pair.
    pub fn is_supported(&self) -> bool {
        self.kind.supported_protocols().contains(&self.protocol)
    }
}

impl std::fmt::Display for DriverKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.protocol {
            Protocol::None => write!(f, "{}", self.kind),
            protocol => write!(f, "{}/{}", self.kind, protocol),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_sensor_kind_from_str() {
        assert_eq!(SensorKind::from_str("ds18b20").unwrap(), SensorKind::Ds18b20);
        assert_eq!(SensorKind::from_str("BME280").unwrap(), SensorKind::Bme280);
        assert!(SensorKind::from_str("sht31").is_err());
    }

    #[test]
    fn test_sensor_kind_serde() {
        let kind: SensorKind = serde_yaml::from_str("tsl2591").unwrap();
        assert_eq!(kind, SensorKind::Tsl2591);
        assert!(serde_yaml::from_str::<SensorKind>("lightmeter").is_err());
    }

    #[test]
    fn test_protocol_default_and_display() {
        assert_eq!(Protocol::default(), Protocol::None);
        assert_eq!(Protocol::I2c.to_string(), "i2c");
        assert_eq!(Protocol::Spi.as_ref(), "spi");
    }

    #[test]
    fn test_driver_key_support() {
        assert!(DriverKey::new(SensorKind::Bme280, Protocol::Spi).is_supported());
        assert!(DriverKey::new(SensorKind::Ds18b20, Protocol::None).is_supported());
        assert!(!DriverKey::new(SensorKind::Bme280, Protocol::None).is_supported());
        assert!(!DriverKey::new(SensorKind::Camera, Protocol::I2c).is_supported());
    }

    #[test]
    fn test_driver_key_display() {
        assert_eq!(
            DriverKey::new(SensorKind::Bmp280, Protocol::I2c).to_string(),
            "bmp280/i2c"
        );
        assert_eq!(
            DriverKey::new(SensorKind::Camera, Protocol::None).to_string(),
            "camera"
        );
    }
}
