//! The validated set of configured sensors.

use std::collections::BTreeMap;

use crate::config::ConfigError;
use crate::sensor::{SensorConfig, SensorKind};

/// Sensor name to configuration, read-only for the lifetime of a run.
///
/// Construction guarantees the set is non-empty and every entry passed
/// [`SensorConfig::validate`], so the loop never starts on a set it cannot use.
#[derive(Debug, Clone)]
pub struct SensorSet {
    sensors: BTreeMap<String, SensorConfig>,
}

impl SensorSet {
    /// Validate and wrap a sensor map.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` for an empty set, an empty
    /// name or an entry whose type/protocol/addressing cannot be served.
    pub fn new(sensors: BTreeMap<String, SensorConfig>) -> Result<Self, ConfigError> {
        if sensors.is_empty() {
            return Err(ConfigError::ValidationError(
                "no sensors configured".to_string(),
            ));
        }
        for (name, sensor) in &sensors {
            if name.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "sensor name cannot be empty".to_string(),
                ));
            }
            sensor.validate().map_err(|e| {
                ConfigError::ValidationError(format!("sensor '{}' ({}): {}", name, sensor.kind, e))
            })?;
        }

        // Same-addressed DHT11 sensors would silently read the same device.
        let mut dht: BTreeMap<(Option<&str>, Option<u8>), &str> = BTreeMap::new();
        for (name, sensor) in sensors.iter().filter(|(_, s)| s.kind == SensorKind::Dht11) {
            if let Some(other) = dht.insert((sensor.device.as_deref(), sensor.pin), name) {
                return Err(ConfigError::ValidationError(format!(
                    "sensors '{}' and '{}' address the same dht11 device; set distinct 'pin' or 'device'",
                    other, name
                )));
            }
        }
        Ok(Self { sensors })
    }

    /// Iterate in enumeration order (sorted by name).
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SensorConfig)> {
        self.sensors.iter().map(|(name, config)| (name.as_str(), config))
    }

    pub fn get(&self, name: &str) -> Option<&SensorConfig> {
        self.sensors.get(name)
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    /// Always false for a constructed set; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::Protocol;

    #[test]
    fn test_sensor_set_rejects_empty() {
        let result = SensorSet::new(BTreeMap::new());
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("no sensors"));
    }

    #[test]
    fn test_sensor_set_rejects_empty_name() {
        let sensors = BTreeMap::from([(" ".to_string(), SensorConfig::new(SensorKind::Ds18b20))]);
        let result = SensorSet::new(sensors);
        assert!(result.unwrap_err().to_string().contains("cannot be empty"));
    }

    #[test]
    fn test_sensor_set_rejects_unsupported_protocol() {
        let sensors = BTreeMap::from([(
            "light".to_string(),
            SensorConfig::new(SensorKind::Tsl2591).with_protocol(Protocol::Spi),
        )]);
        let err = SensorSet::new(sensors).unwrap_err().to_string();
        assert!(err.contains("sensor 'light' (tsl2591)"));
        assert!(err.contains("not implemented"));
    }

    #[test]
    fn test_sensor_set_iterates_by_name() {
        let sensors = BTreeMap::from([
            ("zeta".to_string(), SensorConfig::new(SensorKind::Ds18b20)),
            ("alpha".to_string(), SensorConfig::new(SensorKind::Dht11)),
        ]);
        let set = SensorSet::new(sensors).unwrap();
        let names: Vec<&str> = set.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("alpha").unwrap().kind, SensorKind::Dht11);
    }

    #[test]
    fn test_sensor_set_rejects_same_addressed_dht11() {
        let sensors = BTreeMap::from([
            ("inside".to_string(), SensorConfig::new(SensorKind::Dht11)),
            ("outside".to_string(), SensorConfig::new(SensorKind::Dht11)),
        ]);
        let err = SensorSet::new(sensors).unwrap_err().to_string();
        assert!(err.contains("'inside' and 'outside'"));

        let sensors = BTreeMap::from([
            ("inside".to_string(), SensorConfig::new(SensorKind::Dht11).with_pin(4)),
            ("outside".to_string(), SensorConfig::new(SensorKind::Dht11).with_pin(17)),
        ]);
        assert_eq!(SensorSet::new(sensors).unwrap().len(), 2);
    }
}
