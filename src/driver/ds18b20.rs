//! DS18B20 1-Wire temperature probe via the kernel `w1_therm` driver.

use std::path::{Path, PathBuf};

use crate::sensor::SensorConfig;
use crate::storage::FieldMap;

use super::traits::{Driver, DriverError};

/// Family code prefix of DS18B20 slaves.
const FAMILY_PREFIX: &str = "28-";

/// Reads `<w1_root>/<id>/w1_slave`.
pub struct Ds18b20Driver {
    w1_root: PathBuf,
}

impl Ds18b20Driver {
    pub fn new(w1_root: impl AsRef<Path>) -> Self {
        Self {
            w1_root: w1_root.as_ref().to_path_buf(),
        }
    }

    /// The configured device, else the first DS18B20 on the bus.
    fn device_dir(&self, sensor: &SensorConfig) -> Result<PathBuf, DriverError> {
        if let Some(device) = &sensor.device {
            return Ok(self.w1_root.join(device));
        }

        let mut ids: Vec<String> = std::fs::read_dir(&self.w1_root)
            .map_err(|e| {
                DriverError::NotFound(format!("{}: {}", self.w1_root.display(), e))
            })?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(FAMILY_PREFIX))
            .collect();
        ids.sort();

        ids.into_iter()
            .next()
            .map(|id| self.w1_root.join(id))
            .ok_or_else(|| {
                DriverError::NotFound(format!(
                    "no 1-Wire device matching {}* under {}",
                    FAMILY_PREFIX,
                    self.w1_root.display()
                ))
            })
    }
}

/// Parse the two-line `w1_slave` output into °C.
///
/// ```text
/// 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
/// 72 01 4b 46 7f ff 0e 10 57 t=23125
/// ```
pub fn parse_w1_slave(content: &str) -> Result<f64, DriverError> {
    let mut lines = content.lines();
    let crc_line = lines
        .next()
        .ok_or_else(|| DriverError::InvalidReading("empty w1_slave".to_string()))?;
    if !crc_line.trim_end().ends_with("YES") {
        return Err(DriverError::InvalidReading("CRC check failed".to_string()));
    }

    let data_line = lines
        .next()
        .ok_or_else(|| DriverError::InvalidReading("missing temperature line".to_string()))?;
    let (_, raw) = data_line
        .rsplit_once("t=")
        .ok_or_else(|| DriverError::InvalidReading("missing t= value".to_string()))?;
    let millis: i64 = raw
        .trim()
        .parse()
        .map_err(|_| DriverError::InvalidReading(format!("bad temperature '{}'", raw.trim())))?;
    Ok(millis as f64 / 1000.0)
}

impl Driver for Ds18b20Driver {
    fn name(&self) -> &'static str {
        "ds18b20"
    }

    fn read(&self, sensor: &SensorConfig) -> Result<FieldMap, DriverError> {
        let path = self.device_dir(sensor)?.join("w1_slave");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| DriverError::NotFound(format!("{}: {}", path.display(), e)))?;
        let temperature = parse_w1_slave(&content)?;
        Ok(FieldMap::from([("temperature".to_string(), temperature)]))
    }
}
