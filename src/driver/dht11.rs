//! DHT11 temperature/humidity sensor via the kernel IIO `dht11` driver.
//!
//! The kernel handles the single-wire timing; the device is enabled with the
//! `dht11` overlay and shows up as `iio:deviceN`.

use std::path::{Path, PathBuf};

use crate::sensor::SensorConfig;
use crate::storage::FieldMap;

use super::traits::{Driver, DriverError};

const DEFAULT_DEVICE_NAME: &str = "dht11";
const TEMPERATURE_FILE: &str = "in_temp_input";
const HUMIDITY_FILE: &str = "in_humidityrelative_input";

pub struct Dht11Driver {
    iio_root: PathBuf,
}

impl Dht11Driver {
    pub fn new(iio_root: impl AsRef<Path>) -> Self {
        Self {
            iio_root: iio_root.as_ref().to_path_buf(),
        }
    }

    /// Locate the IIO device for `sensor`.
    ///
    /// - `device`: an `iio:deviceN` directory or a device `name`
    /// - `pin`: the device whose `of_node` is the overlay node `dht11@<pin hex>`
    /// - neither: the only device named `dht11`; several of them is an error
    fn device_dir(&self, sensor: &SensorConfig) -> Result<PathBuf, DriverError> {
        if let Some(device) = sensor.device.as_deref() {
            let direct = self.iio_root.join(device);
            if direct.is_dir() {
                return Ok(direct);
            }
            return self.by_name(device)?.into_iter().next().ok_or_else(|| {
                DriverError::NotFound(format!(
                    "no IIO device named '{}' under {}",
                    device,
                    self.iio_root.display()
                ))
            });
        }

        if let Some(pin) = sensor.pin {
            let node = overlay_node(pin);
            return self
                .devices()?
                .into_iter()
                .find(|dir| {
                    std::fs::read_link(dir.join("of_node"))
                        .ok()
                        .and_then(|target| target.file_name().map(|n| n == node.as_str()))
                        .unwrap_or(false)
                })
                .ok_or_else(|| {
                    DriverError::NotFound(format!(
                        "no IIO device for {} (GPIO{}) under {}",
                        node,
                        pin,
                        self.iio_root.display()
                    ))
                });
        }

        let mut found = self.by_name(DEFAULT_DEVICE_NAME)?;
        match found.len() {
            0 => Err(DriverError::NotFound(format!(
                "no IIO device named '{}' under {}",
                DEFAULT_DEVICE_NAME,
                self.iio_root.display()
            ))),
            1 => Ok(found.remove(0)),
            n => Err(DriverError::Config(format!(
                "{} IIO devices named '{}'; set 'pin' or 'device' to pick one",
                n, DEFAULT_DEVICE_NAME
            ))),
        }
    }

    /// Every device directory, sorted.
    fn devices(&self) -> Result<Vec<PathBuf>, DriverError> {
        let mut dirs: Vec<PathBuf> = std::fs::read_dir(&self.iio_root)
            .map_err(|e| DriverError::NotFound(format!("{}: {}", self.iio_root.display(), e)))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .collect();
        dirs.sort();
        Ok(dirs)
    }

    /// Device directories whose `name` attribute is `wanted`.
    fn by_name(&self, wanted: &str) -> Result<Vec<PathBuf>, DriverError> {
        Ok(self
            .devices()?
            .into_iter()
            .filter(|dir| {
                std::fs::read_to_string(dir.join("name"))
                    .map(|name| name.trim() == wanted)
                    .unwrap_or(false)
            })
            .collect())
    }
}

/// Device tree node created by `dtoverlay=dht11,gpiopin=<pin>`.
fn overlay_node(pin: u8) -> String {
    format!("{}@{:x}", DEFAULT_DEVICE_NAME, pin)
}

/// Read a milli-unit sysfs attribute.
fn read_milli(path: &Path) -> Result<f64, DriverError> {
    let raw = std::fs::read_to_string(path)?;
    let value: i64 = raw.trim().parse().map_err(|_| {
        DriverError::InvalidReading(format!("{}: bad value '{}'", path.display(), raw.trim()))
    })?;
    Ok(value as f64 / 1000.0)
}

impl Driver for Dht11Driver {
    fn name(&self) -> &'static str {
        "dht11"
    }

    fn read(&self, sensor: &SensorConfig) -> Result<FieldMap, DriverError> {
        let dir = self.device_dir(sensor)?;
        // The kernel driver returns EIO on a checksum or timing failure.
        let temperature = read_milli(&dir.join(TEMPERATURE_FILE))?;
        let humidity = read_milli(&dir.join(HUMIDITY_FILE))?;
        Ok(FieldMap::from([
            ("temperature".to_string(), temperature),
            ("relative humidity".to_string(), humidity),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::SensorKind;

    fn iio_device(root: &Path, dir: &str, name: &str, temp: &str, hum: Option<&str>) {
        let dir = root.join(dir);
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("name"), format!("{}\n", name)).unwrap();
        std::fs::write(dir.join(TEMPERATURE_FILE), temp).unwrap();
        if let Some(hum) = hum {
            std::fs::write(dir.join(HUMIDITY_FILE), hum).unwrap();
        }
    }

    /// Link `of_node` the way the kernel does for an overlay on `pin`.
    fn link_overlay(root: &Path, dir: &str, pin: u8) {
        let target = PathBuf::from("/sys/firmware/devicetree/base").join(overlay_node(pin));
        std::os::unix::fs::symlink(target, root.join(dir).join("of_node")).unwrap();
    }

    #[test]
    fn test_read_by_name() {
        let root = tempfile::tempdir().unwrap();
        iio_device(root.path(), "iio:device0", "mcp3008", "0\n", Some("0\n"));
        iio_device(root.path(), "iio:device1", "dht11", "21000\n", Some("48000\n"));

        let driver = Dht11Driver::new(root.path());
        let fields = driver.read(&SensorConfig::new(SensorKind::Dht11)).unwrap();
        assert_eq!(fields["temperature"], 21.0);
        assert_eq!(fields["relative humidity"], 48.0);
    }

    #[test]
    fn test_read_by_directory() {
        let root = tempfile::tempdir().unwrap();
        iio_device(root.path(), "iio:device0", "dht11", "20000\n", Some("40000\n"));
        iio_device(root.path(), "iio:device3", "dht11", "25500\n", Some("61000\n"));

        let driver = Dht11Driver::new(root.path());
        let sensor = SensorConfig::new(SensorKind::Dht11).with_device("iio:device3");
        let fields = driver.read(&sensor).unwrap();
        assert_eq!(fields["temperature"], 25.5);
    }

    #[test]
    fn test_missing_humidity_fails_whole_read() {
        let root = tempfile::tempdir().unwrap();
        iio_device(root.path(), "iio:device0", "dht11", "21000\n", None);

        let driver = Dht11Driver::new(root.path());
        let err = driver.read(&SensorConfig::new(SensorKind::Dht11)).unwrap_err();
        assert!(matches!(err, DriverError::Io(_)));
    }

    #[test]
    fn test_no_device() {
        let root = tempfile::tempdir().unwrap();
        let driver = Dht11Driver::new(root.path());
        let err = driver.read(&SensorConfig::new(SensorKind::Dht11)).unwrap_err();
        assert!(err.to_string().contains("no IIO device named 'dht11'"));
    }

    #[test]
    fn test_overlay_node_uses_hex_pin() {
        assert_eq!(overlay_node(4), "dht11@4");
        assert_eq!(overlay_node(17), "dht11@11");
    }

    #[test]
    fn test_two_sensors_read_by_pin() {
        let root = tempfile::tempdir().unwrap();
        iio_device(root.path(), "iio:device0", "dht11", "20000\n", Some("40000\n"));
        iio_device(root.path(), "iio:device1", "dht11", "25500\n", Some("61000\n"));
        link_overlay(root.path(), "iio:device0", 17);
        link_overlay(root.path(), "iio:device1", 4);

        let driver = Dht11Driver::new(root.path());
        let on_4 = driver
            .read(&SensorConfig::new(SensorKind::Dht11).with_pin(4))
            .unwrap();
        let on_17 = driver
            .read(&SensorConfig::new(SensorKind::Dht11).with_pin(17))
            .unwrap();
        assert_eq!(on_4["temperature"], 25.5);
        assert_eq!(on_17["temperature"], 20.0);

        let err = driver
            .read(&SensorConfig::new(SensorKind::Dht11).with_pin(22))
            .unwrap_err();
        assert!(err.to_string().contains("dht11@16"));
    }

    #[test]
    fn test_several_devices_without_addressing_is_error() {
        let root = tempfile::tempdir().unwrap();
        iio_device(root.path(), "iio:device0", "dht11", "20000\n", Some("40000\n"));
        iio_device(root.path(), "iio:device1", "dht11", "25500\n", Some("61000\n"));

        let driver = Dht11Driver::new(root.path());
        let err = driver.read(&SensorConfig::new(SensorKind::Dht11)).unwrap_err();
        assert!(matches!(err, DriverError::Config(_)));
        assert!(err.to_string().contains("set 'pin' or 'device'"));
    }
}
