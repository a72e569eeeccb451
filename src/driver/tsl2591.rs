//! AMS TSL2591 light sensor over I2C.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::sensor::SensorConfig;
use crate::storage::FieldMap;

use super::cache::DeviceCache;
use super::registers::{I2cRegisters, RegisterBus};
use super::traits::{Driver, DriverError};

/// Command bit, normal (auto-increment) transaction.
const COMMAND: u8 = 0xA0;

const REG_ENABLE: u8 = 0x00;
const REG_CONTROL: u8 = 0x01;
const REG_ID: u8 = 0x12;
const REG_C0DATAL: u8 = 0x14;

const DEVICE_ID: u8 = 0x50;

const ENABLE_POWER_ON: u8 = 0x01;
const ENABLE_ALS: u8 = 0x02;
const ENABLE_OFF: u8 = 0x00;

/// Medium gain (25x).
const GAIN_MED: u8 = 0x10;
const GAIN_MED_FACTOR: f64 = 25.0;
/// 100 ms integration.
const ATIME_100MS: u8 = 0x00;
const ATIME_100MS_FACTOR: f64 = 100.0;

/// Lux coefficient from the AMS application note.
const LUX_DF: f64 = 408.0;

/// Integration time plus margin.
const SETTLE_TIME: Duration = Duration::from_millis(120);

/// Raw counts of one integration cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channels {
    /// Full spectrum (visible + infrared).
    pub ch0: u16,
    /// Infrared only.
    pub ch1: u16,
}

impl Channels {
    fn saturated(&self) -> bool {
        self.ch0 == u16::MAX || self.ch1 == u16::MAX
    }

    /// Illuminance in lux for medium gain and 100 ms integration.
    pub fn lux(&self) -> f64 {
        if self.ch0 == 0 {
            return 0.0;
        }
        let ch0 = self.ch0 as f64;
        let ch1 = self.ch1 as f64;
        let cpl = (ATIME_100MS_FACTOR * GAIN_MED_FACTOR) / LUX_DF;
        (ch0 - ch1) * (1.0 - ch1 / ch0) / cpl
    }

    fn into_fields(self) -> FieldMap {
        FieldMap::from([
            ("Lux".to_string(), self.lux()),
            ("IR".to_string(), self.ch1 as f64),
            ("Vis".to_string(), self.ch0.saturating_sub(self.ch1) as f64),
            ("Full".to_string(), self.ch0 as f64),
        ])
    }
}

/// Power the sensor up, integrate once and power it down again.
pub fn measure<B: RegisterBus>(bus: &mut B, settle: Duration) -> Result<FieldMap, DriverError> {
    let id = bus.read_register(COMMAND | REG_ID)?;
    if id != DEVICE_ID {
        return Err(DriverError::ChipId {
            found: id,
            expected: "0x50",
        });
    }

    bus.write_register(COMMAND | REG_CONTROL, GAIN_MED | ATIME_100MS)?;
    bus.write_register(COMMAND | REG_ENABLE, ENABLE_POWER_ON | ENABLE_ALS)?;
    std::thread::sleep(settle);

    let mut data = [0u8; 4];
    let read = bus.read_registers(COMMAND | REG_C0DATAL, &mut data);
    let disable = bus.write_register(COMMAND | REG_ENABLE, ENABLE_OFF);
    read?;
    disable?;

    let channels = Channels {
        ch0: u16::from_le_bytes([data[0], data[1]]),
        ch1: u16::from_le_bytes([data[2], data[3]]),
    };
    if channels.saturated() {
        return Err(DriverError::Saturated(format!(
            "channel overflow (full={}, ir={})",
            channels.ch0, channels.ch1
        )));
    }
    Ok(channels.into_fields())
}

/// TSL2591 driver on the configured I2C bus.
pub struct Tsl2591Driver {
    i2c_bus: PathBuf,
    cache: Arc<DeviceCache>,
}

impl Tsl2591Driver {
    pub fn new(i2c_bus: impl AsRef<Path>, cache: Arc<DeviceCache>) -> Self {
        Self {
            i2c_bus: i2c_bus.as_ref().to_path_buf(),
            cache,
        }
    }
}

impl Driver for Tsl2591Driver {
    fn name(&self) -> &'static str {
        "tsl2591"
    }

    fn read(&self, sensor: &SensorConfig) -> Result<FieldMap, DriverError> {
        let address = sensor
            .i2c_address()
            .ok_or_else(|| DriverError::Config("missing i2c address".to_string()))?;
        self.cache.with_i2c(&self.i2c_bus, |bus| {
            measure(&mut I2cRegisters::new(bus, address), SETTLE_TIME)
        })
    }
}
