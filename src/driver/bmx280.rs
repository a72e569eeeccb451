//! Bosch BMP280 / BME280 over I2C or SPI.
//!
//! One forced-mode conversion per read, compensated with the floating-point
//! formulas from the datasheet.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::sensor::{Protocol, SensorConfig};
use crate::storage::FieldMap;

use super::cache::DeviceCache;
use super::registers::{I2cRegisters, RegisterBus, SpiRegisters};
use super::traits::{Driver, DriverError};

const REG_CHIP_ID: u8 = 0xD0;
const REG_CALIB_TP: u8 = 0x88;
const REG_CALIB_H1: u8 = 0xA1;
const REG_CALIB_H2: u8 = 0xE1;
const REG_CTRL_HUM: u8 = 0xF2;
const REG_STATUS: u8 = 0xF3;
const REG_CTRL_MEAS: u8 = 0xF4;
const REG_DATA: u8 = 0xF7;

const CHIP_ID_BMP280: u8 = 0x58;
const CHIP_ID_BME280: u8 = 0x60;

/// Humidity oversampling x1.
const CTRL_HUM_OSRS_X1: u8 = 0x01;
/// Temperature x1, pressure x1, forced mode.
const CTRL_MEAS_FORCED_X1: u8 = 0b001_001_01;
/// Conversion running.
const STATUS_MEASURING: u8 = 0x08;

const POLL_INTERVAL: Duration = Duration::from_millis(5);
const POLL_ATTEMPTS: u32 = 40;

/// Chip variant served by a driver instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bmx280Variant {
    Bmp280,
    Bme280,
}

impl Bmx280Variant {
    fn has_humidity(self) -> bool {
        matches!(self, Self::Bme280)
    }

    fn accepts_chip_id(self, id: u8) -> bool {
        match self {
            // A BME280 is register-compatible for temperature and pressure.
            Self::Bmp280 => id == CHIP_ID_BMP280 || id == CHIP_ID_BME280,
            Self::Bme280 => id == CHIP_ID_BME280,
        }
    }

    fn expected_id(self) -> &'static str {
        match self {
            Self::Bmp280 => "0x58 or 0x60",
            Self::Bme280 => "0x60",
        }
    }
}

/// Factory trimming parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Calibration {
    pub t1: u16,
    pub t2: i16,
    pub t3: i16,
    pub p1: u16,
    pub p2: i16,
    pub p3: i16,
    pub p4: i16,
    pub p5: i16,
    pub p6: i16,
    pub p7: i16,
    pub p8: i16,
    pub p9: i16,
    pub h1: u8,
    pub h2: i16,
    pub h3: u8,
    pub h4: i16,
    pub h5: i16,
    pub h6: i8,
}

impl Calibration {
    /// Parse the 24-byte temperature/pressure block at 0x88.
    pub fn from_tp_block(b: &[u8; 24]) -> Self {
        let u = |i: usize| u16::from_le_bytes([b[i], b[i + 1]]);
        let s = |i: usize| i16::from_le_bytes([b[i], b[i + 1]]);
        Self {
            t1: u(0),
            t2: s(2),
            t3: s(4),
            p1: u(6),
            p2: s(8),
            p3: s(10),
            p4: s(12),
            p5: s(14),
            p6: s(16),
            p7: s(18),
            p8: s(20),
            p9: s(22),
            ..Self::default()
        }
    }

    /// Add the humidity parameters (0xA1 and the 7 bytes at 0xE1).
    pub fn with_humidity(mut self, h1: u8, e: &[u8; 7]) -> Self {
        self.h1 = h1;
        self.h2 = i16::from_le_bytes([e[0], e[1]]);
        self.h3 = e[2];
        // H4 and H5 are 12-bit signed values sharing the nibbles of 0xE5.
        self.h4 = ((e[3] as i8 as i16) << 4) | (e[4] & 0x0F) as i16;
        self.h5 = ((e[5] as i8 as i16) << 4) | (e[4] >> 4) as i16;
        self.h6 = e[6] as i8;
        self
    }

    /// Fine temperature carried into the pressure and humidity formulas.
    pub fn t_fine(&self, adc_t: i32) -> f64 {
        let adc_t = adc_t as f64;
        let t1 = self.t1 as f64;
        let var1 = (adc_t / 16384.0 - t1 / 1024.0) * self.t2 as f64;
        let d = adc_t / 131072.0 - t1 / 8192.0;
        let var2 = d * d * self.t3 as f64;
        var1 + var2
    }

    /// Temperature in °C.
    pub fn temperature(t_fine: f64) -> f64 {
        t_fine / 5120.0
    }

    /// Pressure in Pa, `None` when the calibration would divide by zero.
    pub fn pressure(&self, adc_p: i32, t_fine: f64) -> Option<f64> {
        let mut var1 = t_fine / 2.0 - 64000.0;
        let mut var2 = var1 * var1 * self.p6 as f64 / 32768.0;
        var2 += var1 * self.p5 as f64 * 2.0;
        var2 = var2 / 4.0 + self.p4 as f64 * 65536.0;
        var1 = (self.p3 as f64 * var1 * var1 / 524288.0 + self.p2 as f64 * var1) / 524288.0;
        var1 = (1.0 + var1 / 32768.0) * self.p1 as f64;
        if var1 == 0.0 {
            return None;
        }
        let mut p = 1048576.0 - adc_p as f64;
        p = (p - var2 / 4096.0) * 6250.0 / var1;
        let var1 = self.p9 as f64 * p * p / 2147483648.0;
        let var2 = p * self.p8 as f64 / 32768.0;
        Some(p + (var1 + var2 + self.p7 as f64) / 16.0)
    }

    /// Relative humidity in %, clamped to 0..=100.
    pub fn humidity(&self, adc_h: i32, t_fine: f64) -> f64 {
        let mut h = t_fine - 76800.0;
        h = (adc_h as f64 - (self.h4 as f64 * 64.0 + self.h5 as f64 / 16384.0 * h))
            * (self.h2 as f64 / 65536.0
                * (1.0
                    + self.h6 as f64 / 67108864.0 * h * (1.0 + self.h3 as f64 / 67108864.0 * h)));
        h *= 1.0 - self.h1 as f64 * h / 524288.0;
        h.clamp(0.0, 100.0)
    }
}

/// Run one forced-mode measurement over `bus`.
pub fn measure<B: RegisterBus>(bus: &mut B, variant: Bmx280Variant) -> Result<FieldMap, DriverError> {
    let id = bus.read_register(REG_CHIP_ID)?;
    if !variant.accepts_chip_id(id) {
        return Err(DriverError::ChipId {
            found: id,
            expected: variant.expected_id(),
        });
    }
    let humidity = variant.has_humidity() && id == CHIP_ID_BME280;

    let mut block = [0u8; 24];
    bus.read_registers(REG_CALIB_TP, &mut block)?;
    let mut calib = Calibration::from_tp_block(&block);
    if humidity {
        let h1 = bus.read_register(REG_CALIB_H1)?;
        let mut e = [0u8; 7];
        bus.read_registers(REG_CALIB_H2, &mut e)?;
        calib = calib.with_humidity(h1, &e);
        // ctrl_hum only takes effect after the following ctrl_meas write.
        bus.write_register(REG_CTRL_HUM, CTRL_HUM_OSRS_X1)?;
    }
    bus.write_register(REG_CTRL_MEAS, CTRL_MEAS_FORCED_X1)?;

    wait_ready(bus)?;

    let mut data = [0u8; 8];
    let len = if humidity { 8 } else { 6 };
    bus.read_registers(REG_DATA, &mut data[..len])?;

    let adc_p = (data[0] as i32) << 12 | (data[1] as i32) << 4 | (data[2] as i32) >> 4;
    let adc_t = (data[3] as i32) << 12 | (data[4] as i32) << 4 | (data[5] as i32) >> 4;

    let t_fine = calib.t_fine(adc_t);
    let pressure = calib
        .pressure(adc_p, t_fine)
        .ok_or_else(|| DriverError::InvalidReading("pressure calibration is zero".to_string()))?;

    let mut fields = FieldMap::new();
    fields.insert("temperature".to_string(), Calibration::temperature(t_fine));
    fields.insert("pressure".to_string(), pressure / 100.0);
    if humidity {
        let adc_h = (data[6] as i32) << 8 | data[7] as i32;
        fields.insert("relative humidity".to_string(), calib.humidity(adc_h, t_fine));
    }
    Ok(fields)
}

fn wait_ready<B: RegisterBus>(bus: &mut B) -> Result<(), DriverError> {
    for _ in 0..POLL_ATTEMPTS {
        if bus.read_register(REG_STATUS)? & STATUS_MEASURING == 0 {
            return Ok(());
        }
        std::thread::sleep(POLL_INTERVAL);
    }
    Err(DriverError::Timeout)
}

/// BMP280/BME280 driver for both buses.
pub struct Bmx280Driver {
    variant: Bmx280Variant,
    i2c_bus: PathBuf,
    cache: Arc<DeviceCache>,
}

impl Bmx280Driver {
    pub fn new(variant: Bmx280Variant, i2c_bus: impl AsRef<Path>, cache: Arc<DeviceCache>) -> Self {
        Self {
            variant,
            i2c_bus: i2c_bus.as_ref().to_path_buf(),
            cache,
        }
    }
}

impl Driver for Bmx280Driver {
    fn name(&self) -> &'static str {
        match self.variant {
            Bmx280Variant::Bmp280 => "bmp280",
            Bmx280Variant::Bme280 => "bme280",
        }
    }

    fn read(&self, sensor: &SensorConfig) -> Result<FieldMap, DriverError> {
        match sensor.protocol {
            Protocol::I2c => {
                let address = sensor
                    .i2c_address()
                    .ok_or_else(|| DriverError::Config("missing i2c address".to_string()))?;
                self.cache.with_i2c(&self.i2c_bus, |bus| {
                    measure(&mut I2cRegisters::new(bus, address), self.variant)
                })
            }
            Protocol::Spi => {
                let device = sensor.spi_device().ok_or_else(|| {
                    DriverError::Config("spi sensor needs a chip-select pin or device".to_string())
                })?;
                self.cache.with_spi(&device, |spi| {
                    measure(&mut SpiRegisters::new(spi), self.variant)
                })
            }
            Protocol::None => Err(DriverError::Config(format!(
                "{} needs protocol i2c or spi",
                self.name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::registers::mock::MockI2c;

    const ADDR: u8 = 0x76;

    fn tp_block() -> [u8; 24] {
        let words: [u16; 12] = [
            27504,
            26435,
            (-1000i16) as u16,
            36477,
            (-10685i16) as u16,
            3024,
            2855,
            140,
            (-7i16) as u16,
            15500,
            (-14600i16) as u16,
            6000,
        ];
        let mut block = [0u8; 24];
        for (i, w) in words.iter().enumerate() {
            block[i * 2..i * 2 + 2].copy_from_slice(&w.to_le_bytes());
        }
        block
    }

    fn chip(id: u8) -> MockI2c {
        let mut bus = MockI2c::new(ADDR);
        bus.set(REG_CHIP_ID, &[id]);
        bus.set(REG_CALIB_TP, &tp_block());
        // H1=75; H2=362, H3=0, H4=313, H5=50, H6=30.
        bus.set(REG_CALIB_H1, &[75]);
        bus.set(REG_CALIB_H2, &[0x6A, 0x01, 0x00, 19, 0x29, 3, 30]);
        // adc_P=415148, adc_T=519888, adc_H=30000.
        bus.set(REG_DATA, &[0x65, 0x5A, 0xC0, 0x7E, 0xED, 0x00, 0x75, 0x30]);
        bus
    }

    #[test]
    fn test_calibration_parse() {
        let calib = Calibration::from_tp_block(&tp_block())
            .with_humidity(75, &[0x6A, 0x01, 0x00, 19, 0x29, 3, 30]);
        assert_eq!(calib.t1, 27504);
        assert_eq!(calib.t3, -1000);
        assert_eq!(calib.p9, 6000);
        assert_eq!(calib.h2, 362);
        assert_eq!(calib.h4, 313);
        assert_eq!(calib.h5, 50);
        assert_eq!(calib.h6, 30);
    }

    #[test]
    fn test_datasheet_compensation() {
        let calib = Calibration::from_tp_block(&tp_block());
        let t_fine = calib.t_fine(519888);
        assert!((Calibration::temperature(t_fine) - 25.0825).abs() < 1e-3);
        let pressure = calib.pressure(415148, t_fine).unwrap();
        assert!((pressure - 100653.27).abs() < 0.1);
    }

    #[test]
    fn test_pressure_zero_calibration() {
        let calib = Calibration::default();
        assert!(calib.pressure(415148, 128422.0).is_none());
    }

    #[test]
    fn test_measure_bmp280() {
        let mut bus = chip(CHIP_ID_BMP280);
        let fields = measure(&mut I2cRegisters::new(&mut bus, ADDR), Bmx280Variant::Bmp280).unwrap();

        assert_eq!(fields.len(), 2);
        assert!((fields["temperature"] - 25.08).abs() < 0.01);
        assert!((fields["pressure"] - 1006.53).abs() < 0.01);
        assert!(bus.writes.contains(&(REG_CTRL_MEAS, CTRL_MEAS_FORCED_X1)));
        assert!(!bus.writes.iter().any(|(reg, _)| *reg == REG_CTRL_HUM));
    }

    #[test]
    fn test_measure_bme280_humidity() {
        let mut bus = chip(CHIP_ID_BME280);
        let fields = measure(&mut I2cRegisters::new(&mut bus, ADDR), Bmx280Variant::Bme280).unwrap();

        assert_eq!(fields.len(), 3);
        assert!((fields["relative humidity"] - 55.0).abs() < 0.01);
        // Humidity control is written before the measurement trigger.
        assert_eq!(
            bus.writes,
            vec![
                (REG_CTRL_HUM, CTRL_HUM_OSRS_X1),
                (REG_CTRL_MEAS, CTRL_MEAS_FORCED_X1)
            ]
        );
    }

    #[test]
    fn test_wrong_chip_id() {
        let mut bus = chip(CHIP_ID_BMP280);
        let err = measure(&mut I2cRegisters::new(&mut bus, ADDR), Bmx280Variant::Bme280).unwrap_err();
        assert!(matches!(err, DriverError::ChipId { found: 0x58, .. }));
    }

    #[test]
    fn test_measurement_never_completes() {
        let mut bus = chip(CHIP_ID_BMP280);
        bus.set(REG_STATUS, &[STATUS_MEASURING]);
        let err = measure(&mut I2cRegisters::new(&mut bus, ADDR), Bmx280Variant::Bmp280).unwrap_err();
        assert!(matches!(err, DriverError::Timeout));
    }

    #[test]
    fn test_protocol_none_is_config_error() {
        let driver = Bmx280Driver::new(
            Bmx280Variant::Bmp280,
            "/nonexistent/i2c-1",
            Arc::new(DeviceCache::new()),
        );
        let err = driver.read(&SensorConfig::new(crate::sensor::SensorKind::Bmp280)).unwrap_err();
        assert!(matches!(err, DriverError::Config(_)));
    }
}
