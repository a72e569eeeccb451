//! Register-level access over I2C or SPI.
//!
//! The Bosch and AMS chips used here expose a flat 8-bit register map. The
//! measurement code is written once against [`RegisterBus`] and runs over
//! either bus.

use embedded_hal::i2c::I2c;
use embedded_hal::spi::{Operation, SpiDevice};

use super::traits::DriverError;

/// SPI read flag (bit 7 set on the register address).
const SPI_READ: u8 = 0x80;
/// SPI write mask (bit 7 cleared).
const SPI_WRITE_MASK: u8 = 0x7F;

/// Read/write access to a device's register map.
pub trait RegisterBus {
    /// Burst-read consecutive registers starting at `reg`.
    fn read_registers(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), DriverError>;

    /// Write a single register.
    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), DriverError>;

    /// Read a single register.
    fn read_register(&mut self, reg: u8) -> Result<u8, DriverError> {
        let mut buf = [0u8; 1];
        self.read_registers(reg, &mut buf)?;
        Ok(buf[0])
    }
}

/// Registers of the device at `address` on an I2C bus.
pub struct I2cRegisters<'a, B> {
    bus: &'a mut B,
    address: u8,
}

impl<'a, B: I2c> I2cRegisters<'a, B> {
    pub fn new(bus: &'a mut B, address: u8) -> Self {
        Self { bus, address }
    }
}

impl<B: I2c> RegisterBus for I2cRegisters<'_, B> {
    fn read_registers(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), DriverError> {
        self.bus
            .write_read(self.address, &[reg], buf)
            .map_err(|e| bus_error(self.address, reg, e))
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), DriverError> {
        self.bus
            .write(self.address, &[reg, value])
            .map_err(|e| bus_error(self.address, reg, e))
    }
}

fn bus_error(address: u8, reg: u8, err: impl embedded_hal::i2c::Error) -> DriverError {
    DriverError::Bus(format!(
        "i2c {:#04x} register {:#04x}: {:?}",
        address,
        reg,
        err.kind()
    ))
}

/// Registers of a chip-selected SPI device.
pub struct SpiRegisters<'a, D> {
    device: &'a mut D,
}

impl<'a, D: SpiDevice> SpiRegisters<'a, D> {
    pub fn new(device: &'a mut D) -> Self {
        Self { device }
    }
}

impl<D: SpiDevice> RegisterBus for SpiRegisters<'_, D> {
    fn read_registers(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), DriverError> {
        self.device
            .transaction(&mut [Operation::Write(&[reg | SPI_READ]), Operation::Read(buf)])
            .map_err(|e| spi_error(reg, e))
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), DriverError> {
        self.device
            .write(&[reg & SPI_WRITE_MASK, value])
            .map_err(|e| spi_error(reg, e))
    }
}

fn spi_error(reg: u8, err: impl embedded_hal::spi::Error) -> DriverError {
    DriverError::Bus(format!("spi register {:#04x}: {:?}", reg, err.kind()))
}

/// In-memory register maps for driver tests.
#[cfg(test)]
pub(crate) mod mock {
    use embedded_hal::i2c::{self, ErrorKind, I2c, Operation as I2cOperation};
    use embedded_hal::spi::{self, Operation as SpiOperation, SpiDevice};

    /// A 256-byte register file behind a single I2C address.
    ///
    /// The first written byte selects the register; further written bytes and
    /// reads auto-increment from there.
    pub struct MockI2c {
        pub address: u8,
        pub regs: [u8; 256],
        pub writes: Vec<(u8, u8)>,
        pub fail: bool,
    }

    impl MockI2c {
        pub fn new(address: u8) -> Self {
            Self {
                address,
                regs: [0; 256],
                writes: Vec::new(),
                fail: false,
            }
        }

        pub fn set(&mut self, reg: u8, bytes: &[u8]) {
            let start = reg as usize;
            self.regs[start..start + bytes.len()].copy_from_slice(bytes);
        }
    }

    impl i2c::ErrorType for MockI2c {
        type Error = ErrorKind;
    }

    impl I2c for MockI2c {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [I2cOperation<'_>],
        ) -> Result<(), Self::Error> {
            if self.fail {
                return Err(ErrorKind::Bus);
            }
            if address != self.address {
                return Err(ErrorKind::NoAcknowledge(i2c::NoAcknowledgeSource::Address));
            }
            let mut pointer = 0usize;
            for op in operations.iter_mut() {
                match op {
                    I2cOperation::Write(bytes) => {
                        if let Some((&reg, data)) = bytes.split_first() {
                            pointer = reg as usize;
                            for &value in data {
                                self.regs[pointer] = value;
                                self.writes.push((pointer as u8, value));
                                pointer = (pointer + 1) % 256;
                            }
                        }
                    }
                    I2cOperation::Read(buf) => {
                        for byte in buf.iter_mut() {
                            *byte = self.regs[pointer];
                            pointer = (pointer + 1) % 256;
                        }
                    }
                }
            }
            Ok(())
        }
    }

    /// A register file behind SPI, recording the raw address bytes it saw.
    pub struct MockSpi {
        pub regs: [u8; 128],
        pub address_bytes: Vec<u8>,
    }

    impl MockSpi {
        pub fn new() -> Self {
            Self {
                regs: [0; 128],
                address_bytes: Vec::new(),
            }
        }
    }

    impl spi::ErrorType for MockSpi {
        type Error = spi::ErrorKind;
    }

    impl SpiDevice for MockSpi {
        fn transaction(
            &mut self,
            operations: &mut [SpiOperation<'_, u8>],
        ) -> Result<(), Self::Error> {
            let mut pointer = 0usize;
            for op in operations.iter_mut() {
                match op {
                    SpiOperation::Write(bytes) => {
                        if let Some((&addr, data)) = bytes.split_first() {
                            self.address_bytes.push(addr);
                            pointer = (addr & 0x7F) as usize;
                            for &value in data {
                                self.regs[pointer] = value;
                                pointer = (pointer + 1) % 128;
                            }
                        }
                    }
                    SpiOperation::Read(buf) => {
                        for byte in buf.iter_mut() {
                            *byte = self.regs[pointer];
                            pointer = (pointer + 1) % 128;
                        }
                    }
                    _ => return Err(spi::ErrorKind::Other),
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{MockI2c, MockSpi};
    use super::*;

    #[test]
    fn test_i2c_read_write() {
        let mut bus = MockI2c::new(0x76);
        bus.set(0xD0, &[0x58]);
        bus.set(0x88, &[1, 2, 3]);

        let mut regs = I2cRegisters::new(&mut bus, 0x76);
        assert_eq!(regs.read_register(0xD0).unwrap(), 0x58);

        let mut buf = [0u8; 3];
        regs.read_registers(0x88, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3]);

        regs.write_register(0xF4, 0x25).unwrap();
        assert_eq!(bus.regs[0xF4], 0x25);
        assert_eq!(bus.writes, vec![(0xF4, 0x25)]);
    }

    #[test]
    fn test_i2c_wrong_address_is_bus_error() {
        let mut bus = MockI2c::new(0x77);
        let mut regs = I2cRegisters::new(&mut bus, 0x76);
        let err = regs.read_register(0xD0).unwrap_err();
        assert!(matches!(err, DriverError::Bus(_)));
        assert!(err.to_string().contains("0x76"));
    }

    #[test]
    fn test_spi_address_bit() {
        let mut device = MockSpi::new();
        device.regs[0x50] = 0x60;

        let mut regs = SpiRegisters::new(&mut device);
        // 0xD0 is sent as-is for reads (bit 7 already set) and as 0x74 for writes.
        assert_eq!(regs.read_register(0xD0).unwrap(), 0x60);
        regs.write_register(0xF4, 0x25).unwrap();

        assert_eq!(device.address_bytes, vec![0xD0, 0x74]);
        assert_eq!(device.regs[0x74], 0x25);
    }
}
