//! Open bus handles kept across cycles.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, TryLockError};

use linux_embedded_hal::spidev::{SpiModeFlags, SpidevOptions};
use linux_embedded_hal::{I2cdev, SpidevDevice};

use super::traits::DriverError;

/// SPI clock used for register access.
const SPI_SPEED_HZ: u32 = 1_000_000;

/// Handles of one device class, keyed by device node.
struct HandleMap<D> {
    kind: &'static str,
    handles: Mutex<HashMap<PathBuf, D>>,
}

impl<D> HandleMap<D> {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Run `f` against the handle for `path`, opening it on first use.
    ///
    /// A handle whose operation fails is dropped so the next call reopens it.
    /// Returns `Busy` instead of waiting while another call holds the map.
    fn with<T>(
        &self,
        path: &Path,
        open: impl FnOnce(&Path) -> Result<D, DriverError>,
        f: impl FnOnce(&mut D) -> Result<T, DriverError>,
    ) -> Result<T, DriverError> {
        let mut handles = match self.handles.try_lock() {
            Ok(handles) => handles,
            Err(TryLockError::WouldBlock) => {
                return Err(DriverError::Busy(format!(
                    "{} still in use by an earlier call",
                    self.kind
                )));
            }
            Err(TryLockError::Poisoned(_)) => {
                return Err(DriverError::Bus(format!(
                    "{} handle cache poisoned",
                    self.kind
                )));
            }
        };

        let handle = match handles.entry(path.to_path_buf()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let handle = open(path)?;
                tracing::debug!(kind = self.kind, path = %path.display(), "Opened device handle");
                entry.insert(handle)
            }
        };

        let result = f(handle);
        if result.is_err() {
            handles.remove(path);
            tracing::debug!(kind = self.kind, path = %path.display(), "Evicted device handle after error");
        }
        result
    }

    fn len(&self) -> usize {
        self.handles.lock().map(|h| h.len()).unwrap_or(0)
    }

    fn clear(&self) -> usize {
        match self.handles.try_lock() {
            Ok(mut handles) => {
                let count = handles.len();
                handles.clear();
                count
            }
            Err(_) => {
                tracing::warn!(kind = self.kind, "Device handles still in use, not released");
                0
            }
        }
    }
}

/// Process-wide cache of opened I2C buses and SPI devices.
///
/// Created by the binary, shared with the bus drivers and released at
/// shutdown. Reads run on blocking tasks that outlive their timeout, so a
/// hung transfer keeps its bus class locked. Later calls on that class fail
/// with [`DriverError::Busy`] instead of queueing behind it.
pub struct DeviceCache {
    i2c: HandleMap<I2cdev>,
    spi: HandleMap<SpidevDevice>,
}

impl DeviceCache {
    pub fn new() -> Self {
        Self {
            i2c: HandleMap::new("i2c"),
            spi: HandleMap::new("spi"),
        }
    }

    /// Run `f` with the I2C bus at `path`.
    pub fn with_i2c<T>(
        &self,
        path: &Path,
        f: impl FnOnce(&mut I2cdev) -> Result<T, DriverError>,
    ) -> Result<T, DriverError> {
        self.i2c.with(path, open_i2c, f)
    }

    /// Run `f` with the SPI device at `path`.
    pub fn with_spi<T>(
        &self,
        path: &Path,
        f: impl FnOnce(&mut SpidevDevice) -> Result<T, DriverError>,
    ) -> Result<T, DriverError> {
        self.spi.with(path, open_spi, f)
    }

    /// Number of currently open handles.
    pub fn open_handles(&self) -> usize {
        self.i2c.len() + self.spi.len()
    }

    /// Close every handle.
    pub fn release(&self) {
        let closed = self.i2c.clear() + self.spi.clear();
        tracing::info!(closed, "Released device handles");
    }
}

impl Default for DeviceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DeviceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceCache")
            .field("i2c", &self.i2c.len())
            .field("spi", &self.spi.len())
            .finish()
    }
}

fn open_i2c(path: &Path) -> Result<I2cdev, DriverError> {
    I2cdev::new(path)
        .map_err(|e| DriverError::Bus(format!("cannot open {}: {:?}", path.display(), e)))
}

fn open_spi(path: &Path) -> Result<SpidevDevice, DriverError> {
    let mut device = SpidevDevice::open(path)
        .map_err(|e| DriverError::Bus(format!("cannot open {}: {:?}", path.display(), e)))?;
    let options = SpidevOptions::new()
        .bits_per_word(8)
        .max_speed_hz(SPI_SPEED_HZ)
        .mode(SpiModeFlags::SPI_MODE_0)
        .build();
    device.0.configure(&options)?;
    Ok(device)
}
