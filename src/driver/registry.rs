//! Static mapping from (type, protocol) to driver capability.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::config::HardwareConfig;
use crate::sensor::{DriverKey, Protocol, SensorKind};

use super::bmx280::{Bmx280Driver, Bmx280Variant};
use super::cache::DeviceCache;
use super::camera::{CameraDriver, ImageFileStore};
use super::dht11::Dht11Driver;
use super::ds18b20::Ds18b20Driver;
use super::traits::{Driver, FrameSource, FrameStore};
use super::tsl2591::Tsl2591Driver;

/// Lookup failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// No driver serves this (type, protocol) pair.
    #[error("no driver registered for '{0}'")]
    NotFound(DriverKey),

    /// No capture capability for this type.
    #[error("no capture capability registered for '{0}'")]
    CaptureNotFound(SensorKind),

    /// No save capability for this type.
    #[error("no save capability registered for '{0}'")]
    StoreNotFound(SensorKind),
}

/// Registry of driver capabilities.
///
/// Built once at startup and read-only afterwards. Lookup is exact-match on
/// the key; there is no fallback between protocols. Capture and save
/// capabilities are keyed by type alone.
#[derive(Default, Clone)]
pub struct DriverRegistry {
    drivers: HashMap<DriverKey, Arc<dyn Driver>>,
    sources: HashMap<SensorKind, Arc<dyn FrameSource>>,
    stores: HashMap<SensorKind, Arc<dyn FrameStore>>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in driver wired to `hardware`.
    pub fn with_defaults(hardware: &HardwareConfig, cache: Arc<DeviceCache>) -> Self {
        let mut registry = Self::new();

        registry.register(
            DriverKey::new(SensorKind::Ds18b20, Protocol::None),
            Arc::new(Ds18b20Driver::new(&hardware.w1_root)),
        );
        registry.register(
            DriverKey::new(SensorKind::Dht11, Protocol::None),
            Arc::new(Dht11Driver::new(&hardware.iio_root)),
        );
        registry.register(
            DriverKey::new(SensorKind::Tsl2591, Protocol::None),
            Arc::new(Tsl2591Driver::new(&hardware.i2c_bus, Arc::clone(&cache))),
        );

        for (kind, variant) in [
            (SensorKind::Bmp280, Bmx280Variant::Bmp280),
            (SensorKind::Bme280, Bmx280Variant::Bme280),
        ] {
            let driver = Arc::new(Bmx280Driver::new(
                variant,
                &hardware.i2c_bus,
                Arc::clone(&cache),
            ));
            registry.register(DriverKey::new(kind, Protocol::I2c), driver.clone());
            registry.register(DriverKey::new(kind, Protocol::Spi), driver);
        }

        let camera = Arc::new(CameraDriver::new(
            hardware.camera_command.clone(),
            hardware.camera_warmup,
        ));
        registry.register(
            DriverKey::new(SensorKind::Camera, Protocol::None),
            camera.clone(),
        );
        registry.register_capture(SensorKind::Camera, camera);
        registry.register_store(SensorKind::Camera, Arc::new(ImageFileStore));

        registry
    }

    /// Register a driver, replacing any previous one for `key`.
    pub fn register(&mut self, key: DriverKey, driver: Arc<dyn Driver>) -> &mut Self {
        if self.drivers.insert(key, driver).is_some() {
            tracing::debug!(key = %key, "Replaced registered driver");
        }
        self
    }

    /// Register the capture capability for an imaging type.
    pub fn register_capture(&mut self, kind: SensorKind, source: Arc<dyn FrameSource>) -> &mut Self {
        self.sources.insert(kind, source);
        self
    }

    /// Register the save capability for an imaging type.
    pub fn register_store(&mut self, kind: SensorKind, store: Arc<dyn FrameStore>) -> &mut Self {
        self.stores.insert(kind, store);
        self
    }

    /// Resolve the formatted-read driver for a (type, protocol) pair.
    ///
    /// # Errors
    /// Returns `RegistryError::NotFound` if nothing is registered for the key.
    pub fn resolve(
        &self,
        kind: SensorKind,
        protocol: Protocol,
    ) -> Result<Arc<dyn Driver>, RegistryError> {
        let key = DriverKey::new(kind, protocol);
        self.drivers
            .get(&key)
            .cloned()
            .ok_or(RegistryError::NotFound(key))
    }

    /// Resolve the capture capability for a type.
    ///
    /// # Errors
    /// Returns `RegistryError::CaptureNotFound` if none is registered.
    pub fn resolve_capture(&self, kind: SensorKind) -> Result<Arc<dyn FrameSource>, RegistryError> {
        self.sources
            .get(&kind)
            .cloned()
            .ok_or(RegistryError::CaptureNotFound(kind))
    }

    /// Resolve the save capability for a type.
    ///
    /// # Errors
    /// Returns `RegistryError::StoreNotFound` if none is registered.
    pub fn resolve_store(&self, kind: SensorKind) -> Result<Arc<dyn FrameStore>, RegistryError> {
        self.stores
            .get(&kind)
            .cloned()
            .ok_or(RegistryError::StoreNotFound(kind))
    }

    /// Number of registered formatted-read drivers.
    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<String> = self.drivers.keys().map(ToString::to_string).collect();
        keys.sort();
        f.debug_struct("DriverRegistry")
            .field("drivers", &keys)
            .field("capture", &self.sources.len())
            .field("store", &self.stores.len())
            .finish()
    }
}
