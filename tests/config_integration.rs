//! Checks that the shipped example configuration loads.

use std::time::Duration;

use sensorpi::{AppConfig, DeviceCache, DriverRegistry, Protocol, SensorKind};

#[test]
fn test_example_config_loads() {
    let config = AppConfig::load("configs/config.yaml").unwrap();

    assert_eq!(config.run.interval, Duration::from_secs(60));
    assert_eq!(config.run.measurement_name(), "greenhouse");
    assert_eq!(config.run.driver_timeout, Some(Duration::from_secs(15)));

    let sensors = config.sensor_set().unwrap();
    // Five inline sensors plus `porch` from configs/sensors.d.
    assert_eq!(sensors.len(), 6);
    assert_eq!(sensors.get("porch").unwrap().kind, SensorKind::Dht11);
    assert_eq!(sensors.get("roof").unwrap().protocol, Protocol::Spi);
}

#[test]
fn test_every_example_sensor_has_a_driver() {
    let config = AppConfig::load("configs/config.yaml").unwrap();
    let registry = DriverRegistry::with_defaults(
        &config.hardware,
        std::sync::Arc::new(DeviceCache::new()),
    );

    for (name, sensor) in config.sensor_set().unwrap().iter() {
        assert!(
            registry.resolve(sensor.kind, sensor.protocol).is_ok(),
            "no driver for sensor '{}'",
            name
        );
    }
}
