//! One pass over the sensor set.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};

use crate::driver::{DriverError, DriverRegistry};
use crate::sensor::{SaveConfig, SensorConfig, SensorSet};
use crate::storage::Batch;

/// Visits every configured sensor once and assembles a [`Batch`].
///
/// # Error Handling Philosophy
///
/// Nothing below this type propagates out of [`Collector::collect`]:
///
/// - **Unresolvable sensors** (no driver for the type/protocol pair) are a
///   configuration problem. They are logged with the sensor name, type and
///   protocol and skipped.
/// - **Driver failures** (hardware absent, bus error, timeout) are logged
///   against the sensor, which contributes no record this pass.
/// - **Capture/save failures** of imaging sensors are logged and do not stop
///   the formatted read that follows.
#[derive(Debug, Clone)]
pub struct Collector {
    registry: Arc<DriverRegistry>,
    driver_timeout: Option<Duration>,
}

impl Collector {
    pub fn new(registry: Arc<DriverRegistry>) -> Self {
        Self {
            registry,
            driver_timeout: None,
        }
    }

    /// Bound every driver call. `None` waits indefinitely.
    pub fn with_driver_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.driver_timeout = timeout;
        self
    }

    /// Read every sensor once, in set order, stamping all records with `timestamp`.
    pub async fn collect(
        &self,
        sensors: &SensorSet,
        measurement: &str,
        timestamp: DateTime<Utc>,
    ) -> Batch {
        let mut batch = Batch::new(measurement, timestamp);

        for (name, sensor) in sensors.iter() {
            if let Some(save) = &sensor.save {
                self.capture_and_save(name, sensor, save, timestamp).await;
            }

            let driver = match self.registry.resolve(sensor.kind, sensor.protocol) {
                Ok(driver) => driver,
                Err(e) => {
                    tracing::warn!(
                        sensor = %name,
                        kind = %sensor.kind,
                        protocol = %sensor.protocol,
                        error = %e,
                        "No driver for sensor, skipping"
                    );
                    continue;
                }
            };

            let driver_name = driver.name();
            match self.run_blocking(sensor, move |s| driver.read(s)).await {
                Ok(fields) if fields.is_empty() => {
                    tracing::warn!(sensor = %name, driver = driver_name, "Driver returned no fields, skipping");
                }
                Ok(fields) => {
                    tracing::debug!(sensor = %name, fields = fields.len(), "Sensor read");
                    batch.push(name, sensor.comment.clone(), fields);
                }
                Err(e) => {
                    tracing::warn!(
                        sensor = %name,
                        kind = %sensor.kind,
                        protocol = %sensor.protocol,
                        error = %e,
                        "Sensor read failed, skipping"
                    );
                }
            }
        }

        batch
    }

    async fn capture_and_save(
        &self,
        name: &str,
        sensor: &SensorConfig,
        save: &SaveConfig,
        timestamp: DateTime<Utc>,
    ) {
        let capabilities = self
            .registry
            .resolve_capture(sensor.kind)
            .and_then(|source| Ok((source, self.registry.resolve_store(sensor.kind)?)));
        let (source, store) = match capabilities {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(sensor = %name, kind = %sensor.kind, error = %e, "Cannot save frame");
                return;
            }
        };

        let target = save.target_path(&timestamp.with_timezone(&Local));
        let result = self
            .run_blocking(sensor, move |s| {
                let frame = source.capture(s)?;
                store.save(&frame, &target)?;
                Ok(target)
            })
            .await;

        match result {
            Ok(path) => tracing::debug!(sensor = %name, path = %path.display(), "Frame saved"),
            Err(e) => tracing::warn!(sensor = %name, error = %e, "Frame capture/save failed"),
        }
    }

    /// Run a blocking driver call off the async threads, with the optional timeout.
    async fn run_blocking<T, F>(&self, sensor: &SensorConfig, f: F) -> Result<T, DriverError>
    where
        T: Send + 'static,
        F: FnOnce(&SensorConfig) -> Result<T, DriverError> + Send + 'static,
    {
        let sensor = sensor.clone();
        let task = tokio::task::spawn_blocking(move || f(&sensor));

        let joined = match self.driver_timeout {
            Some(limit) => tokio::time::timeout(limit, task)
                .await
                .map_err(|_| DriverError::Timeout)?,
            None => task.await,
        };
        joined.map_err(|e| DriverError::Task(e.to_string()))?
    }
}
