//! Application configuration structures.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sensor::{SensorConfig, SensorSet};
use crate::storage::DEFAULT_REQUEST_TIMEOUT;

use super::sensors::{load_sensors_from_dir, merge_sensors};
use super::validation::{ConfigError, expand_env_vars};

// =============================================================================
// Constants
// =============================================================================

/// Default sampling interval (60 seconds).
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Minimum sampling interval (1 second).
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Default camera warm-up before the still is taken (2 seconds).
pub const DEFAULT_CAMERA_WARMUP: Duration = Duration::from_secs(2);

fn default_interval() -> Duration {
    DEFAULT_INTERVAL
}

fn default_influx_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

fn default_camera_warmup() -> Duration {
    DEFAULT_CAMERA_WARMUP
}

// =============================================================================
// InfluxDB Configuration
// =============================================================================

/// InfluxDB (1.x HTTP API) connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfluxConfig {
    /// Base URL, e.g. `http://localhost:8086`. Supports `${VAR}` expansion.
    #[serde(default = "default_influx_url")]
    pub url: String,

    /// Target database (created on startup if missing).
    #[serde(default = "default_database")]
    pub database: String,

    /// Optional user name. Supports `${VAR}` expansion.
    #[serde(default)]
    pub username: Option<String>,

    /// Optional password. Supports `${VAR}` expansion.
    #[serde(default)]
    pub password: Option<String>,

    /// Per-request timeout (default: 10s).
    #[serde(default = "default_influx_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

fn default_influx_url() -> String {
    "http://localhost:8086".to_string()
}

fn default_database() -> String {
    "sensorpi".to_string()
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            url: default_influx_url(),
            database: default_database(),
            username: None,
            password: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl InfluxConfig {
    /// URL with environment variables expanded.
    pub fn resolved_url(&self) -> String {
        expand_env_vars(&self.url)
    }

    /// Credentials with environment variables expanded.
    pub fn resolved_credentials(&self) -> (Option<String>, Option<String>) {
        (
            self.username.as_deref().map(expand_env_vars),
            self.password.as_deref().map(expand_env_vars),
        )
    }
}

// =============================================================================
// Run Configuration
// =============================================================================

/// Sampling loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Period between cycle starts (default: 60s, minimum: 1s).
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Measurement name every record is written under.
    #[serde(default)]
    pub measurement: Option<String>,

    /// Upper bound for a single driver call. Unbounded when absent.
    #[serde(default, with = "humantime_serde")]
    pub driver_timeout: Option<Duration>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            measurement: None,
            driver_timeout: None,
        }
    }
}

impl RunConfig {
    /// Interval actually used by the loop.
    ///
    /// Interval is clamped to a minimum of 1 second.
    pub fn effective_interval(&self) -> Duration {
        if self.interval < MIN_INTERVAL {
            tracing::warn!(min_interval = ?MIN_INTERVAL, configured = ?self.interval,
                "Interval is less than minimum allowed. Using minimum interval."
            );
            MIN_INTERVAL
        } else {
            self.interval
        }
    }

    /// The measurement name, once validation has guaranteed it is set.
    pub fn measurement_name(&self) -> &str {
        self.measurement.as_deref().unwrap_or_default()
    }
}

// =============================================================================
// Hardware Configuration
// =============================================================================

/// Where the built-in drivers find their devices.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    /// I2C bus device node (default: "/dev/i2c-1").
    pub i2c_bus: PathBuf,

    /// 1-Wire sysfs root (default: "/sys/bus/w1/devices").
    pub w1_root: PathBuf,

    /// IIO sysfs root (default: "/sys/bus/iio/devices").
    pub iio_root: PathBuf,

    /// Still-capture program writing a JPEG to stdout (default: "rpicam-still").
    pub camera_command: String,

    /// Preview time given to the camera before capture (default: 2s).
    #[serde(default = "default_camera_warmup", with = "humantime_serde")]
    pub camera_warmup: Duration,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            i2c_bus: PathBuf::from("/dev/i2c-1"),
            w1_root: PathBuf::from("/sys/bus/w1/devices"),
            iio_root: PathBuf::from("/sys/bus/iio/devices"),
            camera_command: "rpicam-still".to_string(),
            camera_warmup: DEFAULT_CAMERA_WARMUP,
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// InfluxDB sink configuration.
    #[serde(default)]
    pub influx: InfluxConfig,

    /// Sampling loop configuration.
    #[serde(default)]
    pub run: RunConfig,

    /// Device locations for the built-in drivers.
    #[serde(default)]
    pub hardware: HardwareConfig,

    /// Sensor name to configuration. Absent is distinct from empty.
    #[serde(default)]
    pub sensors: Option<BTreeMap<String, SensorConfig>>,

    /// Path to a directory with additional sensor config files.
    #[serde(default)]
    pub sensor_path: Option<String>,
}

impl AppConfig {
    /// Load and validate configuration from a YAML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = Self::from_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a YAML file and merge the `sensor_path` directory, without validating.
    ///
    /// Callers that apply overrides (CLI, env) should call [`AppConfig::validate`]
    /// afterwards.
    ///
    /// # Errors
    /// Returns `ConfigError` if a file cannot be read or parsed, or a sensor
    /// name is defined twice.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let mut config = Self::from_yaml(&content)?;

        if let Some(ref sensor_dir) = config.sensor_path {
            let additional = load_sensors_from_dir(sensor_dir)?;
            merge_sensors(
                config.sensors.get_or_insert_with(BTreeMap::new),
                additional,
                sensor_dir,
            )?;
        }

        Ok(config)
    }

    /// Parse configuration from a YAML string, without validating.
    ///
    /// # Errors
    /// Returns `ConfigError::ParseError` on malformed YAML or unknown sensor types.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::MissingSensors` if no `sensors` key was given and
    /// `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.run.interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "run interval must be non-zero".to_string(),
            ));
        }

        match self.run.measurement.as_deref().map(str::trim) {
            None | Some("") => {
                return Err(ConfigError::ValidationError(
                    "run measurement name cannot be empty".to_string(),
                ));
            }
            Some(_) => {}
        }

        let url = self.influx.resolved_url();
        url::Url::parse(&url).map_err(|e| {
            ConfigError::ValidationError(format!("invalid influx url '{}': {}", url, e))
        })?;

        if self.influx.database.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "influx database cannot be empty".to_string(),
            ));
        }

        if self.influx.timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "influx timeout must be non-zero".to_string(),
            ));
        }

        if self.run.driver_timeout.is_some_and(|d| d.is_zero()) {
            return Err(ConfigError::ValidationError(
                "run driver_timeout must be non-zero".to_string(),
            ));
        }

        self.sensor_set()?;

        Ok(())
    }

    /// Build the validated sensor set.
    ///
    /// # Errors
    /// Returns `ConfigError::MissingSensors` if the key was absent, otherwise
    /// whatever [`SensorSet::new`] rejects.
    pub fn sensor_set(&self) -> Result<SensorSet, ConfigError> {
        let sensors = self.sensors.as_ref().ok_or(ConfigError::MissingSensors)?;
        SensorSet::new(sensors.clone())
    }
}
