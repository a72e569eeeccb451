//! Sensor definitions loaded from the main file and an include directory.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::sensor::SensorConfig;

use super::validation::ConfigError;

/// Shape of an included sensor file: a bare `sensors:` map.
#[derive(Debug, Default, Deserialize)]
struct SensorsFile {
    #[serde(default)]
    sensors: BTreeMap<String, SensorConfig>,
}

/// Merge `other` into `base`, refusing to redefine a sensor name.
pub(crate) fn merge_sensors(
    base: &mut BTreeMap<String, SensorConfig>,
    other: BTreeMap<String, SensorConfig>,
    origin: &str,
) -> Result<(), ConfigError> {
    for (name, sensor) in other {
        if base.contains_key(&name) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate sensor name '{}' in {}",
                name, origin
            )));
        }
        base.insert(name, sensor);
    }
    Ok(())
}

/// Load sensor definitions from all YAML files in a directory.
///
/// Files are read in name order so duplicate reports are deterministic.
pub fn load_sensors_from_dir(
    dir_path: impl AsRef<Path>,
) -> Result<BTreeMap<String, SensorConfig>, ConfigError> {
    let dir = dir_path.as_ref();
    if !dir.exists() {
        return Err(ConfigError::ValidationError(format!(
            "sensor_path '{}' does not exist",
            dir.display()
        )));
    }
    if !dir.is_dir() {
        return Err(ConfigError::ValidationError(format!(
            "sensor_path '{}' is not a directory",
            dir.display()
        )));
    }

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if ext == "yaml" || ext == "yml" {
            paths.push(path);
        }
    }
    paths.sort();

    let mut merged = BTreeMap::new();
    for path in paths {
        tracing::debug!("Loading sensor config from: {}", path.display());
        let content = std::fs::read_to_string(&path)?;
        let file: SensorsFile = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ValidationError(format!("failed to parse '{}': {}", path.display(), e))
        })?;
        merge_sensors(&mut merged, file.sensors, &path.display().to_string())?;
    }

    Ok(merged)
}
