//! Configuration file – reads/writes `~/.proxima/config.toml`.

use proxima_runtime::PipelineConfig;
use proxima_types::SensorId;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

/// Persisted configuration stored in `~/.proxima/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Unique id reported by the radar board.  Used to pick the mounting
    /// position when `pipeline.sensor` is left undefined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware_uid: Option<u8>,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl Config {
    /// The pipeline configuration with the mounting position resolved.
    ///
    /// An explicit sensor always wins; otherwise the hardware uid is looked
    /// up.  Unknown uids leave the sensor undefined (identity transform).
    pub fn effective_pipeline(&self) -> PipelineConfig {
        let mut pipeline = self.pipeline.clone();
        if pipeline.sensor == SensorId::Undefined {
            if let Some(uid) = self.hardware_uid {
                match SensorId::from_hardware_uid(uid) {
                    Some(sensor) => {
                        debug!(uid, %sensor, "sensor resolved from hardware uid");
                        pipeline.sensor = sensor;
                    }
                    None => warn!(uid, "unknown hardware uid; sensor stays undefined"),
                }
            }
        }
        pipeline
    }
}

/// Return the path to `~/.proxima/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".proxima").join("config.toml")
}

/// Load the config from a specific path.  Returns `None` if the file does not
/// exist.
pub fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config = toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Load the file (or the defaults when it is missing) and apply the
/// environment overrides.
pub fn load_effective(path: &Path) -> Result<Config, String> {
    let mut cfg = load_from(path)?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Apply `PROXIMA_*` environment variable overrides to `cfg`.
///
/// Unparseable values are ignored.
///
/// | Variable | Config field |
/// |---|---|
/// | `PROXIMA_SENSOR` | `pipeline.sensor` (name or wire value) |
/// | `PROXIMA_EPSILON` | `pipeline.clustering.epsilon_m` |
/// | `PROXIMA_MIN_POINTS` | `pipeline.clustering.min_points` |
/// | `PROXIMA_TAIL_ARRAY` | `pipeline.tail_array` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("PROXIMA_SENSOR")
        && let Ok(sensor) = SensorId::from_str(&v)
    {
        cfg.pipeline.sensor = sensor;
    }
    if let Ok(v) = std::env::var("PROXIMA_EPSILON")
        && let Ok(epsilon) = v.parse::<f32>()
    {
        cfg.pipeline.clustering.epsilon_m = epsilon;
    }
    if let Ok(v) = std::env::var("PROXIMA_MIN_POINTS")
        && let Ok(min_points) = v.parse::<u8>()
    {
        cfg.pipeline.clustering.min_points = min_points;
    }
    if let Ok(v) = std::env::var("PROXIMA_TAIL_ARRAY")
        && let Some(tail_array) = parse_flag(&v)
    {
        cfg.pipeline.tail_array = tail_array;
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Render the config as TOML.
pub fn to_toml(cfg: &Config) -> Result<String, String> {
    toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))
}

/// Save the config to a specific path, creating the parent directory.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw = to_toml(cfg)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
