//! Review settings: JSON file, then environment overrides.
//!
//! ```json
//! {
//!   "rotation_sensitivity": 200.0,
//!   "upload_timeout_ms": 30000,
//!   "map_center": {"latitude": 37.542, "longitude": 127.049},
//!   "limits": {"max_image_bytes": 10485760}
//! }
//! ```
//!
//! Missing keys keep their defaults.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use foundation::math::GeoPoint;
use markers::{FovTable, RotationSensitivity};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::validation::UploadLimits;

pub const ENV_SENSITIVITY_PX: &str = "PHOTO_REVIEW_SENSITIVITY_PX";
pub const ENV_UPLOAD_TIMEOUT_MS: &str = "PHOTO_REVIEW_UPLOAD_TIMEOUT_MS";

pub const DEFAULT_UPLOAD_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MAP_CENTER: GeoPoint = GeoPoint::new(37.5420, 127.0490);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Upward drag, in pixels, that rotates a marker one full turn.
    pub rotation_sensitivity: RotationSensitivity,
    pub upload_timeout_ms: u64,
    pub fov_table: FovTable,
    pub limits: UploadLimits,
    /// Where the map opens before any photo is placed.
    pub map_center: GeoPoint,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            rotation_sensitivity: RotationSensitivity::default(),
            upload_timeout_ms: DEFAULT_UPLOAD_TIMEOUT_MS,
            fov_table: FovTable::default(),
            limits: UploadLimits::default(),
            map_center: DEFAULT_MAP_CENTER,
        }
    }
}

impl ReviewConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Applies overrides from `lookup` (an env-like key → value source).
    pub fn apply_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(value) = lookup(ENV_SENSITIVITY_PX) {
            let px = parse_var::<f64>(ENV_SENSITIVITY_PX, &value)?;
            self.rotation_sensitivity = RotationSensitivity::new(px);
        }
        if let Some(value) = lookup(ENV_UPLOAD_TIMEOUT_MS) {
            self.upload_timeout_ms = parse_var(ENV_UPLOAD_TIMEOUT_MS, &value)?;
        }
        self.validate()
    }

    /// Defaults (or `path`, if given) with process environment overrides.
    pub fn from_env(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        base.apply_overrides(|key| env::var(key).ok())
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_millis(self.upload_timeout_ms)
    }

    fn validate(mut self) -> Result<Self, ConfigError> {
        self.fov_table.sort_bands();
        let px = self.rotation_sensitivity.pixels_per_turn();
        if !px.is_finite() || px <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "rotation_sensitivity",
                value: px.to_string(),
            });
        }
        if self.upload_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "upload_timeout_ms",
                value: "0".to_string(),
            });
        }
        if self.map_center.validate().is_err() {
            return Err(ConfigError::InvalidValue {
                key: "map_center",
                value: format!("{:?}", self.map_center),
            });
        }
        Ok(self)
    }
}

fn parse_var<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, ReviewConfig, ENV_SENSITIVITY_PX, ENV_UPLOAD_TIMEOUT_MS};
    use std::collections::HashMap;
    use std::io::Write;
    use std::time::Duration;

    use foundation::math::GeoPoint;
    use markers::{FovParameters, RotationSensitivity};
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_object_is_default() {
        let config = ReviewConfig::from_json_str("{}").expect("config");
        assert_eq!(config, ReviewConfig::default());
        assert_eq!(config.upload_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn partial_file_overrides_some_fields() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(
            file,
            r#"{{
                "rotation_sensitivity": 400.0,
                "map_center": {{"latitude": 10.0, "longitude": 20.0}},
                "fov_table": {{
                    "bands": [{{"max_focal_length_mm": 30.0, "fov": {{"aperture_deg": 70.0, "view_distance_m": 90.0}}}}],
                    "telephoto": {{"aperture_deg": 20.0, "view_distance_m": 40.0}},
                    "unknown": {{"aperture_deg": 60.0, "view_distance_m": 80.0}}
                }}
            }}"#
        )
        .expect("write");

        let config = ReviewConfig::load(file.path()).expect("config");
        assert_eq!(config.rotation_sensitivity, RotationSensitivity::new(400.0));
        assert_eq!(config.map_center, GeoPoint::new(10.0, 20.0));
        assert_eq!(config.fov_table.lookup(Some(28.0)), FovParameters::new(70.0, 90.0));
        assert_eq!(config.fov_table.lookup(Some(35.0)), FovParameters::new(20.0, 40.0));
        assert_eq!(config.upload_timeout_ms, 30_000);
    }

    #[test]
    fn loaded_fov_bands_are_sorted() {
        let config = ReviewConfig::from_json_str(
            r#"{"fov_table": {
                "bands": [
                    {"max_focal_length_mm": 85.0, "fov": {"aperture_deg": 28.0, "view_distance_m": 50.0}},
                    {"max_focal_length_mm": 24.0, "fov": {"aperture_deg": 84.0, "view_distance_m": 100.0}}
                ],
                "telephoto": {"aperture_deg": 18.0, "view_distance_m": 40.0},
                "unknown": {"aperture_deg": 65.0, "view_distance_m": 80.0}
            }}"#,
        )
        .expect("config");
        let limits: Vec<f64> = config
            .fov_table
            .bands
            .iter()
            .map(|b| b.max_focal_length_mm)
            .collect();
        assert_eq!(limits, vec![24.0, 85.0]);
        assert_eq!(config.fov_table.lookup(Some(20.0)), FovParameters::new(84.0, 100.0));
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nope.json");
        let err = ReviewConfig::load(&path).expect_err("missing");
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("nope.json"));
    }

    #[test]
    fn env_overrides_apply_and_validate() {
        let vars: HashMap<&str, &str> =
            HashMap::from([(ENV_SENSITIVITY_PX, "100"), (ENV_UPLOAD_TIMEOUT_MS, " 1500 ")]);
        let config = ReviewConfig::default()
            .apply_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .expect("config");
        assert_eq!(config.rotation_sensitivity.pixels_per_turn(), 100.0);
        assert_eq!(config.upload_timeout(), Duration::from_millis(1500));

        let err = ReviewConfig::default()
            .apply_overrides(|k| (k == ENV_SENSITIVITY_PX).then(|| "-5".to_string()))
            .expect_err("negative");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "rotation_sensitivity",
                ..
            }
        ));

        let err = ReviewConfig::default()
            .apply_overrides(|k| (k == ENV_UPLOAD_TIMEOUT_MS).then(|| "soon".to_string()))
            .expect_err("garbage");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: ENV_UPLOAD_TIMEOUT_MS,
                ..
            }
        ));
    }
}
