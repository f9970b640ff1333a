/// Session configuration
///
/// JSON-backed settings: row columns, invalid-row handling, the colour scale,
/// source and layer ids, and the initial camera.

use crate::aggregate::InvalidRowPolicy;
use crate::constants::{
    DEFAULT_CENTER, DEFAULT_FILL_OPACITY, DEFAULT_LAYER_ID, DEFAULT_SOURCE_ID, DEFAULT_ZOOM,
};
use crate::error::{Error, Result};
use crate::row_source::ColumnMapping;
use crate::styling::StylingThresholds;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Session configuration. Every field has a default, so a partial JSON
/// document only overrides what it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub columns: ColumnMapping,
    pub invalid_rows: InvalidRowPolicy,
    pub styling: StylingThresholds,
    pub source_id: String,
    pub layer_id: String,
    pub fill_opacity: f64,
    /// `[lng, lat]`
    pub initial_center: [f64; 2],
    pub initial_zoom: f64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            columns: ColumnMapping::default(),
            invalid_rows: InvalidRowPolicy::default(),
            styling: StylingThresholds::default(),
            source_id: DEFAULT_SOURCE_ID.to_string(),
            layer_id: DEFAULT_LAYER_ID.to_string(),
            fill_opacity: DEFAULT_FILL_OPACITY,
            initial_center: DEFAULT_CENTER,
            initial_zoom: DEFAULT_ZOOM,
        }
    }
}

impl MapConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: MapConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.fill_opacity) {
            return Err(Error::Config(format!(
                "fill_opacity must be within [0, 1], got {}",
                self.fill_opacity
            )));
        }
        if self.source_id.is_empty() || self.layer_id.is_empty() {
            return Err(Error::Config("source_id and layer_id must not be empty".into()));
        }
        if self.columns.lat_column.is_empty() || self.columns.lng_column.is_empty() {
            return Err(Error::Config("coordinate column names must not be empty".into()));
        }
        // styling is validated on construction / deserialization
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MapConfig::default();
        assert_eq!(config.source_id, "h3_index");
        assert_eq!(config.invalid_rows, InvalidRowPolicy::FailFast);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_override() {
        let config = MapConfig::from_json_str(
            r#"{"columns": {"lat_column": "Latitude", "lng_column": "Longitude"}, "invalid_rows": "skip"}"#,
        )
        .unwrap();
        assert_eq!(config.columns.lat_column, "Latitude");
        assert_eq!(config.columns.count_column, None);
        assert_eq!(config.invalid_rows, InvalidRowPolicy::Skip);
        assert_eq!(config.layer_id, "h3_index");
    }

    #[test]
    fn test_rejects_invalid() {
        assert!(matches!(
            MapConfig::from_json_str(r#"{"fill_opacity": 1.5}"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            MapConfig::from_json_str(r#"{"invalid_rows": "retry"}"#),
            Err(Error::Json(_))
        ));
        assert!(MapConfig::from_file("/path/that/does/not/exist.json").is_err());
    }
}
