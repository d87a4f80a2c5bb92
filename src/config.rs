//! Engine tuning knobs. Every section is `#[serde(default)]` so a partial
//! JSON file only overrides what it names.

use crate::error::{MapError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub camera: CameraConfig,
    pub markers: MarkerConfig,
    pub reconciler: ReconcilerConfig,
    pub controller: ControllerConfig,
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Load when a path is given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        let c = &self.camera;
        if c.min_zoom > c.max_zoom {
            return Err(MapError::config(format!(
                "camera.min_zoom ({}) exceeds camera.max_zoom ({})",
                c.min_zoom, c.max_zoom
            )));
        }
        if c.zoom_out_step <= 0.0 {
            return Err(MapError::config("camera.zoom_out_step must be positive"));
        }
        // The guard is re-armed per phase and must outlast the longest one
        let longest = c.pan_duration_ms.max(c.zoom_duration_ms).max(c.fit_duration_ms);
        if c.guard_timeout_ms <= longest {
            return Err(MapError::config(format!(
                "camera.guard_timeout_ms ({}) must exceed the longest transition ({longest} ms)",
                c.guard_timeout_ms
            )));
        }
        if self.markers.cache_capacity == 0 {
            return Err(MapError::config("markers.cache_capacity must be at least 1"));
        }
        Ok(())
    }
}

/// Camera Animator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Ceiling for the target-zoom heuristic and bounds fits
    pub max_zoom: f64,
    /// Floor for zoom-out on deselect
    pub min_zoom: f64,
    pub zoom_out_step: f64,
    pub fit_padding_px: f64,
    pub fit_duration_ms: u64,
    pub pan_duration_ms: u64,
    pub zoom_duration_ms: u64,
    /// Pan then zoom on selection; false uses one bounds fit
    pub two_phase_selection: bool,
    /// Extra right-hand margin while the attributes panel is open
    pub panel_padding_px: f64,
    /// Guard is force-cleared if no `ActionEnd` arrives in time
    pub guard_timeout_ms: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            max_zoom: 16.0,
            min_zoom: 10.0,
            zoom_out_step: 2.0,
            fit_padding_px: 100.0,
            fit_duration_ms: 2000,
            pan_duration_ms: 600,
            zoom_duration_ms: 600,
            two_phase_selection: true,
            panel_padding_px: 0.0,
            guard_timeout_ms: 5000,
        }
    }
}

impl CameraConfig {
    pub fn fit_duration(&self) -> Duration {
        Duration::from_millis(self.fit_duration_ms)
    }

    pub fn pan_duration(&self) -> Duration {
        Duration::from_millis(self.pan_duration_ms)
    }

    pub fn zoom_duration(&self) -> Duration {
        Duration::from_millis(self.zoom_duration_ms)
    }

    pub fn guard_timeout(&self) -> Duration {
        Duration::from_millis(self.guard_timeout_ms)
    }
}

/// Marker sizes (pixels) and stacking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    pub normal_size: u32,
    pub hover_size: u32,
    pub selected_size: u32,
    pub cache_capacity: usize,
    pub base_z: i32,
    pub selected_z: i32,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            normal_size: 6,
            hover_size: 8,
            selected_size: 10,
            cache_capacity: 512,
            base_z: 10,
            selected_z: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Centroid markers are hidden when zoom is above this
    pub marker_hide_zoom: f64,
    /// Added to a shape's stroke width while hovered
    pub hover_stroke_boost: f64,
    pub hover_fill_opacity_boost: f64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            marker_hide_zoom: 17.0,
            hover_stroke_boost: 1.5,
            hover_fill_opacity_boost: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub resize_debounce_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self { resize_debounce_ms: 100 }
    }
}

impl ControllerConfig {
    pub fn resize_debounce(&self) -> Duration {
        Duration::from_millis(self.resize_debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.camera.max_zoom, 16.0);
        assert_eq!(config.camera.min_zoom, 10.0);
        assert_eq!(config.camera.fit_duration(), Duration::from_secs(2));
        assert_eq!(config.markers.cache_capacity, 512);
        assert_eq!(config.controller.resize_debounce(), Duration::from_millis(100));
    }

    #[test]
    fn test_partial_json_keeps_other_defaults() {
        let config = EngineConfig::from_json(r#"{ "camera": { "max_zoom": 18 }, "markers": { "hover_size": 9 } }"#).unwrap();
        assert_eq!(config.camera.max_zoom, 18.0);
        assert_eq!(config.camera.zoom_out_step, 2.0);
        assert_eq!(config.markers.hover_size, 9);
        assert_eq!(config.markers.normal_size, 6);
        assert_eq!(config.reconciler, ReconcilerConfig::default());
    }

    #[test]
    fn test_empty_object_is_default() {
        assert_eq!(EngineConfig::from_json("{}").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_rejects_inverted_zoom_range() {
        let err = EngineConfig::from_json(r#"{ "camera": { "min_zoom": 17, "max_zoom": 12 } }"#).unwrap_err();
        assert!(matches!(err, MapError::Config(_)));
    }

    #[test]
    fn test_rejects_guard_shorter_than_transition() {
        let err = EngineConfig::from_json(r#"{ "camera": { "pan_duration_ms": 6000 } }"#).unwrap_err();
        assert!(matches!(err, MapError::Config(_)));
        let err = EngineConfig::from_json(r#"{ "camera": { "guard_timeout_ms": 2000 } }"#).unwrap_err();
        assert!(matches!(err, MapError::Config(_)));
        assert!(EngineConfig::from_json(r#"{ "camera": { "guard_timeout_ms": 2001 } }"#).is_ok());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = EngineConfig::load(Path::new("/nonexistent/parcel-map.json")).unwrap_err();
        assert!(matches!(err, MapError::Io(_)));
    }
}
