//! Engine configuration

use crate::clip::PixelInclusion;
use serde::Deserialize;
use std::path::PathBuf;

/// Configuration shared by every analysis invocation.
///
/// Loadable from JSON; all fields have defaults matching the deployed
/// system's settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Nodata value substituted when a raster declares none, or declares one
    /// outside the representable integer range
    pub default_nodata: f64,

    /// Lower bound of the representable integer range for analysis outputs
    pub min_int: f64,

    /// Upper bound of the representable integer range for analysis outputs
    pub max_int: f64,

    /// Pixel inclusion policy used when masking rasters to a region
    pub clip_policy: PixelInclusion,

    /// Whether derived rasters are pushed to the tile service after assembly
    pub enable_tiles: bool,

    /// Directory where derivative rasters are persisted
    pub output_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_nodata: -9999.0,
            min_int: i32::MIN as f64,
            max_int: i32::MAX as f64,
            clip_policy: PixelInclusion::AllTouched,
            enable_tiles: false,
            output_dir: PathBuf::from("landmon_outputs"),
        }
    }
}

impl EngineConfig {
    /// Resolve a possibly-missing or out-of-range nodata declaration.
    ///
    /// Declared values outside `[min_int, max_int]` are replaced by the
    /// default so derived integer rasters can carry them.
    pub fn resolve_nodata(&self, declared: Option<f64>) -> f64 {
        match declared {
            Some(nd) if nd >= self.min_int && nd <= self.max_int => nd,
            _ => self.default_nodata,
        }
    }
}
