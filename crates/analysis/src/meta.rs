//! Grid metadata resolution
//!
//! Reads a raster's georeferencing (CRS, transform, shape, nodata) without
//! the caller touching pixel values, normalizing the nodata declaration
//! against the configured integer range.

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use landmon_core::io::read_geotiff;
use landmon_core::{Crs, GeoTransform, Raster};
use std::path::Path;

/// Resolved grid metadata of a raster file
#[derive(Debug, Clone)]
pub struct RasterMeta {
    pub crs: Option<Crs>,
    pub transform: GeoTransform,
    pub rows: usize,
    pub cols: usize,
    pub band_count: usize,
    /// Declared nodata, normalized through [`EngineConfig::resolve_nodata`]
    pub nodata: f64,
}

impl RasterMeta {
    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }
}

/// Resolve the grid metadata of a raster file.
///
/// A missing file is fatal for the containing analysis call and surfaces as
/// [`EngineError::RasterNotFound`].
pub fn resolve_meta(path: &Path, config: &EngineConfig) -> Result<RasterMeta> {
    let raster = open_band(path, config)?;
    Ok(RasterMeta {
        crs: raster.crs().cloned(),
        transform: *raster.transform(),
        rows: raster.rows(),
        cols: raster.cols(),
        band_count: 1,
        nodata: raster.nodata().unwrap_or(config.default_nodata),
    })
}

/// Open band 1 of a raster with its nodata normalized.
///
/// The returned raster always carries a usable nodata value: the declared
/// one when it is inside the configured integer range, the configured
/// default otherwise.
pub fn open_band(path: &Path, config: &EngineConfig) -> Result<Raster<f64>> {
    if !path.exists() {
        return Err(EngineError::RasterNotFound(path.to_path_buf()));
    }
    let mut raster: Raster<f64> = read_geotiff(path, Some(1))?;
    let nodata = config.resolve_nodata(raster.nodata());
    raster.set_nodata(Some(nodata));
    Ok(raster)
}

#[cfg(test)]
mod tests {
    use super::*;
    use landmon_core::io::write_geotiff;

    #[test]
    fn missing_file_is_fatal() {
        let config = EngineConfig::default();
        let result = resolve_meta(Path::new("/nonexistent/raster.tif"), &config);
        assert!(matches!(result, Err(EngineError::RasterNotFound(_))));
    }

    #[test]
    fn undeclared_nodata_gets_default() {
        let config = EngineConfig::default();
        let raster: Raster<f64> = Raster::filled(4, 4, 1.0);

        let tmp = tempfile::NamedTempFile::with_suffix(".tif").unwrap();
        write_geotiff(&raster, tmp.path(), None).unwrap();

        let meta = resolve_meta(tmp.path(), &config).unwrap();
        assert_eq!(meta.nodata, config.default_nodata);
        assert_eq!(meta.shape(), (4, 4));
        assert_eq!(meta.band_count, 1);
    }

    #[test]
    fn declared_nodata_is_kept() {
        let config = EngineConfig::default();
        let mut raster: Raster<f64> = Raster::filled(4, 4, 1.0);
        raster.set_nodata(Some(255.0));

        let tmp = tempfile::NamedTempFile::with_suffix(".tif").unwrap();
        write_geotiff(&raster, tmp.path(), None).unwrap();

        let meta = resolve_meta(tmp.path(), &config).unwrap();
        assert_eq!(meta.nodata, 255.0);
    }
}
