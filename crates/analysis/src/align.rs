//! Raster alignment
//!
//! Reconciles a target raster against a reference raster's grid so the two
//! can be compared pixel for pixel. If CRS, shape, and transform already
//! match, the target is returned untouched; if any differ, band 1 of the
//! target is resampled onto the reference grid with the reference's nodata
//! as destination nodata.
//!
//! The resampling method is a caller contract, not inferred here:
//! nearest-neighbor for categorical rasters, average for continuous ones.

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::maybe_rayon::*;
use crate::meta::{open_band, resolve_meta, RasterMeta};
use crate::workspace::Workspace;
use landmon_core::crs::transform_point;
use landmon_core::io::write_geotiff;
use landmon_core::{Crs, Raster};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resampling algorithm for regridding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resampling {
    /// Nearest-neighbor: for categorical rasters
    Nearest,
    /// Mean of covered source pixels: for continuous rasters
    Average,
}

/// Align `target` against `reference`.
///
/// Returns the path of a raster on the reference grid together with the
/// reference's nodata value. When the grids already match (or the two paths
/// are the same file) the target path is returned unchanged; otherwise a
/// resampled copy is written to the workspace.
pub fn align(
    reference: &Path,
    target: &Path,
    method: Resampling,
    config: &EngineConfig,
    workspace: &Workspace,
) -> Result<(PathBuf, f64)> {
    if reference == target {
        let meta = resolve_meta(reference, config)?;
        return Ok((target.to_path_buf(), meta.nodata));
    }

    let ref_meta = resolve_meta(reference, config)?;
    let tgt_meta = resolve_meta(target, config)?;

    if grids_match(&ref_meta, &tgt_meta) {
        return Ok((target.to_path_buf(), ref_meta.nodata));
    }

    debug!(
        reference = %reference.display(),
        target = %target.display(),
        "grids differ; resampling target onto reference grid"
    );

    let source = open_band(target, config)?;
    let aligned = regrid(&source, &ref_meta, method)?;

    let out_path = workspace.temp_raster("aligned");
    write_geotiff(&aligned, &out_path, None)?;

    Ok((out_path, ref_meta.nodata))
}

/// Whether two grids are pixel-for-pixel comparable
fn grids_match(reference: &RasterMeta, target: &RasterMeta) -> bool {
    let crs_match = match (&reference.crs, &target.crs) {
        (Some(a), Some(b)) => a.is_equivalent(b),
        (None, None) => true,
        _ => false,
    };
    crs_match && reference.shape() == target.shape() && reference.transform == target.transform
}

/// Resample `source` onto the grid described by `dest_meta`
fn regrid(source: &Raster<f64>, dest_meta: &RasterMeta, method: Resampling) -> Result<Raster<f64>> {
    let (rows, cols) = dest_meta.shape();
    let nodata = dest_meta.nodata;
    let mapper = CoordMapper::new(dest_meta.crs.as_ref(), source.crs())?;
    let dest_transform = dest_meta.transform;

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![nodata; cols];
            for col in 0..cols {
                let sample = match method {
                    Resampling::Nearest => {
                        let (x, y) = dest_transform.pixel_to_geo(col, row);
                        sample_nearest(source, mapper.map(x, y))
                    }
                    Resampling::Average => {
                        sample_average(source, &dest_transform, &mapper, col, row)
                    }
                };
                if let Some(v) = sample {
                    row_data[col] = v;
                }
            }
            row_data
        })
        .collect();

    let mut out: Raster<f64> = Raster::from_vec(data, rows, cols)?;
    out.set_transform(dest_meta.transform);
    out.set_crs(dest_meta.crs.clone());
    out.set_nodata(Some(nodata));
    Ok(out)
}

fn sample_nearest(source: &Raster<f64>, point: (f64, f64)) -> Option<f64> {
    let (x, y) = point;
    if !x.is_finite() || !y.is_finite() {
        return None;
    }
    let (fc, fr) = source.geo_to_pixel(x, y);
    if fc < 0.0 || fr < 0.0 {
        return None;
    }
    let (col, row) = (fc.floor() as usize, fr.floor() as usize);
    if row >= source.rows() || col >= source.cols() {
        return None;
    }
    let v = unsafe { source.get_unchecked(row, col) };
    if source.is_nodata(v) {
        None
    } else {
        Some(v)
    }
}

/// Mean of the valid source pixels covered by the destination pixel's
/// footprint
fn sample_average(
    source: &Raster<f64>,
    dest_transform: &landmon_core::GeoTransform,
    mapper: &CoordMapper,
    col: usize,
    row: usize,
) -> Option<f64> {
    let corners = [
        dest_transform.pixel_to_geo_corner(col, row),
        dest_transform.pixel_to_geo_corner(col + 1, row),
        dest_transform.pixel_to_geo_corner(col, row + 1),
        dest_transform.pixel_to_geo_corner(col + 1, row + 1),
    ];

    let mut min_c = f64::MAX;
    let mut max_c = f64::MIN;
    let mut min_r = f64::MAX;
    let mut max_r = f64::MIN;
    for (x, y) in corners {
        let (sx, sy) = mapper.map(x, y);
        if !sx.is_finite() || !sy.is_finite() {
            return None;
        }
        let (fc, fr) = source.geo_to_pixel(sx, sy);
        min_c = min_c.min(fc);
        max_c = max_c.max(fc);
        min_r = min_r.min(fr);
        max_r = max_r.max(fr);
    }

    let c0 = min_c.floor().max(0.0) as usize;
    let r0 = min_r.floor().max(0.0) as usize;
    let c1 = (max_c.ceil() as isize - 1).max(c0 as isize) as usize;
    let r1 = (max_r.ceil() as isize - 1).max(r0 as isize) as usize;
    if c0 >= source.cols() || r0 >= source.rows() {
        return None;
    }
    let c1 = c1.min(source.cols() - 1);
    let r1 = r1.min(source.rows() - 1);

    let mut sum = 0.0;
    let mut count = 0usize;
    for r in r0..=r1 {
        for c in c0..=c1 {
            let v = unsafe { source.get_unchecked(r, c) };
            if !source.is_nodata(v) {
                sum += v;
                count += 1;
            }
        }
    }

    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Precomputed coordinate mapping from the destination CRS into the source
/// CRS. Unsupported CRS pairs are rejected up front so the pixel loop stays
/// infallible.
struct CoordMapper {
    projection: Option<(Crs, Crs)>,
}

impl CoordMapper {
    fn new(dest: Option<&Crs>, source: Option<&Crs>) -> Result<Self> {
        match (dest, source) {
            (Some(d), Some(s)) if !d.is_equivalent(s) => {
                // Probe once; transform support does not depend on the point.
                transform_point(d, s, 0.0, 0.0).map_err(|_| {
                    EngineError::UnsupportedReprojection {
                        from: d.identifier(),
                        to: s.identifier(),
                    }
                })?;
                Ok(Self {
                    projection: Some((d.clone(), s.clone())),
                })
            }
            _ => Ok(Self { projection: None }),
        }
    }

    fn map(&self, x: f64, y: f64) -> (f64, f64) {
        match &self.projection {
            None => (x, y),
            Some((from, to)) => {
                transform_point(from, to, x, y).unwrap_or((f64::NAN, f64::NAN))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use landmon_core::GeoTransform;

    fn write_raster(
        values: Vec<f64>,
        rows: usize,
        cols: usize,
        transform: GeoTransform,
        nodata: f64,
        workspace: &Workspace,
    ) -> PathBuf {
        let mut raster = Raster::from_vec(values, rows, cols).unwrap();
        raster.set_transform(transform);
        raster.set_crs(Some(Crs::from_epsg(32630)));
        raster.set_nodata(Some(nodata));
        let path = workspace.temp_raster("test");
        write_geotiff(&raster, &path, None).unwrap();
        path
    }

    fn test_setup() -> (EngineConfig, Workspace) {
        let config = EngineConfig {
            output_dir: std::env::temp_dir().join("landmon_align_test"),
            ..EngineConfig::default()
        };
        let ws = Workspace::create(&config).unwrap();
        (config, ws)
    }

    #[test]
    fn same_file_is_a_noop() {
        let (config, ws) = test_setup();
        let gt = GeoTransform::new(0.0, 100.0, 10.0, -10.0);
        let path = write_raster(vec![1.0; 100], 10, 10, gt, -9999.0, &ws);

        let (aligned, nodata) = align(&path, &path, Resampling::Nearest, &config, &ws).unwrap();
        assert_eq!(aligned, path);
        assert_eq!(nodata, -9999.0);
    }

    #[test]
    fn matching_grids_return_target_unchanged() {
        let (config, ws) = test_setup();
        let gt = GeoTransform::new(0.0, 100.0, 10.0, -10.0);
        let a = write_raster(vec![1.0; 100], 10, 10, gt, -9999.0, &ws);
        let b = write_raster(vec![2.0; 100], 10, 10, gt, -9999.0, &ws);

        let (aligned, nodata) = align(&a, &b, Resampling::Nearest, &config, &ws).unwrap();
        assert_eq!(aligned, b);
        assert_eq!(nodata, -9999.0);
    }

    #[test]
    fn alignment_is_idempotent() {
        let (config, ws) = test_setup();
        let ref_gt = GeoTransform::new(0.0, 100.0, 10.0, -10.0);
        let tgt_gt = GeoTransform::new(0.0, 100.0, 20.0, -20.0);
        let reference = write_raster(vec![1.0; 100], 10, 10, ref_gt, -9999.0, &ws);
        let target = write_raster(vec![2.0; 25], 5, 5, tgt_gt, -9999.0, &ws);

        let (first, _) = align(&reference, &target, Resampling::Nearest, &config, &ws).unwrap();
        assert_ne!(first, target);

        // Re-aligning the already aligned raster must be a no-op.
        let (second, _) = align(&reference, &first, Resampling::Nearest, &config, &ws).unwrap();
        assert_eq!(second, first);
    }

    #[test]
    fn nearest_resamples_coarser_grid() {
        let (config, ws) = test_setup();
        // Reference: 4x4 at 5m; target: 2x2 at 10m covering the same extent.
        let ref_gt = GeoTransform::new(0.0, 20.0, 5.0, -5.0);
        let tgt_gt = GeoTransform::new(0.0, 20.0, 10.0, -10.0);
        let reference = write_raster(vec![0.0; 16], 4, 4, ref_gt, -9999.0, &ws);
        let target = write_raster(vec![1.0, 2.0, 3.0, 4.0], 2, 2, tgt_gt, -9999.0, &ws);

        let (aligned, nodata) =
            align(&reference, &target, Resampling::Nearest, &config, &ws).unwrap();
        let result: Raster<f64> = landmon_core::io::read_geotiff(&aligned, None).unwrap();

        assert_eq!(result.shape(), (4, 4));
        assert_eq!(nodata, -9999.0);
        // Each target cell expands to a 2x2 block in the reference grid.
        assert_eq!(result.get(0, 0).unwrap(), 1.0);
        assert_eq!(result.get(0, 3).unwrap(), 2.0);
        assert_eq!(result.get(3, 0).unwrap(), 3.0);
        assert_eq!(result.get(3, 3).unwrap(), 4.0);
    }

    #[test]
    fn average_pools_finer_grid() {
        let (config, ws) = test_setup();
        // Reference: 1x1 at 20m; target: 2x2 at 10m covering the same extent.
        let ref_gt = GeoTransform::new(0.0, 20.0, 20.0, -20.0);
        let tgt_gt = GeoTransform::new(0.0, 20.0, 10.0, -10.0);
        let reference = write_raster(vec![0.0], 1, 1, ref_gt, -9999.0, &ws);
        let target = write_raster(vec![1.0, 2.0, 3.0, 6.0], 2, 2, tgt_gt, -9999.0, &ws);

        let (aligned, _) = align(&reference, &target, Resampling::Average, &config, &ws).unwrap();
        let result: Raster<f64> = landmon_core::io::read_geotiff(&aligned, None).unwrap();

        assert_eq!(result.shape(), (1, 1));
        assert!((result.get(0, 0).unwrap() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn missing_reference_is_fatal() {
        let (config, ws) = test_setup();
        let gt = GeoTransform::new(0.0, 10.0, 1.0, -1.0);
        let target = write_raster(vec![1.0; 100], 10, 10, gt, -9999.0, &ws);

        let result = align(
            Path::new("/nonexistent/ref.tif"),
            &target,
            Resampling::Nearest,
            &config,
            &ws,
        );
        assert!(matches!(result, Err(EngineError::RasterNotFound(_))));
    }
}
