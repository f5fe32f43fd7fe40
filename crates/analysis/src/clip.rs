//! Vector clipping
//!
//! Masks a raster to a polygon or multipolygon region of interest and crops
//! the output to the region's bounding box. Pixels outside the region become
//! nodata. The clipped raster is always persisted as well as returned,
//! because downstream steps (reprojection references, file-backed
//! statistics) need a file to reopen.

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::maybe_rayon::*;
use crate::meta::open_band;
use crate::workspace::Workspace;
use geo::{BoundingRect, Contains, Intersects, Point};
use geo_types::{Coord, Geometry, Rect};
use landmon_core::io::write_geotiff;
use landmon_core::Raster;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Policy deciding whether a boundary pixel belongs to the region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelInclusion {
    /// Any overlap between pixel and region counts as inside
    AllTouched,
    /// Only pixels whose center lies inside the region count
    PixelCenter,
}

/// Where the persisted clip output lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipStorage {
    /// Removed when the invocation's workspace drops
    Scratch,
    /// Kept under the configured output directory
    Persistent,
}

/// A clipped raster: the in-memory band plus its persisted file
#[derive(Debug)]
pub struct ClipOutput {
    pub raster: Raster<f64>,
    pub path: PathBuf,
    pub nodata: f64,
}

/// Clip a raster to a vector region.
///
/// The output nodata is `dest_nodata` when supplied, else the source's
/// resolved nodata. Returns `Ok(None)` when the source file does not exist,
/// letting callers short-circuit with a parameter error instead of
/// unwinding.
pub fn clip_to_vector(
    path: &Path,
    geometry: &Geometry<f64>,
    policy: PixelInclusion,
    dest_nodata: Option<f64>,
    storage: ClipStorage,
    config: &EngineConfig,
    workspace: &Workspace,
) -> Result<Option<ClipOutput>> {
    if !path.exists() {
        return Ok(None);
    }

    let source = open_band(path, config)?;
    let nodata = dest_nodata.unwrap_or_else(|| {
        source.nodata().unwrap_or(config.default_nodata)
    });

    let bbox = geometry
        .bounding_rect()
        .ok_or_else(|| EngineError::parameter("clip region has no extent"))?;
    let window = crop_window(&source, &bbox)?;

    let (row0, row1, col0, col1) = window;
    let rows = row1 - row0 + 1;
    let cols = col1 - col0 + 1;
    debug!(rows, cols, "clipping raster to region window");

    let transform = source.transform().for_window(col0, row0);

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|r| {
            let mut row_data = vec![nodata; cols];
            for c in 0..cols {
                let (src_row, src_col) = (row0 + r, col0 + c);
                if !pixel_included(&source, geometry, policy, src_row, src_col) {
                    continue;
                }
                let v = unsafe { source.get_unchecked(src_row, src_col) };
                if !source.is_nodata(v) {
                    row_data[c] = v;
                }
            }
            row_data
        })
        .collect();

    let mut out: Raster<f64> = Raster::from_vec(data, rows, cols)?;
    out.set_transform(transform);
    out.set_crs(source.crs().cloned());
    out.set_nodata(Some(nodata));

    let out_path = match storage {
        ClipStorage::Scratch => workspace.temp_raster("clip"),
        ClipStorage::Persistent => workspace.output_raster("clip"),
    };
    write_geotiff(&out, &out_path, None)?;

    Ok(Some(ClipOutput {
        raster: out,
        path: out_path,
        nodata,
    }))
}

/// Pixel window (row0, row1, col0, col1) covering the region's bounding box
fn crop_window(source: &Raster<f64>, bbox: &Rect<f64>) -> Result<(usize, usize, usize, usize)> {
    // Fractional pixel indices of the bbox corners; pixel_height is negative
    // for north-up grids so max_y maps to the smallest row.
    let (c_min, r_min) = source.geo_to_pixel(bbox.min().x, bbox.max().y);
    let (c_max, r_max) = source.geo_to_pixel(bbox.max().x, bbox.min().y);

    let col0 = c_min.floor().max(0.0) as usize;
    let row0 = r_min.floor().max(0.0) as usize;
    let col1 = (c_max.ceil() - 1.0).max(0.0) as usize;
    let row1 = (r_max.ceil() - 1.0).max(0.0) as usize;

    if col0 >= source.cols() || row0 >= source.rows() || c_max <= 0.0 || r_max <= 0.0 {
        return Err(EngineError::parameter(
            "clip region does not overlap the raster extent",
        ));
    }

    Ok((
        row0,
        row1.min(source.rows() - 1),
        col0,
        col1.min(source.cols() - 1),
    ))
}

fn pixel_included(
    source: &Raster<f64>,
    geometry: &Geometry<f64>,
    policy: PixelInclusion,
    row: usize,
    col: usize,
) -> bool {
    match policy {
        PixelInclusion::PixelCenter => {
            let (x, y) = source.pixel_to_geo(col, row);
            geometry.contains(&Point::new(x, y))
        }
        PixelInclusion::AllTouched => {
            let (x0, y0) = source.transform().pixel_to_geo_corner(col, row);
            let (x1, y1) = source.transform().pixel_to_geo_corner(col + 1, row + 1);
            let cell = Rect::new(Coord { x: x0, y: y0 }, Coord { x: x1, y: y1 });
            cell.to_polygon().intersects(geometry)
        }
    }
}
