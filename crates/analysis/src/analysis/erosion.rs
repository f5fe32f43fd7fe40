//! Erosion indices
//!
//! Water erosion (RUSLE: rainfall erosivity x soil erodibility x slope
//! length/steepness x cover management x support practice) and wind erosion
//! (ILSWE: climatic erosivity x soil erodibility x vegetation cover x
//! surface roughness x land use). Both are the masked product of their
//! aligned factor rasters, classified into five severity steps.

use crate::align::{align, Resampling};
use crate::analysis::{crop_to_common, AnalysisContext, AnalysisResponse};
use crate::assemble::{assemble, AnalysisResult, AssembleRequest};
use crate::catalog::RasterRecord;
use crate::clip::{clip_to_vector, ClipStorage};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::landcover::SEVERITY_CATEGORIES;
use crate::maybe_rayon::*;
use crate::workspace::Workspace;
use geo_types::Geometry;
use landmon_core::{Error as CoreError, Raster};
use serde_json::json;
use std::path::PathBuf;

/// Which erosion model the factor rasters describe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErosionModel {
    /// Revised Universal Soil Loss Equation (water erosion, t/ha/yr)
    Rusle,
    /// Index of Land Susceptibility to Wind Erosion
    Ilswe,
}

impl ErosionModel {
    fn prefix(self) -> &'static str {
        match self {
            ErosionModel::Rusle => "rusle",
            ErosionModel::Ilswe => "ilswe",
        }
    }

    /// Default class boundaries between the five severity steps
    fn default_breakpoints(self) -> [f64; 4] {
        match self {
            ErosionModel::Rusle => [5.0, 10.0, 20.0, 50.0],
            ErosionModel::Ilswe => [2.0, 5.0, 10.0, 20.0],
        }
    }
}

/// Parameters for an erosion index analysis
pub struct ErosionParams {
    pub geometry: Geometry<f64>,
    /// Factor rasters; the first one fixes the output grid
    pub factors: Vec<RasterRecord>,
    pub model: ErosionModel,
    /// Overrides the model's default severity breakpoints
    pub breakpoints: Option<[f64; 4]>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
}

/// Erosion index over a region: factor product, classified by severity
pub fn erosion(params: &ErosionParams, ctx: &AnalysisContext<'_>) -> AnalysisResponse {
    run(params, ctx).into()
}

fn run(params: &ErosionParams, ctx: &AnalysisContext<'_>) -> Result<AnalysisResult> {
    if params.factors.len() < 2 {
        return Err(EngineError::parameter(
            "at least two factor rasters are required",
        ));
    }
    let workspace = Workspace::create(ctx.config)?;

    let (product, meta_path, nodata, resolution) = aligned_factor_product(
        &params.geometry,
        &params.factors,
        ctx.config,
        &workspace,
    )?;

    let breakpoints = params
        .breakpoints
        .unwrap_or_else(|| params.model.default_breakpoints());
    let classified = classify_severity(&product, &breakpoints, nodata)?;

    let summary = product.summarize();
    let extras = json!({
        "index": {
            "mean": summary.mean,
            "min": summary.min,
            "max": summary.max,
        }
    });

    assemble(
        AssembleRequest {
            data: &classified,
            metadata_raster: &meta_path,
            categories: &SEVERITY_CATEGORIES,
            nodata,
            resolution,
            base_year: params.start_year.unwrap_or(0),
            target_year: params.end_year.or(params.start_year).unwrap_or(0),
            prefix: params.model.prefix(),
            precomputed_stats: None,
            extras,
        },
        ctx.config,
        &workspace,
        ctx.publisher,
    )
}

/// Align every factor onto the first one's grid, clip all to the region,
/// and multiply them where every factor is valid.
///
/// Returns (product, metadata raster path, nodata, resolution).
pub(crate) fn aligned_factor_product(
    geometry: &Geometry<f64>,
    factors: &[RasterRecord],
    config: &EngineConfig,
    workspace: &Workspace,
) -> Result<(Raster<f64>, PathBuf, f64, f64)> {
    let reference = factors
        .first()
        .ok_or_else(|| EngineError::parameter("no factor rasters supplied"))?;

    let mut clipped = Vec::with_capacity(factors.len());
    let mut nodata = config.default_nodata;
    let mut meta_path = PathBuf::new();

    for (i, factor) in factors.iter().enumerate() {
        let (path, dest_nodata) = if i == 0 {
            (reference.path.clone(), None)
        } else {
            let (aligned, nd) = align(
                &reference.path,
                &factor.path,
                Resampling::Average,
                config,
                workspace,
            )?;
            (aligned, Some(nd))
        };

        let clip = clip_to_vector(
            &path,
            geometry,
            config.clip_policy,
            dest_nodata,
            ClipStorage::Scratch,
            config,
            workspace,
        )?
        .ok_or_else(|| EngineError::RasterNotFound(factor.path.clone()))?;

        if i == 0 {
            nodata = clip.nodata;
            meta_path = clip.path.clone();
        }
        clipped.push(clip.raster);
    }

    let rasters = crop_to_common(clipped)?;
    let product = masked_product(&rasters, nodata)?;
    Ok((product, meta_path, nodata, reference.resolution))
}

/// Per-pixel product of co-registered rasters; any invalid factor makes the
/// pixel nodata
fn masked_product(rasters: &[Raster<f64>], nodata: f64) -> Result<Raster<f64>> {
    let first = rasters
        .first()
        .ok_or_else(|| EngineError::parameter("no rasters to multiply"))?;
    let (rows, cols) = first.shape();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![nodata; cols];
            'cols: for col in 0..cols {
                let mut product = 1.0;
                for raster in rasters {
                    let v = unsafe { raster.get_unchecked(row, col) };
                    if raster.is_nodata(v) || !v.is_finite() {
                        continue 'cols;
                    }
                    product *= v;
                }
                row_data[col] = product;
            }
            row_data
        })
        .collect();

    let mut out = first.with_same_meta::<f64>(rows, cols);
    out.set_nodata(Some(nodata));
    *out.data_mut() = ndarray::Array2::from_shape_vec((rows, cols), data)
        .map_err(|e| CoreError::Other(e.to_string()))?;
    Ok(out)
}

/// Classify a continuous index into the five severity steps.
///
/// Values at or below breakpoint `i` fall in class `i + 1`; above the last
/// breakpoint is the highest class.
pub(crate) fn classify_severity(
    index: &Raster<f64>,
    breakpoints: &[f64; 4],
    nodata: f64,
) -> Result<Raster<f64>> {
    let (rows, cols) = index.shape();
    let mut out = index.with_same_meta::<f64>(rows, cols);
    out.set_nodata(Some(nodata));

    for row in 0..rows {
        for col in 0..cols {
            let v = unsafe { index.get_unchecked(row, col) };
            let code = if index.is_nodata(v) || !v.is_finite() {
                nodata
            } else {
                let class = breakpoints.iter().position(|&b| v <= b).unwrap_or(4) + 1;
                class as f64
            };
            out.set(row, col, code)?;
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raster(values: Vec<f64>, rows: usize, cols: usize) -> Raster<f64> {
        let mut r = Raster::from_vec(values, rows, cols).unwrap();
        r.set_nodata(Some(-9999.0));
        r
    }

    #[test]
    fn product_masks_invalid_factors() {
        let a = raster(vec![2.0, 3.0, -9999.0, 4.0], 2, 2);
        let b = raster(vec![5.0, -9999.0, 2.0, 0.5], 2, 2);

        let product = masked_product(&[a, b], -9999.0).unwrap();
        assert_eq!(product.get(0, 0).unwrap(), 10.0);
        assert_eq!(product.get(0, 1).unwrap(), -9999.0);
        assert_eq!(product.get(1, 0).unwrap(), -9999.0);
        assert_eq!(product.get(1, 1).unwrap(), 2.0);
    }

    #[test]
    fn severity_classes_at_boundaries() {
        let index = raster(vec![5.0, 5.1, 50.0, 51.0], 2, 2);
        let classified = classify_severity(&index, &[5.0, 10.0, 20.0, 50.0], -9999.0).unwrap();

        assert_eq!(classified.get(0, 0).unwrap(), 1.0); // at first break
        assert_eq!(classified.get(0, 1).unwrap(), 2.0);
        assert_eq!(classified.get(1, 0).unwrap(), 4.0); // at last break
        assert_eq!(classified.get(1, 1).unwrap(), 5.0);
    }
}
