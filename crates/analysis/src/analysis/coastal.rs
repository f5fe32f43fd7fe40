//! Coastal vulnerability index
//!
//! Geometric-mean combination of ranked coastal variables (geomorphology,
//! slope, relative sea-level change, shoreline change, tidal range, wave
//! height), `CVI = sqrt(product / n)`, classified into five vulnerability
//! steps.

use crate::analysis::erosion::{aligned_factor_product, classify_severity};
use crate::analysis::{AnalysisContext, AnalysisResponse};
use crate::assemble::{assemble, AnalysisResult, AssembleRequest};
use crate::catalog::RasterRecord;
use crate::error::{EngineError, Result};
use crate::landcover::SEVERITY_CATEGORIES;
use crate::workspace::Workspace;
use geo_types::Geometry;
use serde_json::json;

/// Vulnerability class boundaries, following the published CVI thresholds
const DEFAULT_BREAKPOINTS: [f64; 4] = [5.0, 8.7, 12.7, 16.4];

/// Parameters for the coastal vulnerability analysis
pub struct CoastalVulnerabilityParams {
    pub geometry: Geometry<f64>,
    /// Ranked variable rasters (values 1..=5); the first fixes the grid
    pub factors: Vec<RasterRecord>,
    /// Overrides the default vulnerability breakpoints
    pub breakpoints: Option<[f64; 4]>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
}

/// Coastal vulnerability index over a region
pub fn coastal_vulnerability(
    params: &CoastalVulnerabilityParams,
    ctx: &AnalysisContext<'_>,
) -> AnalysisResponse {
    run(params, ctx).into()
}

fn run(
    params: &CoastalVulnerabilityParams,
    ctx: &AnalysisContext<'_>,
) -> Result<AnalysisResult> {
    if params.factors.len() < 2 {
        return Err(EngineError::parameter(
            "at least two ranked variable rasters are required",
        ));
    }
    let workspace = Workspace::create(ctx.config)?;

    let (product, meta_path, nodata, resolution) = aligned_factor_product(
        &params.geometry,
        &params.factors,
        ctx.config,
        &workspace,
    )?;

    // CVI = sqrt(product / n); negative products (bad ranks) become nodata.
    let n = params.factors.len() as f64;
    let (rows, cols) = product.shape();
    let mut index = product.with_same_meta::<f64>(rows, cols);
    index.set_nodata(Some(nodata));
    for row in 0..rows {
        for col in 0..cols {
            let v = unsafe { product.get_unchecked(row, col) };
            let value = if product.is_nodata(v) || v < 0.0 {
                nodata
            } else {
                (v / n).sqrt()
            };
            index.set(row, col, value)?;
        }
    }

    let breakpoints = params.breakpoints.unwrap_or(DEFAULT_BREAKPOINTS);
    let classified = classify_severity(&index, &breakpoints, nodata)?;

    let summary = index.summarize();
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
            prefix: "cvi",
            precomputed_stats: None,
            extras,
        },
        ctx.config,
        &workspace,
        ctx.publisher,
    )
}
