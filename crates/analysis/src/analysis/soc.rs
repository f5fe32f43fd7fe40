//! Soil organic carbon change analysis
//!
//! Pairs the land-cover rasters of the two periods, converts each pixel's
//! transition into a stock-change coefficient for the selected climate
//! region, and scores the reference SOC raster's projected change against
//! the cutoff percentage.

use crate::align::{align, Resampling};
use crate::analysis::landcover::paired_land_cover;
use crate::analysis::{crop_to_common, AnalysisContext, AnalysisResponse};
use crate::assemble::{assemble, AnalysisResult, AssembleRequest};
use crate::catalog::{validate_years, RasterRecord};
use crate::clip::{clip_to_vector, ClipOutput, ClipStorage};
use crate::coefficients::{ClimaticRegion, CoefficientMatrix};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::landcover::CHANGE_CATEGORIES;
use crate::scoring::score_change;
use crate::workspace::Workspace;
use geo_types::Geometry;
use landmon_core::Raster;
use serde_json::Value;

/// Default cutoff: a SOC change within +-10% counts as stable
pub const DEFAULT_CUTOFF_PERCENTAGE: f64 = 10.0;

/// Parameters for the SOC change analysis
pub struct SocChangeParams {
    pub geometry: Geometry<f64>,
    /// Land-cover rasters covering both periods
    pub land_cover_rasters: Vec<RasterRecord>,
    /// Reference soil organic carbon raster
    pub reference_soc: RasterRecord,
    pub climatic_region: ClimaticRegion,
    pub cutoff_percentage: f64,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
}

/// Soil organic carbon change between two periods
pub fn soc_change(params: &SocChangeParams, ctx: &AnalysisContext<'_>) -> AnalysisResponse {
    run_soc_change(params, ctx).into()
}

fn run_soc_change(params: &SocChangeParams, ctx: &AnalysisContext<'_>) -> Result<AnalysisResult> {
    if params.cutoff_percentage <= 0.0 {
        return Err(EngineError::parameter(
            "cutoff percentage must be positive",
        ));
    }
    let (start_year, end_year) = validate_years(params.start_year, params.end_year, true)?;

    let workspace = Workspace::create(ctx.config)?;

    let (paired, base_record) = paired_land_cover(
        &params.geometry,
        &params.land_cover_rasters,
        start_year,
        end_year,
        ctx.config,
        &workspace,
    )?;

    let soc_clip = clipped_reference_soc(
        &params.geometry,
        &params.reference_soc,
        &base_record.path,
        ctx.config,
        &workspace,
    )?;
    let soc_meta_path = soc_clip.path.clone();

    let nodata = soc_clip.nodata;
    let [base, target, reference]: [Raster<f64>; 3] =
        crop_to_common(vec![paired.base, paired.target, soc_clip.raster])?
            .try_into()
            .map_err(|_| EngineError::parameter("expected three co-registered rasters"))?;

    let matrix = CoefficientMatrix::for_region(params.climatic_region);
    let scored = score_change(
        &base,
        &target,
        &reference,
        &matrix,
        params.cutoff_percentage,
        nodata,
    )?;

    assemble(
        AssembleRequest {
            data: &scored,
            metadata_raster: &soc_meta_path,
            categories: &CHANGE_CATEGORIES,
            nodata,
            resolution: base_record.resolution,
            base_year: start_year,
            target_year: end_year,
            prefix: "soc",
            precomputed_stats: None,
            extras: Value::Null,
        },
        ctx.config,
        &workspace,
        ctx.publisher,
    )
}

/// Align the reference SOC raster onto the base land-cover grid (average:
/// carbon stock is continuous) and clip it to the region.
fn clipped_reference_soc(
    geometry: &Geometry<f64>,
    reference_soc: &RasterRecord,
    base_lc_path: &std::path::Path,
    config: &EngineConfig,
    workspace: &Workspace,
) -> Result<ClipOutput> {
    let (aligned_soc, _) = align(
        base_lc_path,
        &reference_soc.path,
        Resampling::Average,
        config,
        workspace,
    )?;

    clip_to_vector(
        &aligned_soc,
        geometry,
        config.clip_policy,
        None,
        ClipStorage::Scratch,
        config,
        workspace,
    )?
    .ok_or_else(|| EngineError::RasterNotFound(reference_soc.path.clone()))
}
