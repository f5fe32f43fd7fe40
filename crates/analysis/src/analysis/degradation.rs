//! Land degradation indicator
//!
//! One-out-all-out combination of the three sub-indicators: land
//! productivity, land-cover change, and soil organic carbon change. A pixel
//! degraded in any sub-indicator is degraded overall; otherwise improvement
//! in any wins over stability; pixels with no valid sub-indicator stay
//! nodata.

use crate::analysis::landcover::paired_land_cover;
use crate::analysis::productivity::productivity_ternary;
use crate::analysis::soc::SocChangeParams;
use crate::analysis::{
    combine_ternaries, crop_to_common, AnalysisContext, AnalysisResponse, ProductivityParams,
};
use crate::assemble::{assemble, AnalysisResult, AssembleRequest};
use crate::catalog::{validate_years, RasterRecord};
use crate::coefficients::{ClimaticRegion, CoefficientMatrix};
use crate::error::{EngineError, Result};
use crate::landcover::{TransitionMatrix, CHANGE_CATEGORIES};
use crate::scoring::score_change;
use crate::transition::classify_transition;
use crate::workspace::Workspace;
use geo_types::Geometry;
use landmon_core::Raster;
use serde_json::Value;

/// Parameters for the combined land degradation indicator
pub struct LandDegradationParams {
    pub geometry: Geometry<f64>,
    pub land_cover_rasters: Vec<RasterRecord>,
    pub vi_rasters: Vec<RasterRecord>,
    pub reference_soc: RasterRecord,
    pub reference_eco_units: Option<RasterRecord>,
    pub climatic_region: ClimaticRegion,
    pub cutoff_percentage: f64,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
}

/// Combined land degradation over a region and period
pub fn land_degradation(
    params: &LandDegradationParams,
    ctx: &AnalysisContext<'_>,
) -> AnalysisResponse {
    run(params, ctx).into()
}

fn run(params: &LandDegradationParams, ctx: &AnalysisContext<'_>) -> Result<AnalysisResult> {
    let (start_year, end_year) = validate_years(params.start_year, params.end_year, true)?;
    let workspace = Workspace::create(ctx.config)?;

    // Land-cover change ternary.
    let (paired, base_record) = paired_land_cover(
        &params.geometry,
        &params.land_cover_rasters,
        start_year,
        end_year,
        ctx.config,
        &workspace,
    )?;
    let lc_change = classify_transition(
        &paired.base,
        &paired.target,
        TransitionMatrix::land_cover_default(),
        paired.nodata,
    )?;

    // SOC change ternary, on the same land-cover pairing.
    let soc_params = SocChangeParams {
        geometry: params.geometry.clone(),
        land_cover_rasters: params.land_cover_rasters.clone(),
        reference_soc: params.reference_soc.clone(),
        climatic_region: params.climatic_region,
        cutoff_percentage: params.cutoff_percentage,
        start_year: params.start_year,
        end_year: params.end_year,
    };
    let soc_change = soc_ternary(&soc_params, &paired.base, &paired.target, ctx, &workspace)?;

    // Combined productivity ternary.
    let productivity_params = ProductivityParams {
        geometry: params.geometry.clone(),
        vi_rasters: params.vi_rasters.clone(),
        reference_eco_units: params.reference_eco_units.clone(),
        cutoff_percentage: params.cutoff_percentage,
        start_year: params.start_year,
        end_year: params.end_year,
    };
    let productivity = productivity_ternary(&productivity_params, ctx.config, &workspace)?;

    let nodata = paired.nodata;
    let [lc, soc, prod]: [Raster<f64>; 3] =
        crop_to_common(vec![lc_change, soc_change, productivity.ternary])?
            .try_into()
            .map_err(|_| EngineError::parameter("expected three sub-indicator rasters"))?;

    let combined = combine_ternaries(&[&prod, &lc, &soc], nodata)?;

    assemble(
        AssembleRequest {
            data: &combined,
            metadata_raster: &paired.meta_path,
            categories: &CHANGE_CATEGORIES,
            nodata,
            resolution: base_record.resolution,
            base_year: start_year,
            target_year: end_year,
            prefix: "landdegradation",
            precomputed_stats: None,
            extras: Value::Null,
        },
        ctx.config,
        &workspace,
        ctx.publisher,
    )
}

/// SOC ternary over an existing land-cover pairing
fn soc_ternary(
    params: &SocChangeParams,
    base_lc: &Raster<f64>,
    target_lc: &Raster<f64>,
    ctx: &AnalysisContext<'_>,
    workspace: &Workspace,
) -> Result<Raster<f64>> {
    use crate::align::{align, Resampling};
    use crate::clip::{clip_to_vector, ClipStorage};

    let (start_year, _) = validate_years(params.start_year, params.end_year, true)?;
    let base_record = crate::catalog::first_for_year(&params.land_cover_rasters, start_year)?;

    let (aligned_soc, _) = align(
        &base_record.path,
        &params.reference_soc.path,
        Resampling::Average,
        ctx.config,
        workspace,
    )?;
    let soc_clip = clip_to_vector(
        &aligned_soc,
        &params.geometry,
        ctx.config.clip_policy,
        None,
        ClipStorage::Scratch,
        ctx.config,
        workspace,
    )?
    .ok_or_else(|| EngineError::RasterNotFound(params.reference_soc.path.clone()))?;

    let nodata = soc_clip.nodata;
    let [base, target, reference]: [Raster<f64>; 3] =
        crop_to_common(vec![base_lc.clone(), target_lc.clone(), soc_clip.raster])?
            .try_into()
            .map_err(|_| EngineError::parameter("expected three co-registered rasters"))?;

    score_change(
        &base,
        &target,
        &reference,
        &CoefficientMatrix::for_region(params.climatic_region),
        params.cutoff_percentage,
        nodata,
    )
}
