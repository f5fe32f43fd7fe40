//! Land-cover and land-cover-change analyses

use crate::align::{align, Resampling};
use crate::analysis::{crop_to_common, AnalysisContext, AnalysisResponse};
use crate::assemble::{assemble, AnalysisResult, AssembleRequest};
use crate::catalog::{first_for_year, single_for_year, validate_years, RasterRecord};
use crate::clip::{clip_to_vector, ClipStorage};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::landcover::{TransitionMatrix, CHANGE_CATEGORIES, LAND_COVER_CATEGORIES};
use crate::transition::classify_transition;
use crate::workspace::Workspace;
use crate::zonal::{zonal_stats, CountTransform, ValueMapping};
use geo_types::Geometry;
use landmon_core::Raster;
use serde_json::{json, Value};
use std::path::PathBuf;

/// Parameters for the single-period land-cover analysis
pub struct LandCoverParams {
    pub geometry: Geometry<f64>,
    /// Land-cover rasters resolved by the catalog
    pub rasters: Vec<RasterRecord>,
    pub mapping: ValueMapping,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub transform: CountTransform,
}

/// Parameters for the two-period land-cover-change analysis
pub struct LandCoverChangeParams {
    pub geometry: Geometry<f64>,
    pub rasters: Vec<RasterRecord>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
}

/// Land-cover distribution over a region for a single period
pub fn land_cover(params: &LandCoverParams, ctx: &AnalysisContext<'_>) -> AnalysisResponse {
    run_land_cover(params, ctx).into()
}

/// Land-cover change between two periods, classified through the
/// transition table
pub fn land_cover_change(
    params: &LandCoverChangeParams,
    ctx: &AnalysisContext<'_>,
) -> AnalysisResponse {
    run_land_cover_change(params, ctx).into()
}

fn run_land_cover(params: &LandCoverParams, ctx: &AnalysisContext<'_>) -> Result<AnalysisResult> {
    let (start_year, end_year) = validate_years(params.start_year, params.end_year, false)?;
    if start_year != end_year {
        return Err(EngineError::parameter(
            "land cover can only be analysed for a single period",
        ));
    }

    let record = single_for_year(&params.rasters, start_year)?;
    let workspace = Workspace::create(ctx.config)?;

    let clip = clip_to_vector(
        &record.path,
        &params.geometry,
        ctx.config.clip_policy,
        None,
        ClipStorage::Scratch,
        ctx.config,
        &workspace,
    )?
    .ok_or_else(|| EngineError::RasterNotFound(record.path.clone()))?;

    let report = zonal_stats(
        &params.geometry,
        std::slice::from_ref(record),
        &params.mapping,
        &params.transform,
        true,
        ctx.config,
        &workspace,
    )?;

    assemble(
        AssembleRequest {
            data: &clip.raster,
            metadata_raster: &clip.path,
            categories: &LAND_COVER_CATEGORIES,
            nodata: clip.nodata,
            resolution: record.resolution,
            base_year: start_year,
            target_year: end_year,
            prefix: "lulc",
            precomputed_stats: Some(serde_json::to_value(&report).map_err(|e| {
                landmon_core::Error::Other(format!("stats serialization: {}", e))
            })?),
            extras: Value::Null,
        },
        ctx.config,
        &workspace,
        ctx.publisher,
    )
}

fn run_land_cover_change(
    params: &LandCoverChangeParams,
    ctx: &AnalysisContext<'_>,
) -> Result<AnalysisResult> {
    let (start_year, end_year) = validate_years(params.start_year, params.end_year, true)?;
    let workspace = Workspace::create(ctx.config)?;

    let (paired, base_record) = paired_land_cover(
        &params.geometry,
        &params.rasters,
        start_year,
        end_year,
        ctx.config,
        &workspace,
    )?;

    let classified = classify_transition(
        &paired.base,
        &paired.target,
        TransitionMatrix::land_cover_default(),
        paired.nodata,
    )?;

    let mut clipped = serde_json::Map::new();
    clipped.insert(
        start_year.to_string(),
        Value::String(paired.base_path.display().to_string()),
    );
    clipped.insert(
        end_year.to_string(),
        Value::String(paired.target_path.display().to_string()),
    );
    let extras = json!({ "rasters": clipped });

    assemble(
        AssembleRequest {
            data: &classified,
            metadata_raster: &paired.meta_path,
            categories: &CHANGE_CATEGORIES,
            nodata: paired.nodata,
            resolution: base_record.resolution,
            base_year: start_year,
            target_year: end_year,
            prefix: "lulcchange",
            precomputed_stats: None,
            extras,
        },
        ctx.config,
        &workspace,
        ctx.publisher,
    )
}

/// Co-registered land-cover rasters for a two-period comparison
pub(crate) struct PairedLandCover {
    pub base: Raster<f64>,
    pub target: Raster<f64>,
    /// Persisted clipped base raster, surfaced to the caller
    pub base_path: PathBuf,
    /// Persisted clipped target raster, surfaced to the caller
    pub target_path: PathBuf,
    /// Clipped base raster used as the metadata reference downstream
    pub meta_path: PathBuf,
    pub nodata: f64,
}

/// Produce pixel-aligned, clipped base/target land-cover rasters.
///
/// The target is reprojected against the base as reference
/// (nearest-neighbor: land cover is categorical), then both are clipped
/// identically so downstream pairwise classification sees co-registered
/// grids.
pub(crate) fn paired_land_cover<'a>(
    geometry: &Geometry<f64>,
    rasters: &'a [RasterRecord],
    start_year: i32,
    end_year: i32,
    config: &EngineConfig,
    workspace: &Workspace,
) -> Result<(PairedLandCover, &'a RasterRecord)> {
    let base_record = first_for_year(rasters, start_year)?;
    let target_record = first_for_year(rasters, end_year)?;

    let meta_clip = clip_to_vector(
        &base_record.path,
        geometry,
        config.clip_policy,
        None,
        ClipStorage::Scratch,
        config,
        workspace,
    )?
    .ok_or_else(|| EngineError::RasterNotFound(base_record.path.clone()))?;

    let base_clip = clip_to_vector(
        &base_record.path,
        geometry,
        config.clip_policy,
        None,
        ClipStorage::Persistent,
        config,
        workspace,
    )?
    .ok_or_else(|| EngineError::RasterNotFound(base_record.path.clone()))?;

    let (aligned_target, nodata) = align(
        &base_record.path,
        &target_record.path,
        Resampling::Nearest,
        config,
        workspace,
    )?;

    let target_clip = clip_to_vector(
        &aligned_target,
        geometry,
        config.clip_policy,
        Some(nodata),
        ClipStorage::Persistent,
        config,
        workspace,
    )?
    .ok_or_else(|| EngineError::RasterNotFound(aligned_target.clone()))?;

    let [base, target]: [Raster<f64>; 2] = crop_to_common(vec![base_clip.raster, target_clip.raster])?
        .try_into()
        .map_err(|_| EngineError::parameter("expected a base/target raster pair"))?;

    Ok((
        PairedLandCover {
            base,
            target,
            base_path: base_clip.path,
            target_path: target_clip.path,
            meta_path: meta_clip.path,
            nodata,
        },
        base_record,
    ))
}
