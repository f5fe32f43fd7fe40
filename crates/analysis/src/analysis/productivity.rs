//! Land productivity sub-indicators
//!
//! Three sub-indicators over vegetation-index rasters, each producing a
//! ternary change raster:
//! - **trajectory**: percent change between the base and target period,
//!   thresholded on the cutoff percentage
//! - **state**: percent change of the target period against the mean of the
//!   preceding epoch
//! - **performance**: ratio of the observed index to a reference
//!   (max-index) raster for the region's ecological units; below half the
//!   reference counts as degraded
//!
//! The combined productivity indicator is their one-out-all-out
//! combination.

use crate::align::{align, Resampling};
use crate::analysis::{combine_ternaries, crop_to_common, AnalysisContext, AnalysisResponse};
use crate::assemble::{assemble, AnalysisResult, AssembleRequest};
use crate::catalog::{first_for_year, validate_years, RasterRecord};
use crate::clip::{clip_to_vector, ClipOutput, ClipStorage};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::landcover::{ChangeTernary, CHANGE_CATEGORIES};
use crate::scoring::percent_change_classify;
use crate::workspace::Workspace;
use geo_types::Geometry;
use landmon_core::Raster;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Observed-to-reference ratio below which performance counts as degraded
const PERFORMANCE_DEGRADED_RATIO: f64 = 0.5;

/// Parameters shared by the productivity sub-indicators
pub struct ProductivityParams {
    pub geometry: Geometry<f64>,
    /// Vegetation-index rasters covering the analysis period
    pub vi_rasters: Vec<RasterRecord>,
    /// Reference (max-index per ecological unit) raster, required for the
    /// performance sub-indicator
    pub reference_eco_units: Option<RasterRecord>,
    pub cutoff_percentage: f64,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
}

/// Productivity trajectory sub-indicator
pub fn trajectory(params: &ProductivityParams, ctx: &AnalysisContext<'_>) -> AnalysisResponse {
    run(params, ctx, Indicator::Trajectory).into()
}

/// Productivity state sub-indicator
pub fn state(params: &ProductivityParams, ctx: &AnalysisContext<'_>) -> AnalysisResponse {
    run(params, ctx, Indicator::State).into()
}

/// Productivity performance sub-indicator
pub fn performance(params: &ProductivityParams, ctx: &AnalysisContext<'_>) -> AnalysisResponse {
    run(params, ctx, Indicator::Performance).into()
}

/// Combined productivity indicator
pub fn productivity(params: &ProductivityParams, ctx: &AnalysisContext<'_>) -> AnalysisResponse {
    run(params, ctx, Indicator::Productivity).into()
}

#[derive(Clone, Copy)]
enum Indicator {
    Trajectory,
    State,
    Performance,
    Productivity,
}

impl Indicator {
    fn prefix(self) -> &'static str {
        match self {
            Indicator::Trajectory => "trajectory",
            Indicator::State => "state",
            Indicator::Performance => "performance",
            Indicator::Productivity => "productivity",
        }
    }
}

/// A computed ternary sub-indicator plus the context needed to assemble or
/// combine it
pub(crate) struct SubIndicator {
    pub ternary: Raster<f64>,
    pub meta_path: PathBuf,
    pub nodata: f64,
    pub resolution: f64,
}

fn run(
    params: &ProductivityParams,
    ctx: &AnalysisContext<'_>,
    indicator: Indicator,
) -> Result<AnalysisResult> {
    let (start_year, end_year) = validate_years(params.start_year, params.end_year, true)?;
    let workspace = Workspace::create(ctx.config)?;

    let sub = match indicator {
        Indicator::Trajectory => trajectory_ternary(params, ctx.config, &workspace)?,
        Indicator::State => state_ternary(params, ctx.config, &workspace)?,
        Indicator::Performance => performance_ternary(params, ctx.config, &workspace)?,
        Indicator::Productivity => productivity_ternary(params, ctx.config, &workspace)?,
    };

    assemble(
        AssembleRequest {
            data: &sub.ternary,
            metadata_raster: &sub.meta_path,
            categories: &CHANGE_CATEGORIES,
            nodata: sub.nodata,
            resolution: sub.resolution,
            base_year: start_year,
            target_year: end_year,
            prefix: indicator.prefix(),
            precomputed_stats: None,
            extras: Value::Null,
        },
        ctx.config,
        &workspace,
        ctx.publisher,
    )
}

pub(crate) fn trajectory_ternary(
    params: &ProductivityParams,
    config: &EngineConfig,
    workspace: &Workspace,
) -> Result<SubIndicator> {
    let (start_year, end_year) = validate_years(params.start_year, params.end_year, true)?;
    let base_record = first_for_year(&params.vi_rasters, start_year)?;
    let target_record = first_for_year(&params.vi_rasters, end_year)?;

    let base_clip = clip_record(&base_record.path, &params.geometry, None, config, workspace)?;
    let target_clip = aligned_clip(
        &base_record.path,
        &target_record.path,
        &params.geometry,
        config,
        workspace,
    )?;

    let nodata = base_clip.nodata;
    let meta_path = base_clip.path.clone();
    let [base, target]: [Raster<f64>; 2] =
        crop_to_common(vec![base_clip.raster, target_clip.raster])?
            .try_into()
            .map_err(|_| EngineError::parameter("expected a base/target raster pair"))?;

    let ternary = percent_change_classify(&base, &target, params.cutoff_percentage, nodata)?;

    Ok(SubIndicator {
        ternary,
        meta_path,
        nodata,
        resolution: base_record.resolution,
    })
}

pub(crate) fn state_ternary(
    params: &ProductivityParams,
    config: &EngineConfig,
    workspace: &Workspace,
) -> Result<SubIndicator> {
    let (start_year, end_year) = validate_years(params.start_year, params.end_year, true)?;

    let epoch: Vec<&RasterRecord> = params
        .vi_rasters
        .iter()
        .filter(|r| r.year.map(|y| y >= start_year && y < end_year).unwrap_or(false))
        .collect();
    let Some(grid_record) = epoch.first() else {
        return Err(EngineError::NoRasterForPeriod { year: start_year });
    };
    let recent_record = first_for_year(&params.vi_rasters, end_year)?;

    // Clip every epoch raster onto the grid of the earliest one.
    let mut clipped_epoch = Vec::with_capacity(epoch.len());
    let first_clip = clip_record(&grid_record.path, &params.geometry, None, config, workspace)?;
    let nodata = first_clip.nodata;
    let meta_path = first_clip.path.clone();
    clipped_epoch.push(first_clip.raster);
    for record in epoch.iter().skip(1) {
        let clip = aligned_clip(
            &grid_record.path,
            &record.path,
            &params.geometry,
            config,
            workspace,
        )?;
        clipped_epoch.push(clip.raster);
    }

    let recent_clip = aligned_clip(
        &grid_record.path,
        &recent_record.path,
        &params.geometry,
        config,
        workspace,
    )?;
    clipped_epoch.push(recent_clip.raster);

    let mut rasters = crop_to_common(clipped_epoch)?;
    let recent = rasters
        .pop()
        .ok_or_else(|| EngineError::parameter("no epoch rasters"))?;
    let baseline = pixelwise_mean(&rasters, nodata)?;

    let ternary = percent_change_classify(&baseline, &recent, params.cutoff_percentage, nodata)?;

    Ok(SubIndicator {
        ternary,
        meta_path,
        nodata,
        resolution: grid_record.resolution,
    })
}

pub(crate) fn performance_ternary(
    params: &ProductivityParams,
    config: &EngineConfig,
    workspace: &Workspace,
) -> Result<SubIndicator> {
    let (_, end_year) = validate_years(params.start_year, params.end_year, true)?;
    let reference_record = params
        .reference_eco_units
        .as_ref()
        .ok_or_else(|| EngineError::parameter("specify the reference ecological units"))?;
    let observed_record = first_for_year(&params.vi_rasters, end_year)?;

    let observed_clip =
        clip_record(&observed_record.path, &params.geometry, None, config, workspace)?;
    let reference_clip = aligned_clip(
        &observed_record.path,
        &reference_record.path,
        &params.geometry,
        config,
        workspace,
    )?;

    let nodata = observed_clip.nodata;
    let meta_path = observed_clip.path.clone();
    let [observed, reference]: [Raster<f64>; 2] =
        crop_to_common(vec![observed_clip.raster, reference_clip.raster])?
            .try_into()
            .map_err(|_| EngineError::parameter("expected an observed/reference raster pair"))?;

    let ternary = ratio_classify(&observed, &reference, nodata)?;

    Ok(SubIndicator {
        ternary,
        meta_path,
        nodata,
        resolution: observed_record.resolution,
    })
}

pub(crate) fn productivity_ternary(
    params: &ProductivityParams,
    config: &EngineConfig,
    workspace: &Workspace,
) -> Result<SubIndicator> {
    let trajectory = trajectory_ternary(params, config, workspace)?;
    let state = state_ternary(params, config, workspace)?;
    let performance = performance_ternary(params, config, workspace)?;

    let nodata = trajectory.nodata;
    let [t, s, p]: [Raster<f64>; 3] = crop_to_common(vec![
        trajectory.ternary,
        state.ternary,
        performance.ternary,
    ])?
    .try_into()
    .map_err(|_| EngineError::parameter("expected three sub-indicator rasters"))?;

    let combined = combine_ternaries(&[&t, &s, &p], nodata)?;

    Ok(SubIndicator {
        ternary: combined,
        meta_path: trajectory.meta_path,
        nodata,
        resolution: trajectory.resolution,
    })
}

/// Clip a raster to the region, treating a missing file as a resource error
fn clip_record(
    path: &Path,
    geometry: &Geometry<f64>,
    dest_nodata: Option<f64>,
    config: &EngineConfig,
    workspace: &Workspace,
) -> Result<ClipOutput> {
    clip_to_vector(
        path,
        geometry,
        config.clip_policy,
        dest_nodata,
        ClipStorage::Scratch,
        config,
        workspace,
    )?
    .ok_or_else(|| EngineError::RasterNotFound(path.to_path_buf()))
}

/// Align a continuous raster onto a reference grid, then clip it
fn aligned_clip(
    reference: &Path,
    target: &Path,
    geometry: &Geometry<f64>,
    config: &EngineConfig,
    workspace: &Workspace,
) -> Result<ClipOutput> {
    let (aligned, nodata) = align(reference, target, Resampling::Average, config, workspace)?;
    clip_record(&aligned, geometry, Some(nodata), config, workspace)
}

/// Pixelwise mean over a set of co-registered rasters, nodata where no
/// input is valid
fn pixelwise_mean(rasters: &[Raster<f64>], nodata: f64) -> Result<Raster<f64>> {
    let first = rasters
        .first()
        .ok_or_else(|| EngineError::parameter("no rasters to average"))?;
    let (rows, cols) = first.shape();

    let mut out = first.with_same_meta::<f64>(rows, cols);
    out.set_nodata(Some(nodata));

    for row in 0..rows {
        for col in 0..cols {
            let mut sum = 0.0;
            let mut count = 0usize;
            for raster in rasters {
                let v = unsafe { raster.get_unchecked(row, col) };
                if !raster.is_nodata(v) {
                    sum += v;
                    count += 1;
                }
            }
            let value = if count == 0 { nodata } else { sum / count as f64 };
            out.set(row, col, value)?;
        }
    }

    Ok(out)
}

/// Observed/reference ratio classification for the performance
/// sub-indicator: degraded below half the reference, stable otherwise
fn ratio_classify(
    observed: &Raster<f64>,
    reference: &Raster<f64>,
    nodata: f64,
) -> Result<Raster<f64>> {
    let (rows, cols) = observed.shape();
    let mut out = observed.with_same_meta::<f64>(rows, cols);
    out.set_nodata(Some(nodata));

    for row in 0..rows {
        for col in 0..cols {
            let obs = unsafe { observed.get_unchecked(row, col) };
            let reference_value = unsafe { reference.get_unchecked(row, col) };
            let code = if observed.is_nodata(obs)
                || reference.is_nodata(reference_value)
                || reference_value == 0.0
            {
                nodata
            } else if obs / reference_value < PERFORMANCE_DEGRADED_RATIO {
                ChangeTernary::Degraded.code() as f64
            } else {
                ChangeTernary::Stable.code() as f64
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
    fn mean_skips_nodata() {
        let a = raster(vec![10.0, -9999.0, 30.0, 40.0], 2, 2);
        let b = raster(vec![20.0, -9999.0, -9999.0, 60.0], 2, 2);

        let mean = pixelwise_mean(&[a, b], -9999.0).unwrap();
        assert_eq!(mean.get(0, 0).unwrap(), 15.0);
        assert_eq!(mean.get(0, 1).unwrap(), -9999.0);
        assert_eq!(mean.get(1, 0).unwrap(), 30.0);
        assert_eq!(mean.get(1, 1).unwrap(), 50.0);
    }

    #[test]
    fn ratio_threshold() {
        let observed = raster(vec![40.0, 60.0, 10.0, -9999.0], 2, 2);
        let reference = raster(vec![100.0, 100.0, 0.0, 100.0], 2, 2);

        let classified = ratio_classify(&observed, &reference, -9999.0).unwrap();
        assert_eq!(
            classified.get(0, 0).unwrap(),
            ChangeTernary::Degraded.code() as f64
        );
        assert_eq!(
            classified.get(0, 1).unwrap(),
            ChangeTernary::Stable.code() as f64
        );
        assert_eq!(classified.get(1, 0).unwrap(), -9999.0); // zero reference
        assert_eq!(classified.get(1, 1).unwrap(), -9999.0); // nodata observed
    }
}
