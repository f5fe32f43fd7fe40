//! Analysis entry points
//!
//! One function per analysis type, each taking a uniform parameter bag of
//! already-resolved inputs (region geometry, catalog records, period
//! bounds) and returning either the assembled payload or a structured
//! error. Errors never cross this boundary as panics or exceptions: queued
//! and synchronous callers consume the same `AnalysisResponse`.

pub mod coastal;
pub mod degradation;
pub mod erosion;
pub mod landcover;
pub mod productivity;
pub mod soc;

pub use coastal::{coastal_vulnerability, CoastalVulnerabilityParams};
pub use degradation::{land_degradation, LandDegradationParams};
pub use erosion::{erosion, ErosionModel, ErosionParams};
pub use landcover::{land_cover, land_cover_change, LandCoverChangeParams, LandCoverParams};
pub use productivity::{
    performance, productivity, state, trajectory, ProductivityParams,
};
pub use soc::{soc_change, SocChangeParams};

use crate::assemble::AnalysisResult;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::landcover::ChangeTernary;
use crate::tiles::TilePublisher;
use landmon_core::Raster;
use ndarray::s;
use serde::Serialize;

/// Shared collaborators for one analysis invocation
#[derive(Clone, Copy)]
pub struct AnalysisContext<'a> {
    pub config: &'a EngineConfig,
    pub publisher: Option<&'a dyn TilePublisher>,
}

impl<'a> AnalysisContext<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self {
            config,
            publisher: None,
        }
    }

    pub fn with_publisher(config: &'a EngineConfig, publisher: &'a dyn TilePublisher) -> Self {
        Self {
            config,
            publisher: Some(publisher),
        }
    }
}

/// Payload-or-error response of every analysis function
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum AnalysisResponse {
    Error { error: String },
    Result(Box<AnalysisResult>),
}

impl AnalysisResponse {
    pub fn error(&self) -> Option<&str> {
        match self {
            AnalysisResponse::Error { error } => Some(error),
            AnalysisResponse::Result(_) => None,
        }
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            AnalysisResponse::Error { .. } => None,
            AnalysisResponse::Result(result) => Some(result),
        }
    }
}

impl From<Result<AnalysisResult>> for AnalysisResponse {
    fn from(result: Result<AnalysisResult>) -> Self {
        match result {
            Ok(result) => AnalysisResponse::Result(Box::new(result)),
            Err(e) => AnalysisResponse::Error {
                error: e.to_string(),
            },
        }
    }
}

/// Crop rasters to their smallest common shape.
///
/// Grids derived from the same reference can still differ by an edge pixel
/// when sources have different extents; comparisons use the shared window.
pub(crate) fn crop_to_common(rasters: Vec<Raster<f64>>) -> Result<Vec<Raster<f64>>> {
    if rasters.is_empty() {
        return Ok(rasters);
    }
    let rows = rasters.iter().map(|r| r.rows()).min().unwrap_or(0);
    let cols = rasters.iter().map(|r| r.cols()).min().unwrap_or(0);
    if rows == 0 || cols == 0 {
        return Err(EngineError::parameter("empty raster in comparison set"));
    }
    if rasters.iter().all(|r| r.shape() == (rows, cols)) {
        return Ok(rasters);
    }

    let mut cropped = Vec::with_capacity(rasters.len());
    for raster in rasters {
        if raster.shape() == (rows, cols) {
            cropped.push(raster);
            continue;
        }
        let window = raster.data().slice(s![0..rows, 0..cols]).to_owned();
        let mut out: Raster<f64> = raster.with_same_meta(rows, cols);
        out.set_nodata(raster.nodata());
        *out.data_mut() = window;
        cropped.push(out);
    }
    Ok(cropped)
}

/// One-out-all-out combination of ternary sub-indicator rasters.
///
/// A pixel is Degraded if any input says so, else Improved if any input
/// says so, else Stable; pixels where every input is nodata stay nodata.
pub(crate) fn combine_ternaries(rasters: &[&Raster<f64>], nodata: f64) -> Result<Raster<f64>> {
    let first = rasters
        .first()
        .ok_or_else(|| EngineError::parameter("no sub-indicators to combine"))?;
    let (rows, cols) = first.shape();

    let mut out = first.with_same_meta::<f64>(rows, cols);
    out.set_nodata(Some(nodata));

    for row in 0..rows {
        for col in 0..cols {
            let mut any_degraded = false;
            let mut any_improved = false;
            let mut any_valid = false;

            for raster in rasters {
                let v = unsafe { raster.get_unchecked(row, col) };
                if raster.is_nodata(v) {
                    continue;
                }
                any_valid = true;
                if v == ChangeTernary::Degraded.code() as f64 {
                    any_degraded = true;
                } else if v == ChangeTernary::Improved.code() as f64 {
                    any_improved = true;
                }
            }

            let code = if !any_valid {
                nodata
            } else if any_degraded {
                ChangeTernary::Degraded.code() as f64
            } else if any_improved {
                ChangeTernary::Improved.code() as f64
            } else {
                ChangeTernary::Stable.code() as f64
            };
            out.set(row, col, code)?;
        }
    }

    Ok(out)
}
