//! # LandMon Analysis
//!
//! The raster analysis engine of the LandMon toolkit: aligns, clips,
//! classifies, and scores gridded environmental datasets against vector
//! regions of interest to produce land-cover, degradation, and erosion
//! indicators.
//!
//! ## Pipeline
//!
//! metadata resolution -> alignment -> vector clipping -> zonal statistics
//! or pairwise classification/scoring -> result assembly. Every analysis
//! invocation is a stateless input-to-output computation over its own
//! [`workspace::Workspace`]; concurrent invocations never share mutable
//! state or output paths.
//!
//! ## Entry points
//!
//! One function per analysis type under [`analysis`]: land cover, land
//! cover change, SOC change, productivity sub-indicators, land
//! degradation, erosion indices, and coastal vulnerability. Each returns an
//! [`analysis::AnalysisResponse`] - either the assembled payload or a
//! structured error, never a panic across the boundary.

pub mod align;
pub mod analysis;
pub mod assemble;
pub mod catalog;
pub mod clip;
pub mod coefficients;
pub mod config;
pub mod error;
pub mod expr;
pub mod landcover;
pub mod meta;
mod maybe_rayon;
pub mod scoring;
pub mod tiles;
pub mod transition;
pub mod workspace;
pub mod zonal;

pub use config::EngineConfig;
pub use error::{EngineError, Result};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::align::{align, Resampling};
    pub use crate::analysis::{
        coastal_vulnerability, land_cover, land_cover_change, land_degradation, productivity,
        soc_change, trajectory, AnalysisContext, AnalysisResponse,
    };
    pub use crate::assemble::{assemble, AnalysisResult, AssembleRequest};
    pub use crate::catalog::RasterRecord;
    pub use crate::clip::{clip_to_vector, ClipStorage, PixelInclusion};
    pub use crate::coefficients::{ClimaticRegion, CoefficientMatrix};
    pub use crate::config::EngineConfig;
    pub use crate::error::{EngineError, Result};
    pub use crate::landcover::{ChangeTernary, LandCoverClass, TransitionMatrix};
    pub use crate::meta::{resolve_meta, RasterMeta};
    pub use crate::scoring::score_change;
    pub use crate::transition::classify_transition;
    pub use crate::workspace::Workspace;
    pub use crate::zonal::{zonal_stats, CountTransform, ValueMapping};
}
