//! Engine error taxonomy
//!
//! Three kinds of failure cross the engine:
//! - parameter errors, detected before any raster I/O
//! - resource errors (missing files, no raster for a period), fatal for the
//!   current call
//! - numeric/data errors, which never surface here: they become nodata
//!   pixels in the output
//!
//! At the analysis boundary every error is rendered into a response payload
//! (`{ "error": message }`), so queued and synchronous callers report
//! failures through the same path.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the raster analysis engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{0}")]
    Parameter(String),

    #[error("raster {0} does not exist")]
    RasterNotFound(PathBuf),

    #[error("no raster is associated with period {year}")]
    NoRasterForPeriod { year: i32 },

    #[error("multiple rasters exist for the selected period {year}")]
    AmbiguousRasterMatch { year: i32 },

    #[error("cannot reproject between {from} and {to}")]
    UnsupportedReprojection { from: String, to: String },

    #[error(transparent)]
    Core(#[from] landmon_core::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Convenience constructor for parameter errors
    pub fn parameter(msg: impl Into<String>) -> Self {
        EngineError::Parameter(msg.into())
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
