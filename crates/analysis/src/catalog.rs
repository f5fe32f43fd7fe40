//! Resolved raster catalog records
//!
//! The raster catalog itself (category/source/year lookup, admin scoping)
//! is an external collaborator; analyses receive already-resolved records
//! and only select among them by period. Selection failures follow the
//! parameter/resource error taxonomy.

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A raster resolved by the external catalog to a file on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasterRecord {
    pub id: i64,
    pub name: String,
    pub path: PathBuf,
    /// Ground area per pixel, used to convert counts to area
    pub resolution: f64,
    pub year: Option<i32>,
}

impl RasterRecord {
    pub fn new(id: i64, name: impl Into<String>, path: impl Into<PathBuf>, resolution: f64) -> Self {
        Self {
            id,
            name: name.into(),
            path: path.into(),
            resolution,
            year: None,
        }
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }
}

/// Validate an analysis period.
///
/// Both years must be present and ordered when `both_required`; otherwise a
/// single year is enough and stands in for the missing bound.
pub fn validate_years(
    start_year: Option<i32>,
    end_year: Option<i32>,
    both_required: bool,
) -> Result<(i32, i32)> {
    match (start_year, end_year) {
        (Some(start), Some(end)) => {
            if start > end {
                return Err(EngineError::parameter(
                    "start year must not be later than end year",
                ));
            }
            Ok((start, end))
        }
        (Some(year), None) | (None, Some(year)) if !both_required => Ok((year, year)),
        _ if both_required => Err(EngineError::parameter(
            "both start and end years must be specified",
        )),
        _ => Err(EngineError::parameter("no analysis year specified")),
    }
}

/// First record matching a year; resource error when none does
pub fn first_for_year(records: &[RasterRecord], year: i32) -> Result<&RasterRecord> {
    records
        .iter()
        .find(|r| r.year == Some(year))
        .ok_or(EngineError::NoRasterForPeriod { year })
}

/// The unique record matching a year; ambiguity is a parameter error for
/// single-period analyses
pub fn single_for_year(records: &[RasterRecord], year: i32) -> Result<&RasterRecord> {
    let mut matches = records.iter().filter(|r| r.year == Some(year));
    let first = matches.next().ok_or(EngineError::NoRasterForPeriod { year })?;
    if matches.next().is_some() {
        return Err(EngineError::AmbiguousRasterMatch { year });
    }
    Ok(first)
}
