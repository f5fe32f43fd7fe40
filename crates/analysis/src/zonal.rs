//! Categorical and continuous zonal statistics
//!
//! Clips each raster to the region of interest and reports, for
//! categorical rasters, the pixel count of every distinct value present
//! (annotated through the value mapping and transformed into area or an
//! arbitrary derived quantity); for continuous rasters, summary statistics
//! over the clipped region.

use crate::catalog::RasterRecord;
use crate::clip::{clip_to_vector, ClipStorage};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::expr::eval_expression;
use crate::workspace::Workspace;
use geo_types::Geometry;
use landmon_core::Raster;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How a raw pixel count is turned into the reported value
#[derive(Debug, Clone, PartialEq)]
pub enum CountTransform {
    /// Multiply the count by the raster's resolution
    Area,
    /// Arbitrary arithmetic over the placeholder `x` bound to the count
    Expression(String),
}

impl CountTransform {
    /// The literal token `area` selects the area conversion; any other
    /// string is kept as an expression.
    pub fn parse(text: &str) -> Self {
        if text.trim() == "area" {
            CountTransform::Area
        } else {
            CountTransform::Expression(text.to_string())
        }
    }

    pub fn apply(&self, count: usize, resolution: f64) -> Result<f64> {
        match self {
            CountTransform::Area => Ok(count as f64 * resolution),
            CountTransform::Expression(expr) => eval_expression(expr, count as f64),
        }
    }
}

impl Default for CountTransform {
    fn default() -> Self {
        CountTransform::Area
    }
}

/// One (pixel value, label, color) display annotation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueLabel {
    pub value: f64,
    pub label: String,
    pub color: Option<String>,
}

/// Ordered display annotations for a raster type. Annotation only: never
/// consulted by classification logic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValueMapping {
    entries: Vec<ValueLabel>,
}

impl ValueMapping {
    pub fn new(entries: Vec<ValueLabel>) -> Self {
        Self { entries }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[ValueLabel] {
        &self.entries
    }

    pub fn label_for(&self, value: f64) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.value == value)
            .map(|e| e.label.as_str())
    }
}

/// Count and transformed value for one distinct pixel value
#[derive(Debug, Clone, Serialize)]
pub struct ZonalEntry {
    pub key: f64,
    pub label: String,
    pub count: usize,
    pub value: f64,
}

/// Summary statistics for a continuous raster over the region
#[derive(Debug, Clone, Serialize)]
pub struct ContinuousSummary {
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub std_dev: Option<f64>,
    pub valid_count: usize,
}

/// Statistics for one raster in the request
#[derive(Debug, Clone, Serialize)]
pub struct RasterZonal {
    pub raster_id: i64,
    pub raster_name: String,
    pub resolution: f64,
    pub year: Option<i32>,
    pub entries: Vec<ZonalEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ContinuousSummary>,
}

/// Full zonal statistics report
#[derive(Debug, Clone, Serialize)]
pub struct ZonalReport {
    pub mapping: Vec<ValueLabel>,
    pub rasters: Vec<RasterZonal>,
}

/// Compute zonal statistics for each raster over the region.
///
/// A record whose file is missing is a resource error; the statistics for
/// the remaining rasters are never partially returned.
pub fn zonal_stats(
    geometry: &Geometry<f64>,
    records: &[RasterRecord],
    mapping: &ValueMapping,
    transform: &CountTransform,
    categorical: bool,
    config: &EngineConfig,
    workspace: &Workspace,
) -> Result<ZonalReport> {
    let mut rasters = Vec::with_capacity(records.len());

    for record in records {
        let clip = clip_to_vector(
            &record.path,
            geometry,
            config.clip_policy,
            None,
            ClipStorage::Scratch,
            config,
            workspace,
        )?
        .ok_or_else(|| EngineError::RasterNotFound(record.path.clone()))?;

        let (entries, summary) = if categorical {
            let counts = value_counts(&clip.raster);
            let mut entries = Vec::with_capacity(counts.len());
            for (key, count) in counts {
                let label = mapping
                    .label_for(key)
                    .map(str::to_string)
                    .unwrap_or_else(|| format_key(key));
                entries.push(ZonalEntry {
                    key,
                    label,
                    count,
                    value: transform.apply(count, record.resolution)?,
                });
            }
            (entries, None)
        } else {
            let s = clip.raster.summarize();
            (
                Vec::new(),
                Some(ContinuousSummary {
                    mean: s.mean,
                    min: s.min,
                    max: s.max,
                    std_dev: s.std_dev,
                    valid_count: s.valid_count,
                }),
            )
        };

        rasters.push(RasterZonal {
            raster_id: record.id,
            raster_name: record.name.clone(),
            resolution: record.resolution,
            year: record.year,
            entries,
            summary,
        });
    }

    Ok(ZonalReport {
        mapping: mapping.entries().to_vec(),
        rasters,
    })
}

/// Pixel counts of every distinct valid value, sorted by value
pub fn value_counts(raster: &Raster<f64>) -> Vec<(f64, usize)> {
    let mut counts: HashMap<u64, (f64, usize)> = HashMap::new();
    for &v in raster.data().iter() {
        if raster.is_nodata(v) {
            continue;
        }
        let entry = counts.entry(v.to_bits()).or_insert((v, 0));
        entry.1 += 1;
    }

    let mut result: Vec<(f64, usize)> = counts.into_values().collect();
    result.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    result
}

fn format_key(key: f64) -> String {
    if key.fract() == 0.0 && key.abs() < 1e15 {
        format!("{}", key as i64)
    } else {
        format!("{}", key)
    }
}
