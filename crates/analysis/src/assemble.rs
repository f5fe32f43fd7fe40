//! Result assembly
//!
//! Persists a derived classification array as a raster inheriting its
//! georeferencing from a reference file, computes the frequency
//! distribution, converts counts to area, and builds the response payload.

use crate::config::EngineConfig;
use crate::error::Result;
use crate::landcover::Category;
use crate::meta::resolve_meta;
use crate::tiles::{TileLayer, TilePublisher};
use crate::workspace::Workspace;
use landmon_core::io::write_geotiff;
use landmon_core::Raster;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// Everything the assembler needs for one derived raster
pub struct AssembleRequest<'a> {
    /// Derived classification array
    pub data: &'a Raster<f64>,
    /// Raster whose CRS/transform the output inherits
    pub metadata_raster: &'a Path,
    /// Categories the derived raster can take, for zero-defaulted stats and
    /// tile styling
    pub categories: &'a [Category],
    pub nodata: f64,
    /// Ground area per pixel for count-to-area conversion
    pub resolution: f64,
    pub base_year: i32,
    pub target_year: i32,
    /// Filename prefix of the persisted raster
    pub prefix: &'a str,
    /// Already-computed statistics payload replacing the per-category counts
    pub precomputed_stats: Option<Value>,
    /// Extra payload values surfaced to the caller unchanged
    pub extras: Value,
}

/// Count/area statistics for one category
#[derive(Debug, Clone, Serialize)]
pub struct CategoryStat {
    pub key: i32,
    pub label: String,
    pub count: usize,
    pub area: f64,
}

/// Final analysis payload
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub base: i32,
    pub target: i32,
    /// Path of the persisted derivative raster
    pub rasterfile: String,
    pub nodataval: f64,
    /// Nodata area (count x resolution)
    pub nodata: f64,
    pub stats: Value,
    pub extras: Value,
    pub tiles: TileLayer,
}

/// Persist the derived raster and assemble the response payload
pub fn assemble(
    request: AssembleRequest<'_>,
    config: &EngineConfig,
    workspace: &Workspace,
    publisher: Option<&dyn TilePublisher>,
) -> Result<AnalysisResult> {
    let meta = resolve_meta(request.metadata_raster, config)?;

    // Int32 output carrying the reference georeferencing and its own nodata.
    let (rows, cols) = request.data.shape();
    let nodata_int = request.nodata as i32;
    let mut out: Raster<i32> = Raster::zeros(rows, cols);
    out.set_transform(meta.transform);
    out.set_crs(meta.crs.clone());
    out.set_nodata(Some(nodata_int));

    let mut frequency: HashMap<i32, usize> = HashMap::new();
    for ((r, c), &v) in request.data.data().indexed_iter() {
        let code = if v.is_finite() { v as i32 } else { nodata_int };
        out.set(r, c, code)?;
        *frequency.entry(code).or_insert(0) += 1;
    }

    let out_path = workspace.output_raster(request.prefix);
    write_geotiff(&out, &out_path, None)?;
    info!(path = %out_path.display(), "persisted derived raster");

    let stats = match request.precomputed_stats {
        Some(stats) => stats,
        None => {
            let per_category: Vec<CategoryStat> = request
                .categories
                .iter()
                .map(|cat| {
                    let count = frequency.get(&cat.code).copied().unwrap_or(0);
                    CategoryStat {
                        key: cat.code,
                        label: cat.label.to_string(),
                        count,
                        area: count as f64 * request.resolution,
                    }
                })
                .collect();
            serde_json::to_value(per_category).map_err(|e| {
                landmon_core::Error::Other(format!("stats serialization: {}", e))
            })?
        }
    };

    let nodata_count = frequency.get(&nodata_int).copied().unwrap_or(0);

    let tiles = match publisher {
        Some(publisher) if config.enable_tiles => {
            publisher.publish_raster(&out_path, request.categories, request.nodata)?
        }
        _ => TileLayer::default(),
    };

    Ok(AnalysisResult {
        base: request.base_year,
        target: request.target_year,
        rasterfile: out_path.display().to_string(),
        nodataval: request.nodata,
        nodata: nodata_count as f64 * request.resolution,
        stats,
        extras: request.extras,
        tiles,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landcover::CHANGE_CATEGORIES;
    use landmon_core::io::read_geotiff;
    use landmon_core::{Crs, GeoTransform};
    use std::path::PathBuf;

    fn test_setup() -> (EngineConfig, Workspace) {
        let config = EngineConfig {
            output_dir: std::env::temp_dir().join("landmon_assemble_test"),
            ..EngineConfig::default()
        };
        let ws = Workspace::create(&config).unwrap();
        (config, ws)
    }

    fn reference_raster(ws: &Workspace) -> PathBuf {
        let mut raster: Raster<f64> = Raster::filled(10, 10, 1.0);
        raster.set_transform(GeoTransform::new(500_000.0, 4_500_000.0, 30.0, -30.0));
        raster.set_crs(Some(Crs::from_epsg(32630)));
        raster.set_nodata(Some(-9999.0));
        let path = ws.temp_raster("reference");
        write_geotiff(&raster, &path, None).unwrap();
        path
    }

    fn classified_data() -> Raster<f64> {
        // 60 stable, 40 degraded
        let mut values = vec![1.0; 60];
        values.extend(vec![3.0; 40]);
        let mut r = Raster::from_vec(values, 10, 10).unwrap();
        r.set_nodata(Some(-9999.0));
        r
    }

    #[test]
    fn payload_counts_and_areas() {
        let (config, ws) = test_setup();
        let reference = reference_raster(&ws);
        let data = classified_data();

        let result = assemble(
            AssembleRequest {
                data: &data,
                metadata_raster: &reference,
                categories: &CHANGE_CATEGORIES,
                nodata: -9999.0,
                resolution: 0.09,
                base_year: 2015,
                target_year: 2020,
                prefix: "lulcchange",
                precomputed_stats: None,
                extras: Value::Null,
            },
            &config,
            &ws,
            None,
        )
        .unwrap();

        assert_eq!(result.base, 2015);
        assert_eq!(result.target, 2020);
        assert_eq!(result.nodataval, -9999.0);
        assert_eq!(result.nodata, 0.0);

        let stats = result.stats.as_array().unwrap();
        assert_eq!(stats.len(), 3);
        assert_eq!(stats[0]["label"], "Stable");
        assert_eq!(stats[0]["count"], 60);
        assert!((stats[0]["area"].as_f64().unwrap() - 5.4).abs() < 1e-12);
        assert_eq!(stats[1]["label"], "Improved");
        assert_eq!(stats[1]["count"], 0);
        assert_eq!(stats[2]["label"], "Degraded");
        assert!((stats[2]["area"].as_f64().unwrap() - 3.6).abs() < 1e-12);
    }

    #[test]
    fn area_invariant_holds() {
        let (config, ws) = test_setup();
        let reference = reference_raster(&ws);

        // Mix of categories and nodata.
        let mut values = vec![1.0; 30];
        values.extend(vec![2.0; 20]);
        values.extend(vec![3.0; 25]);
        values.extend(vec![-9999.0; 25]);
        let mut data = Raster::from_vec(values, 10, 10).unwrap();
        data.set_nodata(Some(-9999.0));

        let resolution = 0.09;
        let result = assemble(
            AssembleRequest {
                data: &data,
                metadata_raster: &reference,
                categories: &CHANGE_CATEGORIES,
                nodata: -9999.0,
                resolution,
                base_year: 2015,
                target_year: 2020,
                prefix: "test",
                precomputed_stats: None,
                extras: Value::Null,
            },
            &config,
            &ws,
            None,
        )
        .unwrap();

        let stats = result.stats.as_array().unwrap();
        let category_area: f64 = stats
            .iter()
            .map(|s| s["area"].as_f64().unwrap())
            .sum();
        let total_area = data.len() as f64 * resolution;
        assert!((category_area + result.nodata - total_area).abs() < 1e-9);
    }

    #[test]
    fn persisted_raster_roundtrips_metadata() {
        let (config, ws) = test_setup();
        let reference = reference_raster(&ws);
        let data = classified_data();

        let result = assemble(
            AssembleRequest {
                data: &data,
                metadata_raster: &reference,
                categories: &CHANGE_CATEGORIES,
                nodata: -9999.0,
                resolution: 0.09,
                base_year: 2015,
                target_year: 2020,
                prefix: "roundtrip",
                precomputed_stats: None,
                extras: Value::Null,
            },
            &config,
            &ws,
            None,
        )
        .unwrap();

        let reopened: Raster<i32> = read_geotiff(Path::new(&result.rasterfile), None).unwrap();
        let reference_meta = resolve_meta(&reference, &config).unwrap();

        assert_eq!(*reopened.transform(), reference_meta.transform);
        assert_eq!(
            reopened.crs().and_then(|c| c.epsg()),
            reference_meta.crs.as_ref().and_then(|c| c.epsg())
        );
        assert_eq!(reopened.nodata(), Some(-9999));

        // Pixel frequency distribution survives the round-trip.
        let mut ones = 0;
        let mut threes = 0;
        for &v in reopened.data().iter() {
            match v {
                1 => ones += 1,
                3 => threes += 1,
                _ => {}
            }
        }
        assert_eq!(ones, 60);
        assert_eq!(threes, 40);

        std::fs::remove_file(&result.rasterfile).ok();
    }
}
