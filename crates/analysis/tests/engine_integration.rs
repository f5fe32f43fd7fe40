//! End-to-end engine tests over synthetic rasters on disk

use geo_types::{polygon, Geometry};
use landmon_analysis::analysis::{
    land_cover, land_cover_change, soc_change, trajectory, AnalysisContext, LandCoverChangeParams,
    LandCoverParams, ProductivityParams, SocChangeParams,
};
use landmon_analysis::catalog::RasterRecord;
use landmon_analysis::coefficients::ClimaticRegion;
use landmon_analysis::config::EngineConfig;
use landmon_analysis::zonal::{CountTransform, ValueMapping};
use landmon_core::io::write_geotiff;
use landmon_core::{Crs, GeoTransform, Raster};
use std::path::PathBuf;

struct TestArea {
    config: EngineConfig,
    dir: tempfile::TempDir,
}

impl TestArea {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig {
            output_dir: dir.path().join("outputs"),
            ..EngineConfig::default()
        };
        Self { config, dir }
    }

    /// Write a 10x10 raster over (0,0)..(10,10), cell size 1
    fn write_raster(&self, name: &str, values: Vec<f64>) -> PathBuf {
        let mut raster = Raster::from_vec(values, 10, 10).unwrap();
        raster.set_transform(GeoTransform::new(0.0, 10.0, 1.0, -1.0));
        raster.set_crs(Some(Crs::from_epsg(32630)));
        raster.set_nodata(Some(-9999.0));
        let path = self.dir.path().join(name);
        write_geotiff(&raster, &path, None).unwrap();
        path
    }
}

fn full_region() -> Geometry<f64> {
    Geometry::Polygon(polygon![
        (x: 0.0, y: 0.0),
        (x: 10.0, y: 0.0),
        (x: 10.0, y: 10.0),
        (x: 0.0, y: 10.0),
    ])
}

/// 60 Forest + 40 Cropland
fn split_cover() -> Vec<f64> {
    let mut values = vec![1.0; 60];
    values.extend(vec![3.0; 40]);
    values
}

#[test]
fn land_cover_single_period() {
    let area = TestArea::new();
    let path = area.write_raster("lc_2015.tif", split_cover());
    let ctx = AnalysisContext::new(&area.config);

    let params = LandCoverParams {
        geometry: full_region(),
        rasters: vec![RasterRecord::new(1, "lc_2015", path, 0.09).with_year(2015)],
        mapping: ValueMapping::empty(),
        start_year: Some(2015),
        end_year: Some(2015),
        transform: CountTransform::Area,
    };

    let response = land_cover(&params, &ctx);
    let result = response.result().expect("analysis should succeed");

    assert_eq!(result.base, 2015);
    assert_eq!(result.target, 2015);
    assert_eq!(result.nodataval, -9999.0);

    let rasters = result.stats["rasters"].as_array().unwrap();
    let entries = rasters[0]["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["count"], 60);
    assert!((entries[0]["value"].as_f64().unwrap() - 5.4).abs() < 1e-9);
    assert_eq!(entries[1]["count"], 40);
    assert!((entries[1]["value"].as_f64().unwrap() - 3.6).abs() < 1e-9);
}

#[test]
fn land_cover_rejects_two_period_request() {
    let area = TestArea::new();
    let path = area.write_raster("lc_2015.tif", split_cover());
    let ctx = AnalysisContext::new(&area.config);

    let params = LandCoverParams {
        geometry: full_region(),
        rasters: vec![RasterRecord::new(1, "lc_2015", path, 0.09).with_year(2015)],
        mapping: ValueMapping::empty(),
        start_year: Some(2015),
        end_year: Some(2020),
        transform: CountTransform::Area,
    };

    let response = land_cover(&params, &ctx);
    assert!(response
        .error()
        .unwrap()
        .contains("single period"));
}

#[test]
fn land_cover_ambiguous_period_is_an_error() {
    let area = TestArea::new();
    let path_a = area.write_raster("lc_2015a.tif", split_cover());
    let path_b = area.write_raster("lc_2015b.tif", split_cover());
    let ctx = AnalysisContext::new(&area.config);

    let params = LandCoverParams {
        geometry: full_region(),
        rasters: vec![
            RasterRecord::new(1, "a", path_a, 0.09).with_year(2015),
            RasterRecord::new(2, "b", path_b, 0.09).with_year(2015),
        ],
        mapping: ValueMapping::empty(),
        start_year: Some(2015),
        end_year: Some(2015),
        transform: CountTransform::Area,
    };

    let response = land_cover(&params, &ctx);
    assert!(response.error().unwrap().contains("Multiple")
        || response.error().unwrap().contains("multiple"));
}

#[test]
fn land_cover_change_forest_to_cropland() {
    let area = TestArea::new();
    let base = area.write_raster("lc_2015.tif", vec![1.0; 100]);
    let target = area.write_raster("lc_2020.tif", split_cover());
    let ctx = AnalysisContext::new(&area.config);

    let params = LandCoverChangeParams {
        geometry: full_region(),
        rasters: vec![
            RasterRecord::new(1, "lc_2015", base, 0.09).with_year(2015),
            RasterRecord::new(2, "lc_2020", target, 0.09).with_year(2020),
        ],
        start_year: Some(2015),
        end_year: Some(2020),
    };

    let response = land_cover_change(&params, &ctx);
    let result = response.result().expect("analysis should succeed");

    let stats = result.stats.as_array().unwrap();
    assert_eq!(stats[0]["label"], "Stable");
    assert_eq!(stats[0]["count"], 60);
    assert!((stats[0]["area"].as_f64().unwrap() - 5.4).abs() < 1e-9);
    assert_eq!(stats[1]["label"], "Improved");
    assert_eq!(stats[1]["count"], 0);
    assert_eq!(stats[2]["label"], "Degraded");
    assert_eq!(stats[2]["count"], 40);
    assert!((stats[2]["area"].as_f64().unwrap() - 3.6).abs() < 1e-9);

    // No unclassified pixels in this scenario.
    assert_eq!(result.nodata, 0.0);

    // The clipped per-period rasters are surfaced for download.
    assert!(result.extras["rasters"]["2015"].is_string());
    assert!(result.extras["rasters"]["2020"].is_string());

    // The persisted derivative exists on disk.
    assert!(PathBuf::from(&result.rasterfile).exists());
}

#[test]
fn land_cover_change_requires_both_periods() {
    let area = TestArea::new();
    let base = area.write_raster("lc_2015.tif", vec![1.0; 100]);
    let ctx = AnalysisContext::new(&area.config);

    let params = LandCoverChangeParams {
        geometry: full_region(),
        rasters: vec![RasterRecord::new(1, "lc_2015", base, 0.09).with_year(2015)],
        start_year: Some(2015),
        end_year: None,
    };

    let response = land_cover_change(&params, &ctx);
    assert!(response.error().is_some());
}

#[test]
fn land_cover_change_missing_period_raster() {
    let area = TestArea::new();
    let base = area.write_raster("lc_2015.tif", vec![1.0; 100]);
    let ctx = AnalysisContext::new(&area.config);

    let params = LandCoverChangeParams {
        geometry: full_region(),
        rasters: vec![RasterRecord::new(1, "lc_2015", base, 0.09).with_year(2015)],
        start_year: Some(2015),
        end_year: Some(2020),
    };

    let response = land_cover_change(&params, &ctx);
    assert!(response.error().unwrap().contains("2020"));
}

#[test]
fn soc_change_forest_cultivation() {
    let area = TestArea::new();
    // All forest converts to cropland; temperate dry factor 0.8 -> -20%.
    let base = area.write_raster("lc_2015.tif", vec![1.0; 100]);
    let target = area.write_raster("lc_2020.tif", vec![3.0; 100]);
    let soc = area.write_raster("soc_ref.tif", vec![50.0; 100]);
    let ctx = AnalysisContext::new(&area.config);

    let params = SocChangeParams {
        geometry: full_region(),
        land_cover_rasters: vec![
            RasterRecord::new(1, "lc_2015", base, 0.09).with_year(2015),
            RasterRecord::new(2, "lc_2020", target, 0.09).with_year(2020),
        ],
        reference_soc: RasterRecord::new(3, "soc", soc, 0.09),
        climatic_region: ClimaticRegion::TemperateDry,
        cutoff_percentage: 10.0,
        start_year: Some(2015),
        end_year: Some(2020),
    };

    let response = soc_change(&params, &ctx);
    let result = response.result().expect("analysis should succeed");

    let stats = result.stats.as_array().unwrap();
    assert_eq!(stats[2]["label"], "Degraded");
    assert_eq!(stats[2]["count"], 100);
    assert_eq!(stats[0]["count"], 0);
    assert_eq!(stats[1]["count"], 0);
}

#[test]
fn trajectory_threshold_split() {
    let area = TestArea::new();
    // Base NDVI-scaled values 100; target: half improves by 25%, half drops
    // by 25%.
    let base = area.write_raster("vi_2015.tif", vec![100.0; 100]);
    let mut target_values = vec![125.0; 50];
    target_values.extend(vec![75.0; 50]);
    let target = area.write_raster("vi_2020.tif", target_values);
    let ctx = AnalysisContext::new(&area.config);

    let params = ProductivityParams {
        geometry: full_region(),
        vi_rasters: vec![
            RasterRecord::new(1, "vi_2015", base, 0.09).with_year(2015),
            RasterRecord::new(2, "vi_2020", target, 0.09).with_year(2020),
        ],
        reference_eco_units: None,
        cutoff_percentage: 10.0,
        start_year: Some(2015),
        end_year: Some(2020),
    };

    let response = trajectory(&params, &ctx);
    let result = response.result().expect("analysis should succeed");

    let stats = result.stats.as_array().unwrap();
    assert_eq!(stats[1]["label"], "Improved");
    assert_eq!(stats[1]["count"], 50);
    assert_eq!(stats[2]["label"], "Degraded");
    assert_eq!(stats[2]["count"], 50);
    assert_eq!(stats[0]["count"], 0);
}

#[test]
fn area_invariant_across_categories() {
    let area = TestArea::new();
    let base = area.write_raster("lc_2015.tif", vec![1.0; 100]);
    // Target contains an unknown class code (8): those pixels stay
    // unclassified and count as nodata area.
    let mut values = vec![1.0; 70];
    values.extend(vec![8.0; 30]);
    let target = area.write_raster("lc_2020.tif", values);
    let ctx = AnalysisContext::new(&area.config);

    let params = LandCoverChangeParams {
        geometry: full_region(),
        rasters: vec![
            RasterRecord::new(1, "lc_2015", base, 0.09).with_year(2015),
            RasterRecord::new(2, "lc_2020", target, 0.09).with_year(2020),
        ],
        start_year: Some(2015),
        end_year: Some(2020),
    };

    let response = land_cover_change(&params, &ctx);
    let result = response.result().expect("analysis should succeed");

    let resolution = 0.09;
    let stats = result.stats.as_array().unwrap();
    let category_area: f64 = stats.iter().map(|s| s["area"].as_f64().unwrap()).sum();
    let total_area = 100.0 * resolution;
    assert!((category_area + result.nodata - total_area).abs() < 1e-9);
    assert!((result.nodata - 30.0 * resolution).abs() < 1e-9);
}
