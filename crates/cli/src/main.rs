//! LandMon CLI - land-degradation raster analyses over files on disk

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use geo_types::{Coord, Geometry, LineString, MultiPolygon, Polygon};
use landmon_analysis::analysis::{
    land_cover, land_cover_change, soc_change, trajectory, AnalysisContext, AnalysisResponse,
    LandCoverChangeParams, LandCoverParams, ProductivityParams, SocChangeParams,
};
use landmon_analysis::catalog::RasterRecord;
use landmon_analysis::coefficients::ClimaticRegion;
use landmon_analysis::meta::resolve_meta;
use landmon_analysis::zonal::{CountTransform, ValueMapping};
use landmon_analysis::EngineConfig;
use serde_json::Value;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "landmon")]
#[command(author, version, about = "Land-degradation raster analysis", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory for derived rasters
    #[arg(long, global = true, default_value = "landmon_outputs")]
    output_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show grid metadata of a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Land-cover distribution for one period
    LandCover {
        /// Land-cover raster
        #[arg(long)]
        raster: PathBuf,
        /// Region of interest as a GeoJSON file
        #[arg(long)]
        region: PathBuf,
        /// Analysis year
        #[arg(long)]
        year: i32,
        /// Ground area per pixel (e.g. hectares)
        #[arg(long, default_value_t = 1.0)]
        resolution: f64,
        /// Count transform: "area" or an expression over x
        #[arg(long, default_value = "area")]
        transform: String,
    },
    /// Land-cover change between two periods
    LandCoverChange {
        /// Base-period land-cover raster
        #[arg(long)]
        base: PathBuf,
        /// Target-period land-cover raster
        #[arg(long)]
        target: PathBuf,
        #[arg(long)]
        region: PathBuf,
        #[arg(long)]
        base_year: i32,
        #[arg(long)]
        target_year: i32,
        #[arg(long, default_value_t = 1.0)]
        resolution: f64,
    },
    /// Soil organic carbon change between two periods
    SocChange {
        /// Base-period land-cover raster
        #[arg(long)]
        base: PathBuf,
        /// Target-period land-cover raster
        #[arg(long)]
        target: PathBuf,
        /// Reference soil organic carbon raster
        #[arg(long)]
        soc: PathBuf,
        #[arg(long)]
        region: PathBuf,
        #[arg(long)]
        base_year: i32,
        #[arg(long)]
        target_year: i32,
        /// Climate region: temperate-dry, temperate-moist, tropical-dry,
        /// tropical-moist, tropical-montane
        #[arg(long, default_value = "temperate-dry")]
        climate: String,
        /// Stable range half-width in percent
        #[arg(long, default_value_t = 10.0)]
        cutoff: f64,
        #[arg(long, default_value_t = 1.0)]
        resolution: f64,
    },
    /// Productivity trajectory between two periods
    Trajectory {
        /// Base-period vegetation-index raster
        #[arg(long)]
        base: PathBuf,
        /// Target-period vegetation-index raster
        #[arg(long)]
        target: PathBuf,
        #[arg(long)]
        region: PathBuf,
        #[arg(long)]
        base_year: i32,
        #[arg(long)]
        target_year: i32,
        #[arg(long, default_value_t = 10.0)]
        cutoff: f64,
        #[arg(long, default_value_t = 1.0)]
        resolution: f64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let config = EngineConfig {
        output_dir: cli.output_dir.clone(),
        ..EngineConfig::default()
    };

    match cli.command {
        Commands::Info { input } => {
            let meta = resolve_meta(&input, &config)?;
            println!("file:      {}", input.display());
            println!("size:      {} x {} (cols x rows)", meta.cols, meta.rows);
            println!("bands:     {}", meta.band_count);
            println!(
                "crs:       {}",
                meta.crs
                    .as_ref()
                    .map(|c| c.identifier())
                    .unwrap_or_else(|| "unknown".to_string())
            );
            println!(
                "origin:    ({}, {})",
                meta.transform.origin_x, meta.transform.origin_y
            );
            println!(
                "cell size: {} x {}",
                meta.transform.pixel_width,
                meta.transform.pixel_height.abs()
            );
            println!("nodata:    {}", meta.nodata);
            Ok(())
        }

        Commands::LandCover {
            raster,
            region,
            year,
            resolution,
            transform,
        } => {
            let geometry = load_region(&region)?;
            let params = LandCoverParams {
                geometry,
                rasters: vec![record(1, &raster, resolution, year)],
                mapping: ValueMapping::empty(),
                start_year: Some(year),
                end_year: Some(year),
                transform: CountTransform::parse(&transform),
            };
            print_response(land_cover(&params, &AnalysisContext::new(&config)))
        }

        Commands::LandCoverChange {
            base,
            target,
            region,
            base_year,
            target_year,
            resolution,
        } => {
            let geometry = load_region(&region)?;
            let params = LandCoverChangeParams {
                geometry,
                rasters: vec![
                    record(1, &base, resolution, base_year),
                    record(2, &target, resolution, target_year),
                ],
                start_year: Some(base_year),
                end_year: Some(target_year),
            };
            print_response(land_cover_change(&params, &AnalysisContext::new(&config)))
        }

        Commands::SocChange {
            base,
            target,
            soc,
            region,
            base_year,
            target_year,
            climate,
            cutoff,
            resolution,
        } => {
            let geometry = load_region(&region)?;
            let params = SocChangeParams {
                geometry,
                land_cover_rasters: vec![
                    record(1, &base, resolution, base_year),
                    record(2, &target, resolution, target_year),
                ],
                reference_soc: RasterRecord::new(
                    3,
                    soc.display().to_string(),
                    &soc,
                    resolution,
                ),
                climatic_region: parse_climate(&climate)?,
                cutoff_percentage: cutoff,
                start_year: Some(base_year),
                end_year: Some(target_year),
            };
            print_response(soc_change(&params, &AnalysisContext::new(&config)))
        }

        Commands::Trajectory {
            base,
            target,
            region,
            base_year,
            target_year,
            cutoff,
            resolution,
        } => {
            let geometry = load_region(&region)?;
            let params = ProductivityParams {
                geometry,
                vi_rasters: vec![
                    record(1, &base, resolution, base_year),
                    record(2, &target, resolution, target_year),
                ],
                reference_eco_units: None,
                cutoff_percentage: cutoff,
                start_year: Some(base_year),
                end_year: Some(target_year),
            };
            print_response(trajectory(&params, &AnalysisContext::new(&config)))
        }
    }
}

fn record(id: i64, path: &PathBuf, resolution: f64, year: i32) -> RasterRecord {
    RasterRecord::new(id, path.display().to_string(), path, resolution).with_year(year)
}

fn print_response(response: AnalysisResponse) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn parse_climate(text: &str) -> Result<ClimaticRegion> {
    Ok(match text {
        "temperate-dry" => ClimaticRegion::TemperateDry,
        "temperate-moist" => ClimaticRegion::TemperateMoist,
        "tropical-dry" => ClimaticRegion::TropicalDry,
        "tropical-moist" => ClimaticRegion::TropicalMoist,
        "tropical-montane" => ClimaticRegion::TropicalMontane,
        other => bail!("unknown climate region '{}'", other),
    })
}

/// Load a polygon or multipolygon region from a GeoJSON file.
///
/// Accepts a bare geometry, a Feature, or a FeatureCollection (first
/// feature wins).
fn load_region(path: &PathBuf) -> Result<Geometry<f64>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read region file {}", path.display()))?;
    let value: Value = serde_json::from_str(&text).context("region file is not valid JSON")?;
    parse_geometry(&value)
}

fn parse_geometry(value: &Value) -> Result<Geometry<f64>> {
    match value["type"].as_str() {
        Some("Polygon") => Ok(Geometry::Polygon(parse_polygon(&value["coordinates"])?)),
        Some("MultiPolygon") => {
            let rings = value["coordinates"]
                .as_array()
                .context("MultiPolygon has no coordinates")?;
            let polygons = rings
                .iter()
                .map(parse_polygon)
                .collect::<Result<Vec<_>>>()?;
            Ok(Geometry::MultiPolygon(MultiPolygon::new(polygons)))
        }
        Some("Feature") => parse_geometry(&value["geometry"]),
        Some("FeatureCollection") => {
            let first = value["features"]
                .as_array()
                .and_then(|f| f.first())
                .context("FeatureCollection is empty")?;
            parse_geometry(first)
        }
        other => bail!("unsupported GeoJSON type {:?}", other),
    }
}

fn parse_polygon(coordinates: &Value) -> Result<Polygon<f64>> {
    let rings = coordinates.as_array().context("polygon has no rings")?;
    let mut parsed: Vec<LineString<f64>> = rings
        .iter()
        .map(|ring| {
            let coords = ring
                .as_array()
                .context("ring is not an array")?
                .iter()
                .map(|pair| {
                    let x = pair[0].as_f64().context("coordinate is not a number")?;
                    let y = pair[1].as_f64().context("coordinate is not a number")?;
                    Ok(Coord { x, y })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(LineString::new(coords))
        })
        .collect::<Result<Vec<_>>>()?;

    if parsed.is_empty() {
        bail!("polygon has no exterior ring");
    }
    let exterior = parsed.remove(0);
    Ok(Polygon::new(exterior, parsed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_bare_polygon() {
        let value = json!({
            "type": "Polygon",
            "coordinates": [[[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0], [0.0, 0.0]]]
        });
        let geometry = parse_geometry(&value).unwrap();
        assert!(matches!(geometry, Geometry::Polygon(_)));
    }

    #[test]
    fn parse_feature_collection() {
        let value = json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {},
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [[[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]]
                }
            }]
        });
        let geometry = parse_geometry(&value).unwrap();
        assert!(matches!(geometry, Geometry::MultiPolygon(_)));
    }

    #[test]
    fn reject_unsupported_geometry() {
        let value = json!({"type": "Point", "coordinates": [0.0, 0.0]});
        assert!(parse_geometry(&value).is_err());
    }

    #[test]
    fn climate_names() {
        assert!(parse_climate("tropical-moist").is_ok());
        assert!(parse_climate("arctic").is_err());
    }
}
