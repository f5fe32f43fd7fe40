//! Native GeoTIFF reading/writing (without GDAL dependency)
//!
//! Uses the `tiff` crate for TIFF I/O and reads/writes the GeoTIFF tags the
//! analysis engine depends on: ModelPixelScale + ModelTiepoint (transform),
//! the GeoKey directory (EPSG code), and the GDAL nodata tag. Sample data is
//! encoded as 32-bit float; enable the `gdal` feature for full dtype and
//! compression support.

use crate::crs::Crs;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
const TAG_MODEL_TIEPOINT: u16 = 33922;
const TAG_GEO_KEY_DIRECTORY: u16 = 34735;
const TAG_GDAL_NODATA: u16 = 42113;

const KEY_GT_MODEL_TYPE: u32 = 1024;
const KEY_GT_RASTER_TYPE: u32 = 1025;
const KEY_GEOGRAPHIC_TYPE: u32 = 2048;
const KEY_PROJECTED_CS_TYPE: u32 = 3072;

/// Options for writing GeoTIFF files
#[derive(Debug, Clone)]
pub struct GeoTiffOptions {
    /// Compression name; the native writer stores uncompressed
    pub compression: String,
}

impl Default for GeoTiffOptions {
    fn default() -> Self {
        Self {
            compression: "NONE".to_string(),
        }
    }
}

/// Read a GeoTIFF file into a Raster
pub fn read_geotiff<T, P>(path: P, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    let mut decoder =
        Decoder::new(file).map_err(|e| Error::Tiff(format!("decode error: {}", e)))?;

    // Single-band files only on the native path; band 1 is all the engine
    // reads anyway (see the aligner contract).
    if band.unwrap_or(1) != 1 {
        return Err(Error::UnsupportedDataType(
            "native reader supports band 1 only".to_string(),
        ));
    }

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Tiff(format!("cannot read dimensions: {}", e)))?;
    let rows = height as usize;
    let cols = width as usize;

    let result = decoder
        .read_image()
        .map_err(|e| Error::Tiff(format!("cannot read image data: {}", e)))?;

    let data: Vec<T> = match result {
        DecodingResult::F32(buf) => cast_buffer(&buf),
        DecodingResult::F64(buf) => cast_buffer(&buf),
        DecodingResult::U8(buf) => cast_buffer(&buf),
        DecodingResult::U16(buf) => cast_buffer(&buf),
        DecodingResult::U32(buf) => cast_buffer(&buf),
        DecodingResult::I8(buf) => cast_buffer(&buf),
        DecodingResult::I16(buf) => cast_buffer(&buf),
        DecodingResult::I32(buf) => cast_buffer(&buf),
        _ => {
            return Err(Error::UnsupportedDataType(
                "unsupported TIFF pixel format".to_string(),
            ))
        }
    };

    if data.len() != rows * cols {
        return Err(Error::InvalidDimensions { rows, cols });
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;

    if let Some(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    if let Some(epsg) = read_epsg(&mut decoder) {
        raster.set_crs(Some(Crs::from_epsg(epsg)));
    }
    if let Some(nodata) = read_nodata(&mut decoder) {
        raster.set_nodata(num_traits::cast(nodata));
    }

    Ok(raster)
}

fn cast_buffer<S, T>(buf: &[S]) -> Vec<T>
where
    S: Copy + num_traits::NumCast,
    T: RasterElement,
{
    buf.iter()
        .map(|&v| num_traits::cast(v).unwrap_or(T::default_nodata()))
        .collect()
}

/// GeoTransform from ModelPixelScale + ModelTiepoint
fn read_geotransform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Option<GeoTransform> {
    let scale = decoder
        .get_tag_f64_vec(Tag::Unknown(TAG_MODEL_PIXEL_SCALE))
        .ok()?;
    let tiepoint = decoder
        .get_tag_f64_vec(Tag::Unknown(TAG_MODEL_TIEPOINT))
        .ok()?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }

    // tiepoint: [I, J, K, X, Y, Z]; scale: [ScaleX, ScaleY, ScaleZ]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

/// EPSG code from the GeoKey directory, if one is declared
fn read_epsg<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<u32> {
    let keys = decoder
        .get_tag_u32_vec(Tag::Unknown(TAG_GEO_KEY_DIRECTORY))
        .ok()?;
    if keys.len() < 4 {
        return None;
    }

    // Header is [version, revision, minor, key_count], then 4-value entries
    // [key_id, location, count, value]; location 0 means the value is inline.
    let count = keys[3] as usize;
    for i in 0..count {
        let base = 4 + i * 4;
        if base + 3 >= keys.len() {
            break;
        }
        let (key_id, location, value) = (keys[base], keys[base + 1], keys[base + 3]);
        if location == 0 && (key_id == KEY_PROJECTED_CS_TYPE || key_id == KEY_GEOGRAPHIC_TYPE) {
            return Some(value);
        }
    }
    None
}

/// Nodata value from the GDAL nodata ASCII tag
fn read_nodata<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    let text = decoder
        .get_tag_ascii_string(Tag::Unknown(TAG_GDAL_NODATA))
        .ok()?;
    text.trim().trim_end_matches('\0').parse::<f64>().ok()
}

/// Write a Raster to a GeoTIFF file.
///
/// Sample data is stored as 32-bit float with the raster's transform, EPSG
/// code, and nodata value in the appropriate tags, so a round-trip read
/// reproduces the georeferencing exactly.
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, _options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = BufWriter::new(File::create(path.as_ref())?);
    let mut encoder =
        TiffEncoder::new(file).map_err(|e| Error::Tiff(format!("encoder error: {}", e)))?;

    let (rows, cols) = raster.shape();
    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
        .collect();

    let mut image = encoder
        .new_image::<Gray32Float>(cols as u32, rows as u32)
        .map_err(|e| Error::Tiff(format!("cannot create image: {}", e)))?;

    let gt = raster.transform();

    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::Unknown(TAG_MODEL_PIXEL_SCALE), &scale[..])
        .map_err(|e| Error::Tiff(format!("cannot write scale tag: {}", e)))?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::Unknown(TAG_MODEL_TIEPOINT), &tiepoint[..])
        .map_err(|e| Error::Tiff(format!("cannot write tiepoint tag: {}", e)))?;

    let geokeys = build_geokeys(raster.crs());
    image
        .encoder()
        .write_tag(Tag::Unknown(TAG_GEO_KEY_DIRECTORY), &geokeys[..])
        .map_err(|e| Error::Tiff(format!("cannot write geokey tag: {}", e)))?;

    if let Some(nd) = raster.nodata().and_then(|v| v.to_f64()) {
        let text = format_nodata(nd);
        image
            .encoder()
            .write_tag(Tag::Unknown(TAG_GDAL_NODATA), text.as_str())
            .map_err(|e| Error::Tiff(format!("cannot write nodata tag: {}", e)))?;
    }

    image
        .write_data(&data)
        .map_err(|e| Error::Tiff(format!("cannot write image data: {}", e)))?;

    Ok(())
}

/// GeoKey directory for the raster's CRS.
///
/// GTRasterTypeGeoKey is always RasterPixelIsArea; the model type and CRS
/// key depend on whether the EPSG code is geographic or projected.
fn build_geokeys(crs: Option<&Crs>) -> Vec<u16> {
    match crs.and_then(|c| c.epsg()) {
        Some(4326) => vec![
            1, 1, 0, 3,
            KEY_GT_MODEL_TYPE as u16, 0, 1, 2, // ModelTypeGeographic
            KEY_GT_RASTER_TYPE as u16, 0, 1, 1,
            KEY_GEOGRAPHIC_TYPE as u16, 0, 1, 4326,
        ],
        Some(epsg) if epsg <= u16::MAX as u32 => vec![
            1, 1, 0, 3,
            KEY_GT_MODEL_TYPE as u16, 0, 1, 1, // ModelTypeProjected
            KEY_GT_RASTER_TYPE as u16, 0, 1, 1,
            KEY_PROJECTED_CS_TYPE as u16, 0, 1, epsg as u16,
        ],
        _ => vec![
            1, 1, 0, 2,
            KEY_GT_MODEL_TYPE as u16, 0, 1, 1,
            KEY_GT_RASTER_TYPE as u16, 0, 1, 1,
        ],
    }
}

/// GDAL writes integral nodata without a decimal point; match that so other
/// tools parse the tag.
fn format_nodata(nd: f64) -> String {
    if nd.fract() == 0.0 && nd.abs() < 1e15 {
        format!("{}", nd as i64)
    } else {
        format!("{}", nd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn write_read_roundtrip_preserves_georeferencing() {
        let mut raster: Raster<f32> = Raster::zeros(20, 20);
        raster.set_transform(GeoTransform::new(440_000.0, 4_475_000.0, 30.0, -30.0));
        raster.set_crs(Some(Crs::from_epsg(32630)));
        raster.set_nodata(Some(-9999.0));

        for i in 0..20 {
            for j in 0..20 {
                raster.set(i, j, (i * 20 + j) as f32).unwrap();
            }
        }

        let tmp = NamedTempFile::with_suffix(".tif").unwrap();
        write_geotiff(&raster, tmp.path(), None).unwrap();

        let loaded: Raster<f32> = read_geotiff(tmp.path(), None).unwrap();

        assert_eq!(loaded.shape(), raster.shape());
        assert_eq!(loaded.get(5, 7).unwrap(), raster.get(5, 7).unwrap());
        assert_eq!(loaded.transform(), raster.transform());
        assert_eq!(loaded.crs().and_then(|c| c.epsg()), Some(32630));
        assert_eq!(loaded.nodata(), Some(-9999.0));
    }

    #[test]
    fn nodata_formatting_matches_gdal() {
        assert_eq!(format_nodata(-9999.0), "-9999");
        assert_eq!(format_nodata(0.5), "0.5");
    }
}
