//! Pairwise land-cover transition classification
//!
//! Classifies two co-registered categorical rasters (base period vs target
//! period) into a ternary change raster through the fixed transition table.
//! Inputs must already be pixel-aligned: same shape, same geotransform.
//! The aligner and clipper produce exactly that.

use crate::error::Result;
use crate::landcover::{LandCoverClass, TransitionMatrix};
use crate::maybe_rayon::*;
use landmon_core::{Error as CoreError, Raster};

/// Classify per-pixel transitions between two land-cover rasters.
///
/// The output starts as nodata everywhere; each (base, target) pair covered
/// by the matrix writes its category code. Pairs the matrix does not cover,
/// and pixels where either input is nodata or not a known class code, stay
/// nodata; partial unclassifiable area is an expected, reportable outcome.
pub fn classify_transition(
    base: &Raster<f64>,
    target: &Raster<f64>,
    matrix: &TransitionMatrix,
    nodata: f64,
) -> Result<Raster<f64>> {
    let (rows, cols) = base.shape();
    if target.shape() != (rows, cols) {
        return Err(CoreError::SizeMismatch {
            er: rows,
            ec: cols,
            ar: target.rows(),
            ac: target.cols(),
        }
        .into());
    }

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![nodata; cols];
            for col in 0..cols {
                let b = unsafe { base.get_unchecked(row, col) };
                let t = unsafe { target.get_unchecked(row, col) };
                if base.is_nodata(b) || target.is_nodata(t) {
                    continue;
                }
                let (Some(b_class), Some(t_class)) = (as_class(b), as_class(t)) else {
                    continue;
                };
                if let Some(change) = matrix.classify(b_class, t_class) {
                    row_data[col] = change.code() as f64;
                }
            }
            row_data
        })
        .collect();

    let mut out = base.with_same_meta::<f64>(rows, cols);
    out.set_nodata(Some(nodata));
    *out.data_mut() = ndarray::Array2::from_shape_vec((rows, cols), data)
        .map_err(|e| CoreError::Other(e.to_string()))?;

    Ok(out)
}

/// Interpret a pixel value as a land-cover class code
pub(crate) fn as_class(value: f64) -> Option<LandCoverClass> {
    if !value.is_finite() || value.fract() != 0.0 {
        return None;
    }
    LandCoverClass::from_code(value as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landcover::ChangeTernary;
    use crate::zonal::value_counts;
    use landmon_core::GeoTransform;

    fn raster_from(values: Vec<f64>, rows: usize, cols: usize) -> Raster<f64> {
        let mut r = Raster::from_vec(values, rows, cols).unwrap();
        r.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        r.set_nodata(Some(-9999.0));
        r
    }

    #[test]
    fn forest_to_cropland_scenario() {
        // 100 pixels all Forest; target 60 Forest + 40 Cropland.
        let base = raster_from(vec![1.0; 100], 10, 10);
        let mut target_values = vec![1.0; 60];
        target_values.extend(vec![3.0; 40]);
        let target = raster_from(target_values, 10, 10);

        let classified = classify_transition(
            &base,
            &target,
            TransitionMatrix::land_cover_default(),
            -9999.0,
        )
        .unwrap();

        let counts = value_counts(&classified);
        let count_of = |code: ChangeTernary| {
            counts
                .iter()
                .find(|(v, _)| *v == code.code() as f64)
                .map(|(_, c)| *c)
                .unwrap_or(0)
        };

        assert_eq!(count_of(ChangeTernary::Stable), 60);
        assert_eq!(count_of(ChangeTernary::Degraded), 40);
        assert_eq!(count_of(ChangeTernary::Improved), 0);
    }

    #[test]
    fn nodata_and_unknown_codes_stay_nodata() {
        let base = raster_from(vec![1.0, -9999.0, 9.0, 2.0], 2, 2);
        let target = raster_from(vec![1.0, 1.0, 1.0, -9999.0], 2, 2);

        let classified = classify_transition(
            &base,
            &target,
            TransitionMatrix::land_cover_default(),
            -9999.0,
        )
        .unwrap();

        assert_eq!(classified.get(0, 0).unwrap(), ChangeTernary::Stable.code() as f64);
        assert_eq!(classified.get(0, 1).unwrap(), -9999.0); // base nodata
        assert_eq!(classified.get(1, 0).unwrap(), -9999.0); // unknown code 9
        assert_eq!(classified.get(1, 1).unwrap(), -9999.0); // target nodata
    }

    #[test]
    fn shape_mismatch_rejected() {
        let base = raster_from(vec![1.0; 4], 2, 2);
        let target = raster_from(vec![1.0; 9], 3, 3);
        let result = classify_transition(
            &base,
            &target,
            TransitionMatrix::land_cover_default(),
            -9999.0,
        );
        assert!(result.is_err());
    }
}
