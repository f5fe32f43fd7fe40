//! Coefficient-driven numeric change scoring
//!
//! Extends the pairwise transition logic to continuous quantities: a
//! per-pixel coefficient (from the climate-region table) scales a reference
//! quantity into its projected current value, and the percentage change is
//! classified against an inclusive cutoff.
//!
//! Masking source: validity is decided by the *quantity raster* alone.
//! Nodata, NaN, and zero reference pixels are excluded before any division,
//! so no `inf`/`NaN` can leak through the threshold step. Pixels whose
//! (base, target) pair has no coefficient are likewise nodata.

use crate::coefficients::CoefficientMatrix;
use crate::error::Result;
use crate::landcover::ChangeTernary;
use crate::maybe_rayon::*;
use crate::transition::as_class;
use landmon_core::{Error as CoreError, Raster};

/// Inclusive three-way threshold on a percentage change.
///
/// Exactly `-cutoff` and `+cutoff` are Stable; beyond them the change is
/// Degraded or Improved.
pub fn classify_percent(percent: f64, cutoff: f64) -> ChangeTernary {
    if percent < -cutoff {
        ChangeTernary::Degraded
    } else if percent > cutoff {
        ChangeTernary::Improved
    } else {
        ChangeTernary::Stable
    }
}

/// Per-pixel coefficient raster for a (base, target) land-cover pairing
pub fn coefficient_raster(
    base: &Raster<f64>,
    target: &Raster<f64>,
    matrix: &CoefficientMatrix,
    nodata: f64,
) -> Result<Raster<f64>> {
    check_shapes(base, target)?;
    let (rows, cols) = base.shape();

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
                if let (Some(b_class), Some(t_class)) = (as_class(b), as_class(t)) {
                    row_data[col] = matrix.coefficient(b_class, t_class);
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

/// Score the change of a reference quantity through a land-cover pairing.
///
/// `current = reference * coefficient`, `change = current - reference`,
/// `percent = 100 * change / reference`, classified with
/// [`classify_percent`]. Output pixels are nodata wherever the reference is
/// invalid (nodata, NaN, zero) or the pairing has no coefficient.
pub fn score_change(
    base: &Raster<f64>,
    target: &Raster<f64>,
    reference: &Raster<f64>,
    matrix: &CoefficientMatrix,
    cutoff_percentage: f64,
    nodata: f64,
) -> Result<Raster<f64>> {
    check_shapes(base, target)?;
    check_shapes(base, reference)?;
    let (rows, cols) = base.shape();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![nodata; cols];
            for col in 0..cols {
                let ref_value = unsafe { reference.get_unchecked(row, col) };
                if reference.is_nodata(ref_value) || !ref_value.is_finite() || ref_value == 0.0 {
                    continue;
                }

                let b = unsafe { base.get_unchecked(row, col) };
                let t = unsafe { target.get_unchecked(row, col) };
                if base.is_nodata(b) || target.is_nodata(t) {
                    continue;
                }
                let (Some(b_class), Some(t_class)) = (as_class(b), as_class(t)) else {
                    continue;
                };

                let coeff = matrix.coefficient(b_class, t_class);
                let current = ref_value * coeff;
                let change = current - ref_value;
                let percent = change * 100.0 / ref_value;
                row_data[col] = classify_percent(percent, cutoff_percentage).code() as f64;
            }
            row_data
        })
        .collect();

    let mut out = reference.with_same_meta::<f64>(rows, cols);
    out.set_nodata(Some(nodata));
    *out.data_mut() = ndarray::Array2::from_shape_vec((rows, cols), data)
        .map_err(|e| CoreError::Other(e.to_string()))?;
    Ok(out)
}

/// Classify the percentage change between two continuous rasters.
///
/// Used by the productivity trajectory sub-indicator: the percent change of
/// `target` against `base` goes through the same inclusive threshold as the
/// coefficient scorer. Validity follows the base (quantity) raster.
pub fn percent_change_classify(
    base: &Raster<f64>,
    target: &Raster<f64>,
    cutoff_percentage: f64,
    nodata: f64,
) -> Result<Raster<f64>> {
    check_shapes(base, target)?;
    let (rows, cols) = base.shape();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![nodata; cols];
            for col in 0..cols {
                let b = unsafe { base.get_unchecked(row, col) };
                let t = unsafe { target.get_unchecked(row, col) };
                if base.is_nodata(b) || !b.is_finite() || b == 0.0 || target.is_nodata(t) {
                    continue;
                }
                let percent = (t - b) * 100.0 / b;
                row_data[col] = classify_percent(percent, cutoff_percentage).code() as f64;
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

fn check_shapes(a: &Raster<f64>, b: &Raster<f64>) -> Result<()> {
    if a.shape() != b.shape() {
        let (er, ec) = a.shape();
        return Err(CoreError::SizeMismatch {
            er,
            ec,
            ar: b.rows(),
            ac: b.cols(),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coefficients::ClimaticRegion;
    use landmon_core::GeoTransform;

    fn raster_from(values: Vec<f64>, rows: usize, cols: usize) -> Raster<f64> {
        let mut r = Raster::from_vec(values, rows, cols).unwrap();
        r.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        r.set_nodata(Some(-9999.0));
        r
    }

    #[test]
    fn threshold_boundaries_are_inclusive() {
        let cutoff = 10.0;
        assert_eq!(classify_percent(10.0, cutoff), ChangeTernary::Stable);
        assert_eq!(classify_percent(-10.0, cutoff), ChangeTernary::Stable);
        assert_eq!(classify_percent(10.0 + 1e-9, cutoff), ChangeTernary::Improved);
        assert_eq!(classify_percent(-10.0 - 1e-9, cutoff), ChangeTernary::Degraded);
        assert_eq!(classify_percent(0.0, cutoff), ChangeTernary::Stable);
    }

    #[test]
    fn coefficient_raster_maps_pairs() {
        // Forest->Cropland (0.8) and an unmapped code (9) in one grid.
        let base = raster_from(vec![1.0, 1.0, 9.0, -9999.0], 2, 2);
        let target = raster_from(vec![3.0, 1.0, 1.0, 1.0], 2, 2);
        let matrix = CoefficientMatrix::for_region(ClimaticRegion::TemperateDry);

        let coeffs = coefficient_raster(&base, &target, &matrix, -9999.0).unwrap();
        assert_eq!(coeffs.get(0, 0).unwrap(), 0.8);
        assert_eq!(coeffs.get(0, 1).unwrap(), 1.0);
        assert_eq!(coeffs.get(1, 0).unwrap(), -9999.0); // unknown base class
        assert_eq!(coeffs.get(1, 1).unwrap(), -9999.0); // base nodata
    }

    #[test]
    fn forest_to_cropland_loses_carbon() {
        // Temperate dry: forest -> cropland coefficient 0.8, a -20% change.
        let base = raster_from(vec![1.0; 4], 2, 2);
        let target = raster_from(vec![3.0; 4], 2, 2);
        let reference = raster_from(vec![50.0; 4], 2, 2);
        let matrix = CoefficientMatrix::for_region(ClimaticRegion::TemperateDry);

        let scored = score_change(&base, &target, &reference, &matrix, 10.0, -9999.0).unwrap();
        assert_eq!(
            scored.get(0, 0).unwrap(),
            ChangeTernary::Degraded.code() as f64
        );
    }

    #[test]
    fn unchanged_cover_is_stable() {
        let base = raster_from(vec![2.0; 4], 2, 2);
        let target = raster_from(vec![2.0; 4], 2, 2);
        let reference = raster_from(vec![30.0; 4], 2, 2);
        let matrix = CoefficientMatrix::for_region(ClimaticRegion::TropicalMoist);

        let scored = score_change(&base, &target, &reference, &matrix, 10.0, -9999.0).unwrap();
        assert_eq!(scored.get(1, 1).unwrap(), ChangeTernary::Stable.code() as f64);
    }

    #[test]
    fn zero_and_nodata_reference_masked_out() {
        let base = raster_from(vec![1.0, 1.0, 1.0, 1.0], 2, 2);
        let target = raster_from(vec![3.0, 3.0, 3.0, 3.0], 2, 2);
        let reference = raster_from(vec![0.0, -9999.0, f64::NAN, 50.0], 2, 2);
        let matrix = CoefficientMatrix::for_region(ClimaticRegion::TemperateDry);

        let scored = score_change(&base, &target, &reference, &matrix, 10.0, -9999.0).unwrap();
        assert_eq!(scored.get(0, 0).unwrap(), -9999.0); // zero reference
        assert_eq!(scored.get(0, 1).unwrap(), -9999.0); // nodata reference
        assert_eq!(scored.get(1, 0).unwrap(), -9999.0); // NaN reference
        assert_eq!(
            scored.get(1, 1).unwrap(),
            ChangeTernary::Degraded.code() as f64
        );
    }

    #[test]
    fn trajectory_percent_change() {
        let base = raster_from(vec![100.0, 100.0, 100.0, 0.0], 2, 2);
        let target = raster_from(vec![125.0, 95.0, 70.0, 10.0], 2, 2);

        let classified = percent_change_classify(&base, &target, 10.0, -9999.0).unwrap();
        assert_eq!(classified.get(0, 0).unwrap(), ChangeTernary::Improved.code() as f64);
        assert_eq!(classified.get(0, 1).unwrap(), ChangeTernary::Stable.code() as f64);
        assert_eq!(classified.get(1, 0).unwrap(), ChangeTernary::Degraded.code() as f64);
        assert_eq!(classified.get(1, 1).unwrap(), -9999.0); // zero base
    }
}
