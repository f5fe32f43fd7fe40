//! Coordinate Reference System handling

mod utm;

pub use utm::{parse_utm_epsg, utm_to_wgs84, wgs84_to_utm};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate Reference System identity.
///
/// Carries whichever of EPSG code, WKT, or PROJ string the source file
/// declared. Equality of analysis grids is decided by [`Crs::is_equivalent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crs {
    wkt: Option<String>,
    epsg: Option<u32>,
    proj: Option<String>,
}

impl Crs {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            wkt: None,
            epsg: Some(code),
            proj: None,
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            epsg: None,
            proj: None,
        }
    }

    /// WGS84 geographic (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Whether this CRS is WGS84 geographic
    pub fn is_wgs84(&self) -> bool {
        self.epsg == Some(4326)
    }

    /// Check if two CRS describe the same system.
    ///
    /// EPSG codes are compared when both sides have one; otherwise WKT or
    /// PROJ strings are compared literally. Two CRS with no common
    /// representation are treated as different.
    pub fn is_equivalent(&self, other: &Crs) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (&self.proj, &other.proj) {
            return a == b;
        }
        false
    }

    /// Short display identifier
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(proj) = &self.proj {
            return proj.clone();
        }
        if let Some(wkt) = &self.wkt {
            return format!("WKT:{}", &wkt[..wkt.len().min(50)]);
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for Crs {
    fn default() -> Self {
        Self::wgs84()
    }
}

/// Transform a coordinate between two CRS.
///
/// Supported pairs: identical/equivalent systems (identity), WGS84 to UTM,
/// UTM to WGS84, and UTM zone to UTM zone (through WGS84). Anything else
/// yields [`Error::UnsupportedTransform`] so the caller can fail loudly
/// instead of producing a silently misplaced grid.
pub fn transform_point(from: &Crs, to: &Crs, x: f64, y: f64) -> Result<(f64, f64)> {
    if from.is_equivalent(to) {
        return Ok((x, y));
    }

    let unsupported = || Error::UnsupportedTransform {
        from: from.identifier(),
        to: to.identifier(),
    };

    let from_utm = from.epsg().and_then(parse_utm_epsg);
    let to_utm = to.epsg().and_then(parse_utm_epsg);

    match (from.is_wgs84(), from_utm, to.is_wgs84(), to_utm) {
        (true, _, _, Some((zone, north))) => Ok(wgs84_to_utm(x, y, zone, north)),
        (_, Some((zone, north)), true, _) => Ok(utm_to_wgs84(x, y, zone, north)),
        (_, Some((fz, fn_)), _, Some((tz, tn))) => {
            let (lon, lat) = utm_to_wgs84(x, y, fz, fn_);
            Ok(wgs84_to_utm(lon, lat, tz, tn))
        }
        _ => Err(unsupported()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epsg_identity() {
        let crs = Crs::from_epsg(4326);
        assert_eq!(crs.epsg(), Some(4326));
        assert_eq!(crs.identifier(), "EPSG:4326");
        assert!(crs.is_wgs84());
    }

    #[test]
    fn equivalence() {
        assert!(Crs::from_epsg(4326).is_equivalent(&Crs::wgs84()));
        assert!(!Crs::from_epsg(32630).is_equivalent(&Crs::wgs84()));
    }

    #[test]
    fn transform_identity() {
        let (x, y) = transform_point(&Crs::wgs84(), &Crs::from_epsg(4326), -3.7, 40.4).unwrap();
        assert_eq!((x, y), (-3.7, 40.4));
    }

    #[test]
    fn transform_unsupported_pair() {
        let err = transform_point(&Crs::from_epsg(3857), &Crs::from_epsg(32630), 0.0, 0.0);
        assert!(err.is_err());
    }
}
