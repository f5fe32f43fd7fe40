//! Climatic regions and the soil-carbon coefficient table
//!
//! Per climate region, a multiplier for every (base, target) land-cover
//! pair, scaling a reference carbon stock into the stock expected after the
//! transition. The region-dependent entry is the cultivation factor applied
//! when land converts to cropland; its inverse applies when cropland
//! reverts.

use crate::landcover::LandCoverClass;
use serde::{Deserialize, Serialize};

/// Climate regions with their cropland-conversion stock-change factors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClimaticRegion {
    TemperateDry,
    TemperateMoist,
    TropicalDry,
    TropicalMoist,
    TropicalMontane,
}

impl ClimaticRegion {
    pub const ALL: [ClimaticRegion; 5] = [
        ClimaticRegion::TemperateDry,
        ClimaticRegion::TemperateMoist,
        ClimaticRegion::TropicalDry,
        ClimaticRegion::TropicalMoist,
        ClimaticRegion::TropicalMontane,
    ];

    /// Stock-change factor for conversion to cropland in this region
    pub fn cultivation_factor(self) -> f64 {
        match self {
            ClimaticRegion::TemperateDry => 0.80,
            ClimaticRegion::TemperateMoist => 0.69,
            ClimaticRegion::TropicalDry => 0.58,
            ClimaticRegion::TropicalMoist => 0.48,
            ClimaticRegion::TropicalMontane => 0.64,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ClimaticRegion::TemperateDry => "Temperate Dry",
            ClimaticRegion::TemperateMoist => "Temperate Moist",
            ClimaticRegion::TropicalDry => "Tropical Dry",
            ClimaticRegion::TropicalMoist => "Tropical Moist",
            ClimaticRegion::TropicalMontane => "Tropical Montane",
        }
    }
}

/// Coefficient lookup for one climate region
#[derive(Debug, Clone, Copy)]
pub struct CoefficientMatrix {
    region: ClimaticRegion,
}

impl CoefficientMatrix {
    pub fn for_region(region: ClimaticRegion) -> Self {
        Self { region }
    }

    pub fn region(&self) -> ClimaticRegion {
        self.region
    }

    /// Multiplier projecting a reference stock through a (base, target)
    /// land-cover transition. Every pair is covered; values are
    /// nonnegative.
    pub fn coefficient(&self, base: LandCoverClass, target: LandCoverClass) -> f64 {
        use LandCoverClass::*;
        let f = self.region.cultivation_factor();

        match base {
            Forest | Grassland => match target {
                Cropland => f,
                Artificial | Bareland => 0.1,
                _ => 1.0,
            },
            Cropland => match target {
                Forest | Grassland => 1.0 / f,
                Wetland => 1.0 / 0.71,
                Artificial | Bareland => 0.1,
                _ => 1.0,
            },
            Wetland => match target {
                Cropland => 0.71,
                Artificial | Bareland => 0.1,
                _ => 1.0,
            },
            Artificial | Bareland => match target {
                Forest | Grassland | Cropland | Wetland => 2.0,
                _ => 1.0,
            },
            Water => 1.0,
        }
    }
}
