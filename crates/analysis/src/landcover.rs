//! Land-cover classes, change categories, and the transition table
//!
//! The seven canonical land-cover classes and the fixed table classifying a
//! change between two periods as stable, improved, or degraded per base
//! class. The table is domain data, not user-editable; its
//! stable/improved/degraded sets are checked for disjointness when the
//! matrix is constructed.

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Canonical land-cover classes with their pixel codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum LandCoverClass {
    Forest = 1,
    Grassland = 2,
    Cropland = 3,
    Wetland = 4,
    Artificial = 5,
    Bareland = 6,
    Water = 7,
}

impl LandCoverClass {
    pub const ALL: [LandCoverClass; 7] = [
        LandCoverClass::Forest,
        LandCoverClass::Grassland,
        LandCoverClass::Cropland,
        LandCoverClass::Wetland,
        LandCoverClass::Artificial,
        LandCoverClass::Bareland,
        LandCoverClass::Water,
    ];

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn label(self) -> &'static str {
        match self {
            LandCoverClass::Forest => "Forest",
            LandCoverClass::Grassland => "Grassland",
            LandCoverClass::Cropland => "Cropland",
            LandCoverClass::Wetland => "Wetland",
            LandCoverClass::Artificial => "Artificial",
            LandCoverClass::Bareland => "Bareland",
            LandCoverClass::Water => "Water",
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.code() == code)
    }
}

/// Ternary change categories for pairwise classification outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ChangeTernary {
    Stable = 1,
    Improved = 2,
    Degraded = 3,
}

impl ChangeTernary {
    pub const ALL: [ChangeTernary; 3] = [
        ChangeTernary::Stable,
        ChangeTernary::Improved,
        ChangeTernary::Degraded,
    ];

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn label(self) -> &'static str {
        match self {
            ChangeTernary::Stable => "Stable",
            ChangeTernary::Improved => "Improved",
            ChangeTernary::Degraded => "Degraded",
        }
    }
}

/// A category a derived raster can take, for result summaries and styling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Category {
    pub code: i32,
    pub label: &'static str,
}

/// The categories of the ternary change rasters
pub const CHANGE_CATEGORIES: [Category; 3] = [
    Category { code: 1, label: "Stable" },
    Category { code: 2, label: "Improved" },
    Category { code: 3, label: "Degraded" },
];

/// The categories of a land-cover raster
pub const LAND_COVER_CATEGORIES: [Category; 7] = [
    Category { code: 1, label: "Forest" },
    Category { code: 2, label: "Grassland" },
    Category { code: 3, label: "Cropland" },
    Category { code: 4, label: "Wetland" },
    Category { code: 5, label: "Artificial" },
    Category { code: 6, label: "Bareland" },
    Category { code: 7, label: "Water" },
];

/// Five-step severity categories for erosion and vulnerability indices
pub const SEVERITY_CATEGORIES: [Category; 5] = [
    Category { code: 1, label: "Very low" },
    Category { code: 2, label: "Low" },
    Category { code: 3, label: "Moderate" },
    Category { code: 4, label: "High" },
    Category { code: 5, label: "Very high" },
];

/// Per-base-class transition rule: the target classes counting as stable,
/// improved, and degraded. Targets in none of the sets leave the pixel
/// unclassified.
#[derive(Debug, Clone)]
pub struct TransitionRule {
    pub base: LandCoverClass,
    pub stable: Vec<LandCoverClass>,
    pub improved: Vec<LandCoverClass>,
    pub degraded: Vec<LandCoverClass>,
}

/// Fixed table classifying land-cover change per base class
#[derive(Debug, Clone)]
pub struct TransitionMatrix {
    rules: Vec<TransitionRule>,
}

impl TransitionMatrix {
    /// Build a matrix, rejecting rules whose three sets overlap
    pub fn new(rules: Vec<TransitionRule>) -> Result<Self> {
        for rule in &rules {
            for target in LandCoverClass::ALL {
                let hits = rule.stable.contains(&target) as u8
                    + rule.improved.contains(&target) as u8
                    + rule.degraded.contains(&target) as u8;
                if hits > 1 {
                    return Err(EngineError::parameter(format!(
                        "transition rule for {} maps {} to more than one category",
                        rule.base.label(),
                        target.label()
                    )));
                }
            }
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[TransitionRule] {
        &self.rules
    }

    /// Classify one (base, target) pair. Rules are evaluated stable,
    /// improved, degraded in that order; the sets are disjoint so at most
    /// one matches.
    pub fn classify(&self, base: LandCoverClass, target: LandCoverClass) -> Option<ChangeTernary> {
        let rule = self.rules.iter().find(|r| r.base == base)?;
        if rule.stable.contains(&target) {
            return Some(ChangeTernary::Stable);
        }
        if rule.improved.contains(&target) {
            return Some(ChangeTernary::Improved);
        }
        if rule.degraded.contains(&target) {
            return Some(ChangeTernary::Degraded);
        }
        None
    }

    /// The built-in land-cover transition table.
    pub fn land_cover_default() -> &'static TransitionMatrix {
        static MATRIX: OnceLock<TransitionMatrix> = OnceLock::new();
        MATRIX.get_or_init(|| {
            use LandCoverClass::*;
            TransitionMatrix::new(vec![
                TransitionRule {
                    base: Forest,
                    stable: vec![Forest, Water],
                    improved: vec![],
                    degraded: vec![Grassland, Cropland, Wetland, Artificial, Bareland],
                },
                TransitionRule {
                    base: Grassland,
                    stable: vec![Grassland, Water],
                    improved: vec![Forest, Cropland],
                    degraded: vec![Wetland, Artificial, Bareland],
                },
                TransitionRule {
                    base: Cropland,
                    stable: vec![Cropland, Water],
                    improved: vec![Forest],
                    degraded: vec![Grassland, Wetland, Artificial, Bareland],
                },
                TransitionRule {
                    base: Wetland,
                    stable: vec![Wetland, Water],
                    improved: vec![],
                    degraded: vec![Forest, Grassland, Cropland, Artificial, Bareland],
                },
                TransitionRule {
                    base: Artificial,
                    stable: vec![Artificial, Water],
                    improved: vec![Forest, Grassland, Cropland, Wetland, Bareland],
                    degraded: vec![],
                },
                TransitionRule {
                    base: Bareland,
                    stable: vec![Bareland, Water],
                    improved: vec![Forest, Grassland, Cropland, Wetland],
                    degraded: vec![Artificial],
                },
                TransitionRule {
                    base: Water,
                    stable: vec![
                        Forest, Grassland, Cropland, Wetland, Artificial, Bareland, Water,
                    ],
                    improved: vec![],
                    degraded: vec![],
                },
            ])
            .expect("built-in transition table is disjoint")
        })
    }
}
