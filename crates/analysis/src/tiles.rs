//! Tile publication seam
//!
//! Publishing a derived raster as a WMS layer is an external collaborator
//! concern; the engine only hands over the persisted file, the category set
//! for styling, and the nodata value, and attaches whatever endpoint comes
//! back to the result payload.

use crate::error::Result;
use crate::landcover::Category;
use serde::Serialize;
use std::path::Path;

/// WMS endpoint and layer name returned by the tile service
#[derive(Debug, Clone, Default, Serialize)]
pub struct TileLayer {
    pub url: Option<String>,
    pub layer: Option<String>,
}

/// External tile publishing service
pub trait TilePublisher {
    /// Publish a persisted raster, returning its WMS endpoint and layer name
    fn publish_raster(
        &self,
        raster: &Path,
        categories: &[Category],
        nodata: f64,
    ) -> Result<TileLayer>;
}
