/*!
 * Reference catalog: the store of reference maps (polygon layers with
 * attributes) that raster keys are resolved against.
 *
 * The batch pipeline only talks to the [`Catalog`] trait. Implementations
 * must tolerate concurrent calls from every worker of a batch.
 */

pub mod geojson;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub use geojson::GeoJsonCatalog;

/// Errors reported by a catalog implementation
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("reference map '{0}' is not found")]
    UnknownReference(String),

    #[error("attribute '{attribute}' is not found in reference map '{reference}'")]
    UnknownAttribute { reference: String, attribute: String },

    #[error("no feature in '{reference}' has {attribute} = '{key}'")]
    KeyNotFound {
        reference: String,
        attribute: String,
        key: String,
    },

    #[error("feature '{key}' in '{reference}' has no geometry")]
    MissingGeometry { reference: String, key: String },

    #[error("reference map '{name}' is not a valid GeoJSON FeatureCollection: {reason}")]
    InvalidDocument { name: String, reason: String },

    #[error("failed to read reference map from {path:?}: {source}")]
    Load {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("catalog backend error: {0}")]
    Backend(String),
}

/// Axis-aligned bounding box of a reference geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Grow to include the point `(x, y)`
    pub fn include(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    /// Expand every side by `fraction` of the width (X) or height (Y)
    pub fn grown_by(&self, fraction: f64) -> Extent {
        let dx = self.width() * fraction;
        let dy = self.height() * fraction;
        Extent::new(
            self.min_x - dx,
            self.min_y - dy,
            self.max_x + dx,
            self.max_y + dy,
        )
    }
}

/// Listing entry for a reference map
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceSummary {
    pub name: String,
    pub key_attribute: String,
    pub feature_count: usize,
    #[serde(rename = "type")]
    pub geometry_type: Option<String>,
}

/// Listing entry for one attribute of a reference map
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Read access to the reference catalog.
pub trait Catalog: Send + Sync {
    /// Whether the reference map `id` exists
    fn reference_exists(&self, id: &str) -> Result<bool, CatalogError>;

    /// Whether reference map `id` carries attribute `attr_key`
    fn reference_attribute_exists(&self, id: &str, attr_key: &str) -> Result<bool, CatalogError>;

    /// Values of `attr_names` (in that order) on the feature whose `attr_key`
    /// equals `raster_key`
    fn lookup_attribute_values(
        &self,
        id: &str,
        attr_key: &str,
        raster_key: &str,
        attr_names: &[String],
    ) -> Result<Vec<String>, CatalogError>;

    /// Bounding box of the geometry on the feature whose `attr_key` equals
    /// `raster_key`
    fn lookup_extent(
        &self,
        id: &str,
        attr_key: &str,
        raster_key: &str,
    ) -> Result<Extent, CatalogError>;

    fn list_references(&self) -> Result<Vec<ReferenceSummary>, CatalogError>;

    fn reference_attributes(&self, id: &str) -> Result<Vec<AttributeSummary>, CatalogError>;
}
