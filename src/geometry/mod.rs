/*!
 * Image geometry collaborators used by the batch pipeline: oriented pixel
 * dimensions, feature point detection and affine parameter derivation.
 */

pub mod affine;
pub mod detector;
pub mod dimensions;

use std::fs::File;
use std::path::Path;
use thiserror::Error;

use crate::catalog::Extent;
use crate::core::settings::FeatureSettings;
use crate::core::world_file::WorldFileParameters;

pub use affine::frame_affine;
pub use detector::{detector_from_config, CommandFeatureDetector, FeatureDetector, WholeImageDetector};
pub use dimensions::oriented_dimensions;

#[derive(Error, Debug)]
pub enum GeometryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image decode error: {0}")]
    Image(#[from] image::ImageError),

    #[error("feature detector failed: {0}")]
    Detector(String),

    #[error("invalid feature points: {0}")]
    InvalidPoints(String),

    #[error("invalid extent: {0}")]
    InvalidExtent(String),
}

/// Pixel size of an image after its orientation tag has been applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Pixel-space coordinate `[x, y]`
pub type PixelPoint = [f64; 2];

/// Geometry operations the per-file pipeline depends on.
pub trait RasterGeometry: Send + Sync {
    /// Pixel dimensions honouring embedded orientation metadata.
    ///
    /// `probe` and `pixels` are independent handles on the same file.
    fn oriented_dimensions(&self, probe: File, pixels: File) -> Result<Dimensions, GeometryError>;

    fn detect_feature_points(&self, path: &Path) -> Result<Vec<PixelPoint>, GeometryError>;

    fn compute_affine_parameters(
        &self,
        dimensions: Dimensions,
        points: &[PixelPoint],
        extent: &Extent,
        features: &FeatureSettings,
    ) -> Result<WorldFileParameters, GeometryError>;
}

/// Default geometry: `image` for headers, a pluggable detector for feature
/// points and [`frame_affine`] for the transform.
pub struct ImageGeometry {
    detector: Box<dyn FeatureDetector>,
}

impl ImageGeometry {
    pub fn new(detector: Box<dyn FeatureDetector>) -> Self {
        Self { detector }
    }
}

impl RasterGeometry for ImageGeometry {
    fn oriented_dimensions(&self, probe: File, pixels: File) -> Result<Dimensions, GeometryError> {
        oriented_dimensions(probe, pixels)
    }

    fn detect_feature_points(&self, path: &Path) -> Result<Vec<PixelPoint>, GeometryError> {
        self.detector.detect(path)
    }

    fn compute_affine_parameters(
        &self,
        dimensions: Dimensions,
        points: &[PixelPoint],
        extent: &Extent,
        features: &FeatureSettings,
    ) -> Result<WorldFileParameters, GeometryError> {
        frame_affine(dimensions, points, extent, features.margin())
    }
}
