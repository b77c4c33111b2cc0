/*!
 * geobatch - batch georeferencing of scanned map sheets
 *
 * For every raster in a batch geobatch:
 * - derives a raster key from the filename (whole stem, prefix, suffix or regex)
 * - looks up the matching reference polygon in a catalog of reference maps
 * - files the raster under attribute-named subdirectories
 * - detects the map frame and derives an affine transform onto the polygon extent
 * - writes the transform as a world file (`.jgw` / `.pgw`) next to the raster
 *
 * Files are processed by a bounded worker pool; a failing file is reported
 * but never stops the rest of the batch.
 */

pub mod catalog;
pub mod config;
pub mod core;
pub mod error;
pub mod geometry;
pub mod logging;
pub mod output;

// Re-export commonly used types
pub use catalog::{Catalog, Extent, GeoJsonCatalog};
pub use config::{GeobatchConfig, LogLevel};
pub use core::{georeference, BatchRequest, BatchResponse, BatchResult, FileJob};
pub use error::{GeobatchError, Result};
pub use geometry::{ImageGeometry, RasterGeometry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
    }
}
