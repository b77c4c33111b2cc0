/*!
 * Core batch georeferencing operations
 */

pub mod aggregate;
pub mod pipeline;
pub mod pool;
pub mod raster_key;
pub mod settings;
pub mod world_file;

use std::path::Path;

use crate::catalog::Catalog;
use crate::error::{GeobatchError, Result};
use crate::geometry::RasterGeometry;

pub use aggregate::{BatchResponse, BatchResult};
pub use pipeline::{FileOutcome, StageError};
pub use raster_key::RasterKeyStrategy;
pub use settings::{build_batch, BatchRequest, BatchSettings, FileJob, ValidationError};

/// Validate `request`, then georeference every file in it.
///
/// Validation failures come back as `Err` before anything is written. Once
/// the batch runs, per-file failures are only reported in the response.
pub fn georeference(
    request: BatchRequest,
    storage_root: &Path,
    catalog: &dyn Catalog,
    geometry: &dyn RasterGeometry,
) -> Result<BatchResponse> {
    let batch = build_batch(request, storage_root, catalog)?;
    let target_dir = batch.settings.target_dir().to_path_buf();

    std::fs::create_dir_all(&target_dir).map_err(|e| {
        GeobatchError::Other(format!(
            "Failed to create directory {}: {}",
            target_dir.display(),
            e
        ))
    })?;

    let result = pool::run_batch(&batch.settings, batch.jobs, catalog, geometry)?;
    Ok(result.into_response(&target_dir))
}
