/*!
 * Per-file georeferencing pipeline.
 *
 * Steps run strictly in order and the first failure ends the file with an
 * error tagged by its stage. Nothing is retried.
 */

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, debug_span};

use super::raster_key::KeyError;
use super::settings::{BatchSettings, FileJob};
use super::world_file::{self, WorldFileError};
use crate::catalog::{Catalog, CatalogError};
use crate::geometry::{GeometryError, RasterGeometry};

/// Failure of one pipeline stage for one file
#[derive(Error, Debug)]
pub enum StageError {
    #[error("failed to read image dimensions: {0}")]
    DimensionReadError(GeometryError),

    #[error("failed to resolve raster key: {0}")]
    KeyResolutionError(KeyError),

    #[error("failed to look up directory attributes: {0}")]
    AttributeLookupError(String),

    #[error("failed to create directory {path:?}: {source}")]
    DirectoryCreateError { path: PathBuf, source: io::Error },

    #[error("failed to save file {path:?}: {source}")]
    FileWriteError { path: PathBuf, source: io::Error },

    #[error("failed to look up extent: {0}")]
    ExtentLookupError(CatalogError),

    #[error("failed to detect feature points: {0}")]
    FeatureDetectionError(GeometryError),

    #[error("failed to compute georeference parameters: {0}")]
    TransformComputeError(GeometryError),

    #[error("extension of '{0}' has no world file counterpart (jpg, jpeg or png expected)")]
    UnsupportedExtension(String),

    #[error("failed to write world file: {0}")]
    WorldFileWriteError(WorldFileError),
}

impl StageError {
    /// Short stage name for logs and diagnostics
    pub fn stage(&self) -> &'static str {
        match self {
            StageError::DimensionReadError(_) => "dimensions",
            StageError::KeyResolutionError(_) => "raster_key",
            StageError::AttributeLookupError(_) => "attributes",
            StageError::DirectoryCreateError { .. } => "mkdir",
            StageError::FileWriteError { .. } => "save",
            StageError::ExtentLookupError(_) => "extent",
            StageError::FeatureDetectionError(_) => "features",
            StageError::TransformComputeError(_) => "transform",
            StageError::UnsupportedExtension(_) => "extension",
            StageError::WorldFileWriteError(_) => "world_file",
        }
    }
}

/// Result of running the pipeline on one file
#[derive(Debug)]
pub struct FileOutcome {
    pub id: String,
    pub error: Option<StageError>,
}

impl FileOutcome {
    pub fn success(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            error: None,
        }
    }

    pub fn failure(id: impl Into<String>, error: StageError) -> Self {
        Self {
            id: id.into(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Pipeline bound to one batch's settings and collaborators
pub struct Pipeline<'a> {
    settings: &'a BatchSettings,
    catalog: &'a dyn Catalog,
    geometry: &'a dyn RasterGeometry,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        settings: &'a BatchSettings,
        catalog: &'a dyn Catalog,
        geometry: &'a dyn RasterGeometry,
    ) -> Self {
        Self {
            settings,
            catalog,
            geometry,
        }
    }

    /// Run every step for `job`; always yields exactly one outcome
    pub fn run(&self, job: &FileJob) -> FileOutcome {
        let _span = debug_span!("georeference", file = %job.name()).entered();
        match self.execute(job) {
            Ok(world_file) => {
                debug!(world_file = %world_file.display(), "Georeferenced");
                FileOutcome::success(job.name())
            }
            Err(e) => FileOutcome::failure(job.name(), e),
        }
    }

    fn execute(&self, job: &FileJob) -> Result<PathBuf, StageError> {
        let settings = self.settings;

        let (probe, pixels) = open_twice(job)
            .map_err(|e| StageError::DimensionReadError(GeometryError::Io(e)))?;
        let dimensions = self
            .geometry
            .oriented_dimensions(probe, pixels)
            .map_err(StageError::DimensionReadError)?;
        debug!(width = dimensions.width, height = dimensions.height, "Read dimensions");

        let raster_key = settings
            .key_strategy()
            .resolve(job.name())
            .map_err(StageError::KeyResolutionError)?;
        debug!(raster_key = %raster_key, "Resolved raster key");

        let values = self
            .catalog
            .lookup_attribute_values(
                settings.reference_map(),
                settings.attr_key(),
                &raster_key,
                settings.subdir_attrs(),
            )
            .map_err(|e| StageError::AttributeLookupError(e.to_string()))?;
        let target_dir = settings
            .target_dir()
            .join(subdirectory(&values).map_err(StageError::AttributeLookupError)?);

        fs::create_dir_all(&target_dir).map_err(|e| StageError::DirectoryCreateError {
            path: target_dir.clone(),
            source: e,
        })?;

        let file_path = target_dir.join(job.name());
        save_payload(job, &file_path).map_err(|e| StageError::FileWriteError {
            path: file_path.clone(),
            source: e,
        })?;
        debug!(path = %file_path.display(), "Saved raster");

        let extent = self
            .catalog
            .lookup_extent(settings.reference_map(), settings.attr_key(), &raster_key)
            .map_err(StageError::ExtentLookupError)?;

        let points = self
            .geometry
            .detect_feature_points(&file_path)
            .map_err(StageError::FeatureDetectionError)?;

        let params = self
            .geometry
            .compute_affine_parameters(dimensions, &points, &extent, settings.features())
            .map_err(StageError::TransformComputeError)?;

        let world_path = world_file::world_file_path(&file_path)
            .ok_or_else(|| StageError::UnsupportedExtension(job.name().to_string()))?;
        world_file::write_world_file(&world_path, &params)
            .map_err(StageError::WorldFileWriteError)?;

        Ok(world_path)
    }
}

fn open_twice(job: &FileJob) -> io::Result<(File, File)> {
    Ok((job.open()?, job.open()?))
}

fn save_payload(job: &FileJob, dest: &Path) -> io::Result<()> {
    // re-running over files already in place must not truncate the source
    if dest.exists() && fs::canonicalize(dest)? == fs::canonicalize(job.source())? {
        return Ok(());
    }
    let mut source = job.open()?;
    let mut file = File::create(dest)?;
    let written = io::copy(&mut source, &mut file).and_then(|_| file.sync_all());
    if written.is_err() {
        drop(file);
        let _ = fs::remove_file(dest);
    }
    written
}

/// Nested directory built from attribute values in order.
///
/// Values may contain `/` to nest further, but never climb out of the target.
fn subdirectory(values: &[String]) -> Result<PathBuf, String> {
    let mut dir = PathBuf::new();
    for value in values {
        for component in Path::new(value).components() {
            match component {
                Component::Normal(part) => dir.push(part),
                Component::CurDir => {}
                _ => {
                    return Err(format!(
                        "attribute value '{}' is not a safe directory name",
                        value
                    ))
                }
            }
        }
    }
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_subdirectory_joins_in_order() {
        assert_eq!(
            subdirectory(&strings(&["Balikpapan Barat", "6471050"])).unwrap(),
            PathBuf::from("Balikpapan Barat/6471050")
        );
        assert_eq!(subdirectory(&[]).unwrap(), PathBuf::new());
        assert_eq!(
            subdirectory(&strings(&["a/b", "./c"])).unwrap(),
            PathBuf::from("a/b/c")
        );
    }

    #[test]
    fn test_subdirectory_rejects_escapes() {
        assert!(subdirectory(&strings(&["..", "x"])).is_err());
        assert!(subdirectory(&strings(&["a/../../b"])).is_err());
        assert!(subdirectory(&strings(&["/etc"])).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_save_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        // a directory opens fine on unix but fails on the first read
        let source = dir.path().join("6471.jpg");
        fs::create_dir(&source).unwrap();
        let job = FileJob::new("6471.jpg", &source).unwrap();

        let dest = dir.path().join("out.jpg");
        assert!(save_payload(&job, &dest).is_err());
        assert!(!dest.exists());
    }

    #[test]
    fn test_save_copies_payload() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("6471.jpg");
        fs::write(&source, b"pixels").unwrap();
        let job = FileJob::new("6471.jpg", &source).unwrap();

        let dest = dir.path().join("out.jpg");
        save_payload(&job, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"pixels");

        // saving onto itself keeps the content
        let in_place = FileJob::new("6471.jpg", &dest).unwrap();
        save_payload(&in_place, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"pixels");
    }

    #[test]
    fn test_stage_names_are_distinct() {
        let errors = [
            StageError::DimensionReadError(GeometryError::Detector(String::new())),
            StageError::KeyResolutionError(KeyError::InvalidStrategy(String::new())),
            StageError::AttributeLookupError(String::new()),
            StageError::DirectoryCreateError {
                path: PathBuf::new(),
                source: io::Error::other("x"),
            },
            StageError::FileWriteError {
                path: PathBuf::new(),
                source: io::Error::other("x"),
            },
            StageError::ExtentLookupError(CatalogError::Backend(String::new())),
            StageError::FeatureDetectionError(GeometryError::Detector(String::new())),
            StageError::TransformComputeError(GeometryError::Detector(String::new())),
            StageError::UnsupportedExtension(String::new()),
            StageError::WorldFileWriteError(WorldFileError::LineCount {
                path: PathBuf::new(),
                found: 0,
            }),
        ];
        let mut stages: Vec<&str> = errors.iter().map(StageError::stage).collect();
        stages.sort_unstable();
        stages.dedup();
        assert_eq!(stages.len(), errors.len());
    }

    #[test]
    fn test_outcome_constructors() {
        assert!(FileOutcome::success("a.jpg").is_success());
        let failed = FileOutcome::failure("b.jpg", StageError::UnsupportedExtension("b.gif".into()));
        assert!(!failed.is_success());
        assert_eq!(failed.id, "b.jpg");
    }
}
