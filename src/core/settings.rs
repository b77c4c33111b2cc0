/*!
 * Batch request validation.
 *
 * A [`BatchRequest`] carries the raw, untyped values a caller submitted. The
 * builder checks them in a fixed order and either returns a complete
 * [`PreparedBatch`] or the first [`ValidationError`]; nothing is touched on
 * disk before that decision.
 */

use std::fs::File;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use super::raster_key::{KeyError, RasterKeyStrategy};
use crate::catalog::{Catalog, CatalogError};

/// Reasons a whole batch is rejected before any file is processed
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("missing rasters file")]
    EmptyBatch,

    #[error("missing {0} parameter")]
    MissingField(&'static str),

    #[error("{0}")]
    UnknownReference(CatalogError),

    #[error("invalid raster key settings: {0}")]
    InvalidStrategyParams(KeyError),

    #[error("separate_dir must be a JSON array of attribute names: {0}")]
    InvalidSubdirSpec(String),

    #[error("target directory '{0}' must contain only letters, digits, spaces and slashes")]
    UnsafeTargetDir(String),

    #[error("feature margin '{0}' is not a valid number")]
    InvalidMargin(String),

    #[error("'{0}' is not a usable file name")]
    InvalidFileName(String),
}

/// One raster submitted with a batch
#[derive(Debug)]
pub struct FileJob {
    name: String,
    source: PathBuf,
}

impl FileJob {
    /// A job for the file at `source`, stored under `name` in the target directory.
    ///
    /// Only the final component of `name` is kept; a name that does not end
    /// in a plain file name (`..`, `/`, empty) is rejected.
    pub fn new(name: &str, source: impl Into<PathBuf>) -> Result<Self, ValidationError> {
        Ok(Self {
            name: plain_file_name(Path::new(name))
                .ok_or_else(|| ValidationError::InvalidFileName(name.to_string()))?,
            source: source.into(),
        })
    }

    /// A job named after the file it reads from
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, ValidationError> {
        let source = path.into();
        let name = plain_file_name(&source)
            .ok_or_else(|| ValidationError::InvalidFileName(source.display().to_string()))?;
        Ok(Self { name, source })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Open a fresh read handle on the payload
    pub fn open(&self) -> io::Result<File> {
        File::open(&self.source)
    }
}

/// Anchor position labels and margin used for feature detection and the transform
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSettings {
    x_position: String,
    y_position: String,
    margin: f64,
}

impl FeatureSettings {
    pub fn x_position(&self) -> &str {
        &self.x_position
    }

    pub fn y_position(&self) -> &str {
        &self.y_position
    }

    pub fn margin(&self) -> f64 {
        self.margin
    }
}

/// Validated, read-only settings shared by every worker of a batch
#[derive(Debug)]
pub struct BatchSettings {
    reference_map: String,
    attr_key: String,
    key_strategy: RasterKeyStrategy,
    target_dir: PathBuf,
    subdir_attrs: Vec<String>,
    features: FeatureSettings,
}

impl BatchSettings {
    pub fn reference_map(&self) -> &str {
        &self.reference_map
    }

    pub fn attr_key(&self) -> &str {
        &self.attr_key
    }

    pub fn key_strategy(&self) -> &RasterKeyStrategy {
        &self.key_strategy
    }

    /// Target directory, already anchored under the storage root
    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    /// Attribute names whose values nest each file's output directory
    pub fn subdir_attrs(&self) -> &[String] {
        &self.subdir_attrs
    }

    pub fn features(&self) -> &FeatureSettings {
        &self.features
    }
}

/// Raw batch request as submitted by a caller
#[derive(Debug, Default)]
pub struct BatchRequest {
    pub reference_map: String,
    pub attr_key: String,
    /// `all`, `prefix`, `suffix` or `regex`
    pub key_strategy: String,
    pub prefix_chars: String,
    pub suffix_chars: String,
    pub key_regex: String,
    pub target_dir: String,
    /// JSON array of attribute names; empty means no nesting
    pub subdir_attrs: String,
    pub x_position: String,
    pub y_position: String,
    pub margin: String,
    pub files: Vec<FileJob>,
}

/// Settings plus the jobs they apply to
#[derive(Debug)]
pub struct PreparedBatch {
    pub settings: BatchSettings,
    pub jobs: Vec<FileJob>,
}

/// Validate `request` against `catalog`, anchoring its target under `storage_root`
pub fn build_batch(
    request: BatchRequest,
    storage_root: &Path,
    catalog: &dyn Catalog,
) -> Result<PreparedBatch, ValidationError> {
    if request.files.is_empty() {
        return Err(ValidationError::EmptyBatch);
    }

    let reference_map = required(request.reference_map, "master_map")?;
    let attr_key = required(request.attr_key, "attr_key")?;
    let selector = required(request.key_strategy, "raster_key_type")?;

    match catalog.reference_exists(&reference_map) {
        Ok(true) => {}
        Ok(false) => {
            return Err(ValidationError::UnknownReference(
                CatalogError::UnknownReference(reference_map),
            ))
        }
        Err(e) => return Err(ValidationError::UnknownReference(e)),
    }
    match catalog.reference_attribute_exists(&reference_map, &attr_key) {
        Ok(true) => {}
        Ok(false) => {
            return Err(ValidationError::UnknownReference(
                CatalogError::UnknownAttribute {
                    reference: reference_map,
                    attribute: attr_key,
                },
            ))
        }
        Err(e) => return Err(ValidationError::UnknownReference(e)),
    }

    let key_strategy = RasterKeyStrategy::from_parts(
        &selector,
        &request.prefix_chars,
        &request.suffix_chars,
        &request.key_regex,
    )
    .map_err(ValidationError::InvalidStrategyParams)?;

    let subdir_attrs = parse_subdir_attrs(&request.subdir_attrs)?;
    let target_dir = anchor_target_dir(storage_root, &request.target_dir)?;

    let margin = request
        .margin
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|m| m.is_finite())
        .ok_or_else(|| ValidationError::InvalidMargin(request.margin.clone()))?;

    debug!(
        reference_map = %reference_map,
        strategy = %key_strategy,
        target = %target_dir.display(),
        files = request.files.len(),
        "Batch request validated"
    );

    Ok(PreparedBatch {
        settings: BatchSettings {
            reference_map,
            attr_key,
            key_strategy,
            target_dir,
            subdir_attrs,
            features: FeatureSettings {
                x_position: request.x_position,
                y_position: request.y_position,
                margin,
            },
        },
        jobs: request.files,
    })
}

fn plain_file_name(path: &Path) -> Option<String> {
    match path.components().next_back()? {
        Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
        _ => None,
    }
}

fn required(value: String, field: &'static str) -> Result<String, ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(value)
}

fn parse_subdir_attrs(raw: &str) -> Result<Vec<String>, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str::<Vec<String>>(raw)
        .map_err(|e| ValidationError::InvalidSubdirSpec(e.to_string()))
}

/// Join `target` under `root` after checking it cannot escape it.
///
/// Only the caller-supplied part is checked; the root is trusted configuration.
fn anchor_target_dir(root: &Path, target: &str) -> Result<PathBuf, ValidationError> {
    let unsafe_dir = || ValidationError::UnsafeTargetDir(target.to_string());

    if !target
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '/')
    {
        return Err(unsafe_dir());
    }

    let relative = Path::new(target.trim_start_matches('/'));
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(unsafe_dir());
    }

    if relative.as_os_str().is_empty() {
        return Ok(root.to_path_buf());
    }
    Ok(root.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::GeoJsonCatalog;

    const MAP: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"idsls": "6471", "kec": "Barat"},
             "geometry": {"type": "Point", "coordinates": [1.0, 2.0]}}
        ]
    }"#;

    fn catalog() -> GeoJsonCatalog {
        let mut catalog = GeoJsonCatalog::new();
        catalog.insert_document("sls", "idsls", MAP).unwrap();
        catalog
    }

    fn request() -> BatchRequest {
        BatchRequest {
            reference_map: "sls".to_string(),
            attr_key: "idsls".to_string(),
            key_strategy: "prefix".to_string(),
            prefix_chars: "4".to_string(),
            target_dir: "batch one/2024".to_string(),
            subdir_attrs: r#"["kec"]"#.to_string(),
            x_position: "left".to_string(),
            y_position: "top".to_string(),
            margin: "0.05".to_string(),
            files: vec![FileJob::new("6471.jpg", "/tmp/6471.jpg").unwrap()],
            ..Default::default()
        }
    }

    fn build(request: BatchRequest) -> Result<PreparedBatch, ValidationError> {
        build_batch(request, Path::new("/srv/uploads"), &catalog())
    }

    #[test]
    fn test_valid_request() {
        let batch = build(request()).unwrap();
        let settings = &batch.settings;
        assert_eq!(settings.reference_map(), "sls");
        assert_eq!(settings.attr_key(), "idsls");
        assert!(matches!(
            settings.key_strategy(),
            RasterKeyStrategy::Prefix { count: 4 }
        ));
        assert_eq!(
            settings.target_dir(),
            Path::new("/srv/uploads/batch one/2024")
        );
        assert_eq!(settings.subdir_attrs(), ["kec".to_string()]);
        assert_eq!(settings.features().x_position(), "left");
        assert_eq!(settings.features().y_position(), "top");
        assert_eq!(settings.features().margin(), 0.05);
        assert_eq!(batch.jobs.len(), 1);
    }

    #[test]
    fn test_empty_batch_checked_first() {
        let req = BatchRequest {
            files: Vec::new(),
            reference_map: String::new(),
            ..request()
        };
        assert!(matches!(build(req), Err(ValidationError::EmptyBatch)));
    }

    #[test]
    fn test_missing_fields() {
        let req = BatchRequest {
            reference_map: "  ".to_string(),
            ..request()
        };
        assert!(matches!(
            build(req),
            Err(ValidationError::MissingField("master_map"))
        ));

        let req = BatchRequest {
            attr_key: String::new(),
            ..request()
        };
        assert!(matches!(
            build(req),
            Err(ValidationError::MissingField("attr_key"))
        ));

        let req = BatchRequest {
            key_strategy: String::new(),
            ..request()
        };
        assert!(matches!(
            build(req),
            Err(ValidationError::MissingField("raster_key_type"))
        ));
    }

    #[test]
    fn test_unknown_reference_and_attribute() {
        let req = BatchRequest {
            reference_map: "nowhere".to_string(),
            ..request()
        };
        assert!(matches!(
            build(req),
            Err(ValidationError::UnknownReference(
                CatalogError::UnknownReference(_)
            ))
        ));

        let req = BatchRequest {
            attr_key: "desa".to_string(),
            ..request()
        };
        assert!(matches!(
            build(req),
            Err(ValidationError::UnknownReference(
                CatalogError::UnknownAttribute { .. }
            ))
        ));
    }

    #[test]
    fn test_invalid_strategy_params() {
        let req = BatchRequest {
            prefix_chars: "0".to_string(),
            ..request()
        };
        assert!(matches!(
            build(req),
            Err(ValidationError::InvalidStrategyParams(_))
        ));

        let req = BatchRequest {
            key_strategy: "middle".to_string(),
            ..request()
        };
        assert!(matches!(
            build(req),
            Err(ValidationError::InvalidStrategyParams(
                KeyError::InvalidStrategy(_)
            ))
        ));
    }

    #[test]
    fn test_subdir_spec() {
        let req = BatchRequest {
            subdir_attrs: String::new(),
            ..request()
        };
        assert!(build(req).unwrap().settings.subdir_attrs().is_empty());

        let req = BatchRequest {
            subdir_attrs: "kec".to_string(),
            ..request()
        };
        assert!(matches!(
            build(req),
            Err(ValidationError::InvalidSubdirSpec(_))
        ));
    }

    #[test]
    fn test_unsafe_target_dirs_rejected() {
        for target in ["../../etc", "a/../b", "a\\b", "data.v2", "x;rm", "ok/..", "~root"] {
            let req = BatchRequest {
                target_dir: target.to_string(),
                ..request()
            };
            assert!(
                matches!(build(req), Err(ValidationError::UnsafeTargetDir(_))),
                "target {:?} should be rejected",
                target
            );
        }
    }

    #[test]
    fn test_target_dir_is_anchored() {
        let req = BatchRequest {
            target_dir: "/absolute/looking".to_string(),
            ..request()
        };
        assert_eq!(
            build(req).unwrap().settings.target_dir(),
            Path::new("/srv/uploads/absolute/looking")
        );

        let req = BatchRequest {
            target_dir: String::new(),
            ..request()
        };
        assert_eq!(
            build(req).unwrap().settings.target_dir(),
            Path::new("/srv/uploads")
        );
    }

    #[test]
    fn test_invalid_margin() {
        for margin in ["", "abc", "NaN", "inf"] {
            let req = BatchRequest {
                margin: margin.to_string(),
                ..request()
            };
            assert!(matches!(build(req), Err(ValidationError::InvalidMargin(_))));
        }
    }

    #[test]
    fn test_validation_order_strategy_before_target() {
        let req = BatchRequest {
            prefix_chars: "x".to_string(),
            target_dir: "../../etc".to_string(),
            ..request()
        };
        assert!(matches!(
            build(req),
            Err(ValidationError::InvalidStrategyParams(_))
        ));
    }

    #[test]
    fn test_file_job_keeps_only_file_name() {
        let job = FileJob::new("../../evil/6471.jpg", "/tmp/upload-1").unwrap();
        assert_eq!(job.name(), "6471.jpg");
        assert_eq!(job.source(), Path::new("/tmp/upload-1"));

        let job = FileJob::from_path("/data/in/6471.png").unwrap();
        assert_eq!(job.name(), "6471.png");
    }

    #[test]
    fn test_file_job_rejects_names_without_a_file() {
        for name in ["..", "a/..", "/", "", "."] {
            assert!(
                matches!(
                    FileJob::new(name, "/tmp/upload-1"),
                    Err(ValidationError::InvalidFileName(_))
                ),
                "{:?} was accepted",
                name
            );
        }
        assert!(matches!(
            FileJob::from_path("/data/in/.."),
            Err(ValidationError::InvalidFileName(_))
        ));
    }
}
