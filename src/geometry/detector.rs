//! Feature point detection.
//!
//! Detection itself happens in an external program (typically an OpenCV
//! script). The program receives the raster path as its last argument and
//! prints `{"points": [[x, y], ...]}` on stdout.

use serde::Deserialize;
use std::path::Path;
use std::process::Command;
use tracing::debug;

use super::{GeometryError, PixelPoint};
use crate::config::DetectorConfig;

pub trait FeatureDetector: Send + Sync {
    fn detect(&self, path: &Path) -> Result<Vec<PixelPoint>, GeometryError>;
}

#[derive(Debug, Deserialize)]
struct DetectorOutput {
    points: Vec<PixelPoint>,
}

/// Runs an external detector program per raster
#[derive(Debug, Clone)]
pub struct CommandFeatureDetector {
    program: String,
    args: Vec<String>,
}

impl CommandFeatureDetector {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &DetectorConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }
}

impl FeatureDetector for CommandFeatureDetector {
    fn detect(&self, path: &Path) -> Result<Vec<PixelPoint>, GeometryError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .output()
            .map_err(|e| GeometryError::Detector(format!("failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(GeometryError::Detector(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let parsed: DetectorOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| GeometryError::Detector(format!("unreadable detector output: {}", e)))?;
        debug!(path = %path.display(), points = parsed.points.len(), "Detected feature points");
        Ok(parsed.points)
    }
}

/// Reports no feature points, so the whole image is treated as the frame
#[derive(Debug, Clone, Copy, Default)]
pub struct WholeImageDetector;

impl FeatureDetector for WholeImageDetector {
    fn detect(&self, _path: &Path) -> Result<Vec<PixelPoint>, GeometryError> {
        Ok(Vec::new())
    }
}

/// Detector described by `config`, or [`WholeImageDetector`] when none is set
pub fn detector_from_config(config: Option<&DetectorConfig>) -> Box<dyn FeatureDetector> {
    match config {
        Some(config) => Box::new(CommandFeatureDetector::from_config(config)),
        None => Box::new(WholeImageDetector),
    }
}
