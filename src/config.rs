/*!
 * Configuration types for geobatch
 */

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeobatchConfig {
    /// Managed root every batch target directory is anchored under
    #[serde(default = "default_storage_root")]
    pub storage_root: PathBuf,

    /// Log level for diagnostic output
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path (None = stderr)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging (shorthand for log_level = debug)
    #[serde(default)]
    pub verbose: bool,

    /// Reference maps loaded into the catalog at startup
    #[serde(default)]
    pub reference_maps: Vec<ReferenceMapConfig>,

    /// External feature point detector
    #[serde(default)]
    pub feature_detector: Option<DetectorConfig>,
}

impl Default for GeobatchConfig {
    fn default() -> Self {
        Self {
            storage_root: default_storage_root(),
            log_level: LogLevel::default(),
            log_file: None,
            verbose: false,
            reference_maps: Vec::new(),
            feature_detector: None,
        }
    }
}

/// A GeoJSON reference map to load into the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceMapConfig {
    /// Name batches refer to the map by
    pub name: String,

    /// Path of the GeoJSON FeatureCollection
    pub path: PathBuf,

    /// Property that extent lookups match raster keys against
    pub key_attribute: String,
}

/// External program that prints feature points for a raster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub program: String,

    /// Arguments placed before the raster path
    #[serde(default)]
    pub args: Vec<String>,
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to tracing Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("uploads")
}

impl GeobatchConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: GeobatchConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = GeobatchConfig::default();
        assert_eq!(config.storage_root, PathBuf::from("uploads"));
        assert_eq!(config.log_level, LogLevel::Info);
        assert!(config.reference_maps.is_empty());
        assert!(config.feature_detector.is_none());
    }

    #[test]
    fn test_serialization() {
        let config = GeobatchConfig::default();
        let toml = toml::to_string(&config).unwrap();
        let deserialized: GeobatchConfig = toml::from_str(&toml).unwrap();
        assert_eq!(config.storage_root, deserialized.storage_root);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("geobatch.toml");
        let mut config = GeobatchConfig::default();
        config.verbose = true;
        config.to_file(&path).unwrap();

        let loaded = GeobatchConfig::from_file(&path).unwrap();
        assert!(loaded.verbose);
    }

    #[test]
    fn test_example_config() {
        let toml_str = r#"
storage_root = "/srv/geomatis/uploads"
log_level = "debug"

[[reference_maps]]
name = "sls_6471"
path = "maps/sls_6471.geojson"
key_attribute = "idsls"

[feature_detector]
program = "python3"
args = ["detect_frame.py"]
"#;

        let config: GeobatchConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.storage_root, PathBuf::from("/srv/geomatis/uploads"));
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(
            config.reference_maps,
            vec![ReferenceMapConfig {
                name: "sls_6471".to_string(),
                path: PathBuf::from("maps/sls_6471.geojson"),
                key_attribute: "idsls".to_string(),
            }]
        );
        let detector = config.feature_detector.unwrap();
        assert_eq!(detector.program, "python3");
        assert_eq!(detector.args, vec!["detect_frame.py"]);
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(LogLevel::Error.to_tracing_level(), tracing::Level::ERROR);
        assert_eq!(LogLevel::Trace.to_tracing_level(), tracing::Level::TRACE);
    }
}
