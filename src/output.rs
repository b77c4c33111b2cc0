//! Structured output writer supporting JSON and human-readable modes.

use serde::Serialize;

use crate::catalog::{AttributeSummary, ReferenceSummary};
use crate::core::aggregate::BatchResponse;

/// Output mode for CLI results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

/// Response body for a rejected request
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Writes command results in the selected mode
#[derive(Debug, Clone)]
pub struct OutputWriter {
    pub mode: OutputMode,
}

impl OutputWriter {
    pub fn new(json: bool) -> Self {
        Self {
            mode: if json { OutputMode::Json } else { OutputMode::Human },
        }
    }

    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    pub fn batch_response(&self, response: &BatchResponse) {
        println!("{}", self.render_batch_response(response));
    }

    pub fn render_batch_response(&self, response: &BatchResponse) -> String {
        match self.mode {
            OutputMode::Json => to_json(response),
            OutputMode::Human => {
                let mut out = format!(
                    "Georeferenced into {}\n  succeeded: {}\n  failed:    {}",
                    response.dir_path, response.success, response.fail
                );
                for line in response.error.lines() {
                    out.push_str("\n  ");
                    out.push_str(line);
                }
                out
            }
        }
    }

    pub fn references(&self, maps: &[ReferenceSummary]) {
        match self.mode {
            OutputMode::Json => println!("{}", to_json(&maps)),
            OutputMode::Human => {
                for map in maps {
                    println!(
                        "{:<24} {:>8} features  key={}  type={}",
                        map.name,
                        map.feature_count,
                        map.key_attribute,
                        map.geometry_type.as_deref().unwrap_or("-")
                    );
                }
            }
        }
    }

    pub fn attributes(&self, attributes: &[AttributeSummary]) {
        match self.mode {
            OutputMode::Json => println!("{}", to_json(&attributes)),
            OutputMode::Human => {
                for attribute in attributes {
                    println!("{:<24} {}", attribute.name, attribute.kind);
                }
            }
        }
    }

    /// Print a rejection; JSON goes to stdout so callers always get one document
    pub fn error(&self, msg: &str) {
        match self.mode {
            OutputMode::Json => println!(
                "{}",
                to_json(&ErrorResponse {
                    error: sanitize_error(msg),
                })
            ),
            OutputMode::Human => eprintln!("Error: {}", sanitize_error(msg)),
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!(r#"{{"error":"{}"}}"#, e))
}

/// Sanitize error messages by collapsing whitespace
pub fn sanitize_error(msg: &str) -> String {
    msg.split_whitespace().collect::<Vec<&str>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response() -> BatchResponse {
        BatchResponse {
            dir_path: "uploads/batch".to_string(),
            success: 2,
            fail: 1,
            error: "error file AB.jpg : failed to resolve raster key: too short.".to_string(),
        }
    }

    #[test]
    fn test_sanitize_error_newlines() {
        assert_eq!(sanitize_error("line1\nline2\nline3"), "line1 line2 line3");
    }

    #[test]
    fn test_sanitize_error_mixed() {
        assert_eq!(
            sanitize_error("  error:\n  detail\t  info  \r\n"),
            "error: detail info"
        );
        assert_eq!(sanitize_error(" \n \t \r "), "");
    }

    #[test]
    fn test_output_writer_modes() {
        assert!(OutputWriter::new(true).is_json());
        assert_eq!(OutputWriter::new(false).mode, OutputMode::Human);
    }

    #[test]
    fn test_json_batch_response() {
        let rendered = OutputWriter::new(true).render_batch_response(&response());
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["dir_path"], "uploads/batch");
        assert_eq!(parsed["success"], 2);
        assert_eq!(parsed["fail"], 1);
        assert!(parsed["error"].as_str().unwrap().contains("AB.jpg"));
    }

    #[test]
    fn test_human_batch_response() {
        let rendered = OutputWriter::new(false).render_batch_response(&response());
        assert!(rendered.starts_with("Georeferenced into uploads/batch"));
        assert!(rendered.contains("succeeded: 2"));
        assert!(rendered.contains("failed:    1"));
        assert!(rendered.contains("AB.jpg"));
    }

    #[test]
    fn test_error_response_shape() {
        let json = to_json(&ErrorResponse {
            error: "missing rasters file".to_string(),
        });
        assert_eq!(json, r#"{"error":"missing rasters file"}"#);
    }
}
