/*!
 * Reduction of per-file outcomes into a batch summary.
 */

use serde::Serialize;
use std::path::Path;

use super::pipeline::FileOutcome;

/// One failed file, kept until the batch is summarised
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileFailure {
    pub file: String,
    pub stage: &'static str,
    pub message: String,
}

/// Summary of a batch that ran
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    pub success_count: usize,
    pub fail_count: usize,
    /// One line per failed file in the order outcomes arrived
    pub combined_error: Option<String>,
    pub failures: Vec<FileFailure>,
}

impl BatchResult {
    pub fn all_succeeded(&self) -> bool {
        self.fail_count == 0
    }

    pub fn into_response(self, target_dir: &Path) -> BatchResponse {
        BatchResponse {
            dir_path: target_dir.display().to_string(),
            success: self.success_count,
            fail: self.fail_count,
            error: self.combined_error.unwrap_or_default(),
        }
    }
}

/// Response returned to the caller of a batch that ran
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResponse {
    pub dir_path: String,
    pub success: usize,
    pub fail: usize,
    pub error: String,
}

/// Collects outcomes as they arrive
#[derive(Debug)]
pub struct Aggregator {
    expected: usize,
    received: usize,
    failures: Vec<FileFailure>,
}

impl Aggregator {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            received: 0,
            failures: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: FileOutcome) {
        self.received += 1;
        if let Some(error) = outcome.error {
            self.failures.push(FileFailure {
                file: outcome.id,
                stage: error.stage(),
                message: error.to_string(),
            });
        }
    }

    pub fn received(&self) -> usize {
        self.received
    }

    pub fn is_complete(&self) -> bool {
        self.received >= self.expected
    }

    pub fn finish(self) -> BatchResult {
        let fail_count = self.failures.len();
        let combined_error = if self.failures.is_empty() {
            None
        } else {
            Some(
                self.failures
                    .iter()
                    .map(|f| format!("error file {} : {}.", f.file, f.message))
                    .collect::<Vec<_>>()
                    .join("\n"),
            )
        };
        BatchResult {
            success_count: self.received - fail_count,
            fail_count,
            combined_error,
            failures: self.failures,
        }
    }
}
