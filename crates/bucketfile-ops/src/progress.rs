//! Progress reporting types for bucket operations.

use serde::{Deserialize, Serialize};

use bucketfile_core::DeleteFailure;

/// The type of operation being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum OperationType {
    /// A mixed selection of files and folders.
    Delete,
    /// Every object under one folder prefix.
    #[strum(to_string = "Delete folder")]
    DeleteFolder,
}

/// Progress information for an ongoing operation.
#[derive(Debug, Clone)]
pub struct OperationProgress {
    /// The type of operation.
    pub operation_type: OperationType,
    /// Number of items completed. Items are selected keys and folders for
    /// [`OperationType::Delete`], objects for [`OperationType::DeleteFolder`].
    pub items_completed: usize,
    /// Total number of items to process.
    pub items_total: usize,
    /// The key currently being processed.
    pub current_key: Option<String>,
    /// Failures encountered so far.
    pub errors: Vec<DeleteFailure>,
}

impl OperationProgress {
    /// Create a new progress tracker for an operation.
    pub fn new(operation_type: OperationType, items_total: usize) -> Self {
        Self {
            operation_type,
            items_completed: 0,
            items_total,
            current_key: None,
            errors: Vec::new(),
        }
    }

    /// Get the progress as a percentage (0.0 to 100.0).
    pub fn percentage(&self) -> f64 {
        if self.items_total > 0 {
            (self.items_completed as f64 / self.items_total as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Check if the operation has any errors.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Record one finished item, failed or not.
    pub fn complete_item(&mut self, key: &str, failure: Option<DeleteFailure>) {
        self.items_completed += 1;
        self.current_key = Some(key.to_string());
        if let Some(failure) = failure {
            self.errors.push(failure);
        }
    }
}

/// Result of a completed operation.
#[derive(Debug, Clone)]
pub struct OperationComplete {
    /// The type of operation.
    pub operation_type: OperationType,
    /// Number of items successfully processed.
    pub succeeded: usize,
    /// Number of items that failed.
    pub failed: usize,
    /// Failures that occurred.
    pub errors: Vec<DeleteFailure>,
}

impl OperationComplete {
    /// Check if the operation was fully successful.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Get a human-readable summary of the operation.
    pub fn summary(&self) -> String {
        let noun = match self.operation_type {
            OperationType::Delete => "items",
            OperationType::DeleteFolder => "objects",
        };

        if self.failed == 0 {
            format!("Deleted {} {}", self.succeeded, noun)
        } else {
            format!("Deleted {} {}, {} failed", self.succeeded, noun, self.failed)
        }
    }
}

/// Message sent through the channel of a background operation.
#[derive(Debug)]
pub enum OperationResult {
    /// Progress update.
    Progress(OperationProgress),
    /// The operation completed.
    Complete(OperationComplete),
}

/// Folds per-file progress into one overall percentage.
///
/// Overall progress is `(completed_files + current_file_fraction) / total_files`.
/// A value is only handed out when its integer percentage is strictly higher
/// than the last one, so callers never see repeats or regressions.
#[derive(Debug, Clone)]
pub struct ProgressAggregator {
    total_files: usize,
    completed_files: usize,
    last_reported: Option<u8>,
}

impl ProgressAggregator {
    /// Create an aggregator for a job of `total_files` files.
    pub fn new(total_files: usize) -> Self {
        Self {
            total_files,
            completed_files: 0,
            last_reported: None,
        }
    }

    /// Overall percentage for the current file at `fraction` (0.0 to 1.0).
    pub fn overall(&self, fraction: f64) -> u8 {
        if self.total_files == 0 {
            return 100;
        }
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let done = (self.completed_files as f64 + fraction) / self.total_files as f64;
        // Floored, not rounded: 99.5% must not show as 100 before the last
        // byte is sent.
        (done * 100.0).clamp(0.0, 100.0) as u8
    }

    /// Record progress within the current file.
    pub fn update(&mut self, fraction: f64) -> Option<u8> {
        let pct = self.overall(fraction);
        self.report(pct)
    }

    /// Mark the current file as finished.
    pub fn file_done(&mut self) -> Option<u8> {
        self.completed_files = (self.completed_files + 1).min(self.total_files);
        self.update(0.0)
    }

    /// Number of files marked finished.
    pub fn completed_files(&self) -> usize {
        self.completed_files
    }

    fn report(&mut self, pct: u8) -> Option<u8> {
        match self.last_reported {
            Some(last) if pct <= last => None,
            _ => {
                self.last_reported = Some(pct);
                Some(pct)
            }
        }
    }
}
