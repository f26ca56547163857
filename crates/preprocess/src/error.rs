//! Preprocessing Error Types

use recording::RecordingError;
use thiserror::Error;

/// Errors during filtering and segmentation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PreprocessError {
    /// No sample lies within tolerance of a segment boundary
    #[error("No sample within tolerance of t={target}s in recording {recording}")]
    NoMatchFound { recording: String, target: f64 },

    /// An epoch disagrees with the segment length fixed by the first epoch
    #[error("Epoch {epoch} has {actual} samples, expected {expected}")]
    InconsistentSegmentLength {
        epoch: String,
        expected: usize,
        actual: usize,
    },

    /// Segment count must be at least one
    #[error("Segment count must be >= 1, got {0}")]
    InvalidSegmentCount(usize),

    /// Total duration must be positive and finite
    #[error("Invalid total duration: {0}s")]
    InvalidDuration(f64),

    /// Filter parameters cannot be realised
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// Rebuilding a recording failed
    #[error(transparent)]
    Recording(#[from] RecordingError),
}
