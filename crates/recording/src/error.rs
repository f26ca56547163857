//! Recording Error Types

use thiserror::Error;

/// Errors raised while constructing a recording
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordingError {
    /// Time axis and sample matrix disagree on the number of samples
    #[error("Time axis has {time} samples but the sample matrix has {samples} rows")]
    ShapeMismatch { time: usize, samples: usize },

    /// Recording contains no samples or no channels
    #[error("Recording {0} has no samples or no channels")]
    EmptyRecording(String),

    /// Time axis is not strictly increasing
    #[error("Time axis is not strictly increasing at sample {0}")]
    NonMonotonicTimeAxis(usize),

    /// Channel name list does not match the channel count
    #[error("Expected {expected} channel names, got {actual}")]
    ChannelNameMismatch { expected: usize, actual: usize },

    /// Sampling frequency is zero, negative or not finite
    #[error("Invalid sampling frequency: {0} Hz")]
    InvalidSamplingFrequency(f64),
}
