//! Pipeline Error Types

use feature_engine::{FeatureError, TransformKind};
use preprocess::PreprocessError;
use thiserror::Error;

/// Errors raised while configuring or running the pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Segment mode, bands and transform do not fit together
    #[error("Invalid mode combination: {0}")]
    InvalidModeCombination(String),

    /// A global parameter is out of range
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// The transform cannot reach the band edges at this sampling rate
    #[error("Sampling frequency {sampling_frequency_hz} Hz unsupported by {transform:?}: {reason}")]
    UnsupportedSamplingRate {
        sampling_frequency_hz: f64,
        transform: TransformKind,
        reason: String,
    },

    /// Recording channel count differs from the configuration
    #[error("Recording {recording} has {actual} channels, expected {expected}")]
    ChannelCountMismatch {
        recording: String,
        expected: usize,
        actual: usize,
    },

    /// Recording sampling frequency differs from the configuration
    #[error("Recording {recording} is sampled at {actual} Hz, expected {expected} Hz")]
    SamplingRateMismatch {
        recording: String,
        expected: f64,
        actual: f64,
    },

    #[error(transparent)]
    Preprocess(#[from] PreprocessError),

    #[error(transparent)]
    Feature(#[from] FeatureError),

    /// Configuration source could not be read or deserialised
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// A global tracing subscriber is already installed
    #[error("Failed to initialise logging: {0}")]
    Logging(String),
}
