//! Feature Extraction Error Types

use crate::bands::Band;
use thiserror::Error;

/// Errors during spectral transformation and band feature extraction
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    /// A zero-length epoch reached the transform stage
    #[error("Cannot transform an empty signal")]
    EmptySpectrum,

    /// No frequency bin lies within tolerance of a band edge
    #[error("No frequency bin within {tolerance_hz} Hz of band edge {edge_hz} Hz")]
    BandEdgeNotFound { edge_hz: f64, tolerance_hz: f64 },

    /// Unknown band name
    #[error("Invalid band name: {0:?} (expected delta, theta, alpha, beta or gamma)")]
    InvalidBandName(String),

    /// Two-band selection named the same band twice
    #[error("Two-band selection needs distinct bands, got {0} twice")]
    DuplicateBand(Band),

    /// Band has fewer bins than the requested number of sub-bands
    #[error("Band {band} spans {bins} bins, cannot split into {parts}")]
    BandTooNarrow { band: Band, bins: usize, parts: usize },

    /// Resolved edges leave a band with no bins
    #[error("Band {band} resolved to empty bin range {start}..{end}")]
    DegenerateBand { band: Band, start: usize, end: usize },

    /// Wavelet parameters cannot be realised
    #[error("Invalid wavelet configuration: {0}")]
    InvalidWaveletConfig(String),

    /// An epoch's channel count differs from the rest of the run
    #[error("Epoch {epoch} has {actual} channels, expected {expected}")]
    InconsistentChannelCount {
        epoch: String,
        expected: usize,
        actual: usize,
    },

    /// Feature table encoding failed
    #[error("Failed to encode feature table: {0}")]
    Encode(String),
}
