//! Spectral Transform Interface

use crate::bands::ToleranceTable;
use crate::cwt::{CwtBackend, MorletCwt, WaveletConfig};
use crate::error::FeatureError;
use crate::fft::DirectFft;
use ndarray::{s, Array2};
use rustfft::num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Magnitude spectrum of one channel of one epoch.
///
/// `magnitude` is `frequency bins × time positions`; a Fourier spectrum has
/// a single time column. `frequencies` is ascending and matches the rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    pub frequencies: Vec<f64>,
    pub magnitude: Array2<f64>,
}

impl Spectrum {
    /// Build from coefficients ordered high-to-low frequency, reversing both
    /// the axis and the rows into ascending order.
    pub fn from_descending(mut frequencies: Vec<f64>, coefficients: &Array2<Complex<f64>>) -> Self {
        frequencies.reverse();
        let magnitude = coefficients.slice(s![..;-1, ..]).mapv(|c| c.norm());
        Self {
            frequencies,
            magnitude,
        }
    }

    /// Mean magnitude over a range of frequency bins and every time position
    pub fn band_mean(&self, bins: Range<usize>) -> f64 {
        let band = self.magnitude.slice(s![bins, ..]);
        band.mean().unwrap_or(0.0)
    }
}

/// Converts a real signal into a magnitude spectrum and its frequency axis
pub trait SpectralTransform: Send + Sync {
    fn kind(&self) -> TransformKind;

    /// Transform one channel sampled at `sampling_frequency` Hz
    fn transform(&self, signal: &[f64], sampling_frequency: f64) -> Result<Spectrum, FeatureError>;

    /// Edge tolerances matching this transform's axis resolution
    fn tolerances(&self) -> &'static ToleranceTable {
        self.kind().tolerances()
    }
}

/// Available transform strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransformKind {
    /// Discrete Fourier transform of the whole epoch
    #[serde(rename = "directFFT")]
    DirectFft,
    /// Morlet wavelet transform by time-domain convolution
    #[serde(rename = "continuousDirect")]
    ContinuousDirect,
    /// Morlet wavelet transform through the Fourier domain
    #[serde(rename = "continuousViaFourier")]
    ContinuousViaFourier,
}

impl TransformKind {
    pub fn tolerances(self) -> &'static ToleranceTable {
        match self {
            TransformKind::DirectFft => &ToleranceTable::DIRECT_FFT,
            TransformKind::ContinuousDirect => &ToleranceTable::CONTINUOUS_DIRECT,
            TransformKind::ContinuousViaFourier => &ToleranceTable::CONTINUOUS_VIA_FOURIER,
        }
    }

    /// Wavelet defaults for this kind; `None` for the Fourier transform
    pub fn default_wavelet(self) -> Option<WaveletConfig> {
        match self {
            TransformKind::DirectFft => None,
            TransformKind::ContinuousDirect => Some(WaveletConfig::default()),
            TransformKind::ContinuousViaFourier => Some(WaveletConfig {
                voices_per_octave: 16,
                ..WaveletConfig::default()
            }),
        }
    }

    /// Instantiate the transform; `wavelet` overrides the kind's defaults
    pub fn build(self, wavelet: Option<WaveletConfig>) -> Result<Box<dyn SpectralTransform>, FeatureError> {
        let wavelet = wavelet.or_else(|| self.default_wavelet());
        let transform: Box<dyn SpectralTransform> = match (self, wavelet) {
            (TransformKind::DirectFft, _) => Box::new(DirectFft::new()),
            (TransformKind::ContinuousDirect, Some(config)) => {
                Box::new(MorletCwt::new(CwtBackend::Direct, config)?)
            }
            (TransformKind::ContinuousViaFourier, Some(config)) => {
                Box::new(MorletCwt::new(CwtBackend::Fourier, config)?)
            }
            (kind, None) => {
                return Err(FeatureError::InvalidWaveletConfig(format!(
                    "{:?} requires wavelet parameters",
                    kind
                )))
            }
        };
        Ok(transform)
    }
}
