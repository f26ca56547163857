//! Morlet Continuous Wavelet Transform
//!
//! Two numeric backends share one contract: coefficients are computed on a
//! logarithmic frequency grid from high to low frequency, then reversed into
//! an ascending axis by [`Spectrum::from_descending`].

use crate::error::FeatureError;
use crate::fft::FftPlans;
use crate::spectrum::{SpectralTransform, Spectrum, TransformKind};
use ndarray::{Array2, Axis};
use rustfft::num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Kernel support in units of the wavelet scale
const SUPPORT_SCALES: f64 = 4.0;

/// Morlet wavelet and frequency grid parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveletConfig {
    /// Central angular frequency of the mother wavelet
    pub omega0: f64,
    /// Lowest analysed frequency (Hz)
    pub min_frequency_hz: f64,
    /// Highest analysed frequency (Hz)
    pub max_frequency_hz: f64,
    /// Grid density; adjacent frequencies differ by `2^(1/voices)`
    pub voices_per_octave: usize,
}

impl Default for WaveletConfig {
    fn default() -> Self {
        Self {
            omega0: 6.0,
            min_frequency_hz: 2.0,
            max_frequency_hz: 64.0,
            voices_per_octave: 32,
        }
    }
}

impl WaveletConfig {
    pub fn validate(&self) -> Result<(), FeatureError> {
        if self.omega0.is_nan() || self.omega0 <= 0.0 {
            return Err(FeatureError::InvalidWaveletConfig(format!(
                "omega0 must be positive, got {}",
                self.omega0
            )));
        }
        if self.min_frequency_hz.is_nan() || self.min_frequency_hz <= 0.0 || self.min_frequency_hz >= self.max_frequency_hz {
            return Err(FeatureError::InvalidWaveletConfig(format!(
                "frequency range {}..{} Hz is empty",
                self.min_frequency_hz, self.max_frequency_hz
            )));
        }
        if self.voices_per_octave == 0 {
            return Err(FeatureError::InvalidWaveletConfig("voices_per_octave must be >= 1".into()));
        }
        Ok(())
    }

    /// Analysis frequencies from `max_frequency_hz` down to `min_frequency_hz`
    pub fn frequencies_descending(&self) -> Vec<f64> {
        let voices = self.voices_per_octave as f64;
        let steps = (voices * (self.max_frequency_hz / self.min_frequency_hz).log2() + 1e-9).floor() as usize;
        (0..=steps)
            .map(|k| self.max_frequency_hz * 2f64.powf(-(k as f64) / voices))
            .collect()
    }

    /// Wavelet scale (seconds) whose centre frequency is `frequency_hz`
    fn scale(&self, frequency_hz: f64) -> f64 {
        self.omega0 / (2.0 * PI * frequency_hz)
    }
}

/// How the wavelet coefficients are computed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CwtBackend {
    /// Correlate the raw signal with wavelets sampled in time, truncated at
    /// four scales either side. The correlation runs as a zero-padded FFT
    /// convolution, so a row costs `O(L log L)` with `L >= N + kernel length`.
    Direct,
    /// Multiply by the analytic wavelet spectrum and invert
    Fourier,
}

/// Morlet continuous wavelet transform
#[derive(Debug)]
pub struct MorletCwt {
    backend: CwtBackend,
    config: WaveletConfig,
    frequencies: Vec<f64>,
    plans: FftPlans,
}

impl MorletCwt {
    pub fn new(backend: CwtBackend, config: WaveletConfig) -> Result<Self, FeatureError> {
        config.validate()?;
        Ok(Self {
            backend,
            frequencies: config.frequencies_descending(),
            config,
            plans: FftPlans::default(),
        })
    }

    /// Time-domain Morlet kernel for `frequency_hz`, `2 * half + 1` taps
    fn kernel(&self, frequency_hz: f64, sampling_frequency: f64, max_half: usize) -> Vec<Complex<f64>> {
        let dt = 1.0 / sampling_frequency;
        let scale = self.config.scale(frequency_hz);
        let half = self.half_width(frequency_hz, sampling_frequency).min(max_half);
        let norm = PI.powf(-0.25) / scale.sqrt() * dt;
        (0..=2 * half)
            .map(|i| {
                let t = (i as f64 - half as f64) * dt / scale;
                Complex::from_polar(norm * (-0.5 * t * t).exp(), -self.config.omega0 * t)
            })
            .collect()
    }

    fn half_width(&self, frequency_hz: f64, sampling_frequency: f64) -> usize {
        (SUPPORT_SCALES * self.config.scale(frequency_hz) * sampling_frequency).ceil() as usize
    }

    /// `out[t] = sum_i kernel[i] * signal[t + i - half]`, with the signal
    /// zero outside `0..N`.
    ///
    /// Computed as the linear convolution of the signal with the reversed
    /// kernel; output sample `t` sits at `t + half` of that convolution.
    fn correlate(&self, signal: &[f64], sampling_frequency: f64) -> Array2<Complex<f64>> {
        let n = signal.len();
        let max_half = n - 1;
        let widest = self
            .frequencies
            .iter()
            .map(|&f| self.half_width(f, sampling_frequency).min(max_half))
            .max()
            .unwrap_or(0);
        let m = (n + 2 * widest).next_power_of_two();
        let forward = self.plans.forward(m);
        let inverse = self.plans.inverse(m);

        let mut spectrum = zero_padded(signal, m);
        forward.process(&mut spectrum);

        let mut coeffs = Array2::<Complex<f64>>::zeros((self.frequencies.len(), n));
        let mut buffer = vec![Complex::new(0.0, 0.0); m];
        for (mut row, &freq) in coeffs.axis_iter_mut(Axis(0)).zip(&self.frequencies) {
            let kernel = self.kernel(freq, sampling_frequency, max_half);
            let half = kernel.len() / 2;

            buffer.fill(Complex::new(0.0, 0.0));
            for (slot, tap) in buffer.iter_mut().zip(kernel.iter().rev()) {
                *slot = *tap;
            }
            forward.process(&mut buffer);
            for (out, x) in buffer.iter_mut().zip(&spectrum) {
                *out *= *x;
            }
            inverse.process(&mut buffer);

            for (out, value) in row.iter_mut().zip(&buffer[half..half + n]) {
                *out = *value / m as f64;
            }
        }
        coeffs
    }

    fn via_fourier(&self, signal: &[f64], sampling_frequency: f64) -> Array2<Complex<f64>> {
        let n = signal.len();
        let m = (2 * n).next_power_of_two();
        let forward = self.plans.forward(m);
        let inverse = self.plans.inverse(m);

        let mut spectrum = zero_padded(signal, m);
        forward.process(&mut spectrum);

        // positive angular frequencies only; the Morlet spectrum is analytic
        let omegas: Vec<f64> = (0..m)
            .map(|k| {
                let k = if k <= m / 2 { k as f64 } else { k as f64 - m as f64 };
                2.0 * PI * k * sampling_frequency / m as f64
            })
            .collect();

        let mut coeffs = Array2::<Complex<f64>>::zeros((self.frequencies.len(), n));
        let mut buffer = vec![Complex::new(0.0, 0.0); m];
        for (mut row, &freq) in coeffs.axis_iter_mut(Axis(0)).zip(&self.frequencies) {
            let scale = self.config.scale(freq);
            let norm = PI.powf(-0.25) * (2.0 * PI * scale).sqrt();
            for ((out, x), &w) in buffer.iter_mut().zip(&spectrum).zip(&omegas) {
                *out = if w > 0.0 {
                    let d = scale * w - self.config.omega0;
                    *x * (norm * (-0.5 * d * d).exp())
                } else {
                    Complex::new(0.0, 0.0)
                };
            }
            inverse.process(&mut buffer);
            for (out, value) in row.iter_mut().zip(&buffer) {
                *out = *value / m as f64;
            }
        }
        coeffs
    }
}

fn zero_padded(signal: &[f64], len: usize) -> Vec<Complex<f64>> {
    signal
        .iter()
        .map(|&v| Complex::new(v, 0.0))
        .chain(std::iter::repeat(Complex::new(0.0, 0.0)))
        .take(len)
        .collect()
}

impl SpectralTransform for MorletCwt {
    fn kind(&self) -> TransformKind {
        match self.backend {
            CwtBackend::Direct => TransformKind::ContinuousDirect,
            CwtBackend::Fourier => TransformKind::ContinuousViaFourier,
        }
    }

    fn transform(&self, signal: &[f64], sampling_frequency: f64) -> Result<Spectrum, FeatureError> {
        if signal.is_empty() {
            return Err(FeatureError::EmptySpectrum);
        }
        let nyquist = sampling_frequency / 2.0;
        if self.config.max_frequency_hz >= nyquist {
            return Err(FeatureError::InvalidWaveletConfig(format!(
                "max frequency {} Hz must be below Nyquist ({} Hz)",
                self.config.max_frequency_hz, nyquist
            )));
        }

        let coeffs = match self.backend {
            CwtBackend::Direct => self.correlate(signal, sampling_frequency),
            CwtBackend::Fourier => self.via_fourier(signal, sampling_frequency),
        };
        Ok(Spectrum::from_descending(self.frequencies.clone(), &coeffs))
    }
}
