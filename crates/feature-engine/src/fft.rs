//! FFT-based Magnitude Spectrum

use crate::error::FeatureError;
use crate::spectrum::{SpectralTransform, Spectrum, TransformKind};
use ndarray::Array2;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// FFT plans shared across calls, keyed by length and direction.
///
/// Every epoch of a run has the same length, so after the first channel
/// each transform reuses a cached plan.
#[derive(Default)]
pub(crate) struct FftPlans {
    cache: Mutex<HashMap<(usize, bool), Arc<dyn Fft<f64>>>>,
}

impl FftPlans {
    pub(crate) fn forward(&self, len: usize) -> Arc<dyn Fft<f64>> {
        self.plan(len, false)
    }

    pub(crate) fn inverse(&self, len: usize) -> Arc<dyn Fft<f64>> {
        self.plan(len, true)
    }

    fn plan(&self, len: usize, inverse: bool) -> Arc<dyn Fft<f64>> {
        let mut cache = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        cache
            .entry((len, inverse))
            .or_insert_with(|| {
                let mut planner = FftPlanner::<f64>::new();
                if inverse {
                    planner.plan_fft_inverse(len)
                } else {
                    planner.plan_fft_forward(len)
                }
            })
            .clone()
    }
}

impl fmt::Debug for FftPlans {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FftPlans")
    }
}

/// Discrete Fourier transform of the whole epoch.
///
/// The axis covers every bin, `k * fs / N` for `k` in `0..N`; the upper half
/// mirrors the lower one and is never reached by band edges below Nyquist.
#[derive(Debug, Default)]
pub struct DirectFft {
    plans: FftPlans,
}

impl DirectFft {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frequency axis for an `n`-point transform
    pub fn frequency_axis(n: usize, sampling_frequency: f64) -> Vec<f64> {
        let resolution = sampling_frequency / n as f64;
        (0..n).map(|k| k as f64 * resolution).collect()
    }
}

impl SpectralTransform for DirectFft {
    fn kind(&self) -> TransformKind {
        TransformKind::DirectFft
    }

    fn transform(&self, signal: &[f64], sampling_frequency: f64) -> Result<Spectrum, FeatureError> {
        if signal.is_empty() {
            return Err(FeatureError::EmptySpectrum);
        }
        let n = signal.len();

        let mut buffer: Vec<Complex<f64>> = signal.iter().map(|&v| Complex::new(v, 0.0)).collect();
        let fft = self.plans.forward(n);
        fft.process(&mut buffer);

        Ok(Spectrum {
            frequencies: Self::frequency_axis(n, sampling_frequency),
            magnitude: Array2::from_shape_fn((n, 1), |(k, _)| buffer[k].norm()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_fft_sine_peak() {
        let fs = 100.0;
        let signal: Vec<f64> = (0..200)
            .map(|i| (2.0 * PI * 10.0 * i as f64 / fs).sin())
            .collect();
        let spectrum = DirectFft::new().transform(&signal, fs).unwrap();

        assert_eq!(spectrum.frequencies.len(), 200);
        assert_abs_diff_eq!(spectrum.frequencies[20], 10.0);
        let column = spectrum.magnitude.column(0);
        let peak = (0..100)
            .max_by(|&a, &b| column[a].total_cmp(&column[b]))
            .unwrap();
        assert_eq!(peak, 20);
        // |X_k| of a unit sine is N/2 at its bin
        assert_abs_diff_eq!(column[20], 100.0, epsilon = 1e-6);
    }

    #[test]
    fn test_empty_signal() {
        assert_eq!(
            DirectFft::new().transform(&[], 100.0).unwrap_err(),
            FeatureError::EmptySpectrum
        );
    }

    #[test]
    fn test_plans_reused_across_calls() {
        let plans = FftPlans::default();
        assert!(Arc::ptr_eq(&plans.forward(8000), &plans.forward(8000)));
        assert!(Arc::ptr_eq(&plans.inverse(512), &plans.inverse(512)));
        assert!(!Arc::ptr_eq(&plans.forward(512), &plans.inverse(512)));
    }

    #[test]
    fn test_repeated_transforms_match() {
        let fft = DirectFft::new();
        let signal: Vec<f64> = (0..256).map(|i| (i as f64 * 0.37).sin()).collect();
        let first = fft.transform(&signal, 128.0).unwrap();
        let second = fft.transform(&signal, 128.0).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_axis_resolution() {
        let axis = DirectFft::frequency_axis(8000, 2000.0);
        assert_abs_diff_eq!(axis[1], 0.25);
        assert_abs_diff_eq!(axis[7999], 1999.75);
    }
}
