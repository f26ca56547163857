//! Butterworth Band Limiting
//!
//! IIR filters built from cascaded second-order sections (biquads) in
//! Direct Form II Transposed. High orders stay numerically stable because
//! every pole pair lives in its own section.

use crate::error::PreprocessError;
use ndarray::Array2;
use rayon::prelude::*;
use recording::{Epoch, Recording};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::debug;

/// Biquad coefficients, normalised so that `a0 == 1`.
///
/// `H(z) = (b0 + b1 z^-1 + b2 z^-2) / (1 + a1 z^-1 + a2 z^-2)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

#[derive(Debug, Clone, Copy)]
struct Biquad {
    coeffs: BiquadCoeffs,
    z1: f64,
    z2: f64,
}

impl Biquad {
    fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            z1: 0.0,
            z2: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f64) -> f64 {
        let c = &self.coeffs;
        let output = c.b0 * input + self.z1;
        self.z1 = c.b1 * input - c.a1 * output + self.z2;
        self.z2 = c.b2 * input - c.a2 * output;
        output
    }
}

/// Cascade of second-order sections
#[derive(Debug, Clone)]
pub struct SosFilter {
    sections: Vec<Biquad>,
}

impl SosFilter {
    pub fn new(sections: Vec<BiquadCoeffs>) -> Self {
        Self {
            sections: sections.into_iter().map(Biquad::new).collect(),
        }
    }

    /// Number of sections in the cascade
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Append the sections of another filter
    pub fn chain(mut self, other: SosFilter) -> Self {
        self.sections.extend(other.sections);
        self
    }

    /// Process one sample through every section
    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        self.sections
            .iter_mut()
            .fold(input, |acc, section| section.process(acc))
    }

    /// Filter a whole signal from a zeroed state
    pub fn filter<'a, I>(&mut self, signal: I) -> Vec<f64>
    where
        I: IntoIterator<Item = &'a f64>,
    {
        self.reset();
        signal.into_iter().map(|&x| self.process(x)).collect()
    }

    pub fn reset(&mut self) {
        for section in &mut self.sections {
            section.z1 = 0.0;
            section.z2 = 0.0;
        }
    }
}

/// Butterworth designs via the bilinear transform
pub struct ButterworthFilter;

impl ButterworthFilter {
    /// Lowpass with cutoff given as a fraction of the Nyquist frequency
    pub fn lowpass(order: usize, normalized_cutoff: f64) -> SosFilter {
        let wn = Self::prewarp(normalized_cutoff);
        SosFilter::new(Self::sections(order, wn, false))
    }

    /// Highpass with cutoff given as a fraction of the Nyquist frequency
    pub fn highpass(order: usize, normalized_cutoff: f64) -> SosFilter {
        let wn = Self::prewarp(normalized_cutoff);
        SosFilter::new(Self::sections(order, wn, true))
    }

    fn prewarp(normalized_cutoff: f64) -> f64 {
        (PI * normalized_cutoff / 2.0).tan()
    }

    /// Analog prototype pole pairs are `s^2 + 2 sin(theta_k) s + 1`; an odd
    /// order leaves one real pole for a first-order section.
    fn sections(order: usize, wn: f64, highpass: bool) -> Vec<BiquadCoeffs> {
        let wn2 = wn * wn;
        let mut sections: Vec<BiquadCoeffs> = (0..order / 2)
            .map(|k| {
                let theta = PI * (2 * k + 1) as f64 / (2 * order) as f64;
                let damping = 2.0 * theta.sin();
                let denom = 1.0 + damping * wn + wn2;
                let (b0, b1, b2) = if highpass {
                    (1.0 / denom, -2.0 / denom, 1.0 / denom)
                } else {
                    (wn2 / denom, 2.0 * wn2 / denom, wn2 / denom)
                };
                BiquadCoeffs {
                    b0,
                    b1,
                    b2,
                    a1: 2.0 * (wn2 - 1.0) / denom,
                    a2: (1.0 - damping * wn + wn2) / denom,
                }
            })
            .collect();

        if order % 2 == 1 {
            let k = if highpass { 1.0 / (1.0 + wn) } else { wn / (1.0 + wn) };
            sections.push(BiquadCoeffs {
                b0: k,
                b1: if highpass { -k } else { k },
                b2: 0.0,
                a1: (wn - 1.0) / (wn + 1.0),
                a2: 0.0,
            });
        }
        sections
    }
}

/// Lowpass stage parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LowpassSpec {
    pub order: usize,
    /// Cutoff as a fraction of the Nyquist frequency
    pub normalized_cutoff: f64,
}

impl Default for LowpassSpec {
    fn default() -> Self {
        Self {
            order: 10,
            normalized_cutoff: 0.05,
        }
    }
}

/// Highpass stage parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighpassSpec {
    pub order: usize,
    /// Cutoff frequency (Hz)
    pub cutoff_hz: f64,
}

impl Default for HighpassSpec {
    fn default() -> Self {
        Self {
            order: 4,
            cutoff_hz: 2.0,
        }
    }
}

/// Fixed lowpass plus optional highpass, applied channel by channel
#[derive(Debug, Clone)]
pub struct BandpassStage {
    lowpass: LowpassSpec,
    highpass: Option<HighpassSpec>,
    parallel: bool,
}

impl BandpassStage {
    /// Validate the stage parameters
    pub fn new(lowpass: LowpassSpec, highpass: Option<HighpassSpec>) -> Result<Self, PreprocessError> {
        if lowpass.order == 0 {
            return Err(PreprocessError::InvalidFilter("lowpass order must be >= 1".into()));
        }
        let cutoff = lowpass.normalized_cutoff;
        if cutoff.is_nan() || cutoff <= 0.0 || cutoff >= 1.0 {
            return Err(PreprocessError::InvalidFilter(format!(
                "lowpass cutoff {} must lie in (0, 1) of Nyquist",
                lowpass.normalized_cutoff
            )));
        }
        if let Some(hp) = highpass {
            if hp.order == 0 {
                return Err(PreprocessError::InvalidFilter("highpass order must be >= 1".into()));
            }
            if !hp.cutoff_hz.is_finite() || hp.cutoff_hz <= 0.0 {
                return Err(PreprocessError::InvalidFilter(format!(
                    "highpass cutoff {} Hz must be positive",
                    hp.cutoff_hz
                )));
            }
        }
        Ok(Self {
            lowpass,
            highpass,
            parallel: true,
        })
    }

    /// Run channels sequentially instead of on the rayon pool
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    pub fn has_highpass(&self) -> bool {
        self.highpass.is_some()
    }

    /// Build the filter cascade for one sampling frequency
    pub fn design(&self, sampling_frequency: f64) -> Result<SosFilter, PreprocessError> {
        let mut filter = ButterworthFilter::lowpass(self.lowpass.order, self.lowpass.normalized_cutoff);
        if let Some(hp) = self.highpass {
            let nyquist = sampling_frequency / 2.0;
            if hp.cutoff_hz >= nyquist {
                return Err(PreprocessError::InvalidFilter(format!(
                    "highpass cutoff ({} Hz) must be less than Nyquist ({} Hz)",
                    hp.cutoff_hz, nyquist
                )));
            }
            filter = filter.chain(ButterworthFilter::highpass(hp.order, hp.cutoff_hz / nyquist));
        }
        Ok(filter)
    }

    /// Filter every channel of a `samples × channels` matrix into a new buffer
    pub fn apply(&self, samples: &Array2<f64>, sampling_frequency: f64) -> Result<Array2<f64>, PreprocessError> {
        let template = self.design(sampling_frequency)?;
        let filter_channel = |c: usize| template.clone().filter(samples.column(c));

        let columns: Vec<Vec<f64>> = if self.parallel {
            (0..samples.ncols()).into_par_iter().map(filter_channel).collect()
        } else {
            (0..samples.ncols()).map(filter_channel).collect()
        };

        Ok(Array2::from_shape_fn(samples.dim(), |(i, c)| columns[c][i]))
    }

    /// Filter a whole recording; the input recording is left untouched
    pub fn apply_recording(&self, recording: &Recording) -> Result<Recording, PreprocessError> {
        debug!(
            "Filtering recording {} ({} channels, {} samples)",
            recording.id(),
            recording.channel_count(),
            recording.sample_count()
        );
        let filtered = self.apply(recording.samples(), recording.sampling_frequency())?;
        Ok(recording.with_samples(filtered)?)
    }

    /// Filter a single epoch
    pub fn apply_epoch(&self, epoch: Epoch, sampling_frequency: f64) -> Result<Epoch, PreprocessError> {
        let filtered = self.apply(epoch.samples(), sampling_frequency)?;
        Ok(epoch.with_samples(filtered))
    }
}

impl Default for BandpassStage {
    fn default() -> Self {
        Self {
            lowpass: LowpassSpec::default(),
            highpass: None,
            parallel: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, fs: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / fs).sin())
            .collect()
    }

    fn rms(signal: &[f64]) -> f64 {
        (signal.iter().map(|x| x * x).sum::<f64>() / signal.len() as f64).sqrt()
    }

    #[test]
    fn test_lowpass_passes_dc() {
        let mut filter = ButterworthFilter::lowpass(10, 0.05);
        let out = filter.filter(&vec![1.0; 4000]);
        assert!((out[3999] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_lowpass_section_count() {
        assert_eq!(ButterworthFilter::lowpass(10, 0.05).len(), 5);
        assert_eq!(ButterworthFilter::lowpass(3, 0.2).len(), 2);
    }

    #[test]
    fn test_lowpass_attenuates_stopband() {
        // cutoff 0.05 of Nyquist at 2000 Hz is 50 Hz
        let fs = 2000.0;
        let mut filter = ButterworthFilter::lowpass(10, 0.05);
        let pass = filter.filter(&sine(10.0, fs, 8000));
        let stop = filter.filter(&sine(200.0, fs, 8000));
        assert!(rms(&pass[4000..]) > 0.6);
        assert!(rms(&stop[4000..]) < 1e-3);
    }

    #[test]
    fn test_highpass_removes_offset() {
        let fs = 250.0;
        let mut filter = ButterworthFilter::highpass(4, 2.0 / (fs / 2.0));
        let signal: Vec<f64> = sine(20.0, fs, 5000).iter().map(|x| x + 5.0).collect();
        let out = filter.filter(&signal);
        let tail = &out[2500..];
        let mean = tail.iter().sum::<f64>() / tail.len() as f64;
        assert!(mean.abs() < 0.05);
        assert!(rms(tail) > 0.6);
    }

    #[test]
    fn test_stage_does_not_mutate_input() {
        let samples = Array2::from_shape_fn((500, 3), |(i, c)| (i + c) as f64);
        let rec = Recording::uniform("r", "l", 200.0, samples.clone()).unwrap();
        let stage = BandpassStage::new(LowpassSpec::default(), Some(HighpassSpec::default())).unwrap();
        let filtered = stage.apply_recording(&rec).unwrap();
        assert_eq!(rec.samples(), &samples);
        assert_ne!(filtered.samples(), &samples);
        assert_eq!(filtered.samples().dim(), (500, 3));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let samples = Array2::from_shape_fn((300, 4), |(i, c)| ((i * (c + 1)) as f64).sin());
        let stage = BandpassStage::new(LowpassSpec::default(), None).unwrap();
        let a = stage.apply(&samples, 100.0).unwrap();
        let b = stage.clone().sequential().apply(&samples, 100.0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_stage_parameters() {
        let bad_cutoff = LowpassSpec {
            normalized_cutoff: 1.5,
            ..Default::default()
        };
        assert!(BandpassStage::new(bad_cutoff, None).is_err());

        let stage = BandpassStage::new(
            LowpassSpec::default(),
            Some(HighpassSpec {
                order: 4,
                cutoff_hz: 80.0,
            }),
        )
        .unwrap();
        assert!(matches!(
            stage.design(100.0),
            Err(PreprocessError::InvalidFilter(_))
        ));
    }
}
