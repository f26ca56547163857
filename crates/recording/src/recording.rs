//! Loaded Multi-Channel Recording

use crate::error::RecordingError;
use ndarray::{s, Array2, ArrayView1, ArrayView2};

/// A labelled multi-channel recording with a uniform time axis.
///
/// Samples are stored as a `samples × channels` matrix. The time axis holds
/// one timestamp (seconds) per row and is strictly increasing.
#[derive(Debug, Clone)]
pub struct Recording {
    id: String,
    label: String,
    channel_names: Vec<String>,
    sampling_frequency: f64,
    time: Vec<f64>,
    samples: Array2<f64>,
}

impl Recording {
    /// Create a recording from an explicit time axis and sample matrix.
    ///
    /// An empty `channel_names` list is replaced by `ch0`, `ch1`, ...
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        channel_names: Vec<String>,
        sampling_frequency: f64,
        time: Vec<f64>,
        samples: Array2<f64>,
    ) -> Result<Self, RecordingError> {
        let id = id.into();
        let (n_samples, n_channels) = samples.dim();

        if !sampling_frequency.is_finite() || sampling_frequency <= 0.0 {
            return Err(RecordingError::InvalidSamplingFrequency(sampling_frequency));
        }
        if n_samples == 0 || n_channels == 0 {
            return Err(RecordingError::EmptyRecording(id));
        }
        if time.len() != n_samples {
            return Err(RecordingError::ShapeMismatch {
                time: time.len(),
                samples: n_samples,
            });
        }
        if let Some(i) = time.windows(2).position(|w| w[1] <= w[0]) {
            return Err(RecordingError::NonMonotonicTimeAxis(i + 1));
        }

        let channel_names = if channel_names.is_empty() {
            (0..n_channels).map(|c| format!("ch{}", c)).collect()
        } else if channel_names.len() != n_channels {
            return Err(RecordingError::ChannelNameMismatch {
                expected: n_channels,
                actual: channel_names.len(),
            });
        } else {
            channel_names
        };

        Ok(Self {
            id,
            label: label.into(),
            channel_names,
            sampling_frequency,
            time,
            samples,
        })
    }

    /// Create a recording whose time axis starts at zero with step `1 / fs`
    pub fn uniform(
        id: impl Into<String>,
        label: impl Into<String>,
        sampling_frequency: f64,
        samples: Array2<f64>,
    ) -> Result<Self, RecordingError> {
        let time = (0..samples.nrows())
            .map(|i| i as f64 / sampling_frequency)
            .collect();
        Self::new(id, label, Vec::new(), sampling_frequency, time, samples)
    }

    /// Create a recording from a loader matrix whose first column is time
    /// and whose remaining columns are channels.
    pub fn from_sample_matrix(
        id: impl Into<String>,
        label: impl Into<String>,
        channel_names: Vec<String>,
        sampling_frequency: f64,
        matrix: ArrayView2<'_, f64>,
    ) -> Result<Self, RecordingError> {
        let id = id.into();
        if matrix.ncols() < 2 {
            return Err(RecordingError::EmptyRecording(id));
        }
        let time = matrix.column(0).to_vec();
        let samples = matrix.slice(s![.., 1..]).to_owned();
        Self::new(id, label, channel_names, sampling_frequency, time, samples)
    }

    /// Copy of this recording with a replacement sample buffer of the same shape
    pub fn with_samples(&self, samples: Array2<f64>) -> Result<Self, RecordingError> {
        if samples.dim() != self.samples.dim() {
            return Err(RecordingError::ShapeMismatch {
                time: self.time.len(),
                samples: samples.nrows(),
            });
        }
        Ok(Self {
            id: self.id.clone(),
            label: self.label.clone(),
            channel_names: self.channel_names.clone(),
            sampling_frequency: self.sampling_frequency,
            time: self.time.clone(),
            samples,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn channel_names(&self) -> &[String] {
        &self.channel_names
    }

    pub fn channel_count(&self) -> usize {
        self.samples.ncols()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.nrows()
    }

    /// Sampling frequency (Hz)
    pub fn sampling_frequency(&self) -> f64 {
        self.sampling_frequency
    }

    /// Time axis (seconds)
    pub fn time(&self) -> &[f64] {
        &self.time
    }

    /// Sample matrix (`samples × channels`)
    pub fn samples(&self) -> &Array2<f64> {
        &self.samples
    }

    /// Samples of a single channel
    pub fn channel(&self, index: usize) -> ArrayView1<'_, f64> {
        self.samples.column(index)
    }

    /// Duration covered by the samples (seconds)
    pub fn duration_seconds(&self) -> f64 {
        self.sample_count() as f64 / self.sampling_frequency
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_uniform_time_axis() {
        let rec = Recording::uniform("r1", "ictal", 4.0, Array2::zeros((8, 2))).unwrap();
        assert_eq!(rec.sample_count(), 8);
        assert_eq!(rec.channel_count(), 2);
        assert_abs_diff_eq!(rec.time()[3], 0.75);
        assert_abs_diff_eq!(rec.duration_seconds(), 2.0);
        assert_eq!(rec.channel_names(), &["ch0".to_string(), "ch1".to_string()]);
    }

    #[test]
    fn test_from_sample_matrix_splits_time_column() {
        let matrix = array![[0.0, 1.0, 10.0], [0.5, 2.0, 20.0], [1.0, 3.0, 30.0]];
        let rec = Recording::from_sample_matrix(
            "r2",
            "normal",
            vec!["Fp1".into(), "Fp2".into()],
            2.0,
            matrix.view(),
        )
        .unwrap();
        assert_eq!(rec.time(), &[0.0, 0.5, 1.0]);
        assert_eq!(rec.channel(1).to_vec(), vec![10.0, 20.0, 30.0]);
        assert_eq!(rec.label(), "normal");
    }

    #[test]
    fn test_rejects_non_monotonic_time() {
        let err = Recording::new(
            "r3",
            "x",
            Vec::new(),
            1.0,
            vec![0.0, 1.0, 1.0],
            Array2::zeros((3, 1)),
        )
        .unwrap_err();
        assert_eq!(err, RecordingError::NonMonotonicTimeAxis(2));
    }

    #[test]
    fn test_rejects_shape_mismatch() {
        let err = Recording::new("r4", "x", Vec::new(), 1.0, vec![0.0], Array2::zeros((2, 1)));
        assert!(matches!(err, Err(RecordingError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_with_samples_keeps_metadata() {
        let rec = Recording::uniform("r5", "lbl", 10.0, Array2::zeros((4, 1))).unwrap();
        let replaced = rec.with_samples(Array2::ones((4, 1))).unwrap();
        assert_eq!(replaced.id(), "r5");
        assert_eq!(replaced.samples()[[2, 0]], 1.0);
        assert_eq!(rec.samples()[[2, 0]], 0.0);
        assert!(rec.with_samples(Array2::ones((3, 1))).is_err());
    }
}
