//! Fixed-Length Epochs

use crate::recording::Recording;
use ndarray::{Array2, ArrayView1};

/// One segment of a recording, treated as a single classification sample
#[derive(Debug, Clone)]
pub struct Epoch {
    id: String,
    label: String,
    recording_id: String,
    samples: Array2<f64>,
}

impl Epoch {
    /// Create the epoch for `segment_index` of `recording`.
    ///
    /// The id is the recording id immediately followed by the segment index.
    pub fn new(recording: &Recording, segment_index: usize, samples: Array2<f64>) -> Self {
        Self {
            id: format!("{}{}", recording.id(), segment_index),
            label: recording.label().to_string(),
            recording_id: recording.id().to_string(),
            samples,
        }
    }

    /// Same epoch with its samples replaced (e.g. after filtering)
    pub fn with_samples(self, samples: Array2<f64>) -> Self {
        Self { samples, ..self }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn recording_id(&self) -> &str {
        &self.recording_id
    }

    /// Sample matrix (`samples × channels`)
    pub fn samples(&self) -> &Array2<f64> {
        &self.samples
    }

    pub fn sample_count(&self) -> usize {
        self.samples.nrows()
    }

    pub fn channel_count(&self) -> usize {
        self.samples.ncols()
    }

    pub fn channel(&self, index: usize) -> ArrayView1<'_, f64> {
        self.samples.column(index)
    }
}
