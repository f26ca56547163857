//! Fixed-Length Segmentation

use crate::error::PreprocessError;
use crate::matcher::TimeIndexMatcher;
use ndarray::s;
use recording::{Epoch, Recording};
use tracing::debug;

/// Guards `floor` against `k * fs` landing a hair below an integer
const SAMPLE_EPSILON: f64 = 1e-6;

/// Truncate a time value down to the nearest sample boundary
fn truncate_to_sample(time_s: f64, sampling_frequency: f64) -> f64 {
    (time_s * sampling_frequency + SAMPLE_EPSILON).floor() / sampling_frequency
}

/// Epochs produced by one segmentation run
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// Epochs, recording-major then segment-minor
    pub epochs: Vec<Epoch>,
    /// Samples per epoch, shared by every epoch of the run
    pub segment_length_n: usize,
}

/// Divides recordings into `segment_count` equal-duration epochs
#[derive(Debug, Clone)]
pub struct Segmenter {
    segment_count: usize,
    total_duration_s: f64,
}

impl Segmenter {
    /// Create a segmenter; `segment_count == 1` keeps each recording whole
    pub fn new(segment_count: usize, total_duration_s: f64) -> Result<Self, PreprocessError> {
        if segment_count == 0 {
            return Err(PreprocessError::InvalidSegmentCount(segment_count));
        }
        if !total_duration_s.is_finite() || total_duration_s <= 0.0 {
            return Err(PreprocessError::InvalidDuration(total_duration_s));
        }
        Ok(Self {
            segment_count,
            total_duration_s,
        })
    }

    pub fn segment_count(&self) -> usize {
        self.segment_count
    }

    /// Segment duration, truncated down to a whole number of samples
    pub fn segment_length_seconds(&self, sampling_frequency: f64) -> f64 {
        truncate_to_sample(
            self.total_duration_s / self.segment_count as f64,
            sampling_frequency,
        )
    }

    /// Sample index ranges `[start, end)` of every segment of `recording`
    pub fn boundaries(&self, recording: &Recording) -> Result<Vec<(usize, usize)>, PreprocessError> {
        let fs = recording.sampling_frequency();
        let segment_length_s = self.segment_length_seconds(fs);
        let origin = recording.time().first().copied().unwrap_or(0.0);
        let matcher = TimeIndexMatcher::new(recording);

        (0..self.segment_count)
            .map(|j| {
                let start_s = truncate_to_sample(j as f64 * segment_length_s, fs);
                let end_s = truncate_to_sample((j + 1) as f64 * segment_length_s, fs);
                let start = matcher.resolve(origin + start_s)?;
                let end = matcher.resolve_end(origin + end_s)?;
                Ok((start, end))
            })
            .collect()
    }

    /// Segment a single recording
    pub fn segment(&self, recording: &Recording) -> Result<Segmentation, PreprocessError> {
        self.segment_all(std::iter::once(recording))
    }

    /// Segment every recording, checking that all epochs share one length
    pub fn segment_all<'a, I>(&self, recordings: I) -> Result<Segmentation, PreprocessError>
    where
        I: IntoIterator<Item = &'a Recording>,
    {
        let mut epochs = Vec::new();
        let mut segment_length_n: Option<usize> = None;

        for recording in recordings {
            for (j, (start, end)) in self.boundaries(recording)?.into_iter().enumerate() {
                let samples = recording.samples().slice(s![start..end, ..]).to_owned();
                let epoch = Epoch::new(recording, j, samples);
                let actual = end - start;

                match segment_length_n {
                    None => segment_length_n = Some(actual),
                    Some(expected) if expected != actual => {
                        return Err(PreprocessError::InconsistentSegmentLength {
                            epoch: epoch.id().to_string(),
                            expected,
                            actual,
                        });
                    }
                    Some(_) => {}
                }
                epochs.push(epoch);
            }
            debug!(
                "Segmented recording {} into {} epochs",
                recording.id(),
                self.segment_count
            );
        }

        Ok(Segmentation {
            epochs,
            segment_length_n: segment_length_n.unwrap_or(0),
        })
    }
}
