//! Time-to-Sample Index Matching

use crate::error::PreprocessError;
use recording::Recording;

/// Absolute tolerance (seconds) for matching a time value to a sample
pub const TIME_TOLERANCE: f64 = 1e-5;

/// Maps time offsets onto sample indices of one recording's time axis
pub struct TimeIndexMatcher<'a> {
    recording_id: &'a str,
    time: &'a [f64],
    /// Time one sample past the last sample; resolves to `time.len()`
    end_time: f64,
    tolerance: f64,
}

impl<'a> TimeIndexMatcher<'a> {
    /// Create a matcher over a recording's time axis
    pub fn new(recording: &'a Recording) -> Self {
        let time = recording.time();
        let end_time = time.last().copied().unwrap_or(0.0) + 1.0 / recording.sampling_frequency();
        Self {
            recording_id: recording.id(),
            time,
            end_time,
            tolerance: TIME_TOLERANCE,
        }
    }

    /// Override the matching tolerance
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// First index whose time is within tolerance of `target`, if any.
    ///
    /// The axis is strictly increasing, so every sample before the partition
    /// point is at least `tolerance` below the target.
    pub fn find(&self, target: f64) -> Option<usize> {
        let start = self.time.partition_point(|&t| t <= target - self.tolerance);
        self.time
            .get(start)
            .filter(|&&t| (t - target).abs() < self.tolerance)
            .map(|_| start)
    }

    /// Resolve `target` to a sample index or fail with `NoMatchFound`
    pub fn resolve(&self, target: f64) -> Result<usize, PreprocessError> {
        self.find(target).ok_or_else(|| self.no_match(target))
    }

    /// Resolve an exclusive segment end; the end-of-recording time maps to the sample count
    pub fn resolve_end(&self, target: f64) -> Result<usize, PreprocessError> {
        if let Some(index) = self.find(target) {
            return Ok(index);
        }
        if (self.end_time - target).abs() < self.tolerance {
            return Ok(self.time.len());
        }
        Err(self.no_match(target))
    }

    fn no_match(&self, target: f64) -> PreprocessError {
        PreprocessError::NoMatchFound {
            recording: self.recording_id.to_string(),
            target,
        }
    }
}
