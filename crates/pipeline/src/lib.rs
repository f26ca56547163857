//! Epoch Feature Pipeline
//!
//! Drives the full run: validate configuration, band-limit the recordings,
//! cut them into epochs, and aggregate per-band spectral features into one
//! table with a row per epoch.

mod config;
mod error;

pub use config::{FilterConfig, FilterScope, PipelineConfig, SegmentMode, ValidatedConfig, ENV_PREFIX};
pub use error::PipelineError;

pub use feature_engine::{Band, BandSelection, FeatureRow, FeatureTable, TransformKind, WaveletConfig};
pub use recording::{Epoch, Recording};

use feature_engine::FeatureAggregator;
use preprocess::{PreprocessError, Segmentation};
use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Install the global tracing subscriber
pub fn init_logging(level: Level, format: LogFormat) -> Result<(), PipelineError> {
    let builder = FmtSubscriber::builder().with_max_level(level).with_target(true);
    let result = match format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish()),
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
    };
    result.map_err(|e| PipelineError::Logging(e.to_string()))
}

/// Configured feature extraction pipeline
pub struct FeaturePipeline {
    config: ValidatedConfig,
    aggregator: FeatureAggregator,
}

impl FeaturePipeline {
    /// Validate `config` and build the transform it selects
    pub fn new(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let config = config.validate()?;
        let transform = config.transform.build(config.wavelet)?;
        let mut aggregator = FeatureAggregator::new(config.selection, transform, config.sampling_frequency_hz);
        if !config.parallel {
            aggregator = aggregator.sequential();
        }

        info!(
            "Feature pipeline ready: {:?} via {:?}, {} features per channel",
            config.selection,
            config.transform,
            aggregator.features_per_channel()
        );

        Ok(Self { config, aggregator })
    }

    pub fn config(&self) -> &ValidatedConfig {
        &self.config
    }

    /// Feature columns each channel contributes
    pub fn features_per_channel(&self) -> usize {
        self.aggregator.features_per_channel()
    }

    /// Run the pipeline over `recordings`.
    ///
    /// Rows come out recording by recording, epochs in time order. The
    /// input recordings are never modified.
    pub fn run(&self, recordings: &[Recording]) -> Result<FeatureTable, PipelineError> {
        let started = Instant::now();
        for recording in recordings {
            self.check_recording(recording)?;
        }

        let segmentation = self.segment(recordings)?;
        debug!(
            "Segmented {} recordings into {} epochs of {} samples",
            recordings.len(),
            segmentation.epochs.len(),
            segmentation.segment_length_n
        );

        let epochs = match self.config.filter_scope {
            FilterScope::WholeRecording => segmentation.epochs,
            FilterScope::PerEpoch => self.filter_epochs(segmentation.epochs)?,
        };

        let channel_names = recordings
            .first()
            .map(|r| r.channel_names().to_vec())
            .unwrap_or_default();
        let table = self
            .aggregator
            .build_table(&epochs, self.config.channel_count, &channel_names)?;

        let elapsed = started.elapsed();
        metrics::counter!("pipeline_recordings_total").increment(recordings.len() as u64);
        metrics::counter!("pipeline_epochs_total").increment(table.len() as u64);
        metrics::histogram!("pipeline_run_seconds").record(elapsed.as_secs_f64());

        info!(
            "Extracted {} rows x {} features from {} recordings in {:?}",
            table.len(),
            table.features_per_sample,
            recordings.len(),
            elapsed
        );
        Ok(table)
    }

    fn check_recording(&self, recording: &Recording) -> Result<(), PipelineError> {
        if recording.channel_count() != self.config.channel_count {
            return Err(PipelineError::ChannelCountMismatch {
                recording: recording.id().to_string(),
                expected: self.config.channel_count,
                actual: recording.channel_count(),
            });
        }
        let expected = self.config.sampling_frequency_hz;
        if (recording.sampling_frequency() - expected).abs() > f64::EPSILON * expected {
            return Err(PipelineError::SamplingRateMismatch {
                recording: recording.id().to_string(),
                expected,
                actual: recording.sampling_frequency(),
            });
        }
        Ok(())
    }

    /// Filter (when scoped to whole recordings) and segment
    fn segment(&self, recordings: &[Recording]) -> Result<Segmentation, PipelineError> {
        let segmenter = &self.config.segmenter;
        if self.config.filter_scope == FilterScope::PerEpoch {
            return Ok(segmenter.segment_all(recordings)?);
        }

        let bandpass = &self.config.bandpass;
        let filtered: Vec<Recording> = if self.config.parallel {
            recordings
                .par_iter()
                .map(|r| bandpass.apply_recording(r))
                .collect::<Result<_, PreprocessError>>()?
        } else {
            recordings
                .iter()
                .map(|r| bandpass.apply_recording(r))
                .collect::<Result<_, PreprocessError>>()?
        };
        Ok(segmenter.segment_all(&filtered)?)
    }

    fn filter_epochs(&self, epochs: Vec<Epoch>) -> Result<Vec<Epoch>, PipelineError> {
        let bandpass = &self.config.bandpass;
        let fs = self.config.sampling_frequency_hz;
        let filtered = if self.config.parallel {
            epochs
                .into_par_iter()
                .map(|e| bandpass.apply_epoch(e, fs))
                .collect::<Result<Vec<_>, PreprocessError>>()?
        } else {
            epochs
                .into_iter()
                .map(|e| bandpass.apply_epoch(e, fs))
                .collect::<Result<Vec<_>, PreprocessError>>()?
        };
        Ok(filtered)
    }
}

/// Validate `config` and run it over `recordings` in one call
pub fn extract_features(config: &PipelineConfig, recordings: &[Recording]) -> Result<FeatureTable, PipelineError> {
    FeaturePipeline::new(config)?.run(recordings)
}
