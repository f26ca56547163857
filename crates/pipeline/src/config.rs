//! Pipeline Configuration

use crate::error::PipelineError;
use config::{Config, Environment, File, FileFormat};
use feature_engine::{Band, BandSelection, TransformKind, WaveletConfig};
use preprocess::{BandpassStage, HighpassSpec, LowpassSpec, Segmenter};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Prefix of environment variables overriding file settings
pub const ENV_PREFIX: &str = "EPOCHFEAT";

/// Upper edge of the gamma band (Hz); the Fourier axis must extend past it
const GAMMA_UPPER_HZ: f64 = 50.0;

/// Band selection mode as named in configuration files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SegmentMode {
    /// All five bands
    #[default]
    #[serde(rename = "general")]
    General,
    /// One band (`band1`)
    #[serde(rename = "1fBand")]
    OneBand,
    /// Two distinct bands (`band1`, `band2`)
    #[serde(rename = "2fBand")]
    TwoBand,
    /// `band1` split into five sub-bands
    #[serde(rename = "1fBand5features")]
    OneBandFiveFeatures,
}

/// Where the band-limiting filter runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterScope {
    /// Filter each recording once before segmentation
    #[default]
    WholeRecording,
    /// Filter every epoch separately after segmentation
    PerEpoch,
}

/// Band-limiting filter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub lowpass: LowpassSpec,
    /// Upstream data is often already high-passed
    pub highpass_enabled: bool,
    pub highpass: HighpassSpec,
    pub scope: FilterScope,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            lowpass: LowpassSpec::default(),
            highpass_enabled: false,
            highpass: HighpassSpec::default(),
            scope: FilterScope::WholeRecording,
        }
    }
}

/// Pipeline configuration as read from a file or built in code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Channels per recording
    pub channel_count: usize,
    /// Epochs per recording (1 disables segmentation)
    pub segment_count: usize,
    /// Sampling frequency of every recording (Hz)
    pub sampling_frequency_hz: f64,
    /// Nominal recording duration (seconds)
    pub total_duration_seconds: f64,

    #[serde(default)]
    pub segment_mode: SegmentMode,
    /// First band name, for the single- and two-band modes
    #[serde(default)]
    pub band1: Option<String>,
    /// Second band name, for the two-band mode
    #[serde(default)]
    pub band2: Option<String>,
    #[serde(default = "default_transform")]
    pub transform: TransformKind,

    #[serde(default)]
    pub filter: FilterConfig,
    /// Wavelet overrides; only valid with a continuous transform
    #[serde(default)]
    pub wavelet: Option<WaveletConfig>,
    /// Spread recordings, epochs and channels over the rayon pool
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

fn default_transform() -> TransformKind {
    TransformKind::DirectFft
}

fn default_parallel() -> bool {
    true
}

/// Configuration checked and resolved into the objects the pipeline runs
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub channel_count: usize,
    pub sampling_frequency_hz: f64,
    pub selection: BandSelection,
    pub transform: TransformKind,
    pub wavelet: Option<WaveletConfig>,
    pub bandpass: BandpassStage,
    pub filter_scope: FilterScope,
    pub segmenter: Segmenter,
    pub parallel: bool,
}

impl PipelineConfig {
    /// General-mode, direct-FFT configuration for the given global parameters
    pub fn new(
        channel_count: usize,
        segment_count: usize,
        sampling_frequency_hz: f64,
        total_duration_seconds: f64,
    ) -> Self {
        Self {
            channel_count,
            segment_count,
            sampling_frequency_hz,
            total_duration_seconds,
            segment_mode: SegmentMode::General,
            band1: None,
            band2: None,
            transform: default_transform(),
            filter: FilterConfig::default(),
            wavelet: None,
            parallel: default_parallel(),
        }
    }

    /// Set the band selection mode and its band names
    pub fn with_mode(mut self, mode: SegmentMode, band1: Option<&str>, band2: Option<&str>) -> Self {
        self.segment_mode = mode;
        self.band1 = band1.map(str::to_string);
        self.band2 = band2.map(str::to_string);
        self
    }

    pub fn with_transform(mut self, transform: TransformKind) -> Self {
        self.transform = transform;
        self
    }

    /// Load from a configuration file, with `EPOCHFEAT__*` environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__").try_parsing(true))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Parse an in-memory TOML document
    pub fn from_toml_str(toml: &str) -> Result<Self, PipelineError> {
        let settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Check every option and resolve the typed pipeline settings.
    ///
    /// Runs before any numeric work so that configuration mistakes never
    /// surface halfway through a run.
    pub fn validate(&self) -> Result<ValidatedConfig, PipelineError> {
        self.validate_globals()?;
        let selection = self.band_selection()?;
        self.validate_transform()?;

        let highpass = self.filter.highpass_enabled.then_some(self.filter.highpass);
        let mut bandpass = BandpassStage::new(self.filter.lowpass, highpass)?;
        bandpass.design(self.sampling_frequency_hz)?;
        if !self.parallel {
            bandpass = bandpass.sequential();
        }

        let segmenter = Segmenter::new(self.segment_count, self.total_duration_seconds)?;

        debug!(
            "Validated config: {:?} via {:?}, {} segments, {} channels",
            selection, self.transform, self.segment_count, self.channel_count
        );

        Ok(ValidatedConfig {
            channel_count: self.channel_count,
            sampling_frequency_hz: self.sampling_frequency_hz,
            selection,
            transform: self.transform,
            wavelet: self.wavelet,
            bandpass,
            filter_scope: self.filter.scope,
            segmenter,
            parallel: self.parallel,
        })
    }

    fn validate_globals(&self) -> Result<(), PipelineError> {
        if self.channel_count == 0 {
            return Err(PipelineError::InvalidParameter {
                name: "channel_count",
                reason: "must be >= 1".into(),
            });
        }
        if self.segment_count == 0 {
            return Err(PipelineError::InvalidParameter {
                name: "segment_count",
                reason: "must be >= 1".into(),
            });
        }
        if !self.sampling_frequency_hz.is_finite() || self.sampling_frequency_hz <= 0.0 {
            return Err(PipelineError::InvalidParameter {
                name: "sampling_frequency_hz",
                reason: format!("{} is not a positive frequency", self.sampling_frequency_hz),
            });
        }
        if !self.total_duration_seconds.is_finite() || self.total_duration_seconds <= 0.0 {
            return Err(PipelineError::InvalidParameter {
                name: "total_duration_seconds",
                reason: format!("{} is not a positive duration", self.total_duration_seconds),
            });
        }
        Ok(())
    }

    fn band_selection(&self) -> Result<BandSelection, PipelineError> {
        let band1 = self.band1.as_deref().map(str::parse::<Band>).transpose()?;
        let band2 = self.band2.as_deref().map(str::parse::<Band>).transpose()?;

        let selection = match (self.segment_mode, band1, band2) {
            (SegmentMode::General, None, None) => BandSelection::General,
            (SegmentMode::OneBand, Some(band), None) => BandSelection::SingleBand(band),
            (SegmentMode::TwoBand, Some(a), Some(b)) => BandSelection::two_band(a, b)?,
            (SegmentMode::OneBandFiveFeatures, Some(band), None) => BandSelection::SingleBandSplit(band),
            (mode, band1, band2) => {
                return Err(PipelineError::InvalidModeCombination(format!(
                    "{:?} mode does not take band1={:?}, band2={:?}",
                    mode, band1, band2
                )))
            }
        };
        Ok(selection)
    }

    fn validate_transform(&self) -> Result<(), PipelineError> {
        let nyquist = self.sampling_frequency_hz / 2.0;
        match (self.transform, self.wavelet) {
            (TransformKind::DirectFft, Some(_)) => Err(PipelineError::InvalidModeCombination(
                "wavelet parameters given for the directFFT transform".into(),
            )),
            (TransformKind::DirectFft, None) => {
                if nyquist <= GAMMA_UPPER_HZ {
                    return Err(self.unsupported(format!(
                        "Nyquist frequency {} Hz does not exceed {} Hz",
                        nyquist, GAMMA_UPPER_HZ
                    )));
                }
                Ok(())
            }
            (kind, wavelet) => {
                let wavelet = wavelet.or_else(|| kind.default_wavelet()).unwrap_or_default();
                wavelet.validate()?;
                if wavelet.max_frequency_hz >= nyquist {
                    return Err(self.unsupported(format!(
                        "wavelet grid reaches {} Hz, Nyquist is {} Hz",
                        wavelet.max_frequency_hz, nyquist
                    )));
                }
                Ok(())
            }
        }
    }

    fn unsupported(&self, reason: String) -> PipelineError {
        PipelineError::UnsupportedSamplingRate {
            sampling_frequency_hz: self.sampling_frequency_hz,
            transform: self.transform,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feature_engine::FeatureError;

    fn base() -> PipelineConfig {
        PipelineConfig::new(23, 3, 2000.0, 12.0)
    }

    #[test]
    fn test_default_config_validates() {
        let validated = base().validate().unwrap();
        assert_eq!(validated.selection, BandSelection::General);
        assert_eq!(validated.transform, TransformKind::DirectFft);
        assert_eq!(validated.filter_scope, FilterScope::WholeRecording);
        assert!(!validated.bandpass.has_highpass());
    }

    #[test]
    fn test_mode_band_resolution() {
        let one = base().with_mode(SegmentMode::OneBand, Some("delta"), None);
        assert_eq!(one.validate().unwrap().selection, BandSelection::SingleBand(Band::Delta));

        let two = base().with_mode(SegmentMode::TwoBand, Some("alpha"), Some("gamma"));
        assert_eq!(
            two.validate().unwrap().selection,
            BandSelection::TwoBand(Band::Alpha, Band::Gamma)
        );

        let split = base().with_mode(SegmentMode::OneBandFiveFeatures, Some("beta"), None);
        assert_eq!(
            split.validate().unwrap().selection,
            BandSelection::SingleBandSplit(Band::Beta)
        );
    }

    #[test]
    fn test_invalid_band_name() {
        let err = base()
            .with_mode(SegmentMode::OneBand, Some("mu"), None)
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Feature(FeatureError::InvalidBandName(ref name)) if name == "mu"
        ));
    }

    #[test]
    fn test_duplicate_band() {
        let err = base()
            .with_mode(SegmentMode::TwoBand, Some("theta"), Some("theta"))
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Feature(FeatureError::DuplicateBand(Band::Theta))
        ));
    }

    #[test]
    fn test_mode_combinations() {
        for config in [
            base().with_mode(SegmentMode::General, Some("alpha"), None),
            base().with_mode(SegmentMode::OneBand, None, None),
            base().with_mode(SegmentMode::OneBand, Some("alpha"), Some("beta")),
            base().with_mode(SegmentMode::TwoBand, Some("alpha"), None),
            base().with_mode(SegmentMode::OneBandFiveFeatures, None, None),
        ] {
            assert!(matches!(
                config.validate(),
                Err(PipelineError::InvalidModeCombination(_))
            ));
        }

        let mut fft_with_wavelet = base();
        fft_with_wavelet.wavelet = Some(WaveletConfig::default());
        assert!(matches!(
            fft_with_wavelet.validate(),
            Err(PipelineError::InvalidModeCombination(_))
        ));
    }

    #[test]
    fn test_sampling_rate_limits() {
        let low = PipelineConfig::new(2, 1, 80.0, 4.0);
        assert!(matches!(
            low.validate(),
            Err(PipelineError::UnsupportedSamplingRate { .. })
        ));

        let cwt = PipelineConfig::new(2, 1, 120.0, 4.0).with_transform(TransformKind::ContinuousViaFourier);
        assert!(matches!(
            cwt.validate(),
            Err(PipelineError::UnsupportedSamplingRate { .. })
        ));

        let cwt_ok = PipelineConfig::new(2, 1, 256.0, 4.0).with_transform(TransformKind::ContinuousDirect);
        assert!(cwt_ok.validate().is_ok());
    }

    #[test]
    fn test_invalid_globals() {
        assert!(matches!(
            PipelineConfig::new(0, 1, 2000.0, 1.0).validate(),
            Err(PipelineError::InvalidParameter { name: "channel_count", .. })
        ));
        assert!(matches!(
            PipelineConfig::new(1, 0, 2000.0, 1.0).validate(),
            Err(PipelineError::InvalidParameter { name: "segment_count", .. })
        ));
        assert!(matches!(
            PipelineConfig::new(1, 1, 2000.0, 0.0).validate(),
            Err(PipelineError::InvalidParameter { name: "total_duration_seconds", .. })
        ));
    }

    #[test]
    fn test_highpass_above_nyquist_rejected_early() {
        let mut config = base();
        config.filter.highpass_enabled = true;
        config.filter.highpass.cutoff_hz = 1500.0;
        assert!(matches!(config.validate(), Err(PipelineError::Preprocess(_))));
    }

    #[test]
    fn test_from_toml() {
        let config = PipelineConfig::from_toml_str(
            r#"
            channel_count = 23
            segment_count = 3
            sampling_frequency_hz = 2000.0
            total_duration_seconds = 12.0
            segment_mode = "2fBand"
            band1 = "alpha"
            band2 = "beta"
            transform = "continuousViaFourier"
            parallel = false

            [filter]
            highpass_enabled = true
            scope = "per_epoch"

            [filter.lowpass]
            order = 8

            [wavelet]
            voices_per_octave = 24
            "#,
        )
        .unwrap();

        assert_eq!(config.segment_mode, SegmentMode::TwoBand);
        assert_eq!(config.transform, TransformKind::ContinuousViaFourier);
        assert_eq!(config.filter.scope, FilterScope::PerEpoch);
        assert_eq!(config.filter.lowpass.order, 8);
        assert_eq!(config.filter.lowpass.normalized_cutoff, 0.05);
        assert_eq!(config.wavelet.map(|w| w.voices_per_octave), Some(24));
        assert!(!config.parallel);

        let validated = config.validate().unwrap();
        assert_eq!(validated.selection, BandSelection::TwoBand(Band::Alpha, Band::Beta));
        assert!(validated.bandpass.has_highpass());
    }

    #[test]
    fn test_load_applies_environment_overrides() {
        let path = std::env::temp_dir().join(format!("epochfeat-env-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            r#"
            channel_count = 23
            segment_count = 3
            sampling_frequency_hz = 2000.0
            total_duration_seconds = 12.0
            "#,
        )
        .unwrap();

        std::env::set_var("EPOCHFEAT__SEGMENT_COUNT", "2");
        std::env::set_var("EPOCHFEAT__FILTER__SCOPE", "per_epoch");
        let loaded = PipelineConfig::load(&path);
        std::env::remove_var("EPOCHFEAT__SEGMENT_COUNT");
        std::env::remove_var("EPOCHFEAT__FILTER__SCOPE");
        std::fs::remove_file(&path).ok();

        let config = loaded.unwrap();
        assert_eq!(config.segment_count, 2);
        assert_eq!(config.channel_count, 23);
        assert_eq!(config.filter.scope, FilterScope::PerEpoch);
        assert_eq!(config.filter.lowpass, LowpassSpec::default());
    }

    #[test]
    fn test_toml_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
            channel_count = 4
            segment_count = 1
            sampling_frequency_hz = 500.0
            total_duration_seconds = 10.0
            "#,
        )
        .unwrap();
        assert_eq!(config, PipelineConfig::new(4, 1, 500.0, 10.0));
    }
}
