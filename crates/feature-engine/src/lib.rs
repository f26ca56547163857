//! Spectral Feature Engine
//!
//! Turns epochs into classifier rows: each channel is transformed into a
//! magnitude spectrum, the spectrum's frequency axis is partitioned into
//! physiological bands, and the mean magnitude of every selected band
//! becomes one feature column.

pub mod bands;
pub mod cwt;
mod error;
mod features;
mod fft;
mod spectrum;

pub use bands::{Band, BandPartitioner, BandSelection, ToleranceTable, SPLIT_PARTS};
pub use cwt::{CwtBackend, MorletCwt, WaveletConfig};
pub use error::FeatureError;
pub use features::{FeatureAggregator, FeatureRow, FeatureTable};
pub use fft::DirectFft;
pub use spectrum::{SpectralTransform, Spectrum, TransformKind};
