//! Recording Preprocessing
//!
//! Removes out-of-band content with cascaded Butterworth sections and cuts
//! recordings into equal-duration epochs whose boundaries land on exact
//! sample times.

mod error;
mod filter;
mod matcher;
mod segmenter;

pub use error::PreprocessError;
pub use filter::{BandpassStage, BiquadCoeffs, ButterworthFilter, HighpassSpec, LowpassSpec, SosFilter};
pub use matcher::{TimeIndexMatcher, TIME_TOLERANCE};
pub use segmenter::{Segmentation, Segmenter};
