//! Recording Data Model
//!
//! Multi-channel recordings as handed over by the loader, and the epochs
//! the segmenter cuts out of them. Both are immutable once built.

mod epoch;
mod error;
mod recording;

pub use epoch::Epoch;
pub use error::RecordingError;
pub use recording::Recording;
