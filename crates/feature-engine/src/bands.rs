//! Frequency Band Partitioning
//!
//! Maps the nominal EEG bands onto bin ranges of a transform's frequency
//! axis. Sampled axes rarely hit an integer Hz edge, so each edge resolves
//! to the first bin within a per-transform tolerance.

use crate::error::FeatureError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

/// Number of sub-bands produced by a split selection
pub const SPLIT_PARTS: usize = 5;

/// Nominal lower edge of the delta band (Hz)
pub const DELTA_LOWER_EDGE_HZ: f64 = 2.0;

/// Physiological frequency bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Delta,
    Theta,
    Alpha,
    Beta,
    Gamma,
}

impl Band {
    /// All bands in ascending frequency order
    pub const ALL: [Band; 5] = [Band::Delta, Band::Theta, Band::Alpha, Band::Beta, Band::Gamma];

    /// Nominal `[lower, upper)` edges (Hz)
    pub fn nominal_range(self) -> (f64, f64) {
        match self {
            Band::Delta => (2.0, 4.0),
            Band::Theta => (4.0, 8.0),
            Band::Alpha => (8.0, 12.0),
            Band::Beta => (12.0, 30.0),
            Band::Gamma => (30.0, 50.0),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Band::Delta => "delta",
            Band::Theta => "theta",
            Band::Alpha => "alpha",
            Band::Beta => "beta",
            Band::Gamma => "gamma",
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    fn previous(self) -> Option<Band> {
        self.index().checked_sub(1).map(|i| Band::ALL[i])
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Band {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Band::ALL
            .into_iter()
            .find(|band| band.name() == s)
            .ok_or_else(|| FeatureError::InvalidBandName(s.to_string()))
    }
}

/// Edge matching tolerances (Hz) for one transform's frequency axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToleranceTable {
    /// Tolerance for the 2 Hz delta lower edge; `None` starts delta at index 1
    pub delta_lower: Option<f64>,
    /// Tolerance for the upper edge of each band, delta through gamma
    pub upper: [f64; 5],
}

impl ToleranceTable {
    pub const DIRECT_FFT: ToleranceTable = ToleranceTable {
        delta_lower: Some(0.3),
        upper: [0.3; 5],
    };

    pub const CONTINUOUS_DIRECT: ToleranceTable = ToleranceTable {
        delta_lower: None,
        upper: [0.7, 0.4, 0.4, 1.0, 1.0],
    };

    pub const CONTINUOUS_VIA_FOURIER: ToleranceTable = ToleranceTable {
        delta_lower: None,
        upper: [0.6, 0.9, 0.6, 4.5, 5.7],
    };
}

/// Resolves band edges on an ascending frequency axis
pub struct BandPartitioner<'a> {
    axis: &'a [f64],
    tolerances: &'a ToleranceTable,
}

impl<'a> BandPartitioner<'a> {
    pub fn new(axis: &'a [f64], tolerances: &'a ToleranceTable) -> Self {
        Self { axis, tolerances }
    }

    /// First bin within `tolerance_hz` of `edge_hz`.
    ///
    /// Ties resolve to the lowest index.
    pub fn edge_index(&self, edge_hz: f64, tolerance_hz: f64) -> Result<usize, FeatureError> {
        let start = self.axis.partition_point(|&f| f <= edge_hz - tolerance_hz);
        match self.axis.get(start) {
            Some(&f) if (f - edge_hz).abs() < tolerance_hz => Ok(start),
            _ => Err(FeatureError::BandEdgeNotFound {
                edge_hz,
                tolerance_hz,
            }),
        }
    }

    /// Bin range of one band: `(lower edge index + 1)..(upper edge index + 1)`
    pub fn band_range(&self, band: Band) -> Result<Range<usize>, FeatureError> {
        let lower = match band.previous() {
            Some(prev) => self.upper_edge_index(prev)?,
            None => match self.tolerances.delta_lower {
                Some(tol) => self.edge_index(DELTA_LOWER_EDGE_HZ, tol)?,
                None => 0,
            },
        };
        let upper = self.upper_edge_index(band)?;

        let range = (lower + 1)..(upper + 1);
        if range.is_empty() {
            return Err(FeatureError::DegenerateBand {
                band,
                start: range.start,
                end: range.end,
            });
        }
        Ok(range)
    }

    /// Bin ranges of all five bands, delta through gamma
    pub fn partition(&self) -> Result<Vec<(Band, Range<usize>)>, FeatureError> {
        Band::ALL
            .into_iter()
            .map(|band| Ok((band, self.band_range(band)?)))
            .collect()
    }

    fn upper_edge_index(&self, band: Band) -> Result<usize, FeatureError> {
        self.edge_index(band.nominal_range().1, self.tolerances.upper[band.index()])
    }
}

/// Split a band's bins into `parts` equal sub-ranges; the last absorbs any remainder
pub fn split_range(band: Band, range: Range<usize>, parts: usize) -> Result<Vec<Range<usize>>, FeatureError> {
    let width = range.len() / parts;
    if width == 0 {
        return Err(FeatureError::BandTooNarrow {
            band,
            bins: range.len(),
            parts,
        });
    }
    Ok((0..parts)
        .map(|i| {
            let start = range.start + i * width;
            let end = if i + 1 == parts { range.end } else { start + width };
            start..end
        })
        .collect())
}

/// Which bands become features, fixed once at configuration time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BandSelection {
    /// All five bands, one feature each
    General,
    /// One band, one feature
    SingleBand(Band),
    /// Two distinct bands, one feature each
    TwoBand(Band, Band),
    /// One band split into five equal sub-bands
    SingleBandSplit(Band),
}

impl BandSelection {
    /// Two-band selection; the bands must differ
    pub fn two_band(first: Band, second: Band) -> Result<Self, FeatureError> {
        if first == second {
            return Err(FeatureError::DuplicateBand(first));
        }
        Ok(BandSelection::TwoBand(first, second))
    }

    pub fn features_per_channel(&self) -> usize {
        match self {
            BandSelection::General => Band::ALL.len(),
            BandSelection::SingleBand(_) => 1,
            BandSelection::TwoBand(..) => 2,
            BandSelection::SingleBandSplit(_) => SPLIT_PARTS,
        }
    }

    /// Feature labels for one channel, in column order
    pub fn feature_names(&self) -> Vec<String> {
        match self {
            BandSelection::General => Band::ALL.iter().map(|b| b.to_string()).collect(),
            BandSelection::SingleBand(band) => vec![band.to_string()],
            BandSelection::TwoBand(a, b) => vec![a.to_string(), b.to_string()],
            BandSelection::SingleBandSplit(band) => (1..=SPLIT_PARTS)
                .map(|i| format!("{}_{}", band, i))
                .collect(),
        }
    }

    /// Bin ranges of every feature column, in column order
    pub fn resolve(&self, partitioner: &BandPartitioner<'_>) -> Result<Vec<Range<usize>>, FeatureError> {
        match *self {
            BandSelection::General => Ok(partitioner
                .partition()?
                .into_iter()
                .map(|(_, range)| range)
                .collect()),
            BandSelection::SingleBand(band) => Ok(vec![partitioner.band_range(band)?]),
            BandSelection::TwoBand(a, b) => Ok(vec![partitioner.band_range(a)?, partitioner.band_range(b)?]),
            BandSelection::SingleBandSplit(band) => {
                split_range(band, partitioner.band_range(band)?, SPLIT_PARTS)
            }
        }
    }
}
