//! Feature Table Assembly

use crate::bands::{BandPartitioner, BandSelection};
use crate::error::FeatureError;
use crate::spectrum::SpectralTransform;
use ndarray::Array2;
use rayon::prelude::*;
use recording::Epoch;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Feature vector of one epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    /// Epoch id (`{recordingId}{segmentIndex}`)
    pub id: String,
    /// Label inherited from the recording
    pub label: String,
    /// Channel-major, band-minor feature values
    pub features: Vec<f64>,
}

/// Classifier-ready table of epoch features sharing one column layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    /// Rows in recording-major, segment-minor order
    pub rows: Vec<FeatureRow>,
    pub features_per_channel: usize,
    /// `channel count × features_per_channel`
    pub features_per_sample: usize,
    /// Frequency axis of the transform that produced the features
    pub frequency_axis_used: Vec<f64>,
    /// `{channel}_{feature}` label of every column
    pub column_names: Vec<String>,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.label.as_str()).collect()
    }

    /// Features as a `rows × features_per_sample` matrix
    pub fn matrix(&self) -> Array2<f64> {
        Array2::from_shape_fn((self.rows.len(), self.features_per_sample), |(r, c)| {
            self.rows[r].features[c]
        })
    }

    pub fn to_json(&self) -> Result<String, FeatureError> {
        serde_json::to_string(self).map_err(|e| FeatureError::Encode(e.to_string()))
    }

    /// Compact binary encoding
    pub fn to_bytes(&self) -> Result<Vec<u8>, FeatureError> {
        postcard::to_allocvec(self).map_err(|e| FeatureError::Encode(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FeatureError> {
        postcard::from_bytes(bytes).map_err(|e| FeatureError::Encode(e.to_string()))
    }
}

/// Averages spectral magnitude within the selected bands of every channel
pub struct FeatureAggregator {
    selection: BandSelection,
    transform: Box<dyn SpectralTransform>,
    sampling_frequency: f64,
    parallel: bool,
}

impl FeatureAggregator {
    pub fn new(selection: BandSelection, transform: Box<dyn SpectralTransform>, sampling_frequency: f64) -> Self {
        Self {
            selection,
            transform,
            sampling_frequency,
            parallel: true,
        }
    }

    /// Compute epochs and channels on the calling thread
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    pub fn selection(&self) -> BandSelection {
        self.selection
    }

    pub fn features_per_channel(&self) -> usize {
        self.selection.features_per_channel()
    }

    /// Band means of one channel, plus the frequency axis they were read from
    pub fn channel_features(&self, signal: &[f64]) -> Result<(Vec<f64>, Vec<f64>), FeatureError> {
        let spectrum = self.transform.transform(signal, self.sampling_frequency)?;
        let partitioner = BandPartitioner::new(&spectrum.frequencies, self.transform.tolerances());
        let features = self
            .selection
            .resolve(&partitioner)?
            .into_iter()
            .map(|bins| spectrum.band_mean(bins))
            .collect();
        Ok((features, spectrum.frequencies))
    }

    /// Feature row of one epoch, plus the frequency axis of its first channel
    pub fn extract(&self, epoch: &Epoch) -> Result<(FeatureRow, Vec<f64>), FeatureError> {
        let per_channel = |c: usize| self.channel_features(&epoch.channel(c).to_vec());
        let channels: Vec<(Vec<f64>, Vec<f64>)> = if self.parallel {
            (0..epoch.channel_count())
                .into_par_iter()
                .map(per_channel)
                .collect::<Result<_, _>>()?
        } else {
            (0..epoch.channel_count())
                .map(per_channel)
                .collect::<Result<_, _>>()?
        };

        let mut features = Vec::with_capacity(channels.len() * self.features_per_channel());
        let mut axis = Vec::new();
        for (c, (values, freqs)) in channels.into_iter().enumerate() {
            features.extend(values);
            if c == 0 {
                axis = freqs;
            }
        }

        let row = FeatureRow {
            id: epoch.id().to_string(),
            label: epoch.label().to_string(),
            features,
        };
        Ok((row, axis))
    }

    /// Build the feature table for `epochs`, preserving their order.
    ///
    /// The column layout follows `channel_count` even when `epochs` is
    /// empty; every epoch must carry exactly that many channels. An empty
    /// `channel_names` slice falls back to `ch0`, `ch1`, ...
    pub fn build_table(
        &self,
        epochs: &[Epoch],
        channel_count: usize,
        channel_names: &[String],
    ) -> Result<FeatureTable, FeatureError> {
        if let Some(epoch) = epochs.iter().find(|e| e.channel_count() != channel_count) {
            return Err(FeatureError::InconsistentChannelCount {
                epoch: epoch.id().to_string(),
                expected: channel_count,
                actual: epoch.channel_count(),
            });
        }

        let extracted: Vec<(FeatureRow, Vec<f64>)> = if self.parallel {
            epochs
                .par_iter()
                .map(|e| self.extract(e))
                .collect::<Result<_, _>>()?
        } else {
            epochs.iter().map(|e| self.extract(e)).collect::<Result<_, _>>()?
        };

        let mut frequency_axis_used = Vec::new();
        let mut rows = Vec::with_capacity(extracted.len());
        for (row, axis) in extracted {
            if frequency_axis_used.is_empty() {
                frequency_axis_used = axis;
            }
            rows.push(row);
        }

        let features_per_channel = self.features_per_channel();
        let column_names = column_names(channel_names, channel_count, &self.selection);
        debug!(
            "Assembled feature table: {} rows x {} columns ({} per channel)",
            rows.len(),
            channel_count * features_per_channel,
            features_per_channel
        );

        Ok(FeatureTable {
            rows,
            features_per_channel,
            features_per_sample: channel_count * features_per_channel,
            frequency_axis_used,
            column_names,
        })
    }
}

fn column_names(channel_names: &[String], channel_count: usize, selection: &BandSelection) -> Vec<String> {
    let features = selection.feature_names();
    let features = &features;
    (0..channel_count)
        .flat_map(move |c| {
            let channel = channel_names
                .get(c)
                .cloned()
                .unwrap_or_else(|| format!("ch{}", c));
            features.iter().map(move |f| format!("{}_{}", channel, f))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bands::Band;
    use crate::fft::DirectFft;
    use crate::spectrum::TransformKind;
    use recording::Recording;
    use std::f64::consts::PI;

    const FS: f64 = 256.0;

    /// Two channels: a 10 Hz sine on channel 0 and a faint 20 Hz sine on channel 1
    fn epochs(count: usize) -> Vec<Epoch> {
        let n = 1024;
        let samples = Array2::from_shape_fn((n, 2), |(i, c)| {
            let t = i as f64 / FS;
            if c == 0 {
                (2.0 * PI * 10.0 * t).sin()
            } else {
                0.01 * (2.0 * PI * 20.0 * t).sin()
            }
        });
        let rec = Recording::uniform("s", "A", FS, samples.clone()).unwrap();
        (0..count).map(|j| Epoch::new(&rec, j, samples.clone())).collect()
    }

    fn aggregator(selection: BandSelection) -> FeatureAggregator {
        FeatureAggregator::new(selection, Box::new(DirectFft::new()), FS)
    }

    #[test]
    fn test_general_layout_and_dominant_band() {
        let table = aggregator(BandSelection::General)
            .build_table(&epochs(3), 2, &["O1".into(), "O2".into()])
            .unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.features_per_sample, 10);
        assert_eq!(table.column_names[0], "O1_delta");
        assert_eq!(table.column_names[7], "O2_alpha");
        assert_eq!(table.rows[2].id, "s2");

        let row = &table.rows[0].features;
        let alpha = row[2];
        for (i, &value) in row.iter().enumerate().filter(|&(i, _)| i != 2) {
            assert!(alpha > 20.0 * value, "column {} = {} vs alpha {}", i, value, alpha);
        }
    }

    #[test]
    fn test_single_and_two_band_columns() {
        let single = aggregator(BandSelection::SingleBand(Band::Alpha))
            .build_table(&epochs(1), 2, &[])
            .unwrap();
        assert_eq!(single.features_per_sample, 2);
        assert_eq!(single.column_names, vec!["ch0_alpha", "ch1_alpha"]);

        let general = aggregator(BandSelection::General).build_table(&epochs(1), 2, &[]).unwrap();
        let two = aggregator(BandSelection::TwoBand(Band::Beta, Band::Alpha))
            .build_table(&epochs(1), 2, &[])
            .unwrap();
        let g = &general.rows[0].features;
        assert_eq!(two.rows[0].features, vec![g[3], g[2], g[8], g[7]]);
    }

    #[test]
    fn test_split_mode_sub_bands() {
        let table = aggregator(BandSelection::SingleBandSplit(Band::Alpha))
            .build_table(&epochs(1), 2, &[])
            .unwrap();
        assert_eq!(table.features_per_channel, 5);
        assert_eq!(table.features_per_sample, 10);
        assert_eq!(table.column_names[4], "ch0_alpha_5");
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let input = epochs(4);
        let a = aggregator(BandSelection::General).build_table(&input, 2, &[]).unwrap();
        let b = aggregator(BandSelection::General)
            .sequential()
            .build_table(&input, 2, &[])
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_epoch_aborts() {
        let rec = Recording::uniform("e", "A", FS, Array2::zeros((4, 1))).unwrap();
        let empty = Epoch::new(&rec, 0, Array2::zeros((0, 1)));
        let err = aggregator(BandSelection::General)
            .build_table(&[empty], 1, &[])
            .unwrap_err();
        assert_eq!(err, FeatureError::EmptySpectrum);
    }

    #[test]
    fn test_layout_follows_channel_count_without_epochs() {
        let table = aggregator(BandSelection::General)
            .build_table(&[], 23, &[])
            .unwrap();
        assert!(table.is_empty());
        assert_eq!(table.features_per_sample, 115);
        assert_eq!(table.column_names.len(), 115);
        assert_eq!(table.column_names[114], "ch22_gamma");
        assert!(table.frequency_axis_used.is_empty());
    }

    #[test]
    fn test_epoch_channel_count_checked() {
        let err = aggregator(BandSelection::General)
            .build_table(&epochs(2), 3, &[])
            .unwrap_err();
        assert_eq!(
            err,
            FeatureError::InconsistentChannelCount {
                epoch: "s0".into(),
                expected: 3,
                actual: 2,
            }
        );
    }

    #[test]
    fn test_wavelet_transform_features() {
        let transform = TransformKind::ContinuousViaFourier.build(None).unwrap();
        let table = FeatureAggregator::new(BandSelection::General, transform, FS)
            .build_table(&epochs(1), 2, &[])
            .unwrap();
        let row = &table.rows[0].features;
        assert_eq!(row.len(), 10);
        assert!(row[2] > row[0] && row[2] > row[4]);
        assert!(table.frequency_axis_used.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_table_encodings() {
        let table = aggregator(BandSelection::SingleBand(Band::Theta))
            .build_table(&epochs(2), 2, &[])
            .unwrap();
        let decoded = FeatureTable::from_bytes(&table.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, table);

        let json = table.to_json().unwrap();
        assert!(json.contains("\"features_per_sample\":2"));
        assert_eq!(table.matrix().dim(), (2, 2));
    }
}
