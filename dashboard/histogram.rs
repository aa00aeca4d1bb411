//! # Histogram Construction
//!
//! Builds the chart description for the distribution panel. Bin edges always span
//! the feature's range over the whole table, so the histograms of different groups
//! share the same axes and can be compared by eye.
//!
//! Bar heights go through two normalisations: first the usual density
//! (`count / (n * bin_width)`), then division by the sum of those densities. The
//! second step makes the bars add up to one whatever the bin width.

use crate::data::ColumnRange;
use crate::error::DashboardError;
use serde::Serialize;

pub const DEFAULT_BINS: usize = 40;

/// Headroom above the tallest bar.
const HEADROOM: f64 = 1.2;
/// Lower bound of the logarithmic axis, relative to its upper bound.
const LOG_FLOOR_RATIO: f64 = 1e-4;
/// Padding added on both sides of the x axis for binary features.
const BINARY_PADDING: f64 = 0.2;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisScale {
    #[default]
    Linear,
    Logarithmic,
}

impl AxisScale {
    pub fn toggled(self) -> Self {
        match self {
            Self::Linear => Self::Logarithmic,
            Self::Logarithmic => Self::Linear,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Linear => "linear scale",
            Self::Logarithmic => "logarithmic scale",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HistogramOptions {
    pub bins: usize,
    pub scale: AxisScale,
}

impl Default for HistogramOptions {
    fn default() -> Self {
        Self {
            bins: DEFAULT_BINS,
            scale: AxisScale::Linear,
        }
    }
}

/// Everything needed to draw the distribution chart.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HistogramSpec {
    pub title: String,
    pub y_label: &'static str,
    pub marker_label: &'static str,
    /// `bins + 1` edges, increasing.
    pub edges: Vec<f64>,
    /// One height per bin; they sum to one.
    pub heights: Vec<f64>,
    pub marker: f64,
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
    pub scale: AxisScale,
}

impl HistogramSpec {
    pub fn max_height(&self) -> f64 {
        self.heights.iter().copied().fold(0.0, f64::max)
    }

    /// `(left edge, right edge, height)` for every bin.
    pub fn bars(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        self.edges
            .windows(2)
            .zip(&self.heights)
            .map(|(edge, &height)| (edge[0], edge[1], height))
    }
}

/// Builds the histogram of `values` for `feature`.
///
/// `range` is the feature's range over the entire table, not over `values`.
pub fn build_histogram(
    feature: &str,
    values: &[f64],
    range: ColumnRange,
    client_value: f64,
    is_binary: bool,
    options: HistogramOptions,
) -> Result<HistogramSpec, DashboardError> {
    if range.is_degenerate() {
        return Err(DashboardError::DegenerateRange(feature.to_string()));
    }
    if values.is_empty() {
        return Err(DashboardError::EmptyGroup);
    }
    let bins = options.bins.max(1);

    let edges = bin_edges(range, bins);
    let counts = bin_counts(values, &edges);
    let densities = densities(&counts, &edges);
    let total: f64 = densities.iter().sum();
    let heights: Vec<f64> = densities.iter().map(|d| d / total).collect();

    let x_range = if is_binary {
        let pad = BINARY_PADDING * range.span();
        (range.min - pad, range.max + pad)
    } else {
        (range.min, range.max)
    };

    let top = HEADROOM * heights.iter().copied().fold(0.0, f64::max);
    let y_range = match options.scale {
        AxisScale::Linear => (0.0, top),
        AxisScale::Logarithmic => (LOG_FLOOR_RATIO * top, top),
    };

    log::debug!(
        "Histogram of '{feature}': {} values in {bins} bins over [{}, {}]",
        values.len(),
        range.min,
        range.max
    );

    Ok(HistogramSpec {
        title: feature.to_string(),
        y_label: "share of clients",
        marker_label: "selected client",
        edges,
        heights,
        marker: client_value,
        x_range,
        y_range,
        scale: options.scale,
    })
}

fn bin_edges(range: ColumnRange, bins: usize) -> Vec<f64> {
    let step = range.span() / bins as f64;
    let mut edges: Vec<f64> = (0..bins).map(|i| range.min + step * i as f64).collect();
    edges.push(range.max);
    edges
}

/// Counts per bin; every bin is half-open except the last, which includes the
/// upper edge. Values outside the edges are ignored.
fn bin_counts(values: &[f64], edges: &[f64]) -> Vec<usize> {
    let bins = edges.len() - 1;
    let (lo, hi) = (edges[0], edges[bins]);
    let width = (hi - lo) / bins as f64;
    let mut counts = vec![0usize; bins];
    for &v in values {
        if !(lo..=hi).contains(&v) {
            continue;
        }
        let mut idx = (((v - lo) / width) as usize).min(bins - 1);
        // Snap to the stored edges so rounding never moves a value across a boundary.
        if v < edges[idx] {
            idx -= 1;
        } else if idx + 1 < bins && v >= edges[idx + 1] {
            idx += 1;
        }
        counts[idx] += 1;
    }
    counts
}

fn densities(counts: &[usize], edges: &[f64]) -> Vec<f64> {
    let total: usize = counts.iter().sum();
    counts
        .iter()
        .zip(edges.windows(2))
        .map(|(&count, edge)| count as f64 / (total as f64 * (edge[1] - edge[0])))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn range(min: f64, max: f64) -> ColumnRange {
        ColumnRange { min, max }
    }

    #[test]
    fn heights_sum_to_one() {
        let values: Vec<f64> = (0..997).map(|i| ((i * 37) % 101) as f64 * 0.31).collect();
        let histogram = build_histogram(
            "AMT_CREDIT",
            &values,
            range(0.0, 31.0),
            5.0,
            false,
            HistogramOptions::default(),
        )
        .unwrap();
        assert_eq!(histogram.edges.len(), DEFAULT_BINS + 1);
        assert_eq!(histogram.heights.len(), DEFAULT_BINS);
        assert_abs_diff_eq!(histogram.heights.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn maximum_value_lands_in_last_bin() {
        let counts = bin_counts(&[0.0, 1.0, 4.0], &bin_edges(range(0.0, 4.0), 4));
        assert_eq!(counts, vec![1, 1, 0, 1]);
    }

    #[test]
    fn edges_come_from_the_table_range_not_the_group() {
        // The group only covers the top half of the table range.
        let histogram = build_histogram(
            "DAYS_BIRTH",
            &[6.0, 7.0, 8.0],
            range(0.0, 10.0),
            7.0,
            false,
            HistogramOptions {
                bins: 10,
                scale: AxisScale::Linear,
            },
        )
        .unwrap();
        assert_abs_diff_eq!(histogram.edges[0], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(histogram.edges[10], 10.0, epsilon = 1e-12);
        assert_eq!(histogram.x_range, (0.0, 10.0));
        let nonzero: Vec<usize> = histogram
            .heights
            .iter()
            .enumerate()
            .filter(|(_, h)| **h > 0.0)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(nonzero, vec![6, 7, 8]);
        for i in nonzero {
            assert_abs_diff_eq!(histogram.heights[i], 1.0 / 3.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn binary_features_get_padded_axis() {
        let histogram = build_histogram(
            "FLAG_OWN_CAR",
            &[0.0, 0.0, 1.0, 1.0, 0.0],
            range(0.0, 1.0),
            1.0,
            true,
            HistogramOptions::default(),
        )
        .unwrap();
        assert_abs_diff_eq!(histogram.x_range.0, -0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(histogram.x_range.1, 1.2, epsilon = 1e-12);
        assert_abs_diff_eq!(histogram.heights[0], 0.6, epsilon = 1e-12);
        assert_abs_diff_eq!(histogram.heights[DEFAULT_BINS - 1], 0.4, epsilon = 1e-12);
        assert_abs_diff_eq!(histogram.marker, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn y_axis_ranges_per_scale() {
        let values = [0.0, 0.0, 1.0, 1.0, 0.0];
        let linear = build_histogram(
            "FLAG_OWN_CAR",
            &values,
            range(0.0, 1.0),
            0.0,
            true,
            HistogramOptions::default(),
        )
        .unwrap();
        assert_abs_diff_eq!(linear.y_range.0, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(linear.y_range.1, 0.72, epsilon = 1e-12);

        let log = build_histogram(
            "FLAG_OWN_CAR",
            &values,
            range(0.0, 1.0),
            0.0,
            true,
            HistogramOptions {
                bins: DEFAULT_BINS,
                scale: AxisScale::Logarithmic,
            },
        )
        .unwrap();
        assert_abs_diff_eq!(log.y_range.0, 0.72e-4, epsilon = 1e-15);
        assert_abs_diff_eq!(log.y_range.1, 0.72, epsilon = 1e-12);
        // Empty bins are kept; the axis floor keeps them drawable.
        assert_eq!(log.heights.len(), DEFAULT_BINS);
        assert!(log.heights.contains(&0.0));
        assert_eq!(log.scale, AxisScale::Logarithmic);
    }

    #[test]
    fn degenerate_and_empty_inputs() {
        assert!(matches!(
            build_histogram(
                "CONSTANT",
                &[3.0, 3.0],
                range(3.0, 3.0),
                3.0,
                true,
                HistogramOptions::default()
            ),
            Err(DashboardError::DegenerateRange(name)) if name == "CONSTANT"
        ));
        assert!(matches!(
            build_histogram(
                "AMT_CREDIT",
                &[],
                range(0.0, 1.0),
                0.5,
                false,
                HistogramOptions::default()
            ),
            Err(DashboardError::EmptyGroup)
        ));
    }

    #[test]
    fn bars_pair_edges_with_heights() {
        let histogram = build_histogram(
            "X",
            &[0.0, 2.0],
            range(0.0, 2.0),
            1.0,
            false,
            HistogramOptions {
                bins: 2,
                scale: AxisScale::Linear,
            },
        )
        .unwrap();
        let bars: Vec<_> = histogram.bars().collect();
        assert_eq!(bars, vec![(0.0, 1.0, 0.5), (1.0, 2.0, 0.5)]);
        assert_abs_diff_eq!(histogram.max_height(), 0.5, epsilon = 1e-12);
    }
}
