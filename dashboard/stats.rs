//! # Group Statistics
//!
//! Splits the clients into the group chosen by the analyst and summarises one
//! feature over that group. Near-binary features (at most two distinct values) get
//! a share-of-matching-clients figure; everything else gets mean, median and
//! sample standard deviation.

use crate::data::{ClientTable, TARGET_COLUMN};
use crate::decision::{Threshold, client_row};
use crate::error::DashboardError;
use ahash::AHashSet;
use ndarray::ArrayView1;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Features with at most this many distinct values are treated as binary.
const BINARY_CARDINALITY: usize = 2;

/// Which clients a panel looks at, relative to the current threshold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupFilter {
    #[default]
    AllClients,
    ApprovedAtThreshold,
    DeniedAtThreshold,
}

impl GroupFilter {
    pub const ALL: [GroupFilter; 3] = [
        Self::AllClients,
        Self::ApprovedAtThreshold,
        Self::DeniedAtThreshold,
    ];

    pub fn admits(self, probability: f64, threshold: Threshold) -> bool {
        match self {
            Self::AllClients => true,
            Self::ApprovedAtThreshold => threshold.approves(probability),
            Self::DeniedAtThreshold => !threshold.approves(probability),
        }
    }

    /// The next option, wrapping around; used by the radio control.
    pub fn cycled(self) -> Self {
        match self {
            Self::AllClients => Self::ApprovedAtThreshold,
            Self::ApprovedAtThreshold => Self::DeniedAtThreshold,
            Self::DeniedAtThreshold => Self::AllClients,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::AllClients => "All clients",
            Self::ApprovedAtThreshold => "Clients granted the loan at this threshold",
            Self::DeniedAtThreshold => "Clients refused the loan at this threshold",
        }
    }
}

impl fmt::Display for GroupFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Summary of one feature over one group.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GroupStats {
    Binary {
        match_percent: f64,
    },
    Continuous {
        mean: f64,
        median: f64,
        std_dev: f64,
    },
}

/// One horizontal bar of the statistics chart.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatBar {
    pub label: &'static str,
    pub value: f64,
}

/// Mean, median and standard deviation drawn as horizontal bars, top to bottom,
/// with a vertical marker at the selected client's value.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatsChart {
    pub bars: Vec<StatBar>,
    pub marker: f64,
}

/// Names of the features that take at most two distinct values.
///
/// Cardinality is a property of the whole column, so the result does not depend on
/// row order and only needs computing once per loaded table.
pub fn binary_membership(table: &ClientTable) -> BTreeSet<String> {
    let binary: BTreeSet<String> = table
        .features()
        .par_iter()
        .filter(|column| has_at_most_distinct(column.values(), BINARY_CARDINALITY))
        .map(|column| column.name().to_string())
        .collect();
    log::info!(
        "{} of {} features are binary",
        binary.len(),
        table.features().len()
    );
    binary
}

fn has_at_most_distinct(values: ArrayView1<f64>, limit: usize) -> bool {
    let mut seen = AHashSet::with_capacity(limit + 1);
    for &v in values {
        // -0.0 and 0.0 are the same observed value.
        let normalized = if v == 0.0 { 0.0 } else { v };
        seen.insert(normalized.to_bits());
        if seen.len() > limit {
            return false;
        }
    }
    true
}

/// Values of `feature` for the clients admitted by `filter`, in row order.
pub fn group_values(
    table: &ClientTable,
    feature: &str,
    filter: GroupFilter,
    threshold: Threshold,
) -> Result<Vec<f64>, DashboardError> {
    let column = table
        .feature(feature)
        .ok_or_else(|| DashboardError::UnknownFeature(feature.to_string()))?;
    let values: Vec<f64> = column
        .values()
        .iter()
        .zip(table.target().iter())
        .filter(|&(_, &p)| filter.admits(p, threshold))
        .map(|(&v, _)| v)
        .collect();
    log::debug!(
        "Group '{filter}' holds {} of {} clients for '{feature}'",
        values.len(),
        table.row_count()
    );
    Ok(values)
}

/// The selected client's value for `feature`.
pub fn client_feature_value(
    table: &ClientTable,
    feature: &str,
    client_id: i64,
) -> Result<f64, DashboardError> {
    if feature == TARGET_COLUMN {
        return Err(DashboardError::UnknownFeature(feature.to_string()));
    }
    let column = table
        .feature(feature)
        .ok_or_else(|| DashboardError::UnknownFeature(feature.to_string()))?;
    let row = client_row(table, client_id)?;
    Ok(column.values()[row])
}

pub fn describe(
    values: &[f64],
    client_value: f64,
    is_binary: bool,
) -> Result<GroupStats, DashboardError> {
    if values.is_empty() {
        return Err(DashboardError::EmptyGroup);
    }

    if is_binary {
        // Binary columns hold a handful of exact values, so no tolerance is applied.
        let matching = values.iter().filter(|&&v| v == client_value).count();
        return Ok(GroupStats::Binary {
            match_percent: 100.0 * matching as f64 / values.len() as f64,
        });
    }

    let view = ArrayView1::from(values);
    let mean = view.mean().ok_or(DashboardError::EmptyGroup)?;
    // Sample deviation (n - 1); a single client has no spread to measure.
    let std_dev = if values.len() > 1 {
        view.std(1.0)
    } else {
        f64::NAN
    };
    Ok(GroupStats::Continuous {
        mean,
        median: median(values),
        std_dev,
    })
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Bar chart for continuous statistics; binary features are reported as text.
pub fn stats_chart(stats: &GroupStats, client_value: f64) -> Option<StatsChart> {
    match *stats {
        GroupStats::Binary { .. } => None,
        GroupStats::Continuous {
            mean,
            median,
            std_dev,
        } => Some(StatsChart {
            bars: vec![
                StatBar {
                    label: "mean",
                    value: mean,
                },
                StatBar {
                    label: "median",
                    value: median,
                },
                StatBar {
                    label: "std dev",
                    value: std_dev,
                },
            ],
            marker: client_value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sample_table() -> ClientTable {
        ClientTable::from_columns(vec![
            ("FLAG_OWN_CAR".into(), vec![0.0, 0.0, 1.0, 1.0, 0.0]),
            ("AMT_CREDIT".into(), vec![10.0, 20.0, 30.0, 40.0, 50.0]),
            ("CONSTANT".into(), vec![7.0; 5]),
            ("TRI_STATE".into(), vec![0.0, 1.0, 2.0, 1.0, 0.0]),
            ("target".into(), vec![0.2, 0.6, 0.9, 0.5, 1.0]),
        ])
        .unwrap()
    }

    fn pct(p: f64) -> Threshold {
        Threshold::from_percent(p).unwrap()
    }

    #[test]
    fn binary_membership_counts_distinct_values() {
        let binary = binary_membership(&sample_table());
        let expected: BTreeSet<String> = ["CONSTANT", "FLAG_OWN_CAR"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(binary, expected);
    }

    #[test]
    fn signed_zero_is_one_value() {
        let values = [0.0, -0.0, 1.0];
        assert!(has_at_most_distinct(ArrayView1::from(&values[..]), 2));
    }

    #[test]
    fn binary_match_percentage() {
        let values = [0.0, 0.0, 1.0, 1.0, 0.0];
        let stats = describe(&values, 1.0, true).unwrap();
        match stats {
            GroupStats::Binary { match_percent } => {
                assert_abs_diff_eq!(match_percent, 40.0, epsilon = 1e-12)
            }
            other => panic!("Expected binary stats, got {other:?}"),
        }
    }

    #[test]
    fn continuous_stats_use_sample_deviation() {
        let stats = describe(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], 3.0, false).unwrap();
        match stats {
            GroupStats::Continuous {
                mean,
                median,
                std_dev,
            } => {
                assert_abs_diff_eq!(mean, 5.0, epsilon = 1e-12);
                assert_abs_diff_eq!(median, 4.5, epsilon = 1e-12);
                assert_abs_diff_eq!(std_dev, (32.0f64 / 7.0).sqrt(), epsilon = 1e-12);
            }
            other => panic!("Expected continuous stats, got {other:?}"),
        }
    }

    #[test]
    fn single_value_has_undefined_deviation() {
        match describe(&[3.5], 0.0, false).unwrap() {
            GroupStats::Continuous {
                mean,
                median,
                std_dev,
            } => {
                assert_abs_diff_eq!(mean, 3.5, epsilon = 1e-12);
                assert_abs_diff_eq!(median, 3.5, epsilon = 1e-12);
                assert!(std_dev.is_nan());
            }
            other => panic!("Expected continuous stats, got {other:?}"),
        }
    }

    #[test]
    fn empty_group_is_reported() {
        assert!(matches!(
            describe(&[], 1.0, true),
            Err(DashboardError::EmptyGroup)
        ));
        assert!(matches!(
            describe(&[], 1.0, false),
            Err(DashboardError::EmptyGroup)
        ));
    }

    #[test]
    fn group_values_follow_the_threshold() {
        let table = sample_table();
        let all = group_values(&table, "AMT_CREDIT", GroupFilter::AllClients, pct(50.0)).unwrap();
        assert_eq!(all, vec![10.0, 20.0, 30.0, 40.0, 50.0]);

        let granted =
            group_values(&table, "AMT_CREDIT", GroupFilter::ApprovedAtThreshold, pct(50.0))
                .unwrap();
        assert_eq!(granted, vec![20.0, 30.0, 40.0, 50.0]);

        let refused =
            group_values(&table, "AMT_CREDIT", GroupFilter::DeniedAtThreshold, pct(50.0)).unwrap();
        assert_eq!(refused, vec![10.0]);

        let refused_high =
            group_values(&table, "AMT_CREDIT", GroupFilter::DeniedAtThreshold, pct(95.0)).unwrap();
        assert_eq!(refused_high, vec![10.0, 20.0, 30.0, 40.0]);
    }

    #[test]
    fn unknown_features_are_rejected() {
        let table = sample_table();
        assert!(matches!(
            group_values(&table, "NOPE", GroupFilter::AllClients, pct(50.0)),
            Err(DashboardError::UnknownFeature(name)) if name == "NOPE"
        ));
        assert!(matches!(
            client_feature_value(&table, "target", 0),
            Err(DashboardError::UnknownFeature(_))
        ));
    }

    #[test]
    fn client_value_lookup() {
        let table = sample_table();
        assert_abs_diff_eq!(
            client_feature_value(&table, "AMT_CREDIT", 3).unwrap(),
            40.0,
            epsilon = 1e-12
        );
        assert!(matches!(
            client_feature_value(&table, "AMT_CREDIT", 5),
            Err(DashboardError::ClientNotFound { .. })
        ));
    }

    #[test]
    fn chart_only_for_continuous_features() {
        let binary = GroupStats::Binary {
            match_percent: 40.0,
        };
        assert!(stats_chart(&binary, 1.0).is_none());

        let continuous = GroupStats::Continuous {
            mean: 3.0,
            median: 2.0,
            std_dev: 1.0,
        };
        let chart = stats_chart(&continuous, 2.5).unwrap();
        let labels: Vec<_> = chart.bars.iter().map(|b| b.label).collect();
        assert_eq!(labels, vec!["mean", "median", "std dev"]);
        assert_abs_diff_eq!(chart.marker, 2.5, epsilon = 1e-12);
    }

    #[test]
    fn group_cycle_visits_every_option() {
        let mut group = GroupFilter::default();
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(group);
            group = group.cycled();
        }
        assert_eq!(seen, GroupFilter::ALL.to_vec());
        assert_eq!(group, GroupFilter::AllClients);
    }
}
