//! # View Assembly
//!
//! `render` turns the current control values into a complete `ViewModel` in one
//! pass. Front ends call it after every change to any control and draw the result;
//! nothing is recomputed incrementally.
//!
//! A failure only affects the panels that depend on the failing piece. An unknown
//! client, for instance, blanks the decision and the client-specific panels but
//! the approval summary still renders.

use crate::data::ClientTable;
use crate::decision::{
    ApprovalSummary, Decision, Threshold, approval_summary, client_id_range, resolve_decision,
};
use crate::error::DashboardError;
use crate::explanation::{EXPLANATION_CAPTION, EXPLANATION_TITLE, ExplanationImage};
use crate::histogram::{AxisScale, HistogramOptions, HistogramSpec, build_histogram};
use crate::stats::{
    GroupFilter, GroupStats, StatsChart, binary_membership, client_feature_value, describe,
    group_values, stats_chart,
};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

pub const PAGE_TITLE: &str = "Client solvency";
pub const THRESHOLD_PROMPT: &str =
    "Tolerance threshold (predicted % chance that the loan is repaid)";
pub const FEATURE_PROMPT: &str = "Choose the feature to observe";
pub const GROUP_PROMPT: &str = "Select the group whose data is shown";
pub const HISTOGRAM_HEADING: &str = "Histogram (normalised)";

/// Everything that stays fixed for the lifetime of a session.
///
/// The table is shared behind an `Arc`; the binary-feature set and the explanation
/// image are computed once when the dashboard is built.
pub struct Dashboard {
    table: Arc<ClientTable>,
    binary_features: BTreeSet<String>,
    explanation: Result<ExplanationImage, DashboardError>,
    histogram_bins: usize,
}

impl Dashboard {
    pub fn new(
        table: Arc<ClientTable>,
        explanation: Result<ExplanationImage, DashboardError>,
        histogram_bins: usize,
    ) -> Self {
        let binary_features = binary_membership(&table);
        Self {
            table,
            binary_features,
            explanation,
            histogram_bins,
        }
    }

    pub fn table(&self) -> &ClientTable {
        &self.table
    }

    pub fn binary_features(&self) -> &BTreeSet<String> {
        &self.binary_features
    }

    pub fn is_binary(&self, feature: &str) -> bool {
        self.binary_features.contains(feature)
    }

    pub fn explanation(&self) -> Result<&ExplanationImage, &DashboardError> {
        self.explanation.as_ref()
    }

    /// Options offered by the feature dropdown, in file order.
    pub fn feature_options(&self) -> Vec<String> {
        self.table.feature_names().map(str::to_string).collect()
    }

    /// Control values a fresh session starts from.
    pub fn initial_state(&self, threshold: Threshold) -> DashboardState {
        DashboardState {
            client_id: 0,
            threshold,
            feature: self
                .table
                .feature_names()
                .next()
                .unwrap_or_default()
                .to_string(),
            group: GroupFilter::AllClients,
            scale: AxisScale::Linear,
        }
    }

    pub fn render(&self, state: &DashboardState) -> ViewModel {
        render(self, state)
    }
}

/// The analyst's current control values. Each session owns its own copy.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DashboardState {
    pub client_id: i64,
    pub threshold: Threshold,
    pub feature: String,
    pub group: GroupFilter,
    pub scale: AxisScale,
}

/// A panel either has content or explains why it has none.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Panel<T> {
    Ready(T),
    Notice { message: String },
}

impl<T> Panel<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            Self::Ready(content) => Some(content),
            Self::Notice { .. } => None,
        }
    }

    fn from_error(err: &DashboardError) -> Self {
        log::debug!("Panel replaced by a notice: {err}");
        Self::Notice {
            message: err.to_string(),
        }
    }

    pub fn notice(&self) -> Option<&str> {
        match self {
            Self::Ready(_) => None,
            Self::Notice { message } => Some(message),
        }
    }
}

impl<T> From<Result<T, DashboardError>> for Panel<T> {
    fn from(result: Result<T, DashboardError>) -> Self {
        match result {
            Ok(content) => Self::Ready(content),
            Err(err) => Self::from_error(&err),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DecisionView {
    pub decision: Decision,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SummaryView {
    pub summary: ApprovalSummary,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClientValueView {
    pub value: f64,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FeatureView {
    pub name: String,
    pub is_binary: bool,
    pub options: Vec<String>,
    pub client_value: Panel<ClientValueView>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatisticsView {
    pub stats: GroupStats,
    /// Sentence shown for binary features.
    pub text: Option<String>,
    /// Bar chart shown for continuous features.
    pub chart: Option<StatsChart>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExplanationView {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub caption: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ViewModel {
    pub title: String,
    pub client_prompt: String,
    pub threshold_prompt: String,
    pub decision: Panel<DecisionView>,
    pub summary: SummaryView,
    pub feature_prompt: String,
    pub feature: FeatureView,
    pub group_prompt: String,
    pub group: GroupFilter,
    pub statistics_heading: String,
    pub statistics: Panel<StatisticsView>,
    pub histogram_heading: String,
    pub histogram: Panel<HistogramSpec>,
    pub explanation_heading: String,
    pub explanation: Panel<ExplanationView>,
}

/// One full recomputation of every panel for `state`.
pub fn render(dashboard: &Dashboard, state: &DashboardState) -> ViewModel {
    let table = dashboard.table();
    let (first_id, last_id) = client_id_range(table);
    let is_binary = dashboard.is_binary(&state.feature);

    let decision = resolve_decision(table, state.client_id, state.threshold)
        .map(|decision| DecisionView {
            text: decision_text(decision),
            decision,
        })
        .into();

    let summary = approval_summary(table, state.threshold);
    let summary = SummaryView {
        text: summary_text(summary),
        summary,
    };

    let client_value = client_feature_value(table, &state.feature, state.client_id);
    let group = group_values(table, &state.feature, state.group, state.threshold);

    let statistics = statistics_panel(&client_value, &group, is_binary);
    let histogram = histogram_panel(dashboard, state, &client_value, &group, is_binary);

    let feature = FeatureView {
        name: state.feature.clone(),
        is_binary,
        options: dashboard.feature_options(),
        client_value: client_value
            .map(|value| ClientValueView {
                value,
                text: format!("For the selected client this feature is {value:.3}"),
            })
            .into(),
    };

    ViewModel {
        title: PAGE_TITLE.to_string(),
        client_prompt: format!(
            "Enter the ID of the client to study (number between {first_id} and {last_id})"
        ),
        threshold_prompt: THRESHOLD_PROMPT.to_string(),
        decision,
        summary,
        feature_prompt: FEATURE_PROMPT.to_string(),
        feature,
        group_prompt: GROUP_PROMPT.to_string(),
        group: state.group,
        statistics_heading: format!("Statistics of the selected group for {}", state.feature),
        statistics,
        histogram_heading: HISTOGRAM_HEADING.to_string(),
        histogram,
        explanation_heading: EXPLANATION_TITLE.to_string(),
        explanation: explanation_panel(dashboard),
    }
}

fn decision_text(decision: Decision) -> String {
    if decision.approved {
        "With this tolerance threshold, the selected client's loan would be granted".to_string()
    } else {
        "With this tolerance threshold, the selected client's loan would not be granted"
            .to_string()
    }
}

fn summary_text(summary: ApprovalSummary) -> String {
    format!(
        "For reference, with this threshold {} loans would be granted out of the current \
         applications, i.e. {:.2}% of the total",
        summary.approved_count, summary.approved_percent
    )
}

fn statistics_panel(
    client_value: &Result<f64, DashboardError>,
    group: &Result<Vec<f64>, DashboardError>,
    is_binary: bool,
) -> Panel<StatisticsView> {
    let (value, values) = match (client_value, group) {
        (Ok(value), Ok(values)) => (*value, values),
        (Err(err), _) | (_, Err(err)) => return Panel::from_error(err),
    };
    describe(values, value, is_binary)
        .map(|stats| {
            let text = match stats {
                GroupStats::Binary { match_percent } => Some(format!(
                    "The selected client shares this value with {match_percent:.3}% of the clients in this group"
                )),
                GroupStats::Continuous { .. } => None,
            };
            StatisticsView {
                chart: stats_chart(&stats, value),
                stats,
                text,
            }
        })
        .into()
}

fn histogram_panel(
    dashboard: &Dashboard,
    state: &DashboardState,
    client_value: &Result<f64, DashboardError>,
    group: &Result<Vec<f64>, DashboardError>,
    is_binary: bool,
) -> Panel<HistogramSpec> {
    let (value, values) = match (client_value, group) {
        (Ok(value), Ok(values)) => (*value, values),
        (Err(err), _) | (_, Err(err)) => return Panel::from_error(err),
    };
    dashboard
        .table()
        .feature(&state.feature)
        .ok_or_else(|| DashboardError::UnknownFeature(state.feature.clone()))
        .and_then(|column| {
            build_histogram(
                &state.feature,
                values,
                column.range(),
                value,
                is_binary,
                HistogramOptions {
                    bins: dashboard.histogram_bins,
                    scale: state.scale,
                },
            )
        })
        .into()
}

fn explanation_panel(dashboard: &Dashboard) -> Panel<ExplanationView> {
    match dashboard.explanation() {
        Ok(image) => {
            let (width, height) = image.dimensions();
            Panel::Ready(ExplanationView {
                path: image.path().to_path_buf(),
                width,
                height,
                caption: EXPLANATION_CAPTION.iter().map(|s| s.to_string()).collect(),
            })
        }
        Err(err) => Panel::from_error(err),
    }
}
