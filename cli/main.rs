#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

// ========================================================================================
//
//                      The Session Orchestrator: solvency
//
// ========================================================================================
//
// This binary owns the session lifecycle: it resolves the configuration, loads the
// client table exactly once, wraps it in a shared `Dashboard`, and hands that to
// whichever front end the user asked for. All business logic lives in the library;
// the front ends only turn control changes into `render` calls and draw the result.

mod tui;

use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use solvency::DashboardError;
use solvency::config::DashboardConfig;
use solvency::data::{DatasetLoader, LoadProgressObserver, LoadStage};
use solvency::decision::Threshold;
use solvency::explanation::load_explanation_image;
use solvency::histogram::AxisScale;
use solvency::stats::GroupFilter;
use solvency::view::{Dashboard, DashboardState, Panel, ViewModel};
use std::error::Error;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

// ========================================================================================
//                         Command-Line Interface Definition
// ========================================================================================

#[derive(Parser)]
#[command(
    name = "solvency",
    about = "Explore precomputed credit-scoring predictions",
    long_about = "An interactive dashboard for looking up clients, choosing an approval \
                 threshold and comparing feature distributions across client groups."
)]
struct Cli {
    #[command(flatten)]
    sources: SourceArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct SourceArgs {
    /// TOML file with dashboard settings
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Predictions file (overrides the configuration)
    #[arg(long, global = true, value_name = "CSV")]
    data: Option<PathBuf>,

    /// Feature-importance image (overrides the configuration)
    #[arg(long, global = true, value_name = "IMAGE")]
    image: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive terminal dashboard (default)
    Dashboard,
    /// Render every panel once for the given control values and print the result
    Report(ReportArgs),
    /// List the feature columns and mark the binary ones
    Features,
    /// Show version information
    Version,
}

#[derive(Clone, Copy, ValueEnum)]
enum GroupCli {
    All,
    Approved,
    Denied,
}

impl From<GroupCli> for GroupFilter {
    fn from(group: GroupCli) -> Self {
        match group {
            GroupCli::All => GroupFilter::AllClients,
            GroupCli::Approved => GroupFilter::ApprovedAtThreshold,
            GroupCli::Denied => GroupFilter::DeniedAtThreshold,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ScaleCli {
    Linear,
    Log,
}

impl From<ScaleCli> for AxisScale {
    fn from(scale: ScaleCli) -> Self {
        match scale {
            ScaleCli::Linear => AxisScale::Linear,
            ScaleCli::Log => AxisScale::Logarithmic,
        }
    }
}

#[derive(Args)]
struct ReportArgs {
    /// Client identifier (row position in the predictions file)
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    client: i64,

    /// Tolerance threshold in percent; defaults to the configured value
    #[arg(long)]
    threshold: Option<f64>,

    /// Feature to inspect; defaults to the first feature column
    #[arg(long)]
    feature: Option<String>,

    /// Client group shown in the statistics and histogram panels
    #[arg(long, value_enum, default_value_t = GroupCli::All)]
    group: GroupCli,

    /// Histogram y-axis scale
    #[arg(long, value_enum, default_value_t = ScaleCli::Linear)]
    scale: ScaleCli,

    /// Print the view model as JSON instead of text
    #[arg(long)]
    json: bool,
}

// ========================================================================================
//                           The Main Orchestration Logic
// ========================================================================================

fn main() {
    let cli = Cli::parse();
    let Cli { sources, command } = cli;

    // Log lines would tear the alternate screen, so the dashboard only shows warnings.
    let default_level = match command {
        None | Some(Commands::Dashboard) => "warn",
        Some(_) => "info",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let result = match command {
        None | Some(Commands::Dashboard) => run_dashboard(&sources),
        Some(Commands::Report(args)) => run_report(&sources, args),
        Some(Commands::Features) => run_features(&sources),
        Some(Commands::Version) => {
            print_version_info();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn resolve_config(sources: &SourceArgs) -> Result<DashboardConfig, Box<dyn Error>> {
    let mut config = match &sources.config {
        Some(path) => DashboardConfig::load(path)?,
        None => DashboardConfig::default(),
    };
    if let Some(data) = &sources.data {
        config.data_path = data.clone();
    }
    if let Some(image) = &sources.image {
        config.image_path = image.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Loads the table once and builds the shared dashboard around it.
///
/// A dataset failure ends the session; a missing explanation image does not.
fn open_dashboard(config: &DashboardConfig) -> Result<Dashboard, Box<dyn Error>> {
    let loader = DatasetLoader::new(&config.data_path, config.separator_byte()?);
    let mut progress = SpinnerProgress::new();
    let table = loader
        .load_with_progress(&mut progress)
        .map_err(DashboardError::from)?;
    let explanation = load_explanation_image(&config.image_path);
    Ok(Dashboard::new(table, explanation, config.histogram_bins))
}

fn run_dashboard(sources: &SourceArgs) -> Result<(), Box<dyn Error>> {
    let config = resolve_config(sources)?;
    let dashboard = open_dashboard(&config)?;
    let initial = dashboard.initial_state(config.threshold()?);
    if !io::stdout().is_terminal() {
        log::warn!("Standard output is not a terminal; printing a single report instead");
        print_view(&initial, &dashboard.render(&initial));
        return Ok(());
    }
    tui::run(&dashboard, initial)?;
    Ok(())
}

fn run_report(sources: &SourceArgs, args: ReportArgs) -> Result<(), Box<dyn Error>> {
    let config = resolve_config(sources)?;
    let dashboard = open_dashboard(&config)?;

    let threshold = match args.threshold {
        Some(percent) => Threshold::from_percent(percent)?,
        None => config.threshold()?,
    };
    let mut state = dashboard.initial_state(threshold);
    state.client_id = args.client;
    state.group = args.group.into();
    state.scale = args.scale.into();
    if let Some(feature) = args.feature {
        if dashboard.table().feature(&feature).is_none() {
            return Err(DashboardError::UnknownFeature(feature).into());
        }
        state.feature = feature;
    }

    let view = dashboard.render(&state);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print_view(&state, &view);
    }
    Ok(())
}

fn run_features(sources: &SourceArgs) -> Result<(), Box<dyn Error>> {
    let config = resolve_config(sources)?;
    let dashboard = open_dashboard(&config)?;
    let table = dashboard.table();
    println!(
        "{} clients, {} features ({} binary)",
        table.row_count(),
        table.features().len(),
        dashboard.binary_features().len()
    );
    for column in table.features() {
        let range = column.range();
        let kind = if dashboard.is_binary(column.name()) {
            "binary"
        } else {
            "continuous"
        };
        println!(
            "  {:<40} {:<10} [{:.3}, {:.3}]",
            column.name(),
            kind,
            range.min,
            range.max
        );
    }
    Ok(())
}

// ========================================================================================
//                                   Text Report
// ========================================================================================

fn print_view(state: &DashboardState, view: &ViewModel) {
    println!("{}", view.title);
    println!("{}", "=".repeat(view.title.len()));
    println!();
    println!("{}", view.client_prompt);
    println!("> {}", state.client_id);
    println!("{}", view.threshold_prompt);
    println!("> {:.2}", state.threshold.percent());
    println!();
    print_panel(&view.decision, |decision| println!("{}", decision.text));
    println!("{}", view.summary.text);
    println!();

    println!("{}", view.feature_prompt);
    println!("> {}", view.feature.name);
    print_panel(&view.feature.client_value, |value| println!("{}", value.text));
    println!("{}", view.group_prompt);
    println!("> {}", view.group);
    println!();

    println!("{}", view.statistics_heading);
    print_panel(&view.statistics, |statistics| {
        if let Some(text) = &statistics.text {
            println!("{text}");
        }
        if let Some(chart) = &statistics.chart {
            for bar in &chart.bars {
                println!("  {:<8} {:>14.3}", bar.label, bar.value);
            }
            println!("  {:<8} {:>14.3}", "client", chart.marker);
        }
    });
    println!();

    println!("{} [{}]", view.histogram_heading, state.scale.label());
    print_panel(&view.histogram, |histogram| {
        let top = histogram.max_height();
        let upper = histogram.edges.last().copied().unwrap_or(f64::NAN);
        for (left, right, height) in histogram.bars() {
            let width = if top > 0.0 {
                (height / top * 40.0).round() as usize
            } else {
                0
            };
            let holds_marker = (left..right).contains(&histogram.marker)
                || (right == upper && histogram.marker == upper);
            let marker = if holds_marker {
                " <- selected client"
            } else {
                ""
            };
            println!(
                "  [{left:>12.3}, {right:>12.3})  {height:.4}  {}{marker}",
                "#".repeat(width)
            );
        }
    });
    println!();

    println!("{}", view.explanation_heading);
    print_panel(&view.explanation, |explanation| {
        println!(
            "{} ({}x{})",
            explanation.path.display(),
            explanation.width,
            explanation.height
        );
        for line in &explanation.caption {
            println!("{line}");
        }
    });
}

fn print_panel<T>(panel: &Panel<T>, show: impl FnOnce(&T)) {
    match panel {
        Panel::Ready(content) => show(content),
        Panel::Notice { message } => println!("! {message}"),
    }
}

// ========================================================================================
//                                 Load Progress
// ========================================================================================

struct SpinnerProgress {
    bar: ProgressBar,
}

impl SpinnerProgress {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }
}

impl LoadProgressObserver for SpinnerProgress {
    fn on_stage_start(&mut self, stage: LoadStage) {
        self.bar.set_message(stage.describe());
    }

    fn on_loaded(&mut self, rows: usize, columns: usize) {
        self.bar
            .finish_with_message(format!("Data loaded! ({rows} clients, {columns} columns)"));
    }
}

impl Drop for SpinnerProgress {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

// ========================================================================================
//                                 Version Report
// ========================================================================================

fn print_version_info() {
    let version = env!("CARGO_PKG_VERSION");
    let build_timestamp: u64 = option_env!("SOLVENCY_BUILD_TIMESTAMP")
        .and_then(|value| value.parse().ok())
        .unwrap_or(0);

    println!("solvency {}", version);

    if build_timestamp > 0 {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        if now > build_timestamp {
            println!("Built: {}", format_duration_ago(now - build_timestamp));
        } else {
            println!("Built: just now");
        }
    }
}

/// Format seconds into a human-readable duration like "2.4 hours ago"
fn format_duration_ago(seconds: u64) -> String {
    const MINUTE: u64 = 60;
    const HOUR: u64 = 60 * MINUTE;
    const DAY: u64 = 24 * HOUR;

    if seconds < MINUTE {
        format!("{} seconds ago", seconds)
    } else if seconds < HOUR {
        format!("{:.1} minutes ago", seconds as f64 / MINUTE as f64)
    } else if seconds < DAY {
        format!("{:.1} hours ago", seconds as f64 / HOUR as f64)
    } else {
        format!("{:.1} days ago", seconds as f64 / DAY as f64)
    }
}
