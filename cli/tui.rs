//! Interactive terminal front end.
//!
//! Every key press updates the session's `DashboardState` and re-renders the whole
//! `ViewModel`; this module only draws what `render` produced.

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::prelude::*;
use ratatui::widgets::{Axis, Block, Borders, Chart, Dataset, Gauge, GraphType, Paragraph, Wrap};
use solvency::histogram::{AxisScale, HistogramSpec};
use solvency::stats::{GroupFilter, StatsChart};
use solvency::view::{Dashboard, DashboardState, Panel, ViewModel};
use std::io::{self, Stdout};

const HELP: &str = "digits+Enter: client id | n/p: next/previous client | \u{2190}/\u{2192}: threshold \u{b1}1 (Shift \u{b1}10) | \u{2191}/\u{2193}: feature | g: group | s: scale | q: quit";

struct App<'a> {
    dashboard: &'a Dashboard,
    state: DashboardState,
    features: Vec<String>,
    id_input: Option<String>,
    view: ViewModel,
}

impl<'a> App<'a> {
    fn new(dashboard: &'a Dashboard, state: DashboardState) -> Self {
        let view = dashboard.render(&state);
        Self {
            dashboard,
            features: dashboard.feature_options(),
            state,
            id_input: None,
            view,
        }
    }

    fn refresh(&mut self) {
        self.view = self.dashboard.render(&self.state);
    }

    fn shift_feature(&mut self, forward: bool) {
        if self.features.is_empty() {
            return;
        }
        let current = self
            .features
            .iter()
            .position(|f| *f == self.state.feature)
            .unwrap_or(0);
        let len = self.features.len();
        let next = if forward {
            (current + 1) % len
        } else {
            (current + len - 1) % len
        };
        self.state.feature = self.features[next].clone();
    }

    /// Applies one key press. Returns false when the user asked to quit.
    fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
        if let Some(input) = self.id_input.as_mut() {
            match code {
                KeyCode::Char(c) if c.is_ascii_digit() => input.push(c),
                KeyCode::Char('-') if input.is_empty() => input.push('-'),
                KeyCode::Backspace => {
                    input.pop();
                }
                KeyCode::Enter => {
                    if let Ok(id) = input.parse::<i64>() {
                        self.state.client_id = id;
                    }
                    self.id_input = None;
                }
                KeyCode::Esc => self.id_input = None,
                _ => {}
            }
            self.refresh();
            return true;
        }

        let step = if modifiers.contains(KeyModifiers::SHIFT) {
            10.0
        } else {
            1.0
        };
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return false,
            KeyCode::Char(c) if c.is_ascii_digit() => self.id_input = Some(c.to_string()),
            KeyCode::Char('-') => self.id_input = Some("-".to_string()),
            KeyCode::Char('n') => self.state.client_id = self.state.client_id.saturating_add(1),
            KeyCode::Char('p') => self.state.client_id = self.state.client_id.saturating_sub(1),
            KeyCode::Right => self.state.threshold = self.state.threshold.nudged(step),
            KeyCode::Left => self.state.threshold = self.state.threshold.nudged(-step),
            KeyCode::Down => self.shift_feature(true),
            KeyCode::Up => self.shift_feature(false),
            KeyCode::Char('g') => self.state.group = self.state.group.cycled(),
            KeyCode::Char('s') => self.state.scale = self.state.scale.toggled(),
            _ => return true,
        }
        self.refresh();
        true
    }
}

pub fn run(dashboard: &Dashboard, state: DashboardState) -> io::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(dashboard, state);
    let res = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    res
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> io::Result<()> {
    loop {
        terminal.draw(|f| draw(f, app))?;
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press && !app.handle_key(key.code, key.modifiers) {
                return Ok(());
            }
        }
    }
}

fn draw(f: &mut Frame, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(8),
            Constraint::Length(3),
            Constraint::Min(12),
            Constraint::Length(9),
            Constraint::Length(1),
        ])
        .split(f.area());

    draw_header(f, rows[0], app);
    draw_threshold(f, rows[1], app);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(rows[2]);
    draw_feature_panel(f, columns[0], app);
    draw_histogram(f, columns[1], &app.view, app.state.scale);

    draw_explanation(f, rows[3], app);
    f.render_widget(
        Paragraph::new(HELP).style(Style::default().fg(Color::DarkGray)),
        rows[4],
    );
}

fn notice_line(message: &str) -> Line<'static> {
    Line::from(Span::styled(
        message.to_string(),
        Style::default().fg(Color::Yellow),
    ))
}

fn draw_header(f: &mut Frame, area: Rect, app: &App) {
    let view = &app.view;
    let id_text = match &app.id_input {
        Some(input) => format!("{input}_"),
        None => app.state.client_id.to_string(),
    };
    let mut lines = vec![
        Line::from(view.client_prompt.clone()),
        Line::from(Span::styled(
            format!("Client ID: {id_text}"),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    match &view.decision {
        Panel::Ready(decision) => {
            let colour = if decision.decision.approved {
                Color::Green
            } else {
                Color::Red
            };
            lines.push(Line::from(Span::styled(
                format!(
                    "{} (predicted repayment: {:.1}%)",
                    decision.text,
                    100.0 * decision.decision.probability
                ),
                Style::default().fg(colour),
            )));
        }
        Panel::Notice { message } => lines.push(notice_line(message)),
    }
    lines.push(Line::from(view.summary.text.clone()));

    let header = Paragraph::new(lines)
        .block(Block::default().title(view.title.clone()).borders(Borders::ALL))
        .wrap(Wrap { trim: true });
    f.render_widget(header, area);
}

fn draw_threshold(f: &mut Frame, area: Rect, app: &App) {
    let percent = app.state.threshold.percent();
    let gauge = Gauge::default()
        .block(
            Block::default()
                .title(app.view.threshold_prompt.clone())
                .borders(Borders::ALL),
        )
        .gauge_style(Style::default().fg(Color::Cyan))
        .ratio((percent / 100.0).clamp(0.0, 1.0))
        .label(format!("{percent:.2}%"));
    f.render_widget(gauge, area);
}

fn draw_feature_panel(f: &mut Frame, area: Rect, app: &App) {
    let view = &app.view;
    let kind = if view.feature.is_binary {
        "binary"
    } else {
        "continuous"
    };
    let mut lines = vec![
        Line::from(view.feature_prompt.clone()),
        Line::from(Span::styled(
            format!("\u{25b8} {} ({kind})", view.feature.name),
            Style::default().add_modifier(Modifier::BOLD),
        )),
    ];
    match &view.feature.client_value {
        Panel::Ready(value) => lines.push(Line::from(value.text.clone())),
        Panel::Notice { message } => lines.push(notice_line(message)),
    }
    lines.push(Line::from(""));
    lines.push(Line::from(view.group_prompt.clone()));
    for group in GroupFilter::ALL {
        let mark = if group == view.group { "(o)" } else { "( )" };
        lines.push(Line::from(format!("{mark} {group}")));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        view.statistics_heading.clone(),
        Style::default().add_modifier(Modifier::UNDERLINED),
    )));
    match &view.statistics {
        Panel::Ready(statistics) => {
            if let Some(text) = &statistics.text {
                lines.push(Line::from(text.clone()));
            }
            if let Some(chart) = &statistics.chart {
                let width = area.width.saturating_sub(30).max(10) as usize;
                lines.extend(stat_bar_lines(chart, width));
            }
        }
        Panel::Notice { message } => lines.push(notice_line(message)),
    }

    let panel = Paragraph::new(lines)
        .block(Block::default().title("Feature").borders(Borders::ALL))
        .wrap(Wrap { trim: false });
    f.render_widget(panel, area);
}

/// Horizontal bars on a shared scale that also covers the client's marker.
fn stat_bar_lines(chart: &StatsChart, width: usize) -> Vec<Line<'static>> {
    let reach = chart
        .bars
        .iter()
        .map(|bar| bar.value.abs())
        .chain(std::iter::once(chart.marker.abs()))
        .filter(|v| v.is_finite())
        .fold(0.0, f64::max);
    let cells = |value: f64| -> usize {
        if reach > 0.0 && value.is_finite() {
            (value.abs() / reach * width as f64).round() as usize
        } else {
            0
        }
    };
    let marker_cell = cells(chart.marker).min(width);

    let mut lines: Vec<Line<'static>> = chart
        .bars
        .iter()
        .map(|bar| {
            let filled = cells(bar.value).min(width);
            let bar_text: String = (0..=width)
                .map(|i| {
                    if i == marker_cell {
                        '\u{2502}'
                    } else if i < filled {
                        '\u{2588}'
                    } else {
                        ' '
                    }
                })
                .collect();
            Line::from(vec![
                Span::raw(format!("{:<8}", bar.label)),
                Span::styled(bar_text, Style::default().fg(Color::Blue)),
                Span::raw(format!(" {:.3}", bar.value)),
            ])
        })
        .collect();
    lines.push(Line::from(Span::styled(
        format!(
            "{:<8}{}\u{25b2} selected client ({:.3})",
            "",
            " ".repeat(marker_cell),
            chart.marker
        ),
        Style::default().fg(Color::Red),
    )));
    lines
}

/// Heights on the plotted scale; log axes plot log10 and pin empty bins to the floor.
fn plotted(height: f64, histogram: &HistogramSpec) -> f64 {
    match histogram.scale {
        AxisScale::Linear => height,
        AxisScale::Logarithmic => height.max(histogram.y_range.0).log10(),
    }
}

fn draw_histogram(f: &mut Frame, area: Rect, view: &ViewModel, scale: AxisScale) {
    let title = format!("{} ({})", view.histogram_heading, scale.label());
    let histogram = match &view.histogram {
        Panel::Ready(histogram) => histogram,
        Panel::Notice { message } => {
            let notice = Paragraph::new(notice_line(message))
                .block(Block::default().title(title).borders(Borders::ALL))
                .wrap(Wrap { trim: true });
            f.render_widget(notice, area);
            return;
        }
    };

    let (y_low, y_high) = (
        plotted(histogram.y_range.0, histogram),
        plotted(histogram.y_range.1, histogram),
    );
    let bars: Vec<(f64, f64)> = histogram
        .bars()
        .map(|(left, right, height)| ((left + right) / 2.0, plotted(height, histogram)))
        .collect();
    let marker = vec![(histogram.marker, y_low), (histogram.marker, y_high)];

    let datasets = vec![
        Dataset::default()
            .name(histogram.title.clone())
            .marker(symbols::Marker::HalfBlock)
            .graph_type(GraphType::Bar)
            .style(Style::default().fg(Color::Cyan))
            .data(&bars),
        Dataset::default()
            .name(histogram.marker_label)
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Red))
            .data(&marker),
    ];

    let y_labels = match histogram.scale {
        AxisScale::Linear => vec![
            Line::from("0"),
            Line::from(format!("{:.3}", histogram.y_range.1)),
        ],
        AxisScale::Logarithmic => vec![
            Line::from(format!("{:.1e}", histogram.y_range.0)),
            Line::from(format!("{:.1e}", histogram.y_range.1)),
        ],
    };
    let chart = Chart::new(datasets)
        .block(Block::default().title(title).borders(Borders::ALL))
        .x_axis(
            Axis::default()
                .title(histogram.title.clone())
                .bounds([histogram.x_range.0, histogram.x_range.1])
                .labels(vec![
                    Line::from(format!("{:.2}", histogram.x_range.0)),
                    Line::from(format!("{:.2}", histogram.x_range.1)),
                ]),
        )
        .y_axis(
            Axis::default()
                .title(histogram.y_label)
                .bounds([y_low, y_high])
                .labels(y_labels),
        );
    f.render_widget(chart, area);
}

fn draw_explanation(f: &mut Frame, area: Rect, app: &App) {
    let view = &app.view;
    let block = Block::default()
        .title(view.explanation_heading.clone())
        .borders(Borders::ALL);
    let (explanation, image) = match (&view.explanation, app.dashboard.explanation()) {
        (Panel::Ready(explanation), Ok(image)) => (explanation, image),
        (Panel::Notice { message }, _) => {
            f.render_widget(Paragraph::new(notice_line(message)).block(block), area);
            return;
        }
        (Panel::Ready(_), Err(err)) => {
            f.render_widget(Paragraph::new(notice_line(&err.to_string())).block(block), area);
            return;
        }
    };

    let inner = block.inner(area);
    f.render_widget(block, area);
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(inner);

    // Two pixel rows per cell: the upper half is the foreground, the lower the background.
    let preview = image.preview(
        u32::from(halves[0].width.max(1)),
        u32::from(halves[0].height.max(1)) * 2,
    );
    let preview_lines: Vec<Line> = preview
        .chunks(2)
        .map(|pair| {
            let upper = &pair[0];
            let lower = pair.get(1).unwrap_or(upper);
            Line::from(
                upper
                    .iter()
                    .zip(lower)
                    .map(|(top, bottom)| {
                        Span::styled(
                            "\u{2580}",
                            Style::default()
                                .fg(Color::Rgb(top[0], top[1], top[2]))
                                .bg(Color::Rgb(bottom[0], bottom[1], bottom[2])),
                        )
                    })
                    .collect::<Vec<_>>(),
            )
        })
        .collect();
    f.render_widget(Paragraph::new(preview_lines), halves[0]);

    let mut caption: Vec<Line> = explanation
        .caption
        .iter()
        .map(|line| Line::from(line.clone()))
        .collect();
    caption.push(Line::from(Span::styled(
        format!(
            "{} ({}x{})",
            explanation.path.display(),
            explanation.width,
            explanation.height
        ),
        Style::default().fg(Color::DarkGray),
    )));
    f.render_widget(Paragraph::new(caption).wrap(Wrap { trim: true }), halves[1]);
}
