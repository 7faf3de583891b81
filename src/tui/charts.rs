use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Gauge},
    Frame,
};

use crate::dashboards::SentimentDistribution;
use crate::model::RunStatus;

/// Stage completion as a gauge, labelled with the elapsed seconds.
pub fn draw_stage_gauge(f: &mut Frame, area: Rect, status: &RunStatus) {
    let total = status.stages.len();
    let done = status.completed_stages();
    let ratio = if total == 0 {
        1.0
    } else {
        done as f64 / total as f64
    };
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Pipeline"))
        .gauge_style(Style::default().fg(Color::Green).bg(Color::Black))
        .ratio(ratio.clamp(0.0, 1.0))
        .label(format!(
            "{done}/{total} stages · {}s",
            status.elapsed_seconds
        ));
    f.render_widget(gauge, area);
}

/// Positive / neutral / negative head counts of one sentiment cell.
pub fn draw_sentiment_distribution(f: &mut Frame, area: Rect, dist: &SentimentDistribution) {
    let bars = [
        ("Positive", dist.positive, Color::Green),
        ("Neutral", dist.neutral, Color::Yellow),
        ("Negative", dist.negative, Color::Red),
    ]
    .into_iter()
    .map(|(label, value, color)| {
        Bar::default()
            .label(Line::from(label))
            .value(u64::from(value))
            .style(Style::default().fg(color))
            .value_style(
                Style::default()
                    .fg(Color::Black)
                    .bg(color)
                    .add_modifier(Modifier::BOLD),
            )
    })
    .collect::<Vec<_>>();

    // Spread the three bars across the available width.
    let inner_width = area.width.saturating_sub(2);
    let bar_width = (inner_width.saturating_sub(4) / 3).clamp(1, 12);

    let chart = BarChart::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Sentiment distribution"),
        )
        .data(BarGroup::default().bars(&bars))
        .bar_width(bar_width)
        .bar_gap(2);
    f.render_widget(chart, area);
}
