mod charts;
mod help;

use crate::cli::Cli;
use crate::dashboards::{DashboardUpdate, Feature, SentimentDistribution};
use crate::model::{RunPhase, RunStatus, StageStatus};
use crate::orchestrator::{self, UiCommand, UiEvent};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs, Wrap},
    Terminal,
};
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;

const HELP_TAB: usize = Feature::ALL.len();

/// Last committed result shown in a dashboard pane.
struct ShownResult {
    slot: String,
    lines: Vec<String>,
    json: serde_json::Value,
    committed_at: String,
}

/// One dashboard tab: its live status feed and what it last showed.
struct Pane {
    feature: Feature,
    status_rx: watch::Receiver<RunStatus>,
    result: Option<ShownResult>,
}

struct UiState {
    tab: usize,
    info: String,
    auto_save: bool,
    panes: Vec<Pane>,
}

impl UiState {
    fn selected(&self) -> Option<&Pane> {
        self.panes.get(self.tab)
    }

    fn pane_mut(&mut self, feature: Feature) -> Option<&mut Pane> {
        self.panes.iter_mut().find(|p| p.feature == feature)
    }
}

fn tab_of(feature: Feature) -> usize {
    Feature::ALL
        .iter()
        .position(|f| *f == feature)
        .unwrap_or(0)
}

pub async fn run(args: Cli) -> Result<()> {
    // Unbounded channels avoid backpressure between the UI thread and the controller.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<UiEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let dashboards = crate::cli::build_dashboards(&args)?;
    let receivers: Vec<_> = Feature::ALL
        .iter()
        .map(|f| (*f, dashboards.subscribe(*f)))
        .collect();
    let launch = args.run_on_launch.then_some(args.feature);

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_args = args.clone();
    let ui_handle =
        std::thread::spawn(move || run_threaded(ui_args, receivers, event_rx, cmd_tx));

    let res = orchestrator::run_controller(dashboards, launch, event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    args: Cli,
    receivers: Vec<(Feature, watch::Receiver<RunStatus>)>,
    mut event_rx: UnboundedReceiver<UiEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    // UiState is owned by the UI thread only; progress arrives through the watch receivers.
    let mut state = UiState {
        tab: tab_of(args.feature),
        info: "Press r to run the selected dashboard, ? for help".into(),
        auto_save: args.auto_save,
        panes: receivers
            .into_iter()
            .map(|(feature, status_rx)| Pane {
                feature,
                status_rx,
                result: None,
            })
            .collect(),
    };

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        // Drain events without blocking to keep the UI responsive.
        while let Ok(ev) = event_rx.try_recv() {
            apply_event(&args, &mut state, ev);
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                match (k.modifiers, k.code) {
                    (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                    (_, KeyCode::Char(c @ '1'..='4')) => {
                        state.tab = (c as usize) - ('1' as usize);
                    }
                    (_, KeyCode::Tab) => {
                        state.tab = (state.tab + 1) % (HELP_TAB + 1);
                    }
                    (_, KeyCode::Char('?')) => {
                        state.tab = HELP_TAB;
                    }
                    (_, KeyCode::Char('r')) => {
                        if let Some(pane) = state.selected() {
                            let feature = pane.feature;
                            let _ = cmd_tx.send(UiCommand::Start(feature));
                            state.info = format!("Starting {feature}…");
                        }
                    }
                    (_, KeyCode::Char('c')) | (_, KeyCode::Esc) => {
                        if let Some(pane) = state.selected() {
                            let _ = cmd_tx.send(UiCommand::Cancel(pane.feature));
                        }
                    }
                    (_, KeyCode::Char('s')) => save_shown(&mut state),
                    (_, KeyCode::Char('y')) => copy_shown(&mut state),
                    (_, KeyCode::Char('a')) => {
                        state.auto_save = !state.auto_save;
                        state.info = if state.auto_save {
                            "Auto-save enabled".into()
                        } else {
                            "Auto-save disabled".into()
                        };
                    }
                    _ => {}
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

fn apply_event(args: &Cli, state: &mut UiState, ev: UiEvent) {
    match ev {
        UiEvent::Started { feature, run_id } => {
            tracing::debug!(%feature, run_id, "run started");
            state.info = format!("{feature}: pipeline running");
        }
        UiEvent::Message(msg) => state.info = msg,
        UiEvent::Update(update) => handle_update(args, state, update),
    }
}

fn handle_update(args: &Cli, state: &mut UiState, update: DashboardUpdate) {
    let processed = orchestrator::process_update(args, state.auto_save, &update);
    match update {
        DashboardUpdate::Committed {
            feature,
            slot,
            lines,
            json,
        } => {
            state.info = format!("{feature}: results ready ({slot})");
            if let Some(path) = processed.auto_saved_path.as_ref() {
                state.info = format!("{feature}: results ready, saved {}", path.display());
            }
            if !processed.export_messages.is_empty() {
                state.info = processed.export_messages.join("; ");
            }
            if let Some(pane) = state.pane_mut(feature) {
                pane.result = Some(ShownResult {
                    slot,
                    lines,
                    json,
                    committed_at: local_clock(),
                });
            }
        }
        DashboardUpdate::Failed { feature, message } => {
            state.info = format!("{feature} failed: {message}");
        }
    }
}

fn local_clock() -> String {
    time::OffsetDateTime::now_local()
        .unwrap_or_else(|_| time::OffsetDateTime::now_utc())
        .format(time::macros::format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_default()
}

fn save_shown(state: &mut UiState) {
    let Some(pane) = state.selected() else {
        return;
    };
    let Some(result) = pane.result.as_ref() else {
        state.info = "No committed result to save yet.".into();
        return;
    };
    state.info = match orchestrator::save_result(pane.feature, &result.slot, &result.json) {
        Ok(path) => format!("Saved: {}", path.display()),
        Err(e) => format!("Save failed: {e:#}"),
    };
}

fn copy_shown(state: &mut UiState) {
    let Some(result) = state.selected().and_then(|p| p.result.as_ref()) else {
        state.info = "No committed result to copy yet.".into();
        return;
    };
    let text = match serde_json::to_string_pretty(&result.json) {
        Ok(text) => text,
        Err(e) => {
            state.info = format!("Clipboard copy failed: {e}");
            return;
        }
    };
    state.info = match copy_to_clipboard(&text) {
        Ok(_) => format!("✓ Copied {} ({} bytes)", result.slot, text.len()),
        Err(e) => format!("Clipboard copy failed: {e:#}"),
    };
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(3)].as_ref())
        .split(area);

    let mut titles: Vec<Line> = state
        .panes
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let busy = if p.status_rx.borrow().phase.is_in_flight() {
                " *"
            } else {
                ""
            };
            Line::from(format!("{} {}{busy}", i + 1, p.feature))
        })
        .collect();
    titles.push(Line::from("Help"));

    let tabs = Tabs::new(titles)
        .select(state.tab)
        .block(Block::default().borders(Borders::ALL).title("wfm-dash"))
        .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match state.selected() {
        Some(pane) => draw_dashboard(chunks[1], f, pane),
        None => help::draw_help(chunks[1], f),
    }

    let auto = if state.auto_save { "on" } else { "off" };
    let status = Paragraph::new(Line::from(vec![
        Span::raw(state.info.clone()),
        Span::styled(
            format!("   auto-save {auto}"),
            Style::default().fg(Color::DarkGray),
        ),
    ]))
    .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(status, chunks[2]);
}

fn draw_dashboard(area: Rect, f: &mut ratatui::Frame, pane: &Pane) {
    let status = pane.status_rx.borrow().clone();
    if status.shows_progress() {
        draw_progress(area, f, pane.feature, &status);
        return;
    }

    let mut lines = Vec::new();
    if status.phase == RunPhase::Failed {
        let error = status.error.as_deref().unwrap_or("unknown error");
        lines.push(Line::from(Span::styled(
            format!("Last run failed: {error}"),
            Style::default().fg(Color::Red),
        )));
        lines.push(Line::from("Press r to try again."));
        lines.push(Line::from(""));
    }
    match pane.result.as_ref() {
        Some(result) => {
            lines.push(Line::from(Span::styled(
                format!("{} · committed {}", result.slot, result.committed_at),
                Style::default().fg(Color::Gray),
            )));
            lines.extend(result.lines.iter().map(|l| Line::from(l.clone())));
        }
        None if status.phase != RunPhase::Failed => {
            lines.push(Line::from("No results yet. Press r to run the pipeline."));
        }
        None => {}
    }

    let body = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(pane.feature.title()),
        );

    match sentiment_distribution(pane) {
        Some(dist) if area.width >= 60 => {
            let cols = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(60), Constraint::Percentage(40)].as_ref())
                .split(area);
            f.render_widget(body, cols[0]);
            charts::draw_sentiment_distribution(f, cols[1], &dist);
        }
        _ => f.render_widget(body, area),
    }
}

fn sentiment_distribution(pane: &Pane) -> Option<SentimentDistribution> {
    if pane.feature != Feature::Sentiment {
        return None;
    }
    let raw = pane.result.as_ref()?.json.get("sentiment_distribution")?;
    serde_json::from_value(raw.clone()).ok()
}

fn draw_progress(area: Rect, f: &mut ratatui::Frame, feature: Feature, status: &RunStatus) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(area);
    charts::draw_stage_gauge(f, rows[0], status);

    let title = match status.phase {
        RunPhase::Finalizing => format!("{feature} · finalizing"),
        _ => format!("{feature} · running"),
    };
    let p = Paragraph::new(progress_lines(status))
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(p, rows[1]);
}

fn progress_lines(status: &RunStatus) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = status
        .stages
        .iter()
        .map(|stage| {
            let (glyph, color) = match stage.status {
                StageStatus::Waiting => ("○", Color::DarkGray),
                StageStatus::Working => ("◐", Color::Yellow),
                StageStatus::Completed => ("●", Color::Green),
            };
            let mut spans = vec![
                Span::styled(format!(" {glyph} "), Style::default().fg(color)),
                Span::styled(
                    format!("{:<26}", stage.display_name),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
            ];
            if let Some(msg) = stage.message() {
                spans.push(Span::styled(msg.to_string(), Style::default().fg(Color::Gray)));
            }
            Line::from(spans)
        })
        .collect();

    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("Elapsed: ", Style::default().fg(Color::Gray)),
        Span::raw(format!("{}s", status.elapsed_seconds)),
    ]));
    if let Some(msg) = status.message.as_deref() {
        lines.push(Line::from(Span::styled(
            msg.to_string(),
            Style::default().fg(Color::Cyan),
        )));
    }
    if let Some(fact) = status.current_fact.as_deref() {
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled("Did you know? ", Style::default().fg(Color::Magenta)),
            Span::raw(fact.to_string()),
        ]));
    }
    lines
}

// Global clipboard manager channel - initialized once on first use
use std::sync::mpsc as std_mpsc;
use std::sync::OnceLock;

static CLIPBOARD_SENDER: OnceLock<std_mpsc::Sender<String>> = OnceLock::new();

/// Start the clipboard thread if needed. Each copy keeps its clipboard alive for a while so
/// clipboard managers on Linux can read it.
fn init_clipboard_manager() -> &'static std_mpsc::Sender<String> {
    CLIPBOARD_SENDER.get_or_init(|| {
        let (tx, rx) = std_mpsc::channel::<String>();
        std::thread::spawn(move || {
            use arboard::Clipboard;

            for text in rx {
                if let Ok(mut clipboard) = Clipboard::new() {
                    if clipboard.set_text(&text).is_ok() {
                        std::thread::sleep(Duration::from_secs(2));
                    }
                }
            }
        });
        tx
    })
}

/// Queue `text` for the clipboard without blocking the UI thread.
fn copy_to_clipboard(text: &str) -> Result<()> {
    init_clipboard_manager()
        .send(text.to_string())
        .map_err(|_| anyhow::anyhow!("Clipboard manager channel closed"))?;
    Ok(())
}
