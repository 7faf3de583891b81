use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

fn key_line(key: &'static str, pad: usize, action: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(key, Style::default().fg(Color::Magenta)),
        Span::raw(" ".repeat(pad)),
        Span::raw(action),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let p = Paragraph::new(vec![
        Line::from("Keybinds:"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("q", Style::default().fg(Color::Magenta)),
            Span::raw(" / "),
            Span::styled("Ctrl-C", Style::default().fg(Color::Magenta)),
            Span::raw("  Quit (in-flight runs are discarded)"),
        ]),
        key_line("1-4", 9, "Select dashboard"),
        key_line("tab", 9, "Next tab"),
        key_line("r", 11, "Run the selected dashboard"),
        key_line("c/esc", 7, "Cancel the run and dismiss its progress"),
        key_line("s", 11, "Save the shown result as JSON"),
        key_line("y", 11, "Copy the shown result to the clipboard"),
        key_line("a", 11, "Toggle auto-save"),
        key_line("?", 11, "Show this help"),
        Line::from(""),
        Line::from("Progress:"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("○", Style::default().fg(Color::DarkGray)),
            Span::raw(" waiting   "),
            Span::styled("◐", Style::default().fg(Color::Yellow)),
            Span::raw(" working   "),
            Span::styled("●", Style::default().fg(Color::Green)),
            Span::raw(" completed"),
        ]),
        Line::from(
            "  Results appear once every stage has finished and the backend has answered.",
        ),
        Line::from("  A backend error stops the run at once; press r to try again."),
    ])
    .wrap(Wrap { trim: false })
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
