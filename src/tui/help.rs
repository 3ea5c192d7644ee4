use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

const KEYS: &[(&str, &str)] = &[
    ("q / Ctrl-C", "Quit"),
    ("tab / ?", "Switch between list and help"),
    ("j/k ↑/↓", "Move"),
    ("n/p", "Next / previous page"),
    ("home/end", "First / last page"),
    ("/", "Search (enter applies, esc cancels)"),
    ("s", "Sort by next sortable column"),
    ("o", "Toggle sort direction"),
    ("f", "Cycle status filter"),
    ("g", "Cycle event"),
    ("c", "Hide / show next column"),
    ("space", "Select row"),
    ("u", "Clear selection"),
    ("enter", "Open detail"),
    ("v", "Open in panel"),
    ("esc", "Close detail"),
    ("r", "Reload (try again)"),
];

const PARTICIPANT_KEYS: &[(&str, &str)] = &[
    ("t", "Advance status"),
    ("d then y", "Delete (any other key cancels)"),
    ("e", "Edit in panel"),
    ("+", "Create in panel"),
];

const REGISTRATION_KEYS: &[(&str, &str)] = &[
    ("P", "Print every unprinted badge"),
    ("x", "Print badge for row"),
    ("e", "Edit in panel"),
    ("+", "Create in panel"),
];

fn key_lines(out: &mut Vec<Line<'static>>, keys: &[(&'static str, &'static str)]) {
    for (key, what) in keys {
        out.push(Line::from(vec![
            Span::raw("  "),
            Span::styled(format!("{key:<12}"), Style::default().fg(Color::Magenta)),
            Span::raw(*what),
        ]));
    }
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let mut lines = vec![Line::from("Keybinds:")];
    key_lines(&mut lines, KEYS);
    lines.push(Line::from(""));
    lines.push(Line::from("Participants:"));
    key_lines(&mut lines, PARTICIPANT_KEYS);
    lines.push(Line::from(""));
    lines.push(Line::from("Registrations:"));
    key_lines(&mut lines, REGISTRATION_KEYS);
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("Logs: ", Style::default().fg(Color::Gray)),
        Span::raw("RUST_LOG controls verbosity; output goes to console.log in the data directory."),
    ]));

    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
