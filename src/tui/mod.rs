mod help;
mod state;

use crate::cli::{build_config, build_controller, build_view, Cli};
use crate::entity::{EntityKind, Route};
use crate::model::{ConsoleEvent, Record, Severity};
use crate::orchestrator::{self, Confirmation, ListController, UiCommand};
use crate::session::Session;
use crate::cache::FetchStatus;
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Tabs, Wrap},
    Terminal,
};
use state::{status_color, DetailPane, UiState};
use std::sync::Arc;
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

pub async fn run(args: Cli, session: Session) -> Result<()> {
    let cfg = build_config(&args);
    // Unbounded channels avoid backpressure between the UI thread and the runtime.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<ConsoleEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();
    let controller = Arc::new(build_controller(&cfg, session, event_tx)?);

    let mut ui = UiState::new(cfg.entity, controller.is_restricted(), controller.grouping());
    ui.view = build_view(&args, None);
    ui.search = args.search.clone().unwrap_or_default();
    if cfg.entity.status_field().is_some() {
        ui.status = args.status;
        let _ = cmd_tx.send(UiCommand::SelectStatus(args.status));
    }

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_controller = controller.clone();
    let ui_handle =
        std::thread::spawn(move || run_threaded(ui, ui_controller, event_rx, cmd_tx));

    let res = orchestrator::run_controller(controller, cmd_rx).await;

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
    mut state: UiState,
    controller: Arc<ListController>,
    mut event_rx: UnboundedReceiver<ConsoleEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        // Drain events without blocking to keep UI responsive.
        while let Ok(ev) = event_rx.try_recv() {
            if matches!(ev, ConsoleEvent::CollectionChanged) {
                let entry = controller.snapshot();
                state.replace_rows(entry.status, entry.data);
            }
            state.apply_event(ev);
        }

        if last_tick.elapsed() >= tick_rate {
            terminal
                .draw(|f| draw(f.area(), f, &state, &controller))
                .ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                if handle_key(&mut state, k, &cmd_tx) {
                    let _ = cmd_tx.send(UiCommand::Quit);
                    break Ok(());
                }
                // Redraw right away so key feedback doesn't wait for the tick.
                last_tick = Instant::now().checked_sub(tick_rate).unwrap_or(last_tick);
            }
        }
    };

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();
    res
}

/// Apply one key press. Returns true when the user asked to quit.
fn handle_key(state: &mut UiState, k: KeyEvent, cmd_tx: &UnboundedSender<UiCommand>) -> bool {
    let send = |cmd: UiCommand| {
        let _ = cmd_tx.send(cmd);
    };

    if state.search_editing {
        match k.code {
            KeyCode::Enter => {
                state.search_editing = false;
                state.apply_search();
            }
            KeyCode::Esc => {
                state.search_editing = false;
                state.search = state.view.global_filter().to_string();
            }
            KeyCode::Backspace => {
                state.search.pop();
            }
            KeyCode::Char(c) => state.search.push(c),
            _ => {}
        }
        return false;
    }

    if let Some(id) = state.pending_delete.take() {
        let confirm = if k.code == KeyCode::Char('y') {
            Confirmation::Confirmed
        } else {
            Confirmation::Declined
        };
        if confirm == Confirmation::Declined {
            state.set_info(Severity::Info, "Delete cancelled");
        }
        send(UiCommand::Delete(id, confirm));
        return false;
    }

    let participants = state.entity == EntityKind::Participants;
    let registrations = state.entity == EntityKind::Registrations;

    match (k.modifiers, k.code) {
        (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => return true,
        (_, KeyCode::Tab) => state.tab = (state.tab + 1) % 2,
        (_, KeyCode::Char('?')) => state.tab = if state.tab == 1 { 0 } else { 1 },
        _ if state.tab != 0 => {}
        (_, KeyCode::Char('j')) | (_, KeyCode::Down) => state.move_cursor(1),
        (_, KeyCode::Char('k')) | (_, KeyCode::Up) => state.move_cursor(-1),
        (_, KeyCode::Char('n')) | (_, KeyCode::Right) => state.next_page(),
        (_, KeyCode::Char('p')) | (_, KeyCode::Left) => state.previous_page(),
        (_, KeyCode::Home) => state.first_page(),
        (_, KeyCode::End) => state.last_page(),
        (_, KeyCode::Char('/')) => {
            state.search_editing = true;
        }
        (_, KeyCode::Char('s')) => state.cycle_sort(),
        (_, KeyCode::Char('o')) => state.toggle_sort_direction(),
        (_, KeyCode::Char('f')) => {
            if participants {
                let next = state.status.cycle();
                state.set_status(next);
                send(UiCommand::SelectStatus(next));
            }
        }
        (_, KeyCode::Char('g')) => match state.switch_grouping() {
            Some(g) => send(UiCommand::SelectGrouping(g)),
            None => state.set_info(Severity::Info, "No events to switch between"),
        },
        (_, KeyCode::Char('c')) => {
            if let Some((header, visible)) = state.cycle_column_visibility() {
                let what = if visible { "shown" } else { "hidden" };
                state.set_info(Severity::Info, format!("Column {header} {what}"));
            }
        }
        (_, KeyCode::Char(' ')) => state.toggle_selected(),
        (_, KeyCode::Char('u')) => {
            state.view.clear_selection();
            state.set_info(Severity::Info, "Selection cleared");
        }
        (_, KeyCode::Char('t')) if participants => {
            if let Some(id) = state.cursor_id() {
                send(UiCommand::Advance(id));
            }
        }
        (_, KeyCode::Char('d')) if participants => {
            if let Some(id) = state.cursor_id() {
                state.set_info(Severity::Info, format!("Delete record {id}? Press y to confirm"));
                state.pending_delete = Some(id);
            }
        }
        (_, KeyCode::Enter) => {
            if let Some(id) = state.cursor_id() {
                state.detail = Some(DetailPane::Loading(id.clone()));
                send(UiCommand::OpenDetail(id));
            }
        }
        (_, KeyCode::Esc) => {
            if state.detail.take().is_some() {
                send(UiCommand::CloseDetail);
            }
        }
        (_, KeyCode::Char('P')) if registrations => send(UiCommand::PrintUnprinted),
        (_, KeyCode::Char('x')) if registrations => {
            if let Some(id) = state.cursor_id() {
                send(UiCommand::PrintOne(id));
            }
        }
        (_, KeyCode::Char('v')) => {
            if let Some(id) = state.cursor_id() {
                send(UiCommand::Navigate(Route::View(id)));
            }
        }
        (_, KeyCode::Char('e')) => {
            if let Some(id) = state.cursor_id() {
                send(UiCommand::Navigate(Route::Edit(id)));
            }
        }
        (_, KeyCode::Char('+')) => send(UiCommand::Navigate(Route::Create)),
        (_, KeyCode::Char('r')) => {
            state.set_info(Severity::Info, "Reloading…");
            send(UiCommand::Reload);
        }
        _ => {}
    }
    false
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState, controller: &ListController) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(area);

    let tabs = Tabs::new(vec![Line::from(state.entity.title()), Line::from("Help")])
        .select(state.tab)
        .block(Block::default().borders(Borders::ALL).title("fair-console"))
        .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match state.tab {
        0 => draw_list(chunks[1], f, state, controller),
        _ => help::draw_help(chunks[1], f),
    }
}

fn draw_list(area: Rect, f: &mut ratatui::Frame, state: &UiState, controller: &ListController) {
    let main = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3), // Event, filter and tallies
                Constraint::Min(0),    // Table (+ detail panel)
                Constraint::Length(4), // Status + footer
            ]
            .as_ref(),
        )
        .split(area);

    draw_header(main[0], f, state, controller);

    let body = if state.detail.is_some() {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)].as_ref())
            .split(main[1])
    } else {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(100)].as_ref())
            .split(main[1])
    };
    draw_table(body[0], f, state, controller);
    if let Some(detail) = &state.detail {
        draw_detail(body[1], f, state, detail);
    }

    draw_footer(main[2], f, state);
}

fn draw_header(area: Rect, f: &mut ratatui::Frame, state: &UiState, controller: &ListController) {
    let mut spans = Vec::new();
    if let Some(g) = &state.grouping {
        spans.push(Span::styled("Event: ", Style::default().fg(Color::Gray)));
        spans.push(Span::raw(format!("{g}  ")));
    }
    if state.entity.status_field().is_some() {
        spans.push(Span::styled("Status: ", Style::default().fg(Color::Gray)));
        spans.push(Span::raw(format!("{}  ", state.status.label())));
    }
    if let Some(counts) = state.view.status_counts(&state.rows) {
        for (status, n) in counts {
            spans.push(Span::styled(
                format!("{status} {n}"),
                Style::default().fg(status_color(status.as_str())),
            ));
            spans.push(Span::raw("  "));
        }
    }
    if state.entity.supports_printing() && state.fetch == FetchStatus::Success {
        let pending = controller.unprinted().len();
        spans.push(Span::styled(
            format!("Unprinted {pending}  "),
            Style::default().fg(if pending > 0 { Color::Yellow } else { Color::Green }),
        ));
    }
    if !state.view.global_filter().is_empty() || state.search_editing {
        spans.push(Span::styled("Search: ", Style::default().fg(Color::Gray)));
        let shown = if state.search_editing {
            format!("{}▏", state.search)
        } else {
            state.view.global_filter().to_string()
        };
        spans.push(Span::raw(shown));
    }
    if state.restricted {
        spans.push(Span::styled("  read-only", Style::default().fg(Color::Red)));
    }
    let p = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    f.render_widget(p, area);
}

fn draw_table(area: Rect, f: &mut ratatui::Frame, state: &UiState, controller: &ListController) {
    let title = match state.fetch {
        FetchStatus::Idle | FetchStatus::Loading => "Loading…".to_string(),
        FetchStatus::Error => "Failed to load data (r to try again)".to_string(),
        FetchStatus::Success => state.entity.title().to_string(),
    };
    let block = Block::default().borders(Borders::ALL).title(title);

    let projection = state.projection();
    if projection.rows.is_empty() {
        let msg = if state.fetch == FetchStatus::Success {
            "No results."
        } else {
            ""
        };
        f.render_widget(Paragraph::new(msg).block(block), area);
        return;
    }

    let columns = state.view.visible_columns();
    let sort = state.view.sort();
    let header = Row::new(columns.iter().map(|c| {
        let arrow = match sort {
            Some(s) if s.column == c.id && s.descending => " ↓",
            Some(s) if s.column == c.id => " ↑",
            _ => "",
        };
        Cell::from(format!("{}{arrow}", c.header))
    }))
    .style(Style::default().add_modifier(Modifier::BOLD));

    let status_field = state
        .entity
        .status_field()
        .or(state.entity.print_status_field());
    let rows = projection.rows.iter().map(|r| table_row(r, state, controller, &columns, status_field));
    let widths = columns.iter().map(|_| Constraint::Fill(1));

    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .row_highlight_style(Style::default().bg(Color::DarkGray));
    let mut ts = TableState::default();
    ts.select(Some(state.cursor));
    f.render_stateful_widget(table, area, &mut ts);
}

fn table_row<'a>(
    r: &Record,
    state: &UiState,
    controller: &ListController,
    columns: &[&crate::entity::Column],
    status_field: Option<&str>,
) -> Row<'a> {
    let id = r.id();
    let selected = id.as_ref().is_some_and(|k| state.view.is_selected(k));
    let advancing = id.as_ref().is_some_and(|k| controller.is_advancing(k));
    let cells = columns.iter().map(|c| {
        let text = r.text(c.id);
        if Some(c.id) == status_field {
            let shown = if advancing {
                "updating…".to_string()
            } else if text.is_empty() {
                "-".to_string()
            } else {
                text.clone()
            };
            Cell::from(shown).style(Style::default().fg(status_color(&text)))
        } else {
            Cell::from(text)
        }
    });
    let row = Row::new(cells.collect::<Vec<_>>());
    if selected {
        row.style(Style::default().fg(Color::Cyan))
    } else {
        row
    }
}

fn draw_detail(area: Rect, f: &mut ratatui::Frame, state: &UiState, detail: &DetailPane) {
    let block = Block::default().borders(Borders::ALL).title("Detail (esc closes)");
    let lines: Vec<Line> = match detail {
        DetailPane::Loading(id) => vec![Line::from(format!("Loading {id}…"))],
        DetailPane::Failed { id, error } => vec![
            Line::from(Span::styled(
                format!("Failed to load {id}"),
                Style::default().fg(Color::Red),
            )),
            Line::from(error.clone()),
        ],
        DetailPane::Loaded(record) => {
            let mut out = Vec::new();
            if state.entity == EntityKind::Registrations {
                out.push(Line::from(Span::styled(
                    record.text("fair_firm_name"),
                    Style::default().add_modifier(Modifier::BOLD),
                )));
                out.push(Line::from(record.text("fair_person_name").to_uppercase()));
                out.push(Line::from(""));
            }
            for (k, v) in record.fields() {
                if v.is_empty() {
                    continue;
                }
                out.push(Line::from(vec![
                    Span::styled(format!("{k}: "), Style::default().fg(Color::Gray)),
                    Span::raw(v),
                ]));
            }
            out
        }
    };
    let p = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: true });
    f.render_widget(p, area);
}

fn draw_footer(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let projection = state.projection();
    let page = if projection.page_count == 0 {
        "Page 0 of 0".to_string()
    } else {
        format!(
            "Page {} of {}",
            projection.page_index + 1,
            projection.page_count
        )
    };
    let mut footer = vec![
        Span::raw(format!(
            "{} of {} row(s) selected.  ",
            projection.selected_count, projection.total_filtered
        )),
        Span::raw(page),
    ];
    if let Some(run) = &state.print_run {
        let current = run
            .current
            .as_ref()
            .map(|id| format!(" #{id}"))
            .unwrap_or_default();
        footer.push(Span::styled(
            format!(
                "  printing{current}: {} done, {} failed, {} skipped",
                run.printed, run.failed, run.skipped
            ),
            Style::default().fg(Color::Yellow),
        ));
    }
    let p = Paragraph::new(vec![state.status_line(), Line::from(footer)])
        .block(Block::default().borders(Borders::ALL).title("? for help"));
    f.render_widget(p, area);
}
