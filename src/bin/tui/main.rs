mod app;

use std::io;
use std::time::Duration;

use app::{format_avg_seconds, format_slot, hex_color, truncate, AppState, ConnectionStatus, STRATEGIES};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> io::Result<()> {
    let base_url = std::env::var("API_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .map_err(io::Error::other)?;

    let mut app = AppState::new(base_url);

    // Initial fetch before rendering
    app.refresh(&client).await;

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut preset_table_state = TableState::default();
    preset_table_state.select(Some(0));

    let result = run_loop(&mut terminal, &mut app, &client, &mut preset_table_state).await;

    // Restore terminal regardless of result
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState,
    client: &reqwest::Client,
    preset_state: &mut TableState,
) -> io::Result<()> {
    let refresh_interval = Duration::from_secs(5);
    let mut last_tick = std::time::Instant::now();

    loop {
        terminal.draw(|f| render(f, app, preset_state))?;

        let timeout = refresh_interval
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    let selected = preset_state.selected().unwrap_or(0);
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Char('Q') => return Ok(()),
                        KeyCode::Char('r') | KeyCode::Char('R') => {
                            app.refresh(client).await;
                            last_tick = std::time::Instant::now();
                        }
                        KeyCode::Char('s') => {
                            app.cycle_strategy();
                            app.refresh(client).await;
                            last_tick = std::time::Instant::now();
                        }
                        KeyCode::Char('x') => app.act(client, selected, "run").await,
                        KeyCode::Char('e') => {
                            let enabled = app
                                .reconciled
                                .presets
                                .get(selected)
                                .and_then(|r| r.job.as_ref())
                                .is_some_and(|j| j.enabled);
                            let action = if enabled { "disable" } else { "enable" };
                            app.act(client, selected, action).await;
                        }
                        KeyCode::Down | KeyCode::Char('j') => {
                            let max = app.reconciled.presets.len().saturating_sub(1);
                            preset_state.select(Some((selected + 1).min(max)));
                        }
                        KeyCode::Up | KeyCode::Char('k') => {
                            preset_state.select(Some(selected.saturating_sub(1)));
                        }
                        _ => {}
                    }
                }
            }
        }

        if last_tick.elapsed() >= refresh_interval {
            app.refresh(client).await;
            last_tick = std::time::Instant::now();
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(f: &mut Frame, app: &AppState, preset_state: &mut TableState) {
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Min(0),    // body
            Constraint::Length(1), // footer
        ])
        .split(area);

    render_header(f, app, chunks[0]);
    render_body(f, app, preset_state, chunks[1]);
    render_footer(f, app, chunks[2]);
}

fn render_header(f: &mut Frame, app: &AppState, area: Rect) {
    let (status_text, status_color) = match &app.status {
        ConnectionStatus::Connected => ("● connected".to_string(), Color::Green),
        ConnectionStatus::Connecting => ("◌ connecting".to_string(), Color::Yellow),
        ConnectionStatus::Error(e) => (format!("✗ {}", truncate(e, 40)), Color::Red),
    };

    let mut spans = vec![
        Span::styled(
            " Schedule Monitor  ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled(status_text, Style::default().fg(status_color)),
        Span::raw("  │  "),
        Span::styled(
            format!("{} {}", app.clock.display_time, app.clock.display_zone),
            Style::default().fg(Color::White),
        ),
        Span::raw("  │  "),
    ];

    match &app.clock.badge {
        Some(b) => {
            spans.push(Span::styled(
                format!(" {} ", b.label),
                Style::default()
                    .fg(Color::Black)
                    .bg(hex_color(&b.color))
                    .add_modifier(Modifier::BOLD),
            ));
            spans.push(Span::raw(format!(" {}", b.period)));
        }
        None => spans.push(Span::styled("market status —", Style::default().fg(Color::DarkGray))),
    }
    if let Some(c) = &app.clock.countdown {
        spans.push(Span::raw("  │  "));
        spans.push(Span::styled(c.display.clone(), Style::default().fg(Color::White)));
    }

    let summary = &app.history.summary;
    spans.push(Span::raw("  │  "));
    spans.push(Span::styled(
        format!(
            "runs {}/{} ok, avg {}",
            summary.successful_runs,
            summary.total_runs,
            format_avg_seconds(summary.avg_duration_seconds)
        ),
        Style::default().fg(if summary.failed_runs > 0 { Color::Yellow } else { Color::White }),
    ));

    let paragraph = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    f.render_widget(paragraph, area);
}

fn render_body(f: &mut Frame, app: &AppState, preset_state: &mut TableState, area: Rect) {
    // presets (55%) | timeline over events (45%)
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(halves[1]);

    render_presets_table(f, app, preset_state, halves[0]);
    render_timeline(f, app, right[0]);
    render_events(f, app, right[1]);
}

fn render_presets_table(f: &mut Frame, app: &AppState, state: &mut TableState, area: Rect) {
    let header_cells = ["Preset", "Time", "State", "Status", "Actions"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells).height(1);

    let rows: Vec<Row> = app
        .reconciled
        .presets
        .iter()
        .map(|r| {
            let (state_text, state_color, status) = match &r.job {
                None => ("Not Configured", Color::DarkGray, "—".to_string()),
                Some(j) if j.enabled => ("Enabled", Color::Green, j.status.clone()),
                Some(j) => ("Disabled", Color::Yellow, j.status.clone()),
            };
            let status_color = match status.as_str() {
                "failed" => Color::Red,
                "running" => Color::Cyan,
                _ => Color::White,
            };
            let actions = if r.actions.is_empty() {
                "read-only".to_string()
            } else {
                r.actions.join("/")
            };

            Row::new(vec![
                Cell::from(truncate(&r.preset.name, 28)),
                Cell::from(r.preset.display_time.clone()).style(Style::default().fg(Color::Cyan)),
                Cell::from(state_text).style(Style::default().fg(state_color)),
                Cell::from(status).style(Style::default().fg(status_color)),
                Cell::from(actions).style(Style::default().fg(Color::DarkGray)),
            ])
        })
        .collect();

    let title = format!(
        " PRESETS ({} custom jobs) ",
        app.reconciled.custom_jobs.len()
    );
    let table = Table::new(
        rows,
        [
            Constraint::Min(12),
            Constraint::Length(6),
            Constraint::Length(15),
            Constraint::Length(10),
            Constraint::Length(12),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(Span::styled(
                title,
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
    )
    .row_highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD));

    f.render_stateful_widget(table, area, state);
}

fn render_timeline(f: &mut Frame, app: &AppState, area: Rect) {
    let zone = app.display_zone();
    let rows: Vec<Row> = app
        .timeline
        .events
        .iter()
        .map(|e| {
            let color = hex_color(&e.color);
            Row::new(vec![
                Cell::from("●").style(Style::default().fg(color)),
                Cell::from(format_slot(e.scheduled_at, zone)).style(Style::default().fg(Color::DarkGray)),
                Cell::from(truncate(&e.job_name, 26)),
                Cell::from(e.session_label.clone()).style(Style::default().fg(color)),
            ])
        })
        .collect();

    let title = format!(
        " NEXT {}H · {} ",
        app.timeline.horizon_hours, app.timeline.strategy
    );
    let table = Table::new(
        rows,
        [
            Constraint::Length(1),
            Constraint::Length(9),
            Constraint::Min(10),
            Constraint::Length(12),
        ],
    )
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(Span::styled(
                title,
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
    );

    f.render_widget(table, area);
}

fn render_events(f: &mut Frame, app: &AppState, area: Rect) {
    let rows: Vec<Row> = app
        .events
        .iter()
        .map(|e| {
            let color = match e.event.as_str() {
                "completed" => Color::Green,
                "failed" => Color::Red,
                "started" => Color::Cyan,
                _ => Color::White,
            };
            Row::new(vec![
                Cell::from(truncate(e.timestamp.as_deref().unwrap_or("—"), 19))
                    .style(Style::default().fg(Color::DarkGray)),
                Cell::from(truncate(&e.job_name, 24)),
                Cell::from(e.event.clone()).style(Style::default().fg(color)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [Constraint::Length(19), Constraint::Min(10), Constraint::Length(10)],
    )
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(Span::styled(
                " JOB EVENTS ",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
    );

    f.render_widget(table, area);
}

fn render_footer(f: &mut Frame, app: &AppState, area: Rect) {
    let mut spans = vec![
        Span::styled(" [q] ", Style::default().fg(Color::Yellow)),
        Span::raw("quit  "),
        Span::styled("[r] ", Style::default().fg(Color::Yellow)),
        Span::raw("refresh  "),
        Span::styled("[↑↓ / j k] ", Style::default().fg(Color::Yellow)),
        Span::raw("select  "),
        Span::styled("[x] ", Style::default().fg(Color::Yellow)),
        Span::raw("run  "),
        Span::styled("[e] ", Style::default().fg(Color::Yellow)),
        Span::raw("enable/disable  "),
        Span::styled("[s] ", Style::default().fg(Color::Yellow)),
        Span::raw(format!("strategy: {}  ", STRATEGIES[app.strategy])),
    ];
    if let Some(flash) = &app.flash {
        spans.push(Span::styled(flash.clone(), Style::default().fg(Color::Magenta)));
    }
    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().fg(Color::White));
    f.render_widget(paragraph, area);
}
